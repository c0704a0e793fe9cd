use std::path::Path;

use ndarray::{Array3, ArrayD, ArrayView4, Axis, Ix4};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::KernelNetConfig;
use crate::consts::COLOR_CHANNEL_COUNT;
use crate::error::{KernelNetError, Result};
use crate::io::weights::WeightStore;
use crate::network::KernelNetwork;
use crate::ops::crop_batch;
use crate::shape::{CropWindow, SafeShapeCatalog};

/// Blur-kernel estimator: a validated config, the network built from it,
/// and the safe-shape catalog used to crop prediction inputs.
#[derive(Clone, Debug)]
pub struct KernelEstimator {
    config: KernelNetConfig,
    network: KernelNetwork,
    catalog: SafeShapeCatalog,
}

impl KernelEstimator {
    /// Validate `config` and build the network.
    pub fn new(config: KernelNetConfig) -> Result<Self> {
        validate_config(&config)?;
        let network = KernelNetwork::build(&config);
        info!(
            levels = config.n_levels,
            kernel = %format!("{}x{}", config.kernel_width(), config.kernel_height()),
            parameters = network.parameter_count(),
            "Kernel network built"
        );
        Ok(Self {
            config,
            network,
            catalog: SafeShapeCatalog::default(),
        })
    }

    /// Build the network and load weights from `weights_path`.
    pub fn with_weights(config: KernelNetConfig, weights_path: &Path) -> Result<Self> {
        let mut estimator = Self::new(config)?;
        estimator.load_weights(weights_path)?;
        Ok(estimator)
    }

    /// Replace the safe-shape catalog (the default is the built-in table).
    pub fn with_catalog(mut self, catalog: SafeShapeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &KernelNetConfig {
        &self.config
    }

    pub fn network(&self) -> &KernelNetwork {
        &self.network
    }

    pub fn n_levels(&self) -> usize {
        self.config.n_levels
    }

    pub fn load_weights(&mut self, path: &Path) -> Result<()> {
        let store = WeightStore::open(path)?;
        store.apply_to(&mut self.network)
    }

    pub fn save_weights(&self, path: &Path) -> Result<()> {
        WeightStore::from_network(&self.network).save(path)
    }

    /// Crop window that prediction would use for a `height x width` input.
    pub fn crop_window(&self, height: usize, width: usize) -> Result<CropWindow> {
        self.catalog
            .select(height, width, self.config.max_input_size.as_ref())
    }

    /// Estimate one kernel per image of a `(batch, height, width, 3)` array.
    ///
    /// Images are processed `batch_size` at a time; grouping only bounds
    /// memory use and never changes the results.
    pub fn predict(&self, images: &ArrayD<f32>, batch_size: usize) -> Result<Array3<f32>> {
        self.predict_with_progress(images, batch_size, |_, _| {})
    }

    /// Like [`predict`](Self::predict), calling `progress(done, total)` after
    /// each group.
    pub fn predict_with_progress(
        &self,
        images: &ArrayD<f32>,
        batch_size: usize,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<Array3<f32>> {
        let batch = as_bhwc(images)?;
        let (n, h, w, _) = batch.dim();
        let window = self.crop_window(h, w)?;
        let cropped = crop_batch(batch, &window);
        let group = batch_size.max(1);
        info!(
            images = n,
            crop = %format!("{}x{}", window.width, window.height),
            batch_size = group,
            "Predicting kernels"
        );

        let (kh, kw) = self.network.kernel_size();
        let mut kernels = Array3::<f32>::zeros((n, kh, kw));
        let mut done = 0;
        for (chunk, mut out) in cropped
            .axis_chunks_iter(Axis(0), group)
            .zip(kernels.axis_chunks_iter_mut(Axis(0), group))
        {
            let estimates: Vec<_> = chunk
                .outer_iter()
                .into_par_iter()
                .map(|image| self.network.forward(image))
                .collect::<Result<_>>()?;
            for (mut dst, kernel) in out.outer_iter_mut().zip(estimates) {
                dst.assign(&kernel);
            }
            done += chunk.len_of(Axis(0));
            debug!(done, total = n, "Kernel batch done");
            progress(done, n);
        }
        Ok(kernels)
    }
}

fn as_bhwc(images: &ArrayD<f32>) -> Result<ArrayView4<'_, f32>> {
    let shape = images.shape().to_vec();
    let batch = images.view().into_dimensionality::<Ix4>().map_err(|_| {
        KernelNetError::InvalidShape(format!(
            "Images must be in BHWC layout (4 dimensions), got shape {:?}",
            shape
        ))
    })?;
    if shape[3] != COLOR_CHANNEL_COUNT {
        return Err(KernelNetError::InvalidShape(format!(
            "Images must have {} color channels, got shape {:?}",
            COLOR_CHANNEL_COUNT, shape
        )));
    }
    Ok(batch)
}

/// Checks the invariants the network topology relies on.
pub fn validate_config(config: &KernelNetConfig) -> Result<()> {
    if config.n_levels == 0 {
        return Err(KernelNetError::InvalidConfiguration(
            "n_levels must be at least 1".into(),
        ));
    }
    let [kh, kw] = config.max_kernel_size;
    if kh % 2 == 0 || kw % 2 == 0 {
        return Err(KernelNetError::InvalidConfiguration(format!(
            "max_kernel_size must be odd but got ({}, {})",
            kh, kw
        )));
    }
    let sizes = [
        ("conv_block_n_features", config.conv_block_n_features),
        ("conv_block_filter_size", config.conv_block_filter_size),
        ("n_downsample_features", config.n_downsample_features),
        ("downsample_filter_size", config.downsample_filter_size),
        ("n_upsampling_features", config.n_upsampling_features),
        ("upsample_filter_size", config.upsample_filter_size),
        ("cc_num_of_in_features", config.cc_num_of_in_features),
        ("filter_size_after_cc", config.filter_size_after_cc),
    ];
    if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
        return Err(KernelNetError::InvalidConfiguration(format!(
            "{} must be positive",
            name
        )));
    }
    if config.n_conv_filters_before_output.contains(&0) {
        return Err(KernelNetError::InvalidConfiguration(
            "n_conv_filters_before_output widths must be positive".into(),
        ));
    }
    if let Some(bound) = config.max_input_size {
        let (h, w) = bound.dims();
        if h == 0 || w == 0 {
            return Err(KernelNetError::InvalidConfiguration(format!(
                "max_input_size must be positive, got {}",
                bound
            )));
        }
    }
    Ok(())
}
