//! Multi-resolution correlation pyramid.
//!
//! Coarse levels see large blur displacements as small discrete shifts, so
//! the shift window halves with the resolution while still covering the
//! full kernel support.

use ndarray::Array3;
use rand::Rng;
use tracing::debug;

use crate::config::{Activation, KernelNetConfig};
use crate::consts::PYRAMID_STRIDE;
use crate::error::Result;
use crate::layers::{Conv2d, ConvWeights, CrossCorrelation, Padding, ShiftWindow};

/// Shift windows of levels `0..n_levels`, starting at half the kernel size
/// and halving (rounding up) per level.
pub fn shift_schedule(max_kernel_size: [usize; 2], n_levels: usize) -> Vec<ShiftWindow> {
    let first = ShiftWindow::for_kernel(max_kernel_size[0], max_kernel_size[1]);
    std::iter::successors(Some(first), |w| Some(w.halved()))
        .take(n_levels)
        .collect()
}

/// One resolution level: conv block, correlation, channel projection and
/// the downsampling that feeds the next level.
#[derive(Clone, Debug)]
pub struct PyramidLevel {
    pub index: usize,
    pub conv_block: Vec<Conv2d>,
    pub cc_in: Conv2d,
    pub correlation: CrossCorrelation,
    pub cc_out: Conv2d,
    /// Strided convolution of this level's *input*; `None` on the last level.
    pub downsample: Option<Conv2d>,
}

impl PyramidLevel {
    fn build<R: Rng>(
        config: &KernelNetConfig,
        index: usize,
        in_channels: usize,
        window: ShiftWindow,
        is_last: bool,
        rng: &mut R,
    ) -> Self {
        let act = config.activation;
        let k = config.conv_block_filter_size;

        let mut conv_block = Vec::with_capacity(config.conv_block_size);
        let mut channels = in_channels;
        for _ in 0..config.conv_block_size {
            let w = ConvWeights::glorot((k, k), channels, config.conv_block_n_features, rng);
            conv_block.push(Conv2d::new(w, 1, Padding::Valid, act));
            channels = config.conv_block_n_features;
        }

        let cc_in = Conv2d::new(
            ConvWeights::glorot((1, 1), channels, config.cc_num_of_in_features, rng),
            1,
            Padding::Valid,
            act,
        );
        let correlation = CrossCorrelation::new(window, config.is_add_flips);
        let cc_channels = correlation.output_channels(config.cc_num_of_in_features);
        let cc_out = Conv2d::new(
            ConvWeights::glorot((1, 1), cc_channels, config.n_upsampling_features, rng),
            1,
            Padding::Same,
            act,
        );

        let downsample = (!is_last).then(|| {
            let d = config.downsample_filter_size;
            Conv2d::new(
                ConvWeights::glorot((d, d), in_channels, config.n_downsample_features, rng),
                PYRAMID_STRIDE,
                Padding::Same,
                Activation::Linear,
            )
        });

        Self {
            index,
            conv_block,
            cc_in,
            correlation,
            cc_out,
            downsample,
        }
    }

    /// Returns this level's feature map and, unless it is the last level,
    /// the downsampled input of the next level.
    pub fn forward(&self, input: &Array3<f32>) -> Result<(Array3<f32>, Option<Array3<f32>>)> {
        let mut x = self.conv_block.iter().try_fold(input.clone(), |x, conv| conv.forward(&x))?;
        x = self.cc_in.forward(&x)?;
        let features_dim = x.dim();
        x = self.correlation.forward(&x)?;
        x = self.cc_out.forward(&x)?;

        // TODO: compare against downsampling the conv-block output instead.
        let next = self
            .downsample
            .as_ref()
            .map(|conv| conv.forward(input))
            .transpose()?;

        debug!(
            level = self.index,
            input = ?input.dim(),
            features = ?features_dim,
            window = ?(self.correlation.window.y, self.correlation.window.x),
            output = ?x.dim(),
            "Pyramid level done"
        );
        Ok((x, next))
    }

    pub fn named_weights(&self) -> Vec<(String, &ConvWeights)> {
        let mut out: Vec<(String, &ConvWeights)> = self
            .conv_block
            .iter()
            .enumerate()
            .map(|(j, conv)| (format!("level{}/conv{}", self.index, j), &conv.weights))
            .collect();
        out.push((format!("level{}/cc_in", self.index), &self.cc_in.weights));
        out.push((format!("level{}/cc_out", self.index), &self.cc_out.weights));
        if let Some(ref d) = self.downsample {
            out.push((format!("level{}/downsample", self.index), &d.weights));
        }
        out
    }

    pub fn named_weights_mut(&mut self) -> Vec<(String, &mut ConvWeights)> {
        let index = self.index;
        let mut out: Vec<(String, &mut ConvWeights)> = self
            .conv_block
            .iter_mut()
            .enumerate()
            .map(|(j, conv)| (format!("level{}/conv{}", index, j), &mut conv.weights))
            .collect();
        out.push((format!("level{}/cc_in", index), &mut self.cc_in.weights));
        out.push((format!("level{}/cc_out", index), &mut self.cc_out.weights));
        if let Some(ref mut d) = self.downsample {
            out.push((format!("level{}/downsample", index), &mut d.weights));
        }
        out
    }
}

/// The full pyramid, finest level first.
#[derive(Clone, Debug)]
pub struct Encoder {
    pub levels: Vec<PyramidLevel>,
}

impl Encoder {
    /// Build all levels, one per entry of [`shift_schedule`].
    pub fn build<R: Rng>(config: &KernelNetConfig, rng: &mut R) -> Self {
        let schedule = shift_schedule(config.max_kernel_size, config.n_levels);
        let last = schedule.len().saturating_sub(1);
        let levels = schedule
            .into_iter()
            .enumerate()
            .map(|(i, window)| {
                let in_channels = if i == 0 { 1 } else { config.n_downsample_features };
                PyramidLevel::build(config, i, in_channels, window, i == last, rng)
            })
            .collect();
        Self { levels }
    }

    pub fn shift_windows(&self) -> Vec<ShiftWindow> {
        self.levels.iter().map(|l| l.correlation.window).collect()
    }

    /// Per-level feature maps, finest first.
    pub fn forward(&self, stem: Array3<f32>) -> Result<Vec<Array3<f32>>> {
        let mut maps = Vec::with_capacity(self.levels.len());
        let mut current = stem;
        for level in &self.levels {
            let (features, next) = level.forward(&current)?;
            maps.push(features);
            match next {
                Some(next) => current = next,
                None => break,
            }
        }
        Ok(maps)
    }
}
