use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array3, Axis};
use psfnet_core::io::image_io::{load_rgb_image, save_kernel_image};
use psfnet_core::{KernelEstimator, MaxInputSize};
use tracing::info;

use super::{kernel_output_path, load_config};
use crate::summary::print_estimate_summary;

#[derive(Clone, Copy, ValueEnum)]
pub enum KernelFormat {
    Tiff,
    Png,
}

impl KernelFormat {
    fn extension(self) -> &'static str {
        match self {
            KernelFormat::Tiff => "tiff",
            KernelFormat::Png => "png",
        }
    }
}

#[derive(Args)]
pub struct EstimateArgs {
    /// Input image files
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Network config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Trained weight file
    #[arg(short, long)]
    pub weights: Option<PathBuf>,

    /// Images processed per group
    #[arg(long, default_value = "1")]
    pub batch_size: usize,

    /// Largest input window, overriding the config
    #[arg(long)]
    pub max_input_size: Option<usize>,

    /// Output directory for kernel images
    #[arg(short, long, default_value = "kernels")]
    pub output: PathBuf,

    /// Kernel image format
    #[arg(long, value_enum, default_value = "tiff")]
    pub format: KernelFormat,
}

pub fn run(args: &EstimateArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(size) = args.max_input_size {
        config.max_input_size = Some(MaxInputSize::Scalar(size));
    }

    print_estimate_summary(&config, args.weights.as_deref(), args.images.len(), args.batch_size);

    let estimator = match args.weights {
        Some(ref path) => KernelEstimator::with_weights(config, path)
            .with_context(|| format!("Failed to load weights {}", path.display()))?,
        None => {
            eprintln!("No weights given; kernels come from an untrained network.");
            KernelEstimator::new(config)?
        }
    };

    // The network runs on equally sized batches, so images are grouped by size.
    let mut groups: BTreeMap<(usize, usize), Vec<(PathBuf, Array3<f32>)>> = BTreeMap::new();
    for path in &args.images {
        let image = load_rgb_image(path)
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        let (h, w, _) = image.dim();
        groups.entry((h, w)).or_default().push((path.clone(), image));
    }

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let pb = ProgressBar::new(args.images.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Estimating [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let mut finished = 0u64;
    for ((h, w), entries) in groups {
        let window = estimator
            .crop_window(h, w)
            .with_context(|| format!("No usable crop for {}x{} images", w, h))?;
        info!(
            images = entries.len(),
            size = %format!("{}x{}", w, h),
            crop = %format!("{}x{}", window.width, window.height),
            "Image group"
        );

        let views: Vec<_> = entries.iter().map(|(_, image)| image.view()).collect();
        let batch = ndarray::stack(Axis(0), &views)?.into_dyn();
        let kernels = estimator.predict_with_progress(&batch, args.batch_size, |done, _| {
            pb.set_position(finished + done as u64);
        })?;
        finished += entries.len() as u64;

        for ((path, _), kernel) in entries.iter().zip(kernels.outer_iter()) {
            let out = kernel_output_path(&args.output, path, args.format.extension());
            save_kernel_image(&kernel.to_owned(), &out)
                .with_context(|| format!("Failed to write {}", out.display()))?;
        }
    }
    pb.finish();

    println!("Saved {} kernels to {}", finished, args.output.display());
    Ok(())
}
