use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use psfnet_core::KernelEstimator;

use super::load_config;
use crate::summary::print_architecture;

#[derive(Args)]
pub struct InfoArgs {
    /// Network config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List every parameterised layer
    #[arg(long)]
    pub layers: bool,

    /// Input height, to show the crop used for prediction
    #[arg(long, requires = "width")]
    pub height: Option<usize>,

    /// Input width, to show the crop used for prediction
    #[arg(long, requires = "height")]
    pub width: Option<usize>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let estimator = KernelEstimator::new(config)?;
    print_architecture(estimator.network(), args.layers);

    if let (Some(h), Some(w)) = (args.height, args.width) {
        let crop = estimator
            .crop_window(h, w)
            .with_context(|| format!("No usable crop for a {}x{} input", w, h))?;
        println!(
            "Crop:        {}x{} at ({}, {}) of {}x{}",
            crop.width, crop.height, crop.x, crop.y, w, h
        );
    }

    Ok(())
}
