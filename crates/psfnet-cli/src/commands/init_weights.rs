use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use psfnet_core::KernelEstimator;

use super::load_config;

#[derive(Args)]
pub struct InitWeightsArgs {
    /// Network config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Initialisation seed, overriding the config
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output weight file
    #[arg(short, long, default_value = "psfnet.weights")]
    pub output: PathBuf,
}

pub fn run(args: &InitWeightsArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let seed = config.seed;

    let estimator = KernelEstimator::new(config)?;
    estimator
        .save_weights(&args.output)
        .with_context(|| format!("Failed to write weights to {}", args.output.display()))?;

    println!(
        "Saved {} parameters (seed {}) to {}",
        estimator.network().parameter_count(),
        seed,
        args.output.display()
    );
    Ok(())
}
