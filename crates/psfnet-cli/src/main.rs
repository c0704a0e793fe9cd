mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "psfnet", about = "Blur kernel estimation from single images")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the blur kernel of one or more images
    Estimate(commands::estimate::EstimateArgs),
    /// Print or save the default network config
    Config(commands::config::ConfigArgs),
    /// Describe the network built from a config
    Info(commands::info::InfoArgs),
    /// Write freshly initialized weights to a file
    InitWeights(commands::init_weights::InitWeightsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Estimate(args) => commands::estimate::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::InitWeights(args) => commands::init_weights::run(args),
    }
}
