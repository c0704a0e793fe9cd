pub mod config;
pub mod estimate;
pub mod info;
pub mod init_weights;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use psfnet_core::KernelNetConfig;

/// Read a TOML config, or fall back to the defaults.
pub fn load_config(path: Option<&PathBuf>) -> Result<KernelNetConfig> {
    match path {
        Some(path) => KernelNetConfig::from_toml_file(path)
            .with_context(|| format!("Failed to read config {}", path.display())),
        None => Ok(KernelNetConfig::default()),
    }
}

/// Output file for the kernel of `input`: `<dir>/<stem>_kernel.<ext>`.
pub fn kernel_output_path(dir: &Path, input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    dir.join(format!("{stem}_kernel.{extension}"))
}
