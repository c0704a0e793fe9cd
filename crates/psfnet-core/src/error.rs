use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelNetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid input shape: {0}")]
    InvalidShape(String),

    #[error("No known-valid shape fits within a {width}x{height} input")]
    NoValidShape { width: usize, height: usize },

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Invalid weight file: {0}")]
    InvalidWeights(String),

    #[error("Weight mismatch for layer '{layer}': {reason}")]
    WeightMismatch { layer: String, reason: String },

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, KernelNetError>;
