pub mod config;
pub mod consts;
pub mod error;
pub mod estimator;
pub mod fft;
pub mod io;
pub mod layers;
pub mod network;
pub mod ops;
pub mod shape;

pub use config::{Activation, KernelNetConfig, MaxInputSize};
pub use error::{KernelNetError, Result};
pub use estimator::KernelEstimator;
pub use shape::{CropWindow, SafeShapeCatalog};
