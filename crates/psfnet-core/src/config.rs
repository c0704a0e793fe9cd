use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_INIT_SEED;
use crate::error::Result;

/// Hyperparameters of the kernel-estimation network.
///
/// Level `i` of the pyramid works at resolution `(h / 2^i, w / 2^i)`.
/// The struct is a plain data holder; it is validated by
/// [`KernelEstimator::new`](crate::estimator::KernelEstimator::new).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelNetConfig {
    /// Number of pyramid levels.
    pub n_levels: usize,
    /// Largest kernel grid supported, `[height, width]`, both odd.
    /// Images blurred with a larger kernel should be downsampled first.
    pub max_kernel_size: [usize; 2],

    pub conv_block_size: usize,
    pub conv_block_n_features: usize,
    pub conv_block_filter_size: usize,
    pub activation: Activation,

    pub n_downsample_features: usize,
    pub downsample_filter_size: usize,

    pub n_upsampling_features: usize,
    pub upsample_filter_size: usize,

    pub cc_num_of_in_features: usize,
    pub is_add_flips: bool,

    pub filter_size_after_cc: usize,
    pub n_conv_filters_before_output: Vec<usize>,

    /// Largest input window used for prediction. When the input is larger,
    /// a centered window is cropped. Useful when the correlation step runs
    /// out of memory, at some cost in accuracy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_input_size: Option<MaxInputSize>,

    /// Seed of the Glorot-uniform weight initialisation.
    pub seed: u64,
}

impl Default for KernelNetConfig {
    fn default() -> Self {
        Self {
            n_levels: 4,
            max_kernel_size: [85, 85],
            conv_block_size: 3,
            conv_block_n_features: 64,
            conv_block_filter_size: 7,
            activation: Activation::Relu,
            n_downsample_features: 1,
            downsample_filter_size: 5,
            n_upsampling_features: 32,
            upsample_filter_size: 5,
            cc_num_of_in_features: 32,
            is_add_flips: true,
            filter_size_after_cc: 3,
            n_conv_filters_before_output: vec![24, 16, 8],
            max_input_size: None,
            seed: DEFAULT_INIT_SEED,
        }
    }
}

impl KernelNetConfig {
    /// Parse a config from TOML text. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn kernel_height(&self) -> usize {
        self.max_kernel_size[0]
    }

    pub fn kernel_width(&self) -> usize {
        self.max_kernel_size[1]
    }
}

/// Element-wise non-linearity applied after a layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Linear,
    Tanh,
    Sigmoid,
    Elu,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Linear => x,
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Elu => {
                if x > 0.0 {
                    x
                } else {
                    x.exp_m1()
                }
            }
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Relu => write!(f, "ReLU"),
            Activation::Linear => write!(f, "Linear"),
            Activation::Tanh => write!(f, "Tanh"),
            Activation::Sigmoid => write!(f, "Sigmoid"),
            Activation::Elu => write!(f, "ELU"),
        }
    }
}

/// Bound on the prediction input size. A scalar or a one-element list
/// applies to both axes; a two-element list is `[height, width]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxInputSize {
    Scalar(usize),
    Pair([usize; 2]),
    Single([usize; 1]),
}

impl MaxInputSize {
    /// The bound as `(height, width)`.
    pub fn dims(&self) -> (usize, usize) {
        match *self {
            MaxInputSize::Scalar(s) => (s, s),
            MaxInputSize::Single([s]) => (s, s),
            MaxInputSize::Pair([h, w]) => (h, w),
        }
    }

    /// Largest area (in pixels) a cropped input may have.
    pub fn area(&self) -> usize {
        let (h, w) = self.dims();
        h.saturating_mul(w)
    }
}

impl fmt::Display for MaxInputSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, w) = self.dims();
        write!(f, "{}x{}", w, h)
    }
}
