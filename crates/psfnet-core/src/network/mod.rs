//! The kernel-estimation network: stem, correlation pyramid, top-down
//! fusion and kernel head, assembled once from a [`KernelNetConfig`].

mod decoder;
mod encoder;
mod head;

use ndarray::{Array2, ArrayView3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::KernelNetConfig;
use crate::consts::COLOR_CHANNEL_COUNT;
use crate::error::{KernelNetError, Result};
use crate::layers::{ConvWeights, ShiftWindow};
use crate::ops::{rgb_to_grayscale, standardize};

pub use decoder::{Decoder, FusionStage};
pub use encoder::{shift_schedule, Encoder, PyramidLevel};
pub use head::KernelHead;

/// Shape of a graph input or output. `None` marks a free dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorSlot {
    pub name: &'static str,
    pub shape: Vec<Option<usize>>,
}

/// Assembled network. Topology is fixed at construction; weights can be
/// replaced through [`named_weights_mut`](Self::named_weights_mut).
#[derive(Clone, Debug)]
pub struct KernelNetwork {
    pub encoder: Encoder,
    pub decoder: Decoder,
    pub head: KernelHead,
}

impl KernelNetwork {
    /// Build the graph with Glorot-initialised weights seeded from
    /// `config.seed`. The config is assumed to be validated.
    pub fn build(config: &KernelNetConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let encoder = Encoder::build(config, &mut rng);
        let decoder = Decoder::build(config, &mut rng);
        let head = KernelHead::build(config, &mut rng);
        Self {
            encoder,
            decoder,
            head,
        }
    }

    /// Per-image input: `(height, width, 3)` with free spatial size.
    pub fn inputs(&self) -> Vec<TensorSlot> {
        vec![TensorSlot {
            name: "image",
            shape: vec![None, None, Some(COLOR_CHANNEL_COUNT)],
        }]
    }

    /// Per-image output: the `(kernel_h, kernel_w)` kernel.
    pub fn outputs(&self) -> Vec<TensorSlot> {
        let (kh, kw) = self.head.kernel_size;
        vec![TensorSlot {
            name: "kernel",
            shape: vec![Some(kh), Some(kw)],
        }]
    }

    pub fn kernel_size(&self) -> (usize, usize) {
        self.head.kernel_size
    }

    pub fn n_levels(&self) -> usize {
        self.encoder.levels.len()
    }

    pub fn shift_windows(&self) -> Vec<ShiftWindow> {
        self.encoder.shift_windows()
    }

    /// Estimate the kernel of one `(height, width, 3)` image.
    pub fn forward(&self, image: ArrayView3<f32>) -> Result<Array2<f32>> {
        let channels = image.dim().2;
        if channels != COLOR_CHANNEL_COUNT {
            return Err(KernelNetError::InvalidShape(format!(
                "Expected {} color channels, got {}",
                COLOR_CHANNEL_COUNT, channels
            )));
        }
        // Blur is assumed identical across color channels.
        let stem = standardize(rgb_to_grayscale(image));
        let maps = self.encoder.forward(stem)?;
        let fused = self.decoder.forward(maps)?;
        self.head.forward(&fused)
    }

    /// Every parameterised layer with its stable identifier, in build order.
    pub fn named_weights(&self) -> Vec<(String, &ConvWeights)> {
        let mut out: Vec<(String, &ConvWeights)> = self
            .encoder
            .levels
            .iter()
            .flat_map(|l| l.named_weights())
            .collect();
        out.extend(self.decoder.named_weights());
        out.extend(self.head.named_weights());
        out
    }

    pub fn named_weights_mut(&mut self) -> Vec<(String, &mut ConvWeights)> {
        let mut out: Vec<(String, &mut ConvWeights)> = self
            .encoder
            .levels
            .iter_mut()
            .flat_map(|l| l.named_weights_mut())
            .collect();
        out.extend(self.decoder.named_weights_mut());
        out.extend(self.head.named_weights_mut());
        out
    }

    pub fn parameter_count(&self) -> usize {
        self.named_weights()
            .iter()
            .map(|(_, w)| w.parameter_count())
            .sum()
    }
}
