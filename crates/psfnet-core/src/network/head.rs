use ndarray::{Array2, Array3, Axis};
use rand::Rng;

use crate::config::{Activation, KernelNetConfig};
use crate::consts::HEAD_OUTPUT_FILTER_SIZE;
use crate::error::{KernelNetError, Result};
use crate::layers::{Conv2d, ConvWeights, Padding};
use crate::ops::normalize_sum;

/// Collapses the fused features into a normalized kernel.
#[derive(Clone, Debug)]
pub struct KernelHead {
    pub convs: Vec<Conv2d>,
    /// Single-channel output; ReLU keeps the kernel non-negative.
    pub output: Conv2d,
    pub kernel_size: (usize, usize),
}

impl KernelHead {
    pub fn build<R: Rng>(config: &KernelNetConfig, rng: &mut R) -> Self {
        let f = config.filter_size_after_cc;
        let mut channels = config.n_upsampling_features;
        let mut convs = Vec::with_capacity(config.n_conv_filters_before_output.len());
        for &width in &config.n_conv_filters_before_output {
            convs.push(Conv2d::new(
                ConvWeights::glorot((f, f), channels, width, rng),
                1,
                Padding::Same,
                config.activation,
            ));
            channels = width;
        }
        let k = HEAD_OUTPUT_FILTER_SIZE;
        let output = Conv2d::new(
            ConvWeights::glorot((k, k), channels, 1, rng),
            1,
            Padding::Same,
            Activation::Relu,
        );
        Self {
            convs,
            output,
            kernel_size: (config.kernel_height(), config.kernel_width()),
        }
    }

    /// Produce a `kernel_size` kernel that is non-negative and sums to 1.
    pub fn forward(&self, fused: &Array3<f32>) -> Result<Array2<f32>> {
        let x = self.convs.iter().try_fold(fused.clone(), |x, conv| conv.forward(&x))?;
        let x = self.output.forward(&x)?;

        let (h, w, c) = x.dim();
        if (h, w) != self.kernel_size || c != 1 {
            return Err(KernelNetError::InvalidShape(format!(
                "Head produced a {}x{}x{} map, expected {}x{}x1",
                h, w, c, self.kernel_size.0, self.kernel_size.1
            )));
        }
        let kernel = x.index_axis_move(Axis(2), 0);
        Ok(normalize_sum(kernel, 1.0))
    }

    pub fn named_weights(&self) -> Vec<(String, &ConvWeights)> {
        let mut out: Vec<(String, &ConvWeights)> = self
            .convs
            .iter()
            .enumerate()
            .map(|(j, conv)| (format!("head/conv{}", j), &conv.weights))
            .collect();
        out.push(("head/output".to_string(), &self.output.weights));
        out
    }

    pub fn named_weights_mut(&mut self) -> Vec<(String, &mut ConvWeights)> {
        let mut out: Vec<(String, &mut ConvWeights)> = self
            .convs
            .iter_mut()
            .enumerate()
            .map(|(j, conv)| (format!("head/conv{}", j), &mut conv.weights))
            .collect();
        out.push(("head/output".to_string(), &mut self.output.weights));
        out
    }
}
