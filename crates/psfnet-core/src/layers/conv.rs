use std::borrow::Cow;

use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array1, Array2, Array3, Array4};
use rand::Rng;

use crate::config::Activation;
use crate::error::{KernelNetError, Result};

/// Spatial padding mode, with the usual deep-learning semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding {
    /// No padding; each axis shrinks by `filter - 1` before striding.
    Valid,
    /// Zero padding so the output is `ceil(input / stride)`. An odd total
    /// pad puts the extra row/column at the bottom/right.
    Same,
}

/// Trainable parameters of a convolution.
///
/// `kernel` is laid out `(filter_h, filter_w, in_channels, out_channels)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvWeights {
    pub kernel: Array4<f32>,
    pub bias: Array1<f32>,
}

impl ConvWeights {
    /// Glorot-uniform kernel and zero bias.
    pub fn glorot<R: Rng>(
        filter: (usize, usize),
        in_channels: usize,
        out_channels: usize,
        rng: &mut R,
    ) -> Self {
        let (kh, kw) = filter;
        let receptive = (kh * kw) as f64;
        let fan_in = receptive * in_channels as f64;
        let fan_out = receptive * out_channels as f64;
        let limit = (6.0 / (fan_in + fan_out)).sqrt() as f32;
        let kernel = Array4::from_shape_simple_fn((kh, kw, in_channels, out_channels), || {
            rng.random_range(-limit..=limit)
        });
        Self {
            kernel,
            bias: Array1::zeros(out_channels),
        }
    }

    pub fn filter_size(&self) -> (usize, usize) {
        let (kh, kw, _, _) = self.kernel.dim();
        (kh, kw)
    }

    pub fn in_channels(&self) -> usize {
        self.kernel.dim().2
    }

    pub fn out_channels(&self) -> usize {
        self.kernel.dim().3
    }

    pub fn parameter_count(&self) -> usize {
        self.kernel.len() + self.bias.len()
    }

    fn check_input(&self, input: &Array3<f32>) -> Result<()> {
        let channels = input.dim().2;
        if channels != self.in_channels() {
            return Err(KernelNetError::InvalidShape(format!(
                "Layer expects {} input channels, got {}",
                self.in_channels(),
                channels
            )));
        }
        Ok(())
    }

    fn finish(&self, mut out: Array2<f32>, activation: Activation) -> Array2<f32> {
        out += &self.bias;
        if activation != Activation::Linear {
            out.mapv_inplace(|v| activation.apply(v));
        }
        out
    }
}

/// 2D convolution over an HWC feature map.
#[derive(Clone, Debug)]
pub struct Conv2d {
    pub weights: ConvWeights,
    pub stride: usize,
    pub padding: Padding,
    pub activation: Activation,
}

impl Conv2d {
    pub fn new(weights: ConvWeights, stride: usize, padding: Padding, activation: Activation) -> Self {
        Self {
            weights,
            stride,
            padding,
            activation,
        }
    }

    /// Output spatial size for an `h x w` input, or `None` if the input is
    /// smaller than the filter.
    pub fn output_size(&self, h: usize, w: usize) -> Option<(usize, usize)> {
        let (kh, kw) = self.weights.filter_size();
        match self.padding {
            Padding::Same => Some((h.div_ceil(self.stride), w.div_ceil(self.stride))),
            Padding::Valid => {
                if h < kh || w < kw {
                    None
                } else {
                    Some(((h - kh) / self.stride + 1, (w - kw) / self.stride + 1))
                }
            }
        }
    }

    pub fn forward(&self, input: &Array3<f32>) -> Result<Array3<f32>> {
        self.weights.check_input(input)?;
        let (h, w, cin) = input.dim();
        let (kh, kw) = self.weights.filter_size();
        let cout = self.weights.out_channels();
        let stride = self.stride;

        let (oh, ow) = self.output_size(h, w).ok_or_else(|| {
            KernelNetError::InvalidShape(format!(
                "Feature map {}x{} is smaller than the {}x{} filter; input too small",
                w, h, kw, kh
            ))
        })?;
        if oh == 0 || ow == 0 {
            return Err(KernelNetError::InvalidShape(format!(
                "Empty {}x{} feature map",
                w, h
            )));
        }

        let padded: Cow<'_, Array3<f32>> = match self.padding {
            Padding::Valid => Cow::Borrowed(input),
            Padding::Same => {
                let (top, bottom) = same_padding(h, kh, stride);
                let (left, right) = same_padding(w, kw, stride);
                Cow::Owned(zero_pad(input, top, bottom, left, right))
            }
        };

        // One matrix product per filter tap: (pixels x cin) . (cin x cout).
        let mut out = Array2::<f32>::zeros((oh * ow, cout));
        for ky in 0..kh {
            for kx in 0..kw {
                let window = padded.slice(s![
                    ky..ky + (oh - 1) * stride + 1;stride,
                    kx..kx + (ow - 1) * stride + 1;stride,
                    ..
                ]);
                let cols = window
                    .to_shape((oh * ow, cin))
                    .map_err(|e| KernelNetError::InvalidShape(e.to_string()))?;
                let taps = self.weights.kernel.slice(s![ky, kx, .., ..]);
                general_mat_mul(1.0, &cols, &taps, 1.0, &mut out);
            }
        }

        self.weights
            .finish(out, self.activation)
            .into_shape_with_order((oh, ow, cout))
            .map_err(|e| KernelNetError::InvalidShape(e.to_string()))
    }
}

/// Transposed 2D convolution with "valid" padding:
/// output size is `(input - 1) * stride + filter` per axis.
#[derive(Clone, Debug)]
pub struct ConvTranspose2d {
    pub weights: ConvWeights,
    pub stride: usize,
    pub activation: Activation,
}

impl ConvTranspose2d {
    pub fn new(weights: ConvWeights, stride: usize, activation: Activation) -> Self {
        Self {
            weights,
            stride,
            activation,
        }
    }

    pub fn output_size(&self, h: usize, w: usize) -> (usize, usize) {
        let (kh, kw) = self.weights.filter_size();
        (
            h.saturating_sub(1) * self.stride + kh,
            w.saturating_sub(1) * self.stride + kw,
        )
    }

    pub fn forward(&self, input: &Array3<f32>) -> Result<Array3<f32>> {
        self.weights.check_input(input)?;
        let (h, w, cin) = input.dim();
        if h == 0 || w == 0 {
            return Err(KernelNetError::InvalidShape("Empty feature map".into()));
        }
        let (kh, kw) = self.weights.filter_size();
        let cout = self.weights.out_channels();
        let stride = self.stride;
        let (oh, ow) = self.output_size(h, w);

        let cols = input
            .to_shape((h * w, cin))
            .map_err(|e| KernelNetError::InvalidShape(e.to_string()))?;

        // Each input pixel scatters `filter` taps into a strided output grid.
        let mut out = Array3::<f32>::zeros((oh, ow, cout));
        for ky in 0..kh {
            for kx in 0..kw {
                let taps = self.weights.kernel.slice(s![ky, kx, .., ..]);
                let contrib = cols
                    .dot(&taps)
                    .into_shape_with_order((h, w, cout))
                    .map_err(|e| KernelNetError::InvalidShape(e.to_string()))?;
                let mut dst = out.slice_mut(s![
                    ky..ky + (h - 1) * stride + 1;stride,
                    kx..kx + (w - 1) * stride + 1;stride,
                    ..
                ]);
                dst += &contrib;
            }
        }

        let flat = out
            .into_shape_with_order((oh * ow, cout))
            .map_err(|e| KernelNetError::InvalidShape(e.to_string()))?;
        self.weights
            .finish(flat, self.activation)
            .into_shape_with_order((oh, ow, cout))
            .map_err(|e| KernelNetError::InvalidShape(e.to_string()))
    }
}

/// `(before, after)` zero padding of one axis for "same" convolution.
pub fn same_padding(size: usize, filter: usize, stride: usize) -> (usize, usize) {
    let out = size.div_ceil(stride);
    let total = ((out.saturating_sub(1)) * stride + filter).saturating_sub(size);
    let before = total / 2;
    (before, total - before)
}

fn zero_pad(input: &Array3<f32>, top: usize, bottom: usize, left: usize, right: usize) -> Array3<f32> {
    let (h, w, c) = input.dim();
    let mut padded = Array3::<f32>::zeros((h + top + bottom, w + left + right, c));
    padded
        .slice_mut(s![top..top + h, left..left + w, ..])
        .assign(input);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ones_weights(filter: usize, cin: usize, cout: usize) -> ConvWeights {
        ConvWeights {
            kernel: Array4::ones((filter, filter, cin, cout)),
            bias: Array1::zeros(cout),
        }
    }

    #[test]
    fn test_same_padding_splits_extra_to_end() {
        assert_eq!(same_padding(10, 3, 1), (1, 1));
        assert_eq!(same_padding(10, 5, 2), (1, 2));
        assert_eq!(same_padding(9, 5, 2), (2, 2));
    }

    #[test]
    fn test_valid_conv_box_sum() {
        let conv = Conv2d::new(ones_weights(3, 1, 1), 1, Padding::Valid, Activation::Linear);
        let input = Array3::ones((5, 6, 1));
        let out = conv.forward(&input).unwrap();
        assert_eq!(out.dim(), (3, 4, 1));
        assert!(out.iter().all(|&v| (v - 9.0).abs() < 1e-6));
    }

    #[test]
    fn test_same_strided_conv_shape() {
        let conv = Conv2d::new(ones_weights(5, 1, 2), 2, Padding::Same, Activation::Linear);
        let out = conv.forward(&Array3::ones((11, 8, 1))).unwrap();
        assert_eq!(out.dim(), (6, 4, 2));
    }

    #[test]
    fn test_transposed_conv_scatter() {
        let conv = ConvTranspose2d::new(ones_weights(3, 1, 1), 2, Activation::Linear);
        let out = conv.forward(&Array3::ones((2, 2, 1))).unwrap();
        assert_eq!(out.dim(), (5, 5, 1));
        // The middle row/column receives taps from two input pixels.
        assert_eq!(out[[0, 0, 0]], 1.0);
        assert_eq!(out[[2, 0, 0]], 2.0);
        assert_eq!(out[[2, 2, 0]], 4.0);
    }

    #[test]
    fn test_input_smaller_than_filter_is_rejected() {
        let conv = Conv2d::new(ones_weights(7, 1, 1), 1, Padding::Valid, Activation::Relu);
        assert!(conv.forward(&Array3::ones((4, 10, 1))).is_err());
    }
}
