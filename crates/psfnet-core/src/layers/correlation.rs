//! Global cross-correlation ("self-similarity") features.
//!
//! For every ordered channel pair `(i, j)` the operator measures how well
//! channel `i` matches channel `j` shifted by `(dy, dx)`, for all shifts in
//! the window. The output is independent of the input's spatial size: a
//! `(2*sy + 1) x (2*sx + 1)` grid with one channel per pair. Blur spreads
//! image structure along the kernel's support, which shows up as a
//! kernel-shaped bump in these autocorrelations.

use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use num_complex::Complex;
use rayon::prelude::*;
use tracing::debug;

use crate::consts::{
    CORRELATION_PAIR_PLANES, MAX_CORRELATION_WORKSPACE, PARALLEL_PAIR_THRESHOLD,
};
use crate::error::{KernelNetError, Result};
use crate::fft::{fft_friendly_len, Fft2dPlan};

/// Largest displacement considered on each axis at one pyramid level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShiftWindow {
    pub y: usize,
    pub x: usize,
}

impl ShiftWindow {
    pub fn new(y: usize, x: usize) -> Self {
        Self { y, x }
    }

    /// Window covering a kernel of `(height, width)`: half of each side.
    pub fn for_kernel(height: usize, width: usize) -> Self {
        Self::new(height / 2, width / 2)
    }

    /// Window for the next (half resolution) level, rounding up so that the
    /// same physical displacement range is still covered.
    pub fn halved(self) -> Self {
        Self::new(self.y.div_ceil(2), self.x.div_ceil(2))
    }

    /// Spatial size of the correlation output, `(2*y + 1, 2*x + 1)`.
    pub fn output_size(&self) -> (usize, usize) {
        (2 * self.y + 1, 2 * self.x + 1)
    }
}

/// FFT-based cross-correlation feature operator.
#[derive(Clone, Copy, Debug)]
pub struct CrossCorrelation {
    pub window: ShiftWindow,
    pub add_flips: bool,
}

impl CrossCorrelation {
    pub fn new(window: ShiftWindow, add_flips: bool) -> Self {
        Self { window, add_flips }
    }

    pub fn output_channels(&self, in_channels: usize) -> usize {
        let pairs = in_channels * in_channels;
        if self.add_flips {
            2 * pairs
        } else {
            pairs
        }
    }

    /// Correlate all channel pairs of an HWC map.
    ///
    /// Output channel `i * C + j` holds `mean_p f_i(p) * f_j(p + d)`; with
    /// flips, channel `C^2 + i * C + j` uses the 180-degree mirrored `f_j`.
    pub fn forward(&self, input: &Array3<f32>) -> Result<Array3<f32>> {
        let (h, w, c) = input.dim();
        if h == 0 || w == 0 || c == 0 {
            return Err(KernelNetError::InvalidShape(format!(
                "Cannot correlate an empty {}x{}x{} map",
                h, w, c
            )));
        }
        let ShiftWindow { y: sy, x: sx } = self.window;

        // Padding by the shift keeps circular wrap-around out of the window.
        let fh = fft_friendly_len(h + sy);
        let fw = fft_friendly_len(w + sx);
        let n_spectra = if self.add_flips { 2 * c } else { c };
        self.check_workspace(fh, fw, n_spectra)?;

        let plan = Fft2dPlan::new(fh, fw);
        let mut spectra: Vec<Array2<Complex<f64>>> = input
            .axis_iter(Axis(2))
            .into_par_iter()
            .map(|channel| plan.forward_padded(channel))
            .collect();
        if self.add_flips {
            let flipped: Vec<Array2<Complex<f64>>> = input
                .axis_iter(Axis(2))
                .into_par_iter()
                .map(|channel| plan.forward_padded(channel.slice(s![..;-1, ..;-1])))
                .collect();
            spectra.extend(flipped);
        }

        let n_out = self.output_channels(c);
        let scale = 1.0 / (h * w) as f64;
        let (out_h, out_w) = self.window.output_size();
        let correlate = |k: usize| -> Array2<f32> {
            let (i, j) = ((k % (c * c)) / c, k % c);
            let second = if k < c * c { j } else { c + j };
            let product = ndarray::Zip::from(&spectra[i])
                .and(&spectra[second])
                .map_collect(|a, b| a.conj() * b);
            let surface = plan.inverse_real(product);
            extract_window(surface.view(), sy, sx, scale)
        };

        let windows: Vec<Array2<f32>> = if n_out >= PARALLEL_PAIR_THRESHOLD {
            (0..n_out).into_par_iter().map(correlate).collect()
        } else {
            (0..n_out).map(correlate).collect()
        };

        let mut out = Array3::<f32>::zeros((out_h, out_w, n_out));
        for (k, win) in windows.into_iter().enumerate() {
            out.index_axis_mut(Axis(2), k).assign(&win);
        }
        debug!(
            input = ?(h, w, c),
            window = ?(sy, sx),
            channels = n_out,
            "Cross-correlation features computed"
        );
        Ok(out)
    }

    fn check_workspace(&self, fh: usize, fw: usize, n_spectra: usize) -> Result<()> {
        let needed = fh
            .checked_mul(fw)
            .and_then(|plane| plane.checked_mul(n_spectra + CORRELATION_PAIR_PLANES));
        match needed {
            Some(n) if n <= MAX_CORRELATION_WORKSPACE => Ok(()),
            _ => Err(KernelNetError::ResourceExhausted(format!(
                "Correlation workspace of {} {}x{} spectra exceeds the budget of {} elements; \
                 set a smaller max_input_size",
                n_spectra, fw, fh, MAX_CORRELATION_WORKSPACE
            ))),
        }
    }
}

/// Gather shifts `[-sy, sy] x [-sx, sx]` from a circular correlation surface.
fn extract_window(surface: ArrayView2<f64>, sy: usize, sx: usize, scale: f64) -> Array2<f32> {
    let (fh, fw) = surface.dim();
    Array2::from_shape_fn((2 * sy + 1, 2 * sx + 1), |(r, col)| {
        let row = (r + fh - sy) % fh;
        let cc = (col + fw - sx) % fw;
        (surface[[row, cc]] * scale) as f32
    })
}
