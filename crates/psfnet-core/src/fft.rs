use std::sync::Arc;

use ndarray::{Array2, ArrayView2};
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Forward and inverse 2D FFT plans for a fixed `(height, width)` plane.
///
/// Planning once and reusing the plan matters for the correlation operator,
/// which runs one inverse transform per channel pair.
pub struct Fft2dPlan {
    height: usize,
    width: usize,
    row_forward: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl Fft2dPlan {
    pub fn new(height: usize, width: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            height,
            width,
            row_forward: planner.plan_fft_forward(width),
            col_forward: planner.plan_fft_forward(height),
            row_inverse: planner.plan_fft_inverse(width),
            col_inverse: planner.plan_fft_inverse(height),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// FFT of `data` zero-padded at the bottom/right to the plan size.
    pub fn forward_padded(&self, data: ArrayView2<f32>) -> Array2<Complex<f64>> {
        let (h, w) = (self.height, self.width);
        let mut result = Array2::<Complex<f64>>::zeros((h, w));
        for ((row, col), &v) in data.indexed_iter() {
            result[[row, col]] = Complex::new(v as f64, 0.0);
        }

        if h * w >= PARALLEL_PIXEL_THRESHOLD {
            transform_rows_parallel(&mut result, &self.row_forward);
            transform_cols_parallel(&mut result, &self.col_forward);
        } else {
            transform_rows(&mut result, &self.row_forward);
            transform_cols(&mut result, &self.col_forward);
        }
        result
    }

    /// Inverse FFT, returning the real part normalized by `1/(h*w)`.
    pub fn inverse_real(&self, mut work: Array2<Complex<f64>>) -> Array2<f64> {
        let (h, w) = (self.height, self.width);
        if h * w >= PARALLEL_PIXEL_THRESHOLD {
            transform_cols_parallel(&mut work, &self.col_inverse);
            transform_rows_parallel(&mut work, &self.row_inverse);
        } else {
            transform_cols(&mut work, &self.col_inverse);
            transform_rows(&mut work, &self.row_inverse);
        }

        let scale = 1.0 / (h * w) as f64;
        work.mapv(|c| c.re * scale)
    }
}

/// Smallest `n' >= n` whose only prime factors are 2, 3 and 5.
pub fn fft_friendly_len(n: usize) -> usize {
    let mut candidate = n.max(1);
    loop {
        let mut m = candidate;
        for p in [2, 3, 5] {
            while m % p == 0 {
                m /= p;
            }
        }
        if m == 1 {
            return candidate;
        }
        candidate += 1;
    }
}

fn transform_rows(data: &mut Array2<Complex<f64>>, fft: &Arc<dyn Fft<f64>>) {
    let w = data.ncols();
    for mut row in data.rows_mut() {
        let mut row_data: Vec<Complex<f64>> = row.to_vec();
        fft.process(&mut row_data);
        for col in 0..w {
            row[col] = row_data[col];
        }
    }
}

fn transform_cols(data: &mut Array2<Complex<f64>>, fft: &Arc<dyn Fft<f64>>) {
    let h = data.nrows();
    for mut col in data.columns_mut() {
        let mut col_data: Vec<Complex<f64>> = col.to_vec();
        fft.process(&mut col_data);
        for row in 0..h {
            col[row] = col_data[row];
        }
    }
}

fn transform_rows_parallel(data: &mut Array2<Complex<f64>>, fft: &Arc<dyn Fft<f64>>) {
    let processed: Vec<Vec<Complex<f64>>> = data
        .outer_iter()
        .into_par_iter()
        .map(|row| {
            let mut row_data = row.to_vec();
            fft.process(&mut row_data);
            row_data
        })
        .collect();
    for (mut row, row_data) in data.rows_mut().into_iter().zip(processed) {
        for (dst, val) in row.iter_mut().zip(row_data) {
            *dst = val;
        }
    }
}

fn transform_cols_parallel(data: &mut Array2<Complex<f64>>, fft: &Arc<dyn Fft<f64>>) {
    let w = data.ncols();
    let processed: Vec<Vec<Complex<f64>>> = (0..w)
        .into_par_iter()
        .map(|col| {
            let mut col_data = data.column(col).to_vec();
            fft.process(&mut col_data);
            col_data
        })
        .collect();
    for (mut col, col_data) in data.columns_mut().into_iter().zip(processed) {
        for (dst, val) in col.iter_mut().zip(col_data) {
            *dst = val;
        }
    }
}
