#![allow(dead_code)]

use ndarray::{Array3, Array4, ArrayD};
use psfnet_core::KernelNetConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A narrow network that runs quickly on small inputs.
///
/// Level 0 reduces a `s x s` input to `s - 2` before correlating.
pub fn tiny_config(n_levels: usize, kernel: [usize; 2]) -> KernelNetConfig {
    KernelNetConfig {
        n_levels,
        max_kernel_size: kernel,
        conv_block_size: 1,
        conv_block_n_features: 3,
        conv_block_filter_size: 3,
        n_upsampling_features: 4,
        upsample_filter_size: 5,
        cc_num_of_in_features: 2,
        n_conv_filters_before_output: vec![4, 3],
        seed: 7,
        ..KernelNetConfig::default()
    }
}

/// Uniform noise image `(h, w, 3)` in [0, 1).
pub fn noise_image(h: usize, w: usize, seed: u64) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_simple_fn((h, w, 3), || rng.random::<f32>())
}

/// Batch of `n` noise images as a dynamic-rank array.
pub fn noise_batch(n: usize, h: usize, w: usize, seed: u64) -> ArrayD<f32> {
    let mut batch = Array4::<f32>::zeros((n, h, w, 3));
    for (i, mut img) in batch.outer_iter_mut().enumerate() {
        img.assign(&noise_image(h, w, seed + i as u64));
    }
    batch.into_dyn()
}

/// Assert a kernel is a valid blur kernel: non-negative and summing to 1.
pub fn assert_valid_kernel(kernel: ndarray::ArrayView2<f32>) {
    assert!(
        kernel.iter().all(|&v| v >= 0.0 && v.is_finite()),
        "kernel has negative or non-finite entries"
    );
    let sum: f32 = kernel.sum();
    assert!((sum - 1.0).abs() < 1e-5, "kernel sum = {sum}, expected 1.0");
}
