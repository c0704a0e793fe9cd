use approx::assert_abs_diff_eq;
use ndarray::{s, Array1, Array2, Array3, Array4, Axis};

use psfnet_core::layers::{Conv2d, ConvTranspose2d, ConvWeights, CrossCorrelation, Padding, ShiftWindow};
use psfnet_core::ops::{crop_batch, normalize_sum, rgb_to_grayscale};
use psfnet_core::{Activation, CropWindow};

fn ramp(h: usize, w: usize, c: usize) -> Array3<f32> {
    Array3::from_shape_fn((h, w, c), |(r, col, ch)| {
        ((r * 31 + col * 17 + ch * 7) % 13) as f32 / 13.0 - 0.4
    })
}

// ---------------------------------------------------------------------------
// Cross-correlation
// ---------------------------------------------------------------------------

#[test]
fn autocorrelation_peaks_at_zero_shift() {
    let input = ramp(20, 24, 3);
    let op = CrossCorrelation::new(ShiftWindow::new(4, 5), false);
    let out = op.forward(&input).unwrap();
    for ch in 0..3 {
        let k = ch * 3 + ch;
        let plane = out.index_axis(Axis(2), k);
        let center = plane[[4, 5]];
        for &v in plane.iter() {
            assert!(v <= center + 1e-6, "channel {k}: {v} > center {center}");
        }
    }
}

#[test]
fn output_size_is_independent_of_input_size() {
    let op = CrossCorrelation::new(ShiftWindow::new(3, 6), true);
    for (h, w) in [(10, 12), (33, 17), (64, 64)] {
        let out = op.forward(&ramp(h, w, 2)).unwrap();
        assert_eq!(out.dim(), (7, 13, 8));
    }
}

#[test]
fn flipped_pairs_match_plain_pairs_for_symmetric_input() {
    // f(p) == f(-p) makes the mirrored copy identical to the input.
    let base = ramp(9, 11, 2);
    let mirrored = base.slice(s![..;-1, ..;-1, ..]).to_owned();
    let symmetric = &base + &mirrored;

    let op = CrossCorrelation::new(ShiftWindow::new(2, 2), true);
    let out = op.forward(&symmetric).unwrap();
    let pairs = 4;
    for k in 0..pairs {
        let plain = out.index_axis(Axis(2), k);
        let flipped = out.index_axis(Axis(2), pairs + k);
        for (a, b) in plain.iter().zip(flipped.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }
}

#[test]
fn cross_pairs_are_mirror_images() {
    // c_ij(d) = c_ji(-d)
    let input = ramp(15, 13, 2);
    let op = CrossCorrelation::new(ShiftWindow::new(3, 3), false);
    let out = op.forward(&input).unwrap();
    let c01 = out.index_axis(Axis(2), 1);
    let c10 = out.index_axis(Axis(2), 2);
    for dy in 0..7 {
        for dx in 0..7 {
            assert_abs_diff_eq!(c01[[dy, dx]], c10[[6 - dy, 6 - dx]], epsilon = 1e-5);
        }
    }
}

// ---------------------------------------------------------------------------
// Convolutions
// ---------------------------------------------------------------------------

#[test]
fn relu_conv_is_non_negative() {
    let weights = ConvWeights {
        kernel: Array4::from_elem((3, 3, 2, 4), -0.5),
        bias: Array1::from_vec(vec![0.1, -0.2, 0.3, 0.0]),
    };
    let conv = Conv2d::new(weights, 1, Padding::Same, Activation::Relu);
    let out = conv.forward(&ramp(8, 8, 2)).unwrap();
    assert_eq!(out.dim(), (8, 8, 4));
    assert!(out.iter().all(|&v| v >= 0.0));
}

#[test]
fn conv_channel_mismatch_is_rejected() {
    let weights = ConvWeights {
        kernel: Array4::ones((1, 1, 3, 1)),
        bias: Array1::zeros(1),
    };
    let conv = Conv2d::new(weights, 1, Padding::Valid, Activation::Linear);
    assert!(conv.forward(&ramp(4, 4, 2)).is_err());
}

#[test]
fn transposed_conv_output_size() {
    let weights = ConvWeights {
        kernel: Array4::ones((5, 5, 2, 3)),
        bias: Array1::zeros(3),
    };
    let up = ConvTranspose2d::new(weights, 2, Activation::Relu);
    assert_eq!(up.output_size(11, 11), (25, 25));
    let out = up.forward(&Array3::ones((11, 6, 2))).unwrap();
    assert_eq!(out.dim(), (25, 15, 3));
}

#[test]
fn identity_one_by_one_conv() {
    let mut kernel = Array4::zeros((1, 1, 2, 2));
    kernel[[0, 0, 0, 0]] = 1.0;
    kernel[[0, 0, 1, 1]] = 1.0;
    let weights = ConvWeights {
        kernel,
        bias: Array1::zeros(2),
    };
    let conv = Conv2d::new(weights, 1, Padding::Valid, Activation::Linear);
    let input = ramp(5, 7, 2);
    let out = conv.forward(&input).unwrap();
    assert_eq!(out, input);
}

// ---------------------------------------------------------------------------
// Ops
// ---------------------------------------------------------------------------

#[test]
fn grayscale_of_white_sums_the_weights() {
    let gray = rgb_to_grayscale(Array3::<f32>::ones((3, 4, 3)).view());
    assert_eq!(gray.dim(), (3, 4, 1));
    for &v in gray.iter() {
        assert_abs_diff_eq!(v, 0.9999, epsilon = 1e-6);
    }
}

#[test]
fn grayscale_uses_tensorflow_weights() {
    let mut pixel = Array3::<f32>::zeros((1, 1, 3));
    for (ch, weight) in [0.2989f32, 0.5870, 0.1140].into_iter().enumerate() {
        pixel.fill(0.0);
        pixel[[0, 0, ch]] = 1.0;
        let gray = rgb_to_grayscale(pixel.view());
        assert_abs_diff_eq!(gray[[0, 0, 0]], weight, epsilon = 1e-7);
    }
}

#[test]
fn normalize_sum_rescales() {
    let kernel = Array2::from_shape_fn((5, 5), |(r, c)| (r + c) as f32);
    let out = normalize_sum(kernel, 1.0);
    assert_abs_diff_eq!(out.sum(), 1.0, epsilon = 1e-6);
}

#[test]
fn normalize_sum_of_empty_kernel_is_impulse() {
    let out = normalize_sum(Array2::zeros((5, 7)), 1.0);
    assert_eq!(out[[2, 3]], 1.0);
    assert_abs_diff_eq!(out.sum(), 1.0);
}

#[test]
fn crop_batch_keeps_batch_and_channels() {
    let batch = Array4::from_shape_fn((2, 10, 12, 3), |(b, r, c, ch)| {
        (b * 1000 + r * 100 + c * 10 + ch) as f32
    });
    let window = CropWindow {
        y: 2,
        x: 3,
        height: 5,
        width: 6,
    };
    let cropped = crop_batch(batch.view(), &window);
    assert_eq!(cropped.dim(), (2, 5, 6, 3));
    assert_eq!(cropped[[1, 0, 0, 2]], 1000.0 + 200.0 + 30.0 + 2.0);
}
