mod common;

use ndarray::{s, Array4, ArrayD, Axis, Ix4, IxDyn};
use psfnet_core::ops::crop_batch;
use psfnet_core::{KernelEstimator, KernelNetConfig, KernelNetError, MaxInputSize, SafeShapeCatalog};

use common::{assert_valid_kernel, noise_batch, tiny_config};

fn small_estimator(n_levels: usize, kernel: [usize; 2]) -> KernelEstimator {
    KernelEstimator::new(tiny_config(n_levels, kernel))
        .unwrap()
        .with_catalog(SafeShapeCatalog::new(vec![(48, 48), (40, 56)]))
}

#[test]
fn test_zero_image_single_level_85() {
    // Narrow widths keep the 512x512 correlation quick; the topology is the
    // single-level 85x85 network.
    let config = KernelNetConfig {
        n_levels: 1,
        max_kernel_size: [85, 85],
        conv_block_size: 1,
        conv_block_n_features: 2,
        conv_block_filter_size: 3,
        cc_num_of_in_features: 2,
        n_upsampling_features: 4,
        n_conv_filters_before_output: vec![4],
        ..KernelNetConfig::default()
    };
    let estimator = KernelEstimator::new(config).unwrap();
    let images = ArrayD::<f32>::zeros(IxDyn(&[1, 512, 512, 3]));
    let kernels = estimator.predict(&images, 1).unwrap();
    assert_eq!(kernels.dim(), (1, 85, 85));
    assert_valid_kernel(kernels.index_axis(Axis(0), 0));
}

#[test]
#[ignore = "full-width network; slow outside release builds"]
fn test_zero_image_single_level_default_widths() {
    let config = KernelNetConfig {
        n_levels: 1,
        ..KernelNetConfig::default()
    };
    let estimator = KernelEstimator::new(config).unwrap();
    let images = ArrayD::<f32>::zeros(IxDyn(&[1, 512, 512, 3]));
    let kernels = estimator.predict(&images, 1).unwrap();
    assert_eq!(kernels.dim(), (1, 85, 85));
    assert_valid_kernel(kernels.index_axis(Axis(0), 0));
}

#[test]
fn test_non_4d_input_rejected() {
    let estimator = small_estimator(1, [9, 9]);
    for shape in [&[48, 48, 3][..], &[1, 1, 48, 48, 3][..], &[48][..]] {
        let images = ArrayD::<f32>::zeros(IxDyn(shape));
        let err = estimator.predict(&images, 1).unwrap_err();
        assert!(
            matches!(err, KernelNetError::InvalidShape(_)),
            "shape {shape:?}: got {err}"
        );
    }
}

#[test]
fn test_wrong_channel_count_rejected() {
    let estimator = small_estimator(1, [9, 9]);
    let images = ArrayD::<f32>::zeros(IxDyn(&[1, 48, 48, 4]));
    assert!(matches!(
        estimator.predict(&images, 1),
        Err(KernelNetError::InvalidShape(_))
    ));
}

#[test]
fn test_input_smaller_than_catalog_fails() {
    let estimator = small_estimator(1, [9, 9]);
    let images = noise_batch(1, 30, 60, 0);
    assert!(matches!(
        estimator.predict(&images, 1),
        Err(KernelNetError::NoValidShape { .. })
    ));
}

#[test]
fn test_predictions_are_valid_kernels() {
    let estimator = small_estimator(2, [15, 11]);
    let images = noise_batch(3, 60, 50, 11);
    let kernels = estimator.predict(&images, 2).unwrap();
    assert_eq!(kernels.dim(), (3, 15, 11));
    for kernel in kernels.outer_iter() {
        assert_valid_kernel(kernel);
    }
}

#[test]
fn test_batch_size_does_not_change_results() {
    let estimator = small_estimator(2, [11, 11]);
    let images = noise_batch(5, 52, 52, 21);

    let one = estimator.predict(&images, 1).unwrap();
    let two = estimator.predict(&images, 2).unwrap();
    let all = estimator.predict(&images, 5).unwrap();
    let zero = estimator.predict(&images, 0).unwrap();
    assert_eq!(one, two);
    assert_eq!(one, all);
    assert_eq!(one, zero);
}

#[test]
fn test_image_result_independent_of_batch_mates() {
    let estimator = small_estimator(2, [11, 11]);
    let images = noise_batch(3, 48, 48, 5);
    let batch = estimator.predict(&images, 3).unwrap();

    let single = images.slice_axis(Axis(0), (1..2).into()).to_owned();
    let alone = estimator.predict(&single, 1).unwrap();
    assert_eq!(batch.index_axis(Axis(0), 1), alone.index_axis(Axis(0), 0));
}

#[test]
fn test_progress_reports_each_group() {
    let estimator = small_estimator(1, [9, 9]);
    let images = noise_batch(5, 48, 48, 2);
    let mut calls = Vec::new();
    estimator
        .predict_with_progress(&images, 2, |done, total| calls.push((done, total)))
        .unwrap();
    assert_eq!(calls, vec![(2, 5), (4, 5), (5, 5)]);
}

#[test]
fn test_crop_window_uses_max_input_size() {
    let config = KernelNetConfig {
        max_input_size: Some(MaxInputSize::Scalar(256)),
        ..tiny_config(1, [9, 9])
    };
    let estimator = KernelEstimator::new(config).unwrap();
    let window = estimator.crop_window(800, 800).unwrap();
    assert_eq!((window.height, window.width), (256, 256));
    assert_eq!((window.y, window.x), (272, 272));

    let images: ArrayD<f32> = Array4::<f32>::zeros((1, 800, 800, 3)).into_dyn();
    let kernels = estimator.predict(&images, 1).unwrap();
    assert_eq!(kernels.dim(), (1, 9, 9));
}

#[test]
fn test_accessors() {
    let estimator = small_estimator(3, [9, 9]);
    assert_eq!(estimator.n_levels(), 3);
    assert_eq!(estimator.config().max_kernel_size, [9, 9]);
    assert_eq!(estimator.network().kernel_size(), (9, 9));
}

#[test]
fn test_default_receptive_field_on_smallest_table_shape() {
    // Default depth, filter sizes and 4-level 85x85 schedule; narrow widths.
    // Level 3 shrinks 32 -> 14 before its 13x13 correlation window.
    let config = KernelNetConfig {
        conv_block_n_features: 2,
        cc_num_of_in_features: 2,
        n_upsampling_features: 4,
        n_conv_filters_before_output: vec![4, 3],
        ..KernelNetConfig::default()
    };
    let estimator = KernelEstimator::new(config).unwrap();
    let window = estimator.crop_window(256, 256).unwrap();
    assert_eq!((window.y, window.x, window.height, window.width), (0, 0, 256, 256));

    let images = noise_batch(1, 256, 256, 17);
    let kernels = estimator.predict(&images, 1).unwrap();
    assert_eq!(kernels.dim(), (1, 85, 85));
    assert_valid_kernel(kernels.index_axis(Axis(0), 0));
}

#[test]
fn test_owned_batch_is_cropped_before_prediction() {
    let estimator = small_estimator(1, [9, 9]);
    let images = noise_batch(2, 60, 52, 8);
    let window = estimator.crop_window(60, 52).unwrap();
    assert_eq!((window.height, window.width), (48, 48));

    let batch = images.view().into_dimensionality::<Ix4>().unwrap();
    let cropped = crop_batch(batch, &window);
    assert_eq!(cropped.dim(), (2, 48, 48, 3));
    assert_eq!(cropped, batch.slice(s![.., 6..54, 2..50, ..]));

    let precropped = cropped.to_owned().into_dyn();
    assert_eq!(
        estimator.predict(&images, 2).unwrap(),
        estimator.predict(&precropped, 2).unwrap()
    );
}
