//! Parameter-free tensor operations on single-image feature maps (HWC).

use ndarray::{concatenate, s, Array2, Array3, ArrayView3, ArrayView4, Axis};

use crate::consts::{
    KERNEL_SUM_EPSILON, LUMINANCE_B, LUMINANCE_G, LUMINANCE_R, STANDARDIZE_EPSILON,
};
use crate::error::{KernelNetError, Result};
use crate::shape::CropWindow;

/// Collapse an RGB map to a single luminance channel.
pub fn rgb_to_grayscale(image: ArrayView3<f32>) -> Array3<f32> {
    let (h, w, _) = image.dim();
    Array3::from_shape_fn((h, w, 1), |(row, col, _)| {
        LUMINANCE_R * image[[row, col, 0]]
            + LUMINANCE_G * image[[row, col, 1]]
            + LUMINANCE_B * image[[row, col, 2]]
    })
}

/// Per-channel standardization over the spatial axes: zero mean and unit
/// standard deviation. A constant channel maps to zeros.
pub fn standardize(mut data: Array3<f32>) -> Array3<f32> {
    for mut channel in data.axis_iter_mut(Axis(2)) {
        let n = channel.len().max(1) as f64;
        let mean = channel.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = channel
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let inv = 1.0 / (var.sqrt() as f32 + STANDARDIZE_EPSILON);
        let mean = mean as f32;
        channel.mapv_inplace(|v| (v - mean) * inv);
    }
    data
}

/// Centered spatial crop to `target_h x target_w`.
///
/// The start offset is `floor((size - target) / 2)`, so an odd excess is
/// trimmed from the bottom/right edge.
pub fn crop_center(data: &Array3<f32>, target_h: usize, target_w: usize) -> Result<Array3<f32>> {
    let (h, w, _) = data.dim();
    if target_h > h || target_w > w {
        return Err(KernelNetError::InvalidShape(format!(
            "Cannot center-crop {}x{} map to {}x{}",
            w, h, target_w, target_h
        )));
    }
    let y = (h - target_h) / 2;
    let x = (w - target_w) / 2;
    Ok(data
        .slice(s![y..y + target_h, x..x + target_w, ..])
        .to_owned())
}

/// Channel-wise concatenation of two maps with equal spatial size.
pub fn concat_channels(first: &Array3<f32>, second: &Array3<f32>) -> Result<Array3<f32>> {
    concatenate(Axis(2), &[first.view(), second.view()]).map_err(|e| {
        KernelNetError::InvalidShape(format!(
            "Cannot concatenate {:?} with {:?}: {}",
            first.dim(),
            second.dim(),
            e
        ))
    })
}

/// Apply a crop window to every image of a BHWC batch.
pub fn crop_batch<'a>(images: ArrayView4<'a, f32>, window: &CropWindow) -> ArrayView4<'a, f32> {
    images.slice_move(s![
        ..,
        window.y..window.y + window.height,
        window.x..window.x + window.width,
        ..
    ])
}

/// Rescale `kernel` so that its entries sum to `target_sum`.
///
/// An empty (zero or non-finite sum) response becomes a unit impulse at the
/// center scaled to `target_sum`, i.e. the kernel of an unblurred image.
pub fn normalize_sum(mut kernel: Array2<f32>, target_sum: f32) -> Array2<f32> {
    let sum: f64 = kernel.iter().map(|&v| v as f64).sum();
    if !sum.is_finite() || sum <= KERNEL_SUM_EPSILON as f64 {
        let (h, w) = kernel.dim();
        kernel.fill(0.0);
        kernel[[h / 2, w / 2]] = target_sum;
        return kernel;
    }
    let scale = (target_sum as f64 / sum) as f32;
    kernel.mapv_inplace(|v| v * scale);
    kernel
}
