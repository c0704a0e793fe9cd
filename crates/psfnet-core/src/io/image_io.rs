use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::{Array2, Array3, Array4, ArrayView2, Axis};

use crate::error::{KernelNetError, Result};

/// Load an image file as an `(height, width, 3)` RGB array in [0.0, 1.0].
pub fn load_rgb_image(path: &Path) -> Result<Array3<f32>> {
    let img = image::open(path)?;
    let rgb = img.to_rgb16();
    let (w, h) = rgb.dimensions();
    let mut data = Array3::<f32>::zeros((h as usize, w as usize, 3));

    for (col, row, pixel) in rgb.enumerate_pixels() {
        for ch in 0..3 {
            data[[row as usize, col as usize, ch]] = pixel.0[ch] as f32 / 65535.0;
        }
    }

    Ok(data)
}

/// Load several images of identical size into one BHWC batch.
pub fn load_rgb_batch<P: AsRef<Path>>(paths: &[P]) -> Result<Array4<f32>> {
    let images = paths
        .iter()
        .map(|p| load_rgb_image(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let views: Vec<_> = images.iter().map(|a| a.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| {
        KernelNetError::InvalidShape(format!("Images in a batch must share one size: {e}"))
    })
}

/// Scale a kernel so its peak maps to full range, for viewing.
fn display_scale(kernel: ArrayView2<f32>) -> f32 {
    let peak = kernel.iter().copied().fold(0.0f32, f32::max);
    if peak > 0.0 {
        1.0 / peak
    } else {
        0.0
    }
}

/// Save a kernel as 16-bit grayscale TIFF, peak-normalized.
pub fn save_kernel_tiff(kernel: &Array2<f32>, path: &Path) -> Result<()> {
    let (h, w) = kernel.dim();
    let scale = display_scale(kernel.view());
    let pixels: Vec<u16> = kernel
        .iter()
        .map(|&v| ((v * scale).clamp(0.0, 1.0) * 65535.0) as u16)
        .collect();

    let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| KernelNetError::InvalidShape("Kernel buffer size mismatch".into()))?;
    img.save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

/// Save a kernel as 8-bit grayscale PNG, peak-normalized.
pub fn save_kernel_png(kernel: &Array2<f32>, path: &Path) -> Result<()> {
    let (h, w) = kernel.dim();
    let scale = display_scale(kernel.view());

    let mut img = GrayImage::new(w as u32, h as u32);
    for ((row, col), &v) in kernel.indexed_iter() {
        let val = ((v * scale).clamp(0.0, 1.0) * 255.0) as u8;
        img.put_pixel(col as u32, row as u32, Luma([val]));
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save a kernel, choosing format from file extension.
pub fn save_kernel_image(kernel: &Array2<f32>, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tiff" | "tif") => save_kernel_tiff(kernel, path),
        Some("png") => save_kernel_png(kernel, path),
        _ => save_kernel_tiff(kernel, path),
    }
}
