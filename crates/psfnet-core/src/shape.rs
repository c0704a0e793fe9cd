//! Input-size compatibility for the correlation step.
//!
//! GPU FFT workspace allocation fails for many input sizes, and not
//! monotonically (a size can fail while a larger one works). The catalog
//! below lists sizes that were observed to work at full resolution. Inputs
//! are cropped, centered, to the nearest listed size that fits inside them.

use tracing::debug;

use crate::config::MaxInputSize;
use crate::error::{KernelNetError, Result};

/// `(height, width)` pairs known to run without allocation failure.
/// If `(h, w)` is listed then `(w, h)` is valid too; the swap is derived
/// at lookup time and not stored here.
pub const KNOWN_VALID_SHAPES: [(usize, usize); 42] = [
    (256, 256), (240, 368), (354, 640), (368, 640), (240, 368), (384, 540), (408, 608),
    (408, 688), (480, 368), (480, 732), (492, 704), (512, 512), (512, 448), (512, 672),
    (512, 768), (528, 638), (528, 558), (528, 780), (540, 800), (558, 864), (576, 688),
    (576, 800), (592, 462), (592, 800), (608, 800), (608, 1012), (624, 414), (624, 448),
    (624, 576), (624, 800), (656, 1012), (672, 800), (672, 1012), (700, 1012), (704, 608),
    (720, 958), (720, 1072), (732, 1080), (750, 908), (800, 800), (800, 968), (810, 942),
];

/// A centered crop in image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropWindow {
    pub y: usize,
    pub x: usize,
    pub height: usize,
    pub width: usize,
}

impl CropWindow {
    /// Pixels left below the crop (the odd pixel of an unbalanced trim).
    pub fn bottom_margin(&self, source_height: usize) -> usize {
        source_height - self.y - self.height
    }

    /// Pixels left to the right of the crop.
    pub fn right_margin(&self, source_width: usize) -> usize {
        source_width - self.x - self.width
    }
}

/// Lookup table of input shapes that are safe for the correlation operator.
#[derive(Clone, Debug)]
pub struct SafeShapeCatalog {
    shapes: Vec<(usize, usize)>,
}

impl Default for SafeShapeCatalog {
    fn default() -> Self {
        Self::new(KNOWN_VALID_SHAPES.to_vec())
    }
}

impl SafeShapeCatalog {
    pub fn new(shapes: Vec<(usize, usize)>) -> Self {
        Self { shapes }
    }

    pub fn shapes(&self) -> &[(usize, usize)] {
        &self.shapes
    }

    /// Every shape the selector may return under `bound`, in enumeration
    /// order: the area-filtered table followed by its swapped copy.
    pub fn candidates(&self, bound: Option<&MaxInputSize>) -> Vec<(usize, usize)> {
        let max_area = bound.map(MaxInputSize::area);
        let kept: Vec<(usize, usize)> = self
            .shapes
            .iter()
            .copied()
            .filter(|&(h, w)| max_area.map_or(true, |area| h * w <= area))
            .collect();

        kept.iter()
            .copied()
            .chain(kept.iter().map(|&(h, w)| (w, h)))
            .collect()
    }

    /// Pick the crop for an `height x width` input.
    ///
    /// The chosen shape minimises the norm of the per-axis relative size
    /// difference; ties go to the first candidate in enumeration order.
    pub fn select(
        &self,
        height: usize,
        width: usize,
        bound: Option<&MaxInputSize>,
    ) -> Result<CropWindow> {
        let mut best: Option<((usize, usize), f64)> = None;
        for (ch, cw) in self.candidates(bound) {
            if ch > height || cw > width {
                continue;
            }
            let dy = (height - ch) as f64 / height as f64;
            let dx = (width - cw) as f64 / width as f64;
            let dist = (dy * dy + dx * dx).sqrt();
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some(((ch, cw), dist)),
            }
        }

        let ((crop_h, crop_w), dist) =
            best.ok_or(KernelNetError::NoValidShape { width, height })?;

        let window = CropWindow {
            y: (height - crop_h) / 2,
            x: (width - crop_w) / 2,
            height: crop_h,
            width: crop_w,
        };
        debug!(
            input = %format!("{}x{}", width, height),
            crop = %format!("{}x{}", crop_w, crop_h),
            distance = dist,
            "Selected safe input shape"
        );
        Ok(window)
    }
}
