//! Canvas resampling.
//!
//! Used in two places: the extractor's `maximize` option resizes the
//! canvas to the planner's adjusted size, and the pixel-upscale stage
//! halves the 4x output of the external upscaler to a net 2x.

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::types::Size;

/// Resampling filter used when resizing a canvas.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Resize `image` to exactly `target`, ignoring aspect ratio.
///
/// Returns the (possibly unchanged) image and whether resampling was
/// actually applied. An image already at `target` is returned as-is.
#[must_use]
pub fn resize_exact(image: &RgbImage, target: Size, filter: ResampleFilter) -> (RgbImage, bool) {
    if Size::of(image) == target || target.is_empty() {
        return (image.clone(), false);
    }
    let resized = image::imageops::resize(
        image,
        target.width,
        target.height,
        filter.to_image_filter(),
    );
    (resized, true)
}

/// Halve both dimensions (floored, minimum 1 pixel).
#[must_use]
pub fn halve(image: &RgbImage, filter: ResampleFilter) -> RgbImage {
    let target = Size::new((image.width() / 2).max(1), (image.height() / 2).max(1));
    resize_exact(image, target, filter).0
}

/// Double both dimensions.
#[must_use]
pub fn double(image: &RgbImage, filter: ResampleFilter) -> RgbImage {
    let target = Size::new(image.width() * 2, image.height() * 2);
    resize_exact(image, target, filter).0
}
