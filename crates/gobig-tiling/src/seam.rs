//! Seam mask: the feathered alpha applied to every detailed tile.
//!
//! The mask is painted as concentric filled rectangles, outermost first,
//! each one pixel further in and 4 alpha levels more opaque than the
//! last. The ring at depth `d` (distance to the nearest tile edge) ends up
//! with alpha `min(4 * d, 255)` for `d < overlap`; everything deeper is
//! fully opaque.
//!
//! ```text
//!   depth:  0   1   2  ...  63  64 ... overlap-1 | interior
//!   alpha:  0   4   8  ... 252 255 ... 255       | 255
//! ```
//!
//! The ramp saturates at depth 64, so overlaps wider than 64 pixels do not
//! feather any further: the extra margin is fully opaque.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::types::Size;

/// Alpha increase per pixel of depth.
pub const ALPHA_STEP: u32 = 4;

/// Alpha of the ring at `depth` pixels from the nearest edge.
#[must_use]
pub fn ring_alpha(depth: u32, overlap: u32) -> u8 {
    if depth >= overlap {
        return u8::MAX;
    }
    u8::try_from(depth.saturating_mul(ALPHA_STEP)).unwrap_or(u8::MAX)
}

/// A tile-sized feathering mask, built once per pass and shared by all
/// tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeamMask {
    alpha: GrayImage,
    overlap: u32,
}

impl SeamMask {
    /// Build the mask for `tile` with an `overlap`-pixel feather.
    #[must_use]
    pub fn new(tile: Size, overlap: u32) -> Self {
        let mut alpha = GrayImage::from_pixel(tile.width, tile.height, Luma([u8::MAX]));

        // Each rectangle covers depth `i` and everything inside it, so
        // painting outermost-first leaves ring `i` with alpha(i).
        for i in 0..overlap {
            let inset = i.saturating_mul(2);
            if inset >= tile.width || inset >= tile.height {
                break;
            }
            let Ok(origin) = i32::try_from(i) else {
                break;
            };
            let rect = Rect::at(origin, origin).of_size(tile.width - inset, tile.height - inset);
            draw_filled_rect_mut(&mut alpha, rect, Luma([ring_alpha(i, overlap)]));
        }

        let inset = overlap.saturating_mul(2);
        if inset < tile.width
            && inset < tile.height
            && let Ok(origin) = i32::try_from(overlap)
        {
            let rect = Rect::at(origin, origin).of_size(tile.width - inset, tile.height - inset);
            draw_filled_rect_mut(&mut alpha, rect, Luma([u8::MAX]));
        }

        Self { alpha, overlap }
    }

    /// A mask that leaves tiles fully opaque everywhere.
    #[must_use]
    pub fn opaque(tile: Size) -> Self {
        Self::new(tile, 0)
    }

    /// The single-channel alpha raster.
    #[must_use]
    pub const fn alpha(&self) -> &GrayImage {
        &self.alpha
    }

    /// Mask dimensions.
    #[must_use]
    pub fn size(&self) -> Size {
        Size::of(&self.alpha)
    }

    /// Feather width this mask was built with.
    #[must_use]
    pub const fn overlap(&self) -> u32 {
        self.overlap
    }

    /// Alpha at `(x, y)`.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.alpha.get_pixel(x, y).0[0]
    }
}
