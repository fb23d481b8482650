//! Compositing detailed tiles back onto the canvas.
//!
//! Each tile keeps its own RGB but takes its alpha purely from the
//! [`SeamMask`], then is alpha-composited ("over") onto the canvas at its
//! position. Tiles are drawn in plan order, so the center tile, drawn
//! last, wins wherever tiles overlap.

use image::{Rgba, RgbImage, RgbaImage};

use crate::seam::SeamMask;
use crate::types::{Point, Size, TilingError};

/// Combine a tile's color with the mask's alpha.
///
/// # Errors
///
/// Returns [`TilingError::InvalidGeometry`] if the tile and mask differ
/// in size.
pub fn apply_mask(tile: &RgbImage, mask: &SeamMask) -> Result<RgbaImage, TilingError> {
    let size = Size::of(tile);
    if size != mask.size() {
        return Err(TilingError::InvalidGeometry(format!(
            "seam mask is {} but the tile is {size}",
            mask.size()
        )));
    }
    Ok(RgbaImage::from_fn(size.width, size.height, |x, y| {
        let [r, g, b] = tile.get_pixel(x, y).0;
        Rgba([r, g, b, mask.get(x, y)])
    }))
}

/// Porter-Duff "over": composite `src` onto `dst` in place.
///
/// A fully opaque `src` replaces `dst` exactly; a fully transparent one
/// leaves it untouched.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    match src.0[3] {
        0 => return,
        u8::MAX => {
            *dst = src;
            return;
        }
        _ => {}
    }

    let src_a = f32::from(src.0[3]) / 255.0;
    let dst_a = f32::from(dst.0[3]) / 255.0;
    let out_a = dst_a.mul_add(1.0 - src_a, src_a);

    let mix = |s: u8, d: u8| -> u8 {
        let value = f32::from(s).mul_add(src_a, f32::from(d) * dst_a * (1.0 - src_a)) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };

    *dst = Rgba([
        mix(src.0[0], dst.0[0]),
        mix(src.0[1], dst.0[1]),
        mix(src.0[2], dst.0[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ]);
}

/// Accumulates feathered tiles onto a canvas.
#[derive(Debug, Clone)]
pub struct Compositor {
    canvas: RgbaImage,
    drawn: usize,
}

impl Compositor {
    /// Start from an opaque copy of `base`.
    #[must_use]
    pub fn new(base: &RgbImage) -> Self {
        Self {
            canvas: image::DynamicImage::ImageRgb8(base.clone()).into_rgba8(),
            drawn: 0,
        }
    }

    /// Composite `layer` with its top-left corner at `position`.
    ///
    /// Parts of the layer outside the canvas are clipped.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn draw(&mut self, layer: &RgbaImage, position: Point) {
        let canvas_w = i64::from(self.canvas.width());
        let canvas_h = i64::from(self.canvas.height());
        let x0 = position.x.max(0);
        let y0 = position.y.max(0);
        let x1 = (position.x + i64::from(layer.width())).min(canvas_w);
        let y1 = (position.y + i64::from(layer.height())).min(canvas_h);

        // All indices below are inside [0, canvas) and [0, layer).
        for y in y0..y1 {
            for x in x0..x1 {
                let src = *layer.get_pixel((x - position.x) as u32, (y - position.y) as u32);
                blend_over(self.canvas.get_pixel_mut(x as u32, y as u32), src);
            }
        }
        self.drawn += 1;
    }

    /// Number of layers drawn so far.
    #[must_use]
    pub const fn drawn(&self) -> usize {
        self.drawn
    }

    /// The canvas in its current RGBA state.
    #[must_use]
    pub const fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Flatten to RGB, dropping alpha.
    #[must_use]
    pub fn finish(self) -> RgbImage {
        image::DynamicImage::ImageRgba8(self.canvas).into_rgb8()
    }
}

/// Composite detailed tiles onto `base` in the given order.
///
/// # Errors
///
/// Returns [`TilingError::InvalidGeometry`] if a tile's size differs from
/// the mask's.
pub fn composite<'t>(
    base: &RgbImage,
    tiles: impl IntoIterator<Item = (&'t RgbImage, Point)>,
    mask: &SeamMask,
) -> Result<RgbImage, TilingError> {
    let mut compositor = Compositor::new(base);
    for (tile, position) in tiles {
        compositor.draw(&apply_mask(tile, mask)?, position);
    }
    Ok(compositor.finish())
}
