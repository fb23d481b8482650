//! Tile extraction: crop tile-sized sub-images in draw order.

use std::borrow::Cow;

use image::RgbImage;

use crate::plan::{self, TilePlan};
use crate::resample::{self, ResampleFilter};
use crate::types::{Point, Size, TilingError};

/// A tile-sized raster tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// Index in draw order.
    pub index: usize,
    /// Top-left corner on the canvas.
    pub position: Point,
    /// Pixel content, always exactly the plan's tile size.
    pub image: RgbImage,
}

impl Tile {
    /// Dimensions of the tile raster.
    #[must_use]
    pub fn size(&self) -> Size {
        Size::of(&self.image)
    }
}

/// How the canvas is prepared before cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractOptions {
    /// Resize the canvas to the plan's adjusted size and re-plan first.
    pub maximize: bool,
    /// Filter used for the `maximize` resize.
    pub filter: ResampleFilter,
}

/// Lazily crops the tiles of a [`TilePlan`] from a canvas.
///
/// Yields tiles in draw order. Each tile is cropped from the canvas as
/// it is at construction time; the iterator cannot be restarted.
#[derive(Debug)]
pub struct TileExtractor<'a> {
    canvas: Cow<'a, RgbImage>,
    plan: TilePlan,
    next: usize,
}

impl<'a> TileExtractor<'a> {
    /// Prepare extraction of `plan`'s tiles from `canvas`.
    ///
    /// With [`ExtractOptions::maximize`], the canvas is resized to
    /// [`TilePlan::adjusted_canvas`] and the plan is recomputed for the
    /// new size (geometry depends on the canvas, so the old coordinates
    /// cannot simply be rescaled).
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::InvalidGeometry`] if `plan` was computed for
    /// a different canvas size, or if re-planning fails.
    pub fn new(
        canvas: &'a RgbImage,
        plan: TilePlan,
        options: ExtractOptions,
    ) -> Result<Self, TilingError> {
        let size = Size::of(canvas);
        if size != plan.canvas_size() {
            return Err(TilingError::InvalidGeometry(format!(
                "plan was computed for a {} canvas but the canvas is {size}",
                plan.canvas_size()
            )));
        }

        if !options.maximize {
            return Ok(Self {
                canvas: Cow::Borrowed(canvas),
                plan,
                next: 0,
            });
        }

        let (resized, applied) =
            resample::resize_exact(canvas, plan.adjusted_canvas(), options.filter);
        if !applied {
            return Ok(Self {
                canvas: Cow::Borrowed(canvas),
                plan,
                next: 0,
            });
        }
        let plan = plan::plan(Size::of(&resized), plan.tile_size(), plan.overlap())?;
        Ok(Self {
            canvas: Cow::Owned(resized),
            plan,
            next: 0,
        })
    }

    /// The canvas tiles are cropped from (resized if `maximize` applied).
    #[must_use]
    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    /// The plan being extracted (re-planned if `maximize` applied).
    #[must_use]
    pub const fn plan(&self) -> &TilePlan {
        &self.plan
    }

    /// Consume the extractor, returning the canvas and plan it used.
    #[must_use]
    pub fn into_parts(self) -> (Cow<'a, RgbImage>, TilePlan) {
        (self.canvas, self.plan)
    }
}

impl Iterator for TileExtractor<'_> {
    type Item = Tile;

    fn next(&mut self) -> Option<Tile> {
        let position = *self.plan.positions().get(self.next)?;
        let index = self.next;
        self.next += 1;
        Some(Tile {
            index,
            position,
            image: crop_tile(&self.canvas, position, self.plan.tile_size()),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileExtractor<'_> {}

/// Crop a `tile`-sized region at `position`, clamping the window to the
/// canvas.
///
/// If the canvas is smaller than the tile, the part of the window that
/// falls outside the canvas stays black.
#[must_use]
pub fn crop_tile(canvas: &RgbImage, position: Point, tile: Size) -> RgbImage {
    let canvas_size = Size::of(canvas);
    let clamped = plan::clamp_to_canvas(position, canvas_size, tile);
    // Clamped coordinates are within [0, canvas], so they fit in u32.
    let x = u32::try_from(clamped.x).unwrap_or(0);
    let y = u32::try_from(clamped.y).unwrap_or(0);
    let width = tile.width.min(canvas_size.width - x);
    let height = tile.height.min(canvas_size.height - y);

    let cropped = image::imageops::crop_imm(canvas, x, y, width, height).to_image();
    if width == tile.width && height == tile.height {
        return cropped;
    }

    let mut padded = RgbImage::new(tile.width, tile.height);
    image::imageops::replace(&mut padded, &cropped, 0, 0);
    padded
}
