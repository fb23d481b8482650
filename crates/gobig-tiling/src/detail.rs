//! The detailer seam: whatever re-renders a tile at higher fidelity.
//!
//! The core never knows how detailing happens (diffusion img2img, an
//! external process, a test double). It only enforces the contract:
//! the returned raster has exactly the tile's dimensions.

use image::RgbImage;

use crate::extract::Tile;
use crate::types::{DetailError, DetailParams, Size, TilingError};

/// Re-renders one tile.
///
/// Calls are made strictly one at a time, in draw order; an
/// implementation may hold an exclusive resource across calls.
pub trait Detailer {
    /// Return a refined raster with the same dimensions as `tile.image`.
    ///
    /// # Errors
    ///
    /// Returns [`DetailError`] if the tile could not be detailed. The
    /// pass is aborted; there are no retries.
    fn detail(&mut self, tile: &Tile, params: &DetailParams) -> Result<RgbImage, DetailError>;
}

impl<F> Detailer for F
where
    F: FnMut(&Tile, &DetailParams) -> Result<RgbImage, DetailError>,
{
    fn detail(&mut self, tile: &Tile, params: &DetailParams) -> Result<RgbImage, DetailError> {
        self(tile, params)
    }
}

/// Returns every tile unchanged. Useful for previewing the tiling and
/// seam blending without a model.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDetailer;

impl Detailer for PassthroughDetailer {
    fn detail(&mut self, tile: &Tile, _params: &DetailParams) -> Result<RgbImage, DetailError> {
        Ok(tile.image.clone())
    }
}

/// Progress notification emitted after each tile is detailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileProgress {
    /// Index of the finished tile in draw order.
    pub index: usize,
    /// Total tiles in this pass.
    pub total: usize,
    /// Canvas position of the finished tile.
    pub position: crate::types::Point,
}

/// Detail one tile, enforcing the size contract.
///
/// # Errors
///
/// Returns [`TilingError::DetailFailed`] if the detailer errors and
/// [`TilingError::DetailSizeMismatch`] if it returns a raster of a
/// different size. Mismatched rasters are never resized.
pub fn detail_tile(
    detailer: &mut (impl Detailer + ?Sized),
    tile: Tile,
    params: &DetailParams,
) -> Result<Tile, TilingError> {
    let image = detailer
        .detail(&tile, params)
        .map_err(|source| TilingError::DetailFailed {
            index: tile.index,
            position: tile.position,
            source,
        })?;

    let expected = tile.size();
    let actual = Size::of(&image);
    if actual != expected {
        return Err(TilingError::DetailSizeMismatch {
            index: tile.index,
            expected,
            actual,
        });
    }

    Ok(Tile { image, ..tile })
}
