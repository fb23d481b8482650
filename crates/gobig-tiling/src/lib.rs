//! gobig-tiling: tile geometry and seam-free compositing (sans-IO).
//!
//! Splits an upscaled canvas into overlapping fixed-size tiles, hands each
//! tile to a caller-supplied [`Detailer`], and composites the results back
//! with a feathered alpha mask so no seams show.
//!
//! This crate has **no I/O dependencies**. It works on in-memory rasters;
//! reading and writing files, running external upscalers, and talking to
//! diffusion backends all live in `gobig-io`.
//!
//! # Pass stages
//!
//! 1. Plan tile positions ([`plan::plan`])
//! 2. Crop tiles, optionally resizing the canvas first ([`TileExtractor`])
//! 3. Detail each tile, one at a time ([`Detailer`])
//! 4. Attach the seam mask as alpha ([`SeamMask`])
//! 5. Alpha-composite in draw order ([`Compositor`])

pub mod composite;
pub mod detail;
pub mod diagnostics;
pub mod extract;
pub mod pass;
pub mod plan;
pub mod resample;
pub mod seam;
pub mod types;

pub use composite::Compositor;
pub use detail::{Detailer, PassthroughDetailer, TileProgress};
pub use diagnostics::{Clock, PassDiagnostics};
pub use extract::{Tile, TileExtractor};
pub use pass::{Pass, PassOutput};
pub use plan::{TilePlan, TileWalk};
pub use resample::ResampleFilter;
pub use seam::SeamMask;
pub use types::{
    DetailError, DetailParams, ErrorKind, Point, RgbImage, Size, TilingConfig, TilingError,
};

/// Run one complete detail pass over `canvas`.
///
/// Equivalent to driving [`Pass`] through every stage. The returned
/// image has the canvas's dimensions, or the plan's adjusted size when
/// `config.maximize` is set.
///
/// # Errors
///
/// Returns [`TilingError::InvalidGeometry`] or
/// [`TilingError::InvalidConfig`] before any tile is detailed, and
/// [`TilingError::DetailFailed`] or [`TilingError::DetailSizeMismatch`]
/// if a tile fails. Nothing partial is returned.
pub fn run_pass<D: Detailer + ?Sized>(
    canvas: RgbImage,
    config: TilingConfig,
    detailer: &mut D,
    params: &DetailParams,
    on_tile: impl FnMut(TileProgress),
) -> Result<PassOutput, TilingError> {
    Ok(Pass::new(canvas, config)
        .plan()?
        .extract()?
        .detail(detailer, params, on_tile)?
        .feather()?
        .composite()
        .into_output())
}
