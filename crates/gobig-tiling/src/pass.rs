//! One tiled detail pass, advanced stage by stage.
//!
//! ```rust
//! # use gobig_tiling::{Pass, TilingConfig, DetailParams, PassthroughDetailer, TilingError};
//! # fn run(canvas: image::RgbImage) -> Result<(), TilingError> {
//! let output = Pass::new(canvas, TilingConfig::default())
//!     .plan()?
//!     .extract()?
//!     .detail(&mut PassthroughDetailer, &DetailParams::default(), |_| {})?
//!     .feather()?
//!     .composite()
//!     .into_output();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, carrying
//! the canvas and plan along so callers can inspect them between steps.
//! The detail stage is the only one that calls out of the crate, and it
//! calls the detailer once per tile, in draw order, never concurrently.

use image::RgbImage;
use serde::Serialize;

use crate::composite::{Compositor, apply_mask};
use crate::detail::{Detailer, TileProgress, detail_tile};
use crate::diagnostics::StageMetrics;
use crate::extract::{ExtractOptions, Tile, TileExtractor};
use crate::plan::{self, TilePlan};
use crate::seam::SeamMask;
use crate::types::{DetailParams, Point, RgbaImage, Size, TilingConfig, TilingError};

/// Entry point for a detail pass.
pub struct Pass;

impl Pass {
    /// Create a pass over `canvas`. Nothing is computed yet.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(canvas: RgbImage, config: TilingConfig) -> Pending {
        Pending { config, canvas }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// The canvas and config, untouched.
#[must_use = "pass stages are consumed by advancing: call .plan() to continue"]
pub struct Pending {
    config: TilingConfig,
    canvas: RgbImage,
}

impl Pending {
    /// Stage name used in diagnostics.
    pub const NAME: &str = "pending";

    /// The input canvas.
    #[must_use]
    pub const fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    /// Validate the geometry and compute the tile plan.
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::InvalidGeometry`] for an empty canvas, an
    /// empty tile, or an overlap too wide for the tile.
    pub fn plan(self) -> Result<Planned, TilingError> {
        self.config.validate()?;
        let plan = plan::plan(Size::of(&self.canvas), self.config.tile_size(), self.config.overlap)?;
        Ok(Planned {
            config: self.config,
            canvas: self.canvas,
            plan,
        })
    }
}

// ───────────────────────── Stage 1: Planned ──────────────────────────

/// Geometry is known; no pixels have been cropped.
#[must_use = "pass stages are consumed by advancing: call .extract() to continue"]
pub struct Planned {
    config: TilingConfig,
    canvas: RgbImage,
    plan: TilePlan,
}

impl Planned {
    /// Stage name used in diagnostics.
    pub const NAME: &str = "plan";

    /// The computed plan.
    #[must_use]
    pub const fn plan(&self) -> &TilePlan {
        &self.plan
    }

    /// Metrics describing the plan.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Plan {
            canvas: self.plan.canvas_size(),
            tile: self.plan.tile_size(),
            overlap: self.plan.overlap(),
            tile_count: self.plan.len(),
            adjusted: self.plan.adjusted_canvas(),
        }
    }

    /// Crop every tile, resizing the canvas first if `maximize` is set.
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::InvalidGeometry`] if re-planning the
    /// resized canvas fails.
    pub fn extract(self) -> Result<Extracted, TilingError> {
        let options = ExtractOptions {
            maximize: self.config.maximize,
            filter: self.config.resample_filter,
        };
        let original = Size::of(&self.canvas);
        let mut extractor = TileExtractor::new(&self.canvas, self.plan, options)?;
        let tiles: Vec<Tile> = extractor.by_ref().collect();
        let (canvas, plan) = extractor.into_parts();
        let resized = Size::of(canvas.as_ref()) != original;
        Ok(Extracted {
            canvas: canvas.into_owned(),
            plan,
            tiles,
            resized,
        })
    }
}

// ───────────────────────── Stage 2: Extracted ────────────────────────

/// Tiles cropped and waiting for the detailer.
#[must_use = "pass stages are consumed by advancing: call .detail() to continue"]
pub struct Extracted {
    canvas: RgbImage,
    plan: TilePlan,
    tiles: Vec<Tile>,
    resized: bool,
}

impl Extracted {
    /// Stage name used in diagnostics.
    pub const NAME: &str = "extract";

    /// The canvas the tiles were cut from.
    #[must_use]
    pub const fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    /// The source tiles, in draw order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// The plan in effect (re-planned if the canvas was maximized).
    #[must_use]
    pub const fn plan(&self) -> &TilePlan {
        &self.plan
    }

    /// Whether `maximize` actually resized the canvas.
    #[must_use]
    pub const fn resized(&self) -> bool {
        self.resized
    }

    /// Metrics describing the extraction.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Extract {
            canvas: Size::of(&self.canvas),
            resized: self.resized,
            tile_count: self.tiles.len(),
        }
    }

    /// Run every tile through `detailer`, one at a time, in draw order.
    ///
    /// `on_tile` is called after each tile succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::InvalidConfig`] if `params` are out of
    /// range, [`TilingError::DetailFailed`] if the detailer fails, and
    /// [`TilingError::DetailSizeMismatch`] if it returns a raster of the
    /// wrong size. The first failure aborts the pass.
    pub fn detail<D: Detailer + ?Sized>(
        self,
        detailer: &mut D,
        params: &DetailParams,
        mut on_tile: impl FnMut(TileProgress),
    ) -> Result<Detailed, TilingError> {
        params.validate()?;
        let total = self.tiles.len();
        let mut detailed = Vec::with_capacity(total);
        for tile in self.tiles {
            let tile = detail_tile(detailer, tile, params)?;
            on_tile(TileProgress {
                index: tile.index,
                total,
                position: tile.position,
            });
            detailed.push(tile);
        }
        Ok(Detailed {
            canvas: self.canvas,
            plan: self.plan,
            tiles: detailed,
        })
    }
}

// ───────────────────────── Stage 3: Detailed ─────────────────────────

/// Every tile has been re-rendered.
#[must_use = "pass stages are consumed by advancing: call .feather() to continue"]
pub struct Detailed {
    canvas: RgbImage,
    plan: TilePlan,
    tiles: Vec<Tile>,
}

impl Detailed {
    /// Stage name used in diagnostics.
    pub const NAME: &str = "detail";

    /// The detailed tiles, in draw order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Metrics describing the detail stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Detail {
            tile_count: self.tiles.len(),
        }
    }

    /// Build the seam mask and attach it to every tile as alpha.
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::InvalidGeometry`] if a tile's size differs
    /// from the plan's tile size.
    pub fn feather(self) -> Result<Feathered, TilingError> {
        let mask = SeamMask::new(self.plan.tile_size(), self.plan.overlap());
        let layers = self
            .tiles
            .iter()
            .map(|tile| Ok((apply_mask(&tile.image, &mask)?, tile.position)))
            .collect::<Result<Vec<_>, TilingError>>()?;
        Ok(Feathered {
            canvas: self.canvas,
            plan: self.plan,
            mask,
            layers,
        })
    }
}

// ───────────────────────── Stage 4: Feathered ────────────────────────

/// Tiles carry the seam alpha and are ready to be drawn.
#[must_use = "pass stages are consumed by advancing: call .composite() to continue"]
pub struct Feathered {
    canvas: RgbImage,
    plan: TilePlan,
    mask: SeamMask,
    layers: Vec<(RgbaImage, Point)>,
}

impl Feathered {
    /// Stage name used in diagnostics.
    pub const NAME: &str = "feather";

    /// The shared seam mask.
    #[must_use]
    pub const fn mask(&self) -> &SeamMask {
        &self.mask
    }

    /// Metrics describing the mask.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Feather {
            overlap: self.mask.overlap(),
            layer_count: self.layers.len(),
        }
    }

    /// Draw every layer over the canvas in draw order.
    pub fn composite(self) -> Composited {
        let mut compositor = Compositor::new(&self.canvas);
        for (layer, position) in &self.layers {
            compositor.draw(layer, *position);
        }
        let layer_count = compositor.drawn();
        Composited {
            image: compositor.finish(),
            plan: self.plan,
            layer_count,
        }
    }
}

// ───────────────────────── Stage 5: Composited ───────────────────────

/// The finished canvas.
#[must_use = "call .into_output() to take the composited canvas"]
pub struct Composited {
    image: RgbImage,
    plan: TilePlan,
    layer_count: usize,
}

impl Composited {
    /// Stage name used in diagnostics.
    pub const NAME: &str = "composite";

    /// The composited canvas.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Metrics describing the composite.
    #[must_use]
    pub const fn metrics(&self) -> StageMetrics {
        StageMetrics::Composite {
            layer_count: self.layer_count,
        }
    }

    /// Take the result.
    #[must_use]
    pub fn into_output(self) -> PassOutput {
        PassOutput {
            image: self.image,
            plan: self.plan,
        }
    }
}

/// Result of a completed pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassOutput {
    /// The composited canvas.
    #[serde(skip)]
    pub image: RgbImage,
    /// The plan the pass ran with.
    pub plan: TilePlan,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::detail::PassthroughDetailer;
    use crate::types::DetailError;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    fn config(tile: u32, overlap: u32) -> TilingConfig {
        TilingConfig {
            tile_width: tile,
            tile_height: tile,
            overlap,
            ..TilingConfig::default()
        }
    }

    #[test]
    fn single_tile_canvas_round_trips() {
        let canvas = gradient(512, 512);
        let output = Pass::new(canvas.clone(), TilingConfig::default())
            .plan()
            .unwrap()
            .extract()
            .unwrap()
            .detail(&mut PassthroughDetailer, &DetailParams::default(), |_| {})
            .unwrap()
            .feather()
            .unwrap()
            .composite()
            .into_output();
        assert_eq!(output.plan.positions(), &[Point::new(0, 0)]);
        assert_eq!(output.image, canvas);
    }

    #[test]
    fn identity_detailer_preserves_multi_tile_canvas() {
        let canvas = gradient(400, 300);
        let output = Pass::new(canvas.clone(), config(128, 32))
            .plan()
            .unwrap()
            .extract()
            .unwrap()
            .detail(&mut PassthroughDetailer, &DetailParams::default(), |_| {})
            .unwrap()
            .feather()
            .unwrap()
            .composite()
            .into_output();
        assert_eq!(output.image, canvas);
    }

    #[test]
    fn progress_reports_every_tile_in_order() {
        let canvas = gradient(1024, 1024);
        let mut seen = Vec::new();
        let detailed = Pass::new(canvas, TilingConfig::default())
            .plan()
            .unwrap()
            .extract()
            .unwrap()
            .detail(&mut PassthroughDetailer, &DetailParams::default(), |p| {
                seen.push(p);
            })
            .unwrap();
        assert_eq!(seen.len(), 9);
        assert!(seen.iter().enumerate().all(|(i, p)| p.index == i && p.total == 9));
        // Center last.
        assert_eq!(seen[8].position, Point::new(256, 256));
        assert_eq!(detailed.metrics(), StageMetrics::Detail { tile_count: 9 });
    }

    #[test]
    fn detailer_sees_tiles_in_plan_order() {
        let canvas = gradient(1024, 1024);
        let planned = Pass::new(canvas, TilingConfig::default()).plan().unwrap();
        let expected = planned.plan().positions().to_vec();
        let mut order = Vec::new();
        let mut record = |t: &Tile, _: &DetailParams| -> Result<RgbImage, DetailError> {
            order.push(t.position);
            Ok(t.image.clone())
        };
        planned
            .extract()
            .unwrap()
            .detail(&mut record, &DetailParams::default(), |_| {})
            .unwrap();
        assert_eq!(order, expected);
    }

    #[test]
    fn solid_detailer_covers_whole_canvas() {
        // The center tile is drawn last and its interior is opaque.
        let canvas = gradient(600, 600);
        let mut paint = |t: &Tile, _: &DetailParams| -> Result<RgbImage, DetailError> {
            Ok(RgbImage::from_pixel(t.image.width(), t.image.height(), image::Rgb([9, 9, 9])))
        };
        let output = Pass::new(canvas, config(256, 64))
            .plan()
            .unwrap()
            .extract()
            .unwrap()
            .detail(&mut paint, &DetailParams::default(), |_| {})
            .unwrap()
            .feather()
            .unwrap()
            .composite()
            .into_output();
        let center = output.image.get_pixel(300, 300).0;
        assert_eq!(center, [9, 9, 9]);
    }

    #[test]
    fn size_mismatch_aborts_without_partial_output() {
        let canvas = gradient(1024, 1024);
        let mut calls = 0;
        let mut bad = |t: &Tile, _: &DetailParams| -> Result<RgbImage, DetailError> {
            calls += 1;
            if t.index == 3 {
                Ok(RgbImage::new(511, 512))
            } else {
                Ok(t.image.clone())
            }
        };
        let result = Pass::new(canvas, TilingConfig::default())
            .plan()
            .unwrap()
            .extract()
            .unwrap()
            .detail(&mut bad, &DetailParams::default(), |_| {});
        assert!(matches!(
            result,
            Err(TilingError::DetailSizeMismatch { index: 3, .. })
        ));
        assert_eq!(calls, 4);
    }

    #[test]
    fn invalid_params_fail_before_any_detailing() {
        let canvas = gradient(512, 512);
        let mut calls = 0;
        let mut count = |t: &Tile, _: &DetailParams| -> Result<RgbImage, DetailError> {
            calls += 1;
            Ok(t.image.clone())
        };
        let params = DetailParams {
            strength: 1.5,
            ..DetailParams::default()
        };
        let result = Pass::new(canvas, TilingConfig::default())
            .plan()
            .unwrap()
            .extract()
            .unwrap()
            .detail(&mut count, &params, |_| {});
        assert!(matches!(result, Err(TilingError::InvalidConfig(_))));
        assert_eq!(calls, 0);
    }

    #[test]
    fn invalid_geometry_is_rejected_at_plan() {
        let canvas = gradient(512, 512);
        let result = Pass::new(canvas, config(64, 64)).plan();
        assert!(matches!(result, Err(TilingError::InvalidGeometry(_))));
    }

    #[test]
    fn maximize_without_resize_keeps_canvas() {
        let canvas = gradient(1280, 1280);
        let config = TilingConfig {
            maximize: true,
            ..TilingConfig::default()
        };
        let extracted = Pass::new(canvas, config).plan().unwrap().extract().unwrap();
        assert!(!extracted.resized());
        assert_eq!(Size::of(extracted.canvas()), Size::new(1280, 1280));
        assert_eq!(extracted.tiles().len(), 9);
    }

    #[test]
    fn maximize_resizes_to_adjusted_canvas() {
        let config = TilingConfig {
            maximize: true,
            ..TilingConfig::default()
        };
        let planned = Pass::new(gradient(1024, 1024), config).plan().unwrap();
        let adjusted = planned.plan().adjusted_canvas();
        assert!(adjusted.width < 1024 && adjusted.height < 1024, "{adjusted}");

        let extracted = planned.extract().unwrap();
        assert!(extracted.resized());
        assert_eq!(Size::of(extracted.canvas()), adjusted);
        assert_eq!(extracted.plan().canvas_size(), adjusted);

        let output = extracted
            .detail(&mut PassthroughDetailer, &DetailParams::default(), |_| {})
            .unwrap()
            .feather()
            .unwrap()
            .composite()
            .into_output();
        assert_eq!(Size::of(&output.image), adjusted);
    }

    #[test]
    fn plan_metrics_describe_geometry() {
        let planned = Pass::new(gradient(1024, 1024), TilingConfig::default())
            .plan()
            .unwrap();
        assert_eq!(
            planned.metrics(),
            StageMetrics::Plan {
                canvas: Size::new(1024, 1024),
                tile: Size::new(512, 512),
                overlap: 128,
                tile_count: 9,
                adjusted: Size::new(768, 768),
            }
        );
    }
}
