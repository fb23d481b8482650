//! Tile geometry planning.
//!
//! Computes where the fixed-size tiles go on a canvas. The walk starts
//! from a tile centred on the canvas and steps outward by
//! `tile - overlap` in each direction until it passes the canvas edge:
//!
//! ```text
//!          left columns      center     right columns
//!   up    (lx, uy) ...     (cx, uy)   ... (rx, uy)
//!   row   (lx, cy) ...     (cx, cy)   ... (rx, cy)
//!   down  (lx, dy) ...     (cx, dy)   ... (rx, dy)
//! ```
//!
//! The raw walk ([`TileWalk`]) overshoots: its outermost tiles sit
//! partly above/left of the origin or past the far edges. Positions are
//! clamped into the canvas when the [`TilePlan`] is emitted, which keeps
//! every tile full-size while preserving coverage.
//!
//! # Draw order
//!
//! Tiles are composited in [`TilePlan::positions`] order: the down group,
//! the up group, the right column, the left column (each farthest-first),
//! and finally the center tile. Later tiles are drawn over earlier ones,
//! so central content is never covered by an outer tile's feathered edge.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{Point, Size, TilingError};

/// Raw positions produced by the outward walk, grouped by direction.
///
/// Positions here are *unclamped* and may lie outside the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileWalk {
    /// The tile centred on the canvas.
    pub center: Point,
    /// Positions above the center row, one column after another.
    pub up: Vec<Point>,
    /// Positions below the center row, one column after another.
    pub down: Vec<Point>,
    /// Center-row positions left of center, nearest first.
    pub left: Vec<Point>,
    /// Center-row positions right of center, nearest first.
    pub right: Vec<Point>,
}

impl TileWalk {
    /// Walk outward from the canvas center.
    ///
    /// Does not validate its inputs; callers go through [`plan`].
    fn run(canvas: Size, tile: Size, overlap: u32) -> Self {
        let canvas_w = i64::from(canvas.width);
        let canvas_h = i64::from(canvas.height);
        let tile_w = i64::from(tile.width);
        let tile_h = i64::from(tile.height);
        let step_x = tile_w - i64::from(overlap);
        let step_y = tile_h - i64::from(overlap);

        let center = Point::new(canvas_w / 2 - tile_w / 2, canvas_h / 2 - tile_h / 2);

        let mut walk = Self {
            center,
            up: Vec::new(),
            down: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
        };

        // Each step is taken while the *current* tile has room, so the
        // final step of every walk lands at or beyond the canvas edge.
        let column = |x: i64, up: &mut Vec<Point>, down: &mut Vec<Point>| {
            let mut uy = center.y;
            while uy > 0 {
                uy -= step_y;
                up.push(Point::new(x, uy));
            }
            let mut dy = center.y;
            while dy + tile_h <= canvas_h {
                dy += step_y;
                down.push(Point::new(x, dy));
            }
        };

        column(center.x, &mut walk.up, &mut walk.down);

        let mut lx = center.x;
        while lx > 0 {
            lx -= step_x;
            walk.left.push(Point::new(lx, center.y));
            column(lx, &mut walk.up, &mut walk.down);
        }

        let mut rx = center.x;
        while rx + tile_w <= canvas_w {
            rx += step_x;
            walk.right.push(Point::new(rx, center.y));
            column(rx, &mut walk.up, &mut walk.down);
        }

        walk
    }

    /// Total number of raw positions, center included.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.up.len() + self.down.len() + self.left.len() + self.right.len()
    }

    /// Always `false`: a walk contains at least the center tile.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Raw positions in draw order (farthest groups first, center last).
    #[must_use]
    pub fn draw_order(&self) -> Vec<Point> {
        let mut order = Vec::with_capacity(self.len());
        order.extend(self.down.iter().rev());
        order.extend(self.up.iter().rev());
        order.extend(self.right.iter().rev());
        order.extend(self.left.iter().rev());
        order.push(self.center);
        order
    }
}

/// The tiles needed to cover a canvas, in draw order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePlan {
    canvas: Size,
    tile: Size,
    overlap: u32,
    positions: Vec<Point>,
    adjusted: Size,
    walk: TileWalk,
}

impl TilePlan {
    /// Canvas size this plan was computed for.
    #[must_use]
    pub const fn canvas_size(&self) -> Size {
        self.canvas
    }

    /// Size of every tile.
    #[must_use]
    pub const fn tile_size(&self) -> Size {
        self.tile
    }

    /// Overlap between neighbouring tiles in pixels.
    #[must_use]
    pub const fn overlap(&self) -> u32 {
        self.overlap
    }

    /// Clamped tile positions in draw order. The center tile is last.
    #[must_use]
    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    /// Positions in render order: the center tile first, then outward.
    pub fn render_order(&self) -> impl ExactSizeIterator<Item = Point> + '_ {
        self.positions.iter().rev().copied()
    }

    /// The center tile's (clamped) position.
    #[must_use]
    pub fn center(&self) -> Point {
        clamp_to_canvas(self.walk.center, self.canvas, self.tile)
    }

    /// Number of tiles to render.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always `false`: every plan contains at least the center tile.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Canvas size that the tile grid fits with the least excess,
    /// scaled uniformly and never larger than [`canvas_size`](Self::canvas_size).
    #[must_use]
    pub const fn adjusted_canvas(&self) -> Size {
        self.adjusted
    }

    /// The raw walk the plan was derived from.
    #[must_use]
    pub const fn walk(&self) -> &TileWalk {
        &self.walk
    }
}

/// Check tile size and overlap independent of any canvas.
///
/// # Errors
///
/// Returns [`TilingError::InvalidGeometry`] if a tile dimension is zero
/// or `overlap >= min(tile.width, tile.height)`.
pub fn validate_tile(tile: Size, overlap: u32) -> Result<(), TilingError> {
    if tile.is_empty() {
        return Err(TilingError::InvalidGeometry(format!(
            "tile size must be positive, got {tile}"
        )));
    }
    let min_side = tile.width.min(tile.height);
    if overlap >= min_side {
        return Err(TilingError::InvalidGeometry(format!(
            "overlap {overlap} must be smaller than the tile's shorter side ({min_side}) for tile {tile}"
        )));
    }
    Ok(())
}

/// Check that `(canvas, tile, overlap)` can be planned.
///
/// # Errors
///
/// Returns [`TilingError::InvalidGeometry`] for a zero-sized canvas, a
/// zero-sized tile, or an overlap not smaller than the tile.
pub fn validate_geometry(canvas: Size, tile: Size, overlap: u32) -> Result<(), TilingError> {
    if canvas.is_empty() {
        return Err(TilingError::InvalidGeometry(format!(
            "canvas size must be positive, got {canvas}"
        )));
    }
    validate_tile(tile, overlap)
}

/// Plan the tiles covering `canvas`.
///
/// # Errors
///
/// Returns [`TilingError::InvalidGeometry`] if the geometry is invalid
/// (see [`validate_geometry`]).
pub fn plan(canvas: Size, tile: Size, overlap: u32) -> Result<TilePlan, TilingError> {
    validate_geometry(canvas, tile, overlap)?;

    let walk = TileWalk::run(canvas, tile, overlap);

    // Clamping can fold several raw positions onto one; keep the last
    // occurrence so draw order (and the center-last rule) is preserved.
    let mut seen = HashSet::new();
    let mut positions: Vec<Point> = walk
        .draw_order()
        .into_iter()
        .rev()
        .map(|p| clamp_to_canvas(p, canvas, tile))
        .filter(|p| seen.insert(*p))
        .collect();
    positions.reverse();

    let adjusted = adjusted_canvas(canvas, tile, &walk);

    Ok(TilePlan {
        canvas,
        tile,
        overlap,
        positions,
        adjusted,
        walk,
    })
}

/// Clamp a raw position so the tile lies inside the canvas where possible.
///
/// When the canvas is smaller than the tile on an axis, the position on
/// that axis is pinned to 0 and the tile hangs past the far edge.
#[must_use]
pub fn clamp_to_canvas(p: Point, canvas: Size, tile: Size) -> Point {
    let max_x = (i64::from(canvas.width) - i64::from(tile.width)).max(0);
    let max_y = (i64::from(canvas.height) - i64::from(tile.height)).max(0);
    Point::new(p.x.clamp(0, max_x), p.y.clamp(0, max_y))
}

/// Far edge of the outermost walked tile that lies fully inside
/// `0..canvas` on one axis.
fn inner_edge(starts: impl Iterator<Item = i64>, tile: i64, canvas: i64) -> i64 {
    starts
        .filter(|&start| start >= 0 && start + tile <= canvas)
        .map(|start| start + tile)
        .max()
        .unwrap_or(canvas)
}

/// Uniformly shrink `canvas` so its far edges meet the outermost walked
/// tiles that fit entirely inside it.
///
/// Neither side is shrunk below the tile, and a canvas already smaller
/// than the tile on either axis is returned unchanged.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn adjusted_canvas(canvas: Size, tile: Size, walk: &TileWalk) -> Size {
    if canvas.width < tile.width || canvas.height < tile.height {
        return canvas;
    }

    let raw = walk.draw_order();
    let edge_x = inner_edge(
        raw.iter().map(|p| p.x),
        i64::from(tile.width),
        i64::from(canvas.width),
    );
    let edge_y = inner_edge(
        raw.iter().map(|p| p.y),
        i64::from(tile.height),
        i64::from(canvas.height),
    );

    let canvas_w = f64::from(canvas.width);
    let canvas_h = f64::from(canvas.height);
    let floor = (f64::from(tile.width) / canvas_w).max(f64::from(tile.height) / canvas_h);
    let scale = (edge_x as f64 / canvas_w)
        .min(edge_y as f64 / canvas_h)
        .max(floor)
        .min(1.0);

    Size::new(
        ((canvas_w * scale).floor() as u32).clamp(tile.width, canvas.width),
        ((canvas_h * scale).floor() as u32).clamp(tile.height, canvas.height),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;

    fn sq(n: u32) -> Size {
        Size::new(n, n)
    }

    fn pts(coords: &[(i64, i64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    /// Mark every canvas pixel covered by at least one tile.
    fn covers_canvas(plan: &TilePlan) -> bool {
        let canvas = plan.canvas_size();
        let tile = plan.tile_size();
        let mut covered = vec![false; (canvas.width * canvas.height) as usize];
        for p in plan.positions() {
            for y in p.y..(p.y + i64::from(tile.height)).min(i64::from(canvas.height)) {
                for x in p.x..(p.x + i64::from(tile.width)).min(i64::from(canvas.width)) {
                    covered[(y * i64::from(canvas.width) + x) as usize] = true;
                }
            }
        }
        covered.into_iter().all(|c| c)
    }

    #[test]
    fn single_tile_canvas_yields_one_position() {
        let plan = plan(sq(512), sq(512), 64).unwrap();
        assert_eq!(plan.positions(), &[Point::new(0, 0)]);
        assert_eq!(plan.adjusted_canvas(), sq(512));
    }

    #[test]
    fn single_tile_canvas_raw_walk_overshoots() {
        let plan = plan(sq(512), sq(512), 64).unwrap();
        let walk = plan.walk();
        assert_eq!(walk.center, Point::new(0, 0));
        assert!(walk.up.is_empty());
        assert!(walk.left.is_empty());
        assert_eq!(walk.down, pts(&[(0, 448), (448, 448)]));
        assert_eq!(walk.right, pts(&[(448, 0)]));
    }

    #[test]
    fn double_canvas_raw_walk() {
        let plan = plan(sq(1024), sq(512), 128).unwrap();
        let walk = plan.walk();
        assert_eq!(walk.center, Point::new(256, 256));
        assert_eq!(walk.up, pts(&[(256, -128), (-128, -128), (640, -128)]));
        assert_eq!(walk.down, pts(&[(256, 640), (-128, 640), (640, 640)]));
        assert_eq!(walk.left, pts(&[(-128, 256)]));
        assert_eq!(walk.right, pts(&[(640, 256)]));
    }

    #[test]
    fn double_canvas_draw_order() {
        let plan = plan(sq(1024), sq(512), 128).unwrap();
        assert_eq!(
            plan.positions(),
            pts(&[
                (512, 512),
                (0, 512),
                (256, 512),
                (512, 0),
                (0, 0),
                (256, 0),
                (512, 256),
                (0, 256),
                (256, 256),
            ])
            .as_slice()
        );
        for p in plan.positions() {
            assert!((0..=512).contains(&p.x) && (0..=512).contains(&p.y), "{p}");
        }
        assert_eq!(plan.adjusted_canvas(), sq(768));
    }

    #[test]
    fn center_is_last_in_draw_order_and_first_in_render_order() {
        for (canvas, tile, overlap) in [
            (Size::new(1024, 1024), sq(512), 128),
            (Size::new(1000, 700), sq(512), 128),
            (Size::new(2048, 1152), Size::new(512, 768), 64),
            (Size::new(300, 200), sq(64), 16),
        ] {
            let plan = plan(canvas, tile, overlap).unwrap();
            assert_eq!(plan.positions().last(), Some(&plan.center()));
            assert_eq!(plan.render_order().next(), Some(plan.center()));
            assert_eq!(plan.walk().draw_order().last(), Some(&plan.walk().center));
        }
    }

    #[test]
    fn positions_stay_within_canvas_and_cover_it() {
        let tile = Size::new(64, 48);
        for overlap in [0, 8, 16, 40] {
            for w in (30..220).step_by(13) {
                for h in (20..180).step_by(17) {
                    let canvas = Size::new(w, h);
                    let plan = plan(canvas, tile, overlap).unwrap();
                    for p in plan.positions() {
                        assert!(p.x >= 0 && p.y >= 0, "{p} on {canvas}");
                        assert!(p.x + 64 <= i64::from(w.max(64)), "{p} on {canvas}");
                        assert!(p.y + 48 <= i64::from(h.max(48)), "{p} on {canvas}");
                    }
                    assert!(
                        covers_canvas(&plan),
                        "gap on {canvas} overlap {overlap}: {:?}",
                        plan.positions()
                    );
                }
            }
        }
    }

    #[test]
    fn positions_are_unique() {
        let plan = plan(Size::new(1000, 700), sq(512), 128).unwrap();
        let unique: HashSet<_> = plan.positions().iter().collect();
        assert_eq!(unique.len(), plan.len());
    }

    #[test]
    fn neighbours_overlap_by_at_least_overlap() {
        let overlap = 128;
        let plan = plan(Size::new(1700, 1300), sq(512), overlap).unwrap();
        let mut xs: Vec<i64> = plan.positions().iter().map(|p| p.x).collect();
        xs.sort_unstable();
        xs.dedup();
        for pair in xs.windows(2) {
            assert!(pair[1] - pair[0] <= 512 - i64::from(overlap), "{pair:?}");
        }
        let mut ys: Vec<i64> = plan.positions().iter().map(|p| p.y).collect();
        ys.sort_unstable();
        ys.dedup();
        for pair in ys.windows(2) {
            assert!(pair[1] - pair[0] <= 512 - i64::from(overlap), "{pair:?}");
        }
    }

    #[test]
    fn adjusted_canvas_never_grows_and_is_isotropic() {
        for canvas in [
            Size::new(1000, 700),
            Size::new(1023, 1537),
            Size::new(2000, 600),
            Size::new(100, 100),
            Size::new(700, 300),
        ] {
            let plan = plan(canvas, sq(512), 128).unwrap();
            let adjusted = plan.adjusted_canvas();
            assert!(adjusted.width <= canvas.width, "{adjusted} vs {canvas}");
            assert!(adjusted.height <= canvas.height, "{adjusted} vs {canvas}");
            let sx = f64::from(adjusted.width) / f64::from(canvas.width);
            let sy = f64::from(adjusted.height) / f64::from(canvas.height);
            let tolerance = 1.0 / f64::from(canvas.width.min(canvas.height));
            assert!((sx - sy).abs() <= tolerance, "{sx} vs {sy} for {canvas}");
        }
    }

    #[test]
    fn adjusted_canvas_shrinks_to_inner_tiles() {
        // Columns start at 256 and 640; only the center column fits, so the
        // far edge is 768 on both axes.
        assert_eq!(plan(sq(1024), sq(512), 128).unwrap().adjusted_canvas(), sq(768));
        // Columns at 0, 384, 768: the grid already ends on the canvas edge.
        assert_eq!(plan(sq(1280), sq(512), 128).unwrap().adjusted_canvas(), sq(1280));
        for side in (512..3000).step_by(37) {
            let adjusted = plan(sq(side), sq(512), 128).unwrap().adjusted_canvas();
            assert!(adjusted.width >= 512 && adjusted.width <= side, "{adjusted} for {side}");
        }
    }

    #[test]
    fn adjusted_canvas_keeps_short_side_at_least_a_tile() {
        let adjusted = plan(Size::new(2000, 600), sq(512), 128).unwrap().adjusted_canvas();
        assert!(adjusted.width < 2000, "{adjusted}");
        assert_eq!(adjusted.height, 512);
    }

    #[test]
    fn adjusted_canvas_untouched_when_shorter_than_tile() {
        let canvas = Size::new(1000, 300);
        assert_eq!(plan(canvas, sq(512), 128).unwrap().adjusted_canvas(), canvas);
    }

    #[test]
    fn canvas_smaller_than_tile_degenerates_to_center() {
        let plan = plan(sq(100), sq(512), 64).unwrap();
        assert_eq!(plan.positions(), &[Point::new(0, 0)]);
        assert_eq!(plan.walk().len(), 1);
        assert_eq!(plan.walk().center, Point::new(-206, -206));
        assert_eq!(plan.adjusted_canvas(), sq(100));
    }

    #[test]
    fn zero_overlap_steps_by_full_tile() {
        let plan = plan(sq(256), sq(128), 0).unwrap();
        let walk = plan.walk();
        assert_eq!(walk.center, Point::new(64, 64));
        assert_eq!(walk.left, pts(&[(-64, 64)]));
        assert_eq!(walk.right, pts(&[(192, 64)]));
        assert!(covers_canvas(&plan));
    }

    #[test]
    fn rectangular_tiles_use_per_axis_steps() {
        let plan = plan(Size::new(1024, 512), Size::new(512, 256), 64).unwrap();
        let walk = plan.walk();
        assert_eq!(walk.center, Point::new(256, 128));
        // Vertical step is 256 - 64 = 192, horizontal is 512 - 64 = 448.
        assert_eq!(walk.up[0], Point::new(256, -64));
        assert_eq!(walk.right[0], Point::new(704, 128));
    }

    #[test]
    fn overlap_equal_to_tile_is_invalid() {
        let err = plan(sq(1024), sq(512), 512).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGeometry);
    }

    #[test]
    fn overlap_checked_against_shorter_side() {
        assert!(plan(sq(1024), Size::new(512, 128), 128).is_err());
        assert!(plan(sq(1024), Size::new(512, 128), 127).is_ok());
    }

    #[test]
    fn zero_tile_is_invalid() {
        assert!(matches!(
            plan(sq(1024), Size::new(0, 512), 0),
            Err(TilingError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn zero_canvas_is_invalid() {
        assert!(matches!(
            plan(Size::new(1024, 0), sq(512), 64),
            Err(TilingError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn clamp_pins_oversized_tiles_to_origin() {
        assert_eq!(
            clamp_to_canvas(Point::new(-30, 900), Size::new(100, 1000), Size::new(200, 64)),
            Point::new(0, 936)
        );
    }

    #[test]
    fn plan_serializes_to_json() {
        let plan = plan(sq(1024), sq(512), 128).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        let back: TilePlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
