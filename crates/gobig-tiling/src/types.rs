//! Shared types for the gobig tiling core.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resample::ResampleFilter;

/// Re-export `GrayImage` so downstream crates can reference seam masks
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage`: canvases and tiles travel through the pass as RGB.
pub use image::RgbImage;

/// Re-export `RgbaImage`: the compositor blends in RGBA.
pub use image::RgbaImage;

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size of an existing raster.
    #[must_use]
    pub fn of(image: &impl image::GenericImageView) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height)
    }

    /// Returns `true` if either dimension is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Top-left corner of a tile relative to the canvas origin.
///
/// Signed: the raw geometry walk can step above or to the left of the
/// canvas before positions are clamped for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal offset in pixels.
    pub x: i64,
    /// Vertical offset in pixels.
    pub y: i64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Tile geometry configuration for one pass.
///
/// Geometry is validated against the canvas in
/// [`plan::validate_geometry`](crate::plan::validate_geometry) before any
/// planning or I/O happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Width of every tile handed to the detailer.
    pub tile_width: u32,

    /// Height of every tile handed to the detailer.
    pub tile_height: u32,

    /// Pixels shared between neighbouring tiles. Also the width of the
    /// feathered border in the seam mask.
    pub overlap: u32,

    /// Resize the canvas to the plan's adjusted size (and re-plan)
    /// before cropping tiles.
    pub maximize: bool,

    /// Filter used when `maximize` resizes the canvas.
    pub resample_filter: ResampleFilter,
}

impl TilingConfig {
    /// Default tile width: the native output width of the detail model.
    pub const DEFAULT_TILE_WIDTH: u32 = 512;
    /// Default tile height.
    pub const DEFAULT_TILE_HEIGHT: u32 = 512;
    /// Default overlap in pixels.
    pub const DEFAULT_OVERLAP: u32 = 128;
    /// Default resampling filter for `maximize`.
    pub const DEFAULT_RESAMPLE_FILTER: ResampleFilter = ResampleFilter::Lanczos3;

    /// The configured tile size.
    #[must_use]
    pub const fn tile_size(&self) -> Size {
        Size::new(self.tile_width, self.tile_height)
    }

    /// Check the tile/overlap relationship without a canvas.
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::InvalidGeometry`] if a tile dimension is
    /// zero or the overlap is not smaller than both tile dimensions.
    pub fn validate(&self) -> Result<(), TilingError> {
        crate::plan::validate_tile(self.tile_size(), self.overlap)
    }
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile_width: Self::DEFAULT_TILE_WIDTH,
            tile_height: Self::DEFAULT_TILE_HEIGHT,
            overlap: Self::DEFAULT_OVERLAP,
            maximize: false,
            resample_filter: Self::DEFAULT_RESAMPLE_FILTER,
        }
    }
}

/// Parameters forwarded verbatim to the detailer for every tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailParams {
    /// Text prompt describing the image.
    pub prompt: String,

    /// Optional negative prompt.
    pub negative_prompt: Option<String>,

    /// How much of each tile is re-noised before re-rendering.
    /// `0.0` keeps the tile, `1.0` discards it entirely.
    pub strength: f32,

    /// Classifier-free guidance scale.
    pub guidance_scale: f32,

    /// Sampling steps for the detail model.
    pub steps: u32,

    /// Sampler seed.
    pub seed: u64,

    /// Ask the detail model for circular (seamlessly tiling) padding.
    pub seamless: bool,
}

impl DetailParams {
    /// Default strength.
    pub const DEFAULT_STRENGTH: f32 = 0.3;
    /// Default guidance scale.
    pub const DEFAULT_GUIDANCE_SCALE: f32 = 10.0;
    /// Default sampling steps.
    pub const DEFAULT_STEPS: u32 = 150;
    /// Default seed.
    pub const DEFAULT_SEED: u64 = 42;

    /// Validate parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::InvalidConfig`] if `strength` is outside
    /// `0.0..=1.0`, `guidance_scale` is not finite, or `steps` is zero.
    pub fn validate(&self) -> Result<(), TilingError> {
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(TilingError::InvalidConfig(format!(
                "strength must be within [0.0, 1.0], got {}",
                self.strength
            )));
        }
        if !self.guidance_scale.is_finite() {
            return Err(TilingError::InvalidConfig(format!(
                "guidance scale must be finite, got {}",
                self.guidance_scale
            )));
        }
        if self.steps == 0 {
            return Err(TilingError::InvalidConfig(
                "detail steps must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for DetailParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: None,
            strength: Self::DEFAULT_STRENGTH,
            guidance_scale: Self::DEFAULT_GUIDANCE_SCALE,
            steps: Self::DEFAULT_STEPS,
            seed: Self::DEFAULT_SEED,
            seamless: false,
        }
    }
}

/// Failure reported by a [`Detailer`](crate::detail::Detailer)
/// implementation.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DetailError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl DetailError {
    /// Create an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Broad failure categories shared by every gobig error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad tile, overlap, or canvas dimensions. Detected before any I/O.
    InvalidGeometry,
    /// Out-of-range non-geometry parameter (e.g. detail strength).
    InvalidConfig,
    /// The external pixel upscaler failed or produced no output.
    ExternalToolFailure,
    /// The detailer failed or returned a raster of the wrong size.
    ExternalDetailFailure,
    /// A raster file could not be read or written.
    IoFailure,
}

/// Errors that can occur while planning, detailing, or compositing.
#[derive(Debug, thiserror::Error)]
pub enum TilingError {
    /// Tile, overlap, or canvas dimensions cannot produce a plan.
    #[error("invalid tile geometry: {0}")]
    InvalidGeometry(String),

    /// A non-geometry parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The detailer returned an error for one tile.
    #[error("detailer failed on tile {index} at {position}: {source}")]
    DetailFailed {
        /// Index of the tile in draw order.
        index: usize,
        /// Canvas position of the tile.
        position: Point,
        /// Underlying failure.
        #[source]
        source: DetailError,
    },

    /// The detailer returned a raster whose size differs from the tile.
    #[error("detailer returned a {actual} raster for tile {index}, expected {expected}")]
    DetailSizeMismatch {
        /// Index of the tile in draw order.
        index: usize,
        /// Size of the tile that was sent.
        expected: Size,
        /// Size of the raster that came back.
        actual: Size,
    },
}

impl TilingError {
    /// The broad category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidGeometry(_) => ErrorKind::InvalidGeometry,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::DetailFailed { .. } | Self::DetailSizeMismatch { .. } => {
                ErrorKind::ExternalDetailFailure
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn size_display() {
        assert_eq!(Size::new(512, 768).to_string(), "512x768");
    }

    #[test]
    fn size_of_raster() {
        let img = RgbImage::new(7, 3);
        assert_eq!(Size::of(&img), Size::new(7, 3));
    }

    #[test]
    fn point_display_handles_negative() {
        assert_eq!(Point::new(-128, 640).to_string(), "(-128, 640)");
    }

    #[test]
    fn tiling_config_defaults_match_constants() {
        let config = TilingConfig::default();
        assert_eq!(config.tile_width, TilingConfig::DEFAULT_TILE_WIDTH);
        assert_eq!(config.tile_height, TilingConfig::DEFAULT_TILE_HEIGHT);
        assert_eq!(config.overlap, TilingConfig::DEFAULT_OVERLAP);
        assert!(!config.maximize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tiling_config_partial_json_uses_defaults() {
        let config: TilingConfig = serde_json::from_str(r#"{"overlap": 64}"#).unwrap();
        assert_eq!(config.overlap, 64);
        assert_eq!(config.tile_width, TilingConfig::DEFAULT_TILE_WIDTH);
    }

    #[test]
    fn tiling_config_rejects_overlap_equal_to_tile() {
        let config = TilingConfig {
            overlap: 512,
            ..TilingConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGeometry);
    }

    #[test]
    fn detail_params_defaults_are_valid() {
        assert!(DetailParams::default().validate().is_ok());
    }

    #[test]
    fn detail_params_strength_bounds() {
        for strength in [0.0, 0.5, 1.0] {
            let params = DetailParams {
                strength,
                ..DetailParams::default()
            };
            assert!(params.validate().is_ok(), "strength {strength} rejected");
        }
        for strength in [-0.1, 1.01, f32::NAN] {
            let params = DetailParams {
                strength,
                ..DetailParams::default()
            };
            let err = params.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        }
    }

    #[test]
    fn detail_params_rejects_zero_steps() {
        let params = DetailParams {
            steps: 0,
            ..DetailParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(TilingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn detail_failed_display_names_tile() {
        let err = TilingError::DetailFailed {
            index: 3,
            position: Point::new(0, 384),
            source: DetailError::new("model crashed"),
        };
        let msg = err.to_string();
        assert!(msg.contains("tile 3"), "{msg}");
        assert!(msg.contains("(0, 384)"), "{msg}");
        assert!(msg.contains("model crashed"), "{msg}");
        assert_eq!(err.kind(), ErrorKind::ExternalDetailFailure);
    }

    #[test]
    fn detail_error_preserves_source() {
        let err = DetailError::with_source("write failed", std::io::Error::other("disk full"));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("disk full"));
    }

    #[test]
    fn size_mismatch_display() {
        let err = TilingError::DetailSizeMismatch {
            index: 0,
            expected: Size::new(512, 512),
            actual: Size::new(512, 448),
        };
        assert_eq!(
            err.to_string(),
            "detailer returned a 512x448 raster for tile 0, expected 512x512"
        );
    }
}
