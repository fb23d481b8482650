//! Pass diagnostics: timing and counts for each stage of a detail pass.
//!
//! The crate does no clock access of its own. Callers supply a [`Clock`]
//! so the same instrumentation works under a real clock, a test clock, or
//! a platform without `std::time::Instant`.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detail::{Detailer, TileProgress};
use crate::pass::{Detailed, Extracted, Feathered, Pass, PassOutput, Planned};
use crate::types::{DetailParams, RgbImage, Size, TilingConfig, TilingError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom("duration seconds must be finite and non-negative")
        })
    }
}

/// Source of timestamps for diagnostics.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from one detail pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassDiagnostics {
    /// Stage 1: geometry planning.
    pub plan: StageDiagnostics,
    /// Stage 2: tile extraction (including any maximize resize).
    pub extract: StageDiagnostics,
    /// Stage 3: detailing every tile.
    pub detail: StageDiagnostics,
    /// Stage 4: seam mask construction and application.
    pub feather: StageDiagnostics,
    /// Stage 5: compositing.
    pub composite: StageDiagnostics,
    /// Wall-clock duration of the whole pass (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Per-tile detail durations, in draw order (seconds).
    #[serde(with = "tile_durations_serde")]
    pub tile_durations: Vec<Duration>,
}

mod tile_durations_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(
        durations: &Vec<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let secs: Vec<f64> = durations.iter().map(Duration::as_secs_f64).collect();
        secs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Duration>, D::Error> {
        Vec::<f64>::deserialize(deserializer)?
            .into_iter()
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|_| {
                    serde::de::Error::custom("duration seconds must be finite and non-negative")
                })
            })
            .collect()
    }
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Geometry planning.
    Plan {
        /// Canvas the plan covers.
        canvas: Size,
        /// Tile size.
        tile: Size,
        /// Overlap in pixels.
        overlap: u32,
        /// Number of tiles in draw order.
        tile_count: usize,
        /// Canvas size `maximize` would resize to.
        adjusted: Size,
    },
    /// Tile extraction.
    Extract {
        /// Canvas the tiles were cut from.
        canvas: Size,
        /// Whether `maximize` resized the canvas.
        resized: bool,
        /// Number of tiles cropped.
        tile_count: usize,
    },
    /// Detailing.
    Detail {
        /// Number of tiles detailed.
        tile_count: usize,
    },
    /// Seam feathering.
    Feather {
        /// Feather width in pixels.
        overlap: u32,
        /// Number of feathered layers.
        layer_count: usize,
    },
    /// Compositing.
    Composite {
        /// Number of layers drawn.
        layer_count: usize,
    },
}

impl PassDiagnostics {
    /// Human-readable multi-line report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pass Diagnostics Report\n{}", "=".repeat(60)));
        if let StageMetrics::Plan {
            canvas,
            tile,
            overlap,
            tile_count,
            ..
        } = &self.plan.metrics
        {
            lines.push(format!(
                "Canvas: {canvas}  Tile: {tile}  Overlap: {overlap}px  Tiles: {tile_count}"
            ));
        }
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration)
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Plan", &self.plan),
            ("Extract", &self.extract),
            ("Detail", &self.detail),
            ("Feather", &self.feather),
            ("Composite", &self.composite),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        if let (Some(slowest), Some(fastest)) = (
            self.tile_durations.iter().max(),
            self.tile_durations.iter().min(),
        ) {
            lines.push(String::new());
            lines.push(format!(
                "Per tile: fastest {:.3}ms  |  slowest {:.3}ms",
                duration_ms(*fastest),
                duration_ms(*slowest),
            ));
        }

        lines.join("\n")
    }
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Plan {
            tile_count,
            adjusted,
            ..
        } => format!("tiles={tile_count} adjusted={adjusted}"),
        StageMetrics::Extract {
            canvas,
            resized,
            tile_count,
        } => format!("canvas={canvas} resized={resized} tiles={tile_count}"),
        StageMetrics::Detail { tile_count } => format!("tiles={tile_count}"),
        StageMetrics::Feather {
            overlap,
            layer_count,
        } => format!("overlap={overlap} layers={layer_count}"),
        StageMetrics::Composite { layer_count } => format!("layers={layer_count}"),
    }
}

/// Convert a `Duration` to fractional milliseconds.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Run a full pass, timing each stage with `clock`.
///
/// # Errors
///
/// Returns the same errors as the individual stages of [`Pass`].
pub fn run_pass_with_diagnostics<C: Clock, D: Detailer + ?Sized>(
    canvas: RgbImage,
    config: TilingConfig,
    detailer: &mut D,
    params: &DetailParams,
    mut on_tile: impl FnMut(TileProgress),
    clock: &C,
) -> Result<(PassOutput, PassDiagnostics), TilingError> {
    let total_start = clock.now();

    let start = clock.now();
    let planned: Planned = Pass::new(canvas, config).plan()?;
    let plan = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: planned.metrics(),
    };

    let start = clock.now();
    let extracted: Extracted = planned.extract()?;
    let extract = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: extracted.metrics(),
    };

    let start = clock.now();
    let mut tile_durations = Vec::with_capacity(extracted.tiles().len());
    let mut tile_start = clock.now();
    let detailed: Detailed = extracted.detail(detailer, params, |progress| {
        tile_durations.push(clock.elapsed(&tile_start));
        tile_start = clock.now();
        on_tile(progress);
    })?;
    let detail = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: detailed.metrics(),
    };

    let start = clock.now();
    let feathered: Feathered = detailed.feather()?;
    let feather = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: feathered.metrics(),
    };

    let start = clock.now();
    let composited = feathered.composite();
    let composite = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: composited.metrics(),
    };

    let diagnostics = PassDiagnostics {
        plan,
        extract,
        detail,
        feather,
        composite,
        total_duration: clock.elapsed(&total_start),
        tile_durations,
    };
    Ok((composited.into_output(), diagnostics))
}
