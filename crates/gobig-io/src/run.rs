//! Multi-pass orchestration.
//!
//! Each pass runs `upscale -> plan -> extract -> detail -> feather ->
//! composite -> save`, and its detailed output becomes the next pass's
//! source. The first failure ends the run; files already written stay on
//! disk.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use gobig_tiling::diagnostics::run_pass_with_diagnostics;
use gobig_tiling::{
    Clock, DetailParams, Detailer, PassDiagnostics, TileProgress, TilingConfig, TilingError,
};
use serde::{Deserialize, Serialize};

use crate::detailer::DetailerKind;
use crate::error::{PipelineError, PipelineResult};
use crate::raster;
use crate::stage::{self, StageId, StagePaths};
use crate::upscaler::{PixelUpscaler, UpscalerKind};

/// Everything a run needs, serializable for `--config-json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscaleConfig {
    /// Tile geometry.
    pub tiling: TilingConfig,
    /// Parameters forwarded to the detailer.
    pub detail: DetailParams,
    /// Number of upscale-and-detail passes.
    pub passes: u32,
    /// Pixel upscaler.
    pub upscaler: UpscalerKind,
    /// Tile detailer.
    pub detailer: DetailerKind,
    /// Skip passes whose detailed output already exists.
    pub resume: bool,
}

impl UpscaleConfig {
    /// Default number of passes.
    pub const DEFAULT_PASSES: u32 = 1;

    /// Validate every part of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::InvalidGeometry`] or
    /// [`TilingError::InvalidConfig`] (wrapped) for the first problem.
    pub fn validate(&self) -> PipelineResult<()> {
        self.tiling.validate()?;
        self.detail.validate()?;
        if self.passes == 0 {
            return Err(TilingError::InvalidConfig("passes must be at least 1".to_owned()).into());
        }
        Ok(())
    }
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self {
            tiling: TilingConfig::default(),
            detail: DetailParams::default(),
            passes: Self::DEFAULT_PASSES,
            upscaler: UpscalerKind::default(),
            detailer: DetailerKind::default(),
            resume: false,
        }
    }
}

/// Wall-clock [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Progress notifications emitted while a run advances.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A pass is starting on `base`.
    PassStarted {
        /// One-based pass number.
        pass: u32,
        /// Total passes in the run.
        total: u32,
        /// Base name the pass reads.
        base: String,
    },
    /// A stage wrote its output file.
    StageWritten {
        /// One-based pass number (0 for the source import).
        pass: u32,
        /// Stage that wrote the file.
        stage: StageId,
        /// The file written.
        path: PathBuf,
    },
    /// One tile finished detailing.
    TileDetailed {
        /// One-based pass number.
        pass: u32,
        /// Tile progress within the pass.
        progress: TileProgress,
    },
    /// A pass was skipped because its output already exists.
    PassSkipped {
        /// One-based pass number.
        pass: u32,
        /// The existing output.
        path: PathBuf,
    },
}

/// Outcome of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// One-based pass number.
    pub pass: u32,
    /// Base name the pass read.
    pub base: String,
    /// File the pass produced (or found, when skipped).
    pub output: PathBuf,
    /// Whether the pass was skipped on resume.
    pub skipped: bool,
    /// Timing and counts; absent for skipped passes.
    pub diagnostics: Option<PassDiagnostics>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// One entry per pass, in order.
    pub passes: Vec<PassReport>,
    /// Final detailed image.
    pub output: PathBuf,
}

/// Drives passes over images in a samples directory.
pub struct UpscalePipeline<C: Clock = StdClock> {
    config: UpscaleConfig,
    samples_dir: PathBuf,
    upscaler: Box<dyn PixelUpscaler>,
    detailer: Box<dyn Detailer>,
    clock: C,
}

impl<C: Clock> UpscalePipeline<C> {
    /// Name of the scratch directory used by command detailers.
    pub const WORK_DIR: &str = ".tiles";

    /// Build a pipeline from `config`, reading and writing stage files in
    /// `samples_dir`.
    ///
    /// # Errors
    ///
    /// Returns a wrapped [`TilingError`] if the configuration is invalid.
    /// Nothing is touched on disk.
    pub fn new(config: UpscaleConfig, samples_dir: impl Into<PathBuf>, clock: C) -> PipelineResult<Self> {
        config.validate()?;
        let samples_dir = samples_dir.into();
        let upscaler = config.upscaler.build();
        let detailer = config.detailer.build(&samples_dir.join(Self::WORK_DIR));
        Ok(Self {
            config,
            samples_dir,
            upscaler,
            detailer,
            clock,
        })
    }

    /// Replace the upscaler built from configuration.
    #[must_use]
    pub fn with_upscaler(mut self, upscaler: Box<dyn PixelUpscaler>) -> Self {
        self.upscaler = upscaler;
        self
    }

    /// Replace the detailer built from configuration.
    #[must_use]
    pub fn with_detailer(mut self, detailer: Box<dyn Detailer>) -> Self {
        self.detailer = detailer;
        self
    }

    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &UpscaleConfig {
        &self.config
    }

    /// Directory holding every stage file.
    #[must_use]
    pub fn samples_dir(&self) -> &Path {
        &self.samples_dir
    }

    /// Store `image` as a PNG in the samples directory under the next
    /// free five-digit name and return that base name.
    ///
    /// Any format the decoder recognises is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the directory cannot be created or
    /// listed or a file cannot be read or written, and
    /// [`PipelineError::Image`] if `image` cannot be decoded.
    pub fn import(
        &self,
        image: &Path,
        mut on_event: impl FnMut(&PipelineEvent),
    ) -> PipelineResult<String> {
        std::fs::create_dir_all(&self.samples_dir)
            .map_err(|source| PipelineError::io(StageId::Source, &self.samples_dir, source))?;
        let base = stage::next_base_name(&self.samples_dir)?;
        let paths = StagePaths::new(&self.samples_dir, &base);
        let source = raster::load_rgb(image, StageId::Source)?;
        raster::save_png(&source, &paths.source(), StageId::Source)?;
        tracing::info!(from = %image.display(), to = %paths.source().display(), "imported source image");
        on_event(&PipelineEvent::StageWritten {
            pass: 0,
            stage: StageId::Source,
            path: paths.source(),
        });
        Ok(base)
    }

    /// Run every configured pass starting from `{base}.png`.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Passes that completed before it keep
    /// their output files.
    pub fn run(
        &mut self,
        base: &str,
        mut on_event: impl FnMut(&PipelineEvent),
    ) -> PipelineResult<RunReport> {
        let total = self.config.passes;
        let mut paths = StagePaths::new(&self.samples_dir, base);
        let mut passes = Vec::with_capacity(total as usize);

        for pass in 1..=total {
            let report = self.run_pass(pass, &paths, &mut on_event)?;
            passes.push(report);
            paths = paths.next_pass();
        }

        let output = passes
            .last()
            .map_or_else(|| paths.source(), |report| report.output.clone());
        Ok(RunReport { passes, output })
    }

    fn run_pass(
        &mut self,
        pass: u32,
        paths: &StagePaths,
        on_event: &mut impl FnMut(&PipelineEvent),
    ) -> PipelineResult<PassReport> {
        let total = self.config.passes;
        let span = tracing::info_span!("pass", pass, total, base = paths.base());
        let _enter = span.enter();

        let detailed_path = paths.detailed();
        if self.config.resume && detailed_path.exists() {
            tracing::info!(path = %detailed_path.display(), "output exists, skipping pass");
            on_event(&PipelineEvent::PassSkipped {
                pass,
                path: detailed_path.clone(),
            });
            return Ok(PassReport {
                pass,
                base: paths.base().to_owned(),
                output: detailed_path,
                skipped: true,
                diagnostics: None,
            });
        }

        on_event(&PipelineEvent::PassStarted {
            pass,
            total,
            base: paths.base().to_owned(),
        });

        let source = paths.source();
        if !source.exists() {
            return Err(PipelineError::io(
                StageId::Source,
                &source,
                std::io::Error::new(std::io::ErrorKind::NotFound, "source image not found"),
            ));
        }

        let upscaled_path = paths.upscaled();
        tracing::info!(upscaler = self.upscaler.name(), "upscaling");
        let canvas = self.upscaler.upscale(&source, &upscaled_path)?;
        tracing::info!(width = canvas.width(), height = canvas.height(), "upscaled");
        on_event(&PipelineEvent::StageWritten {
            pass,
            stage: StageId::Upscale,
            path: upscaled_path,
        });

        let (output, diagnostics) = run_pass_with_diagnostics(
            canvas,
            self.config.tiling.clone(),
            &mut *self.detailer,
            &self.config.detail,
            |progress| {
                tracing::debug!(
                    tile = progress.index,
                    total = progress.total,
                    position = %progress.position,
                    "tile detailed"
                );
                on_event(&PipelineEvent::TileDetailed { pass, progress });
            },
            &self.clock,
        )?;
        tracing::info!(
            tiles = output.plan.len(),
            elapsed_ms = diagnostics.total_duration.as_secs_f64() * 1000.0,
            "pass composited"
        );

        raster::save_png(&output.image, &detailed_path, StageId::Save)?;
        on_event(&PipelineEvent::StageWritten {
            pass,
            stage: StageId::Save,
            path: detailed_path.clone(),
        });

        Ok(PassReport {
            pass,
            base: paths.base().to_owned(),
            output: detailed_path,
            skipped: false,
            diagnostics: Some(diagnostics),
        })
    }
}
