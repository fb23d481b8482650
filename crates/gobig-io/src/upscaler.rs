//! Pixel upscalers: produce a 2x canvas from a pass's source file.
//!
//! The default is the `realesrgan-ncnn-vulkan` executable, which upscales
//! 4x; its output is then halved with Lanczos3 for a net 2x. A pure
//! in-process resampler is available where the executable is not.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use gobig_tiling::{ResampleFilter, RgbImage, resample};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::raster;
use crate::stage::StageId;

/// Writes a 2x upscale of `input` to `output` and returns it.
pub trait PixelUpscaler {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Upscale `input` into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ExternalTool`] if the upscaler fails or
    /// writes nothing, and I/O or codec errors for the files involved.
    fn upscale(&mut self, input: &Path, output: &Path) -> PipelineResult<RgbImage>;
}

/// Which upscaler to build from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum UpscalerKind {
    /// Run an external Real-ESRGAN executable.
    Realesrgan {
        /// Executable path or name on `PATH`.
        executable: PathBuf,
        /// Model name passed with `-n`.
        model: String,
    },
    /// Resize in process with a resampling filter.
    Resample {
        /// Filter used for the 2x resize.
        filter: ResampleFilter,
    },
}

impl UpscalerKind {
    /// Default Real-ESRGAN executable name.
    pub const DEFAULT_EXECUTABLE: &str = "realesrgan-ncnn-vulkan";
    /// Default Real-ESRGAN model.
    pub const DEFAULT_MODEL: &str = "realesrgan-x4plus";

    /// Build the configured upscaler.
    #[must_use]
    pub fn build(&self) -> Box<dyn PixelUpscaler> {
        match self {
            Self::Realesrgan { executable, model } => Box::new(ProcessUpscaler {
                executable: executable.clone(),
                model: model.clone(),
                halve_filter: ResampleFilter::Lanczos3,
            }),
            Self::Resample { filter } => Box::new(ResampleUpscaler { filter: *filter }),
        }
    }
}

impl Default for UpscalerKind {
    fn default() -> Self {
        Self::Realesrgan {
            executable: PathBuf::from(Self::DEFAULT_EXECUTABLE),
            model: Self::DEFAULT_MODEL.to_owned(),
        }
    }
}

/// Runs a 4x Real-ESRGAN executable and halves the result.
#[derive(Debug, Clone)]
pub struct ProcessUpscaler {
    executable: PathBuf,
    model: String,
    halve_filter: ResampleFilter,
}

impl ProcessUpscaler {
    /// Upscaler for `executable` with the default model.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            model: UpscalerKind::DEFAULT_MODEL.to_owned(),
            halve_filter: ResampleFilter::Lanczos3,
        }
    }

    /// Use a different model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-n")
            .arg(&self.model)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }

    fn tool(&self) -> String {
        self.executable.display().to_string()
    }
}

impl PixelUpscaler for ProcessUpscaler {
    fn name(&self) -> &str {
        "realesrgan"
    }

    fn upscale(&mut self, input: &Path, output: &Path) -> PipelineResult<RgbImage> {
        raster::ensure_parent_dir(output, StageId::Upscale)?;
        let mut cmd = self.command(input, output);
        tracing::debug!(command = ?cmd, "running pixel upscaler");

        let result = cmd.output().map_err(|e| {
            PipelineError::external_tool(
                StageId::Upscale,
                self.tool(),
                output,
                format!("failed to spawn (is it installed and on PATH?): {e}"),
            )
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PipelineError::external_tool(
                StageId::Upscale,
                self.tool(),
                output,
                format!("exited with {}: {}", result.status, stderr.trim()),
            ));
        }
        if !output.exists() {
            return Err(PipelineError::external_tool(
                StageId::Upscale,
                self.tool(),
                output,
                "exited successfully but wrote no output",
            ));
        }

        let upscaled = raster::load_rgb(output, StageId::Upscale).map_err(|e| {
            PipelineError::external_tool(
                StageId::Upscale,
                self.tool(),
                output,
                format!("wrote an unreadable image: {e}"),
            )
        })?;
        let halved = resample::halve(&upscaled, self.halve_filter);
        raster::save_png(&halved, output, StageId::Upscale)?;
        Ok(halved)
    }
}

/// Doubles the canvas in process with a resampling filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResampleUpscaler {
    /// Filter used for the 2x resize.
    pub filter: ResampleFilter,
}

impl PixelUpscaler for ResampleUpscaler {
    fn name(&self) -> &str {
        "resample"
    }

    fn upscale(&mut self, input: &Path, output: &Path) -> PipelineResult<RgbImage> {
        let source = raster::load_rgb(input, StageId::Upscale)?;
        let doubled = resample::double(&source, self.filter);
        raster::save_png(&doubled, output, StageId::Upscale)?;
        Ok(doubled)
    }
}
