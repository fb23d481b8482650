//! Errors raised while running passes against the filesystem and
//! external tools.

use std::path::{Path, PathBuf};

use gobig_tiling::{ErrorKind, TilingError};

use crate::stage::StageId;

/// Result alias for orchestration code.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur during a multi-pass run.
///
/// Every variant that touches a file names the stage and the path.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Geometry, parameter, or detailer failure from the tiling core.
    #[error(transparent)]
    Tiling(#[from] TilingError),

    /// An external executable could not be run, failed, or produced no
    /// output.
    #[error("{stage}: {tool} failed for {}: {message}", path.display())]
    ExternalTool {
        /// Stage that invoked the tool.
        stage: StageId,
        /// Executable name or path.
        tool: String,
        /// Output file the tool was expected to write.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A file or directory could not be read, written, or copied.
    #[error("{stage}: i/o error on {}: {source}", path.display())]
    Io {
        /// Stage that touched the file.
        stage: StageId,
        /// File or directory involved.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// A raster could not be decoded or encoded.
    #[error("{stage}: image error on {}: {source}", path.display())]
    Image {
        /// Stage that touched the raster.
        stage: StageId,
        /// File involved.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: image::ImageError,
    },
}

impl PipelineError {
    /// An I/O failure on `path` during `stage`.
    pub fn io(stage: StageId, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            stage,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// A codec failure on `path` during `stage`.
    ///
    /// I/O errors wrapped by the codec are surfaced as [`Self::Io`].
    pub fn image(stage: StageId, path: impl AsRef<Path>, source: image::ImageError) -> Self {
        match source {
            image::ImageError::IoError(source) => Self::io(stage, path, source),
            source => Self::Image {
                stage,
                path: path.as_ref().to_path_buf(),
                source,
            },
        }
    }

    /// An external tool failure during `stage`.
    pub fn external_tool(
        stage: StageId,
        tool: impl Into<String>,
        path: impl AsRef<Path>,
        message: impl Into<String>,
    ) -> Self {
        Self::ExternalTool {
            stage,
            tool: tool.into(),
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// The broad category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Tiling(err) => err.kind(),
            Self::ExternalTool { .. } => ErrorKind::ExternalToolFailure,
            Self::Io { .. } | Self::Image { .. } => ErrorKind::IoFailure,
        }
    }
}
