//! Stage identifiers and on-disk naming for multi-pass runs.
//!
//! Every pass over a base name `B` writes two files next to `B.png`:
//!
//! ```text
//!   B.png    source for this pass
//!   Bu.png   after the pixel upscaler
//!   Bud.png  after tile detailing; the next pass uses `Bud` as its base
//! ```
//!
//! The names are stable, so a restarted run can find finished passes.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::PipelineError;

/// Identifier for one step of a pass, used in events and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StageId {
    /// Placing the input image in the samples directory.
    Source,
    /// External 2x pixel upscale.
    Upscale,
    /// Handing tiles to an external detailer.
    Detail,
    /// Writing the detailed canvas.
    Save,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [Self::Source, Self::Upscale, Self::Detail, Self::Save];

    /// Lowercase label for logs and error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Upscale => "upscale",
            Self::Detail => "detail",
            Self::Save => "save",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// File paths for one pass over a base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePaths {
    dir: PathBuf,
    base: String,
}

impl StagePaths {
    /// Paths for `base` inside `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: base.into(),
        }
    }

    /// The base name without extension.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Directory holding every stage file.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{base}.png`
    #[must_use]
    pub fn source(&self) -> PathBuf {
        self.dir.join(format!("{}.png", self.base))
    }

    /// `{base}u.png`
    #[must_use]
    pub fn upscaled(&self) -> PathBuf {
        self.dir.join(format!("{}u.png", self.base))
    }

    /// `{base}ud.png`
    #[must_use]
    pub fn detailed(&self) -> PathBuf {
        self.dir.join(format!("{}ud.png", self.base))
    }

    /// Paths for the pass that consumes this pass's output.
    #[must_use]
    pub fn next_pass(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            base: format!("{}ud", self.base),
        }
    }
}

/// The next free five-digit base name in `dir`.
///
/// Starts from the number of entries already in the directory and skips
/// forward past any name that is taken.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if `dir` cannot be listed.
pub fn next_base_name(dir: &Path) -> Result<String, PipelineError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|source| PipelineError::io(StageId::Source, dir, source))?
        .count();
    let mut counter = entries;
    loop {
        let name = format!("{counter:05}");
        if !dir.join(format!("{name}.png")).exists() {
            return Ok(name);
        }
        counter += 1;
    }
}
