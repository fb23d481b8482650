//! Detailers that live outside the process.
//!
//! [`CommandDetailer`] hands each tile to an executable as a PNG file and
//! reads the re-rendered PNG back. The executable receives every
//! [`DetailParams`] field as a flag:
//!
//! ```text
//! <program> [args..] --input <tile.png> --output <out.png>
//!     --prompt <text> [--negative-prompt <text>] --strength <f>
//!     --guidance-scale <f> --steps <n> --seed <n> [--seamless]
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use gobig_tiling::{DetailError, DetailParams, Detailer, PassthroughDetailer, RgbImage, Tile};
use serde::{Deserialize, Serialize};

use crate::raster;
use crate::stage::StageId;

/// Which detailer to build from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DetailerKind {
    /// Return every tile unchanged.
    #[default]
    Passthrough,
    /// Run an executable once per tile.
    Command {
        /// Executable path or name on `PATH`.
        program: PathBuf,
        /// Extra arguments placed before the generated flags.
        #[serde(default)]
        args: Vec<String>,
    },
}

impl DetailerKind {
    /// Build the configured detailer. Tile files go under `work_dir`.
    #[must_use]
    pub fn build(&self, work_dir: &Path) -> Box<dyn Detailer> {
        match self {
            Self::Passthrough => Box::new(PassthroughDetailer),
            Self::Command { program, args } => Box::new(
                CommandDetailer::new(program.clone(), work_dir).with_args(args.iter().cloned()),
            ),
        }
    }
}

/// Runs an external program once per tile.
#[derive(Debug, Clone)]
pub struct CommandDetailer {
    program: PathBuf,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl CommandDetailer {
    /// Detailer that runs `program`, exchanging tiles through `work_dir`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
        }
    }

    /// Extra arguments placed before the generated flags.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    fn tile_paths(&self, tile: &Tile) -> (PathBuf, PathBuf) {
        (
            self.work_dir.join(format!("tile-{:03}.png", tile.index)),
            self.work_dir.join(format!("tile-{:03}-detailed.png", tile.index)),
        )
    }

    fn command(&self, input: &Path, output: &Path, params: &DetailParams) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--input")
            .arg(input)
            .arg("--output")
            .arg(output)
            .arg("--prompt")
            .arg(&params.prompt);
        if let Some(negative) = &params.negative_prompt {
            cmd.arg("--negative-prompt").arg(negative);
        }
        cmd.arg("--strength")
            .arg(params.strength.to_string())
            .arg("--guidance-scale")
            .arg(params.guidance_scale.to_string())
            .arg("--steps")
            .arg(params.steps.to_string())
            .arg("--seed")
            .arg(params.seed.to_string());
        if params.seamless {
            cmd.arg("--seamless");
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Detailer for CommandDetailer {
    fn detail(&mut self, tile: &Tile, params: &DetailParams) -> Result<RgbImage, DetailError> {
        let (input, output) = self.tile_paths(tile);
        raster::save_png(&tile.image, &input, StageId::Detail).map_err(|e| {
            DetailError::with_source(format!("cannot write tile {}", input.display()), e)
        })?;
        // A stale output from an earlier run must not be mistaken for this one.
        if output.exists() {
            std::fs::remove_file(&output).map_err(|e| {
                DetailError::with_source(
                    format!("cannot remove stale output {}", output.display()),
                    e,
                )
            })?;
        }

        let mut cmd = self.command(&input, &output, params);
        tracing::debug!(tile = tile.index, command = ?cmd, "running detailer");
        let result = cmd.output().map_err(|e| {
            DetailError::with_source(format!("failed to spawn {}", self.program.display()), e)
        })?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(DetailError::new(format!(
                "{} exited with {}: {}",
                self.program.display(),
                result.status,
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(DetailError::new(format!(
                "{} exited successfully but wrote no {}",
                self.program.display(),
                output.display()
            )));
        }
        raster::load_rgb(&output, StageId::Detail).map_err(|e| {
            DetailError::with_source(
                format!("cannot read detailer output {}", output.display()),
                e,
            )
        })
    }
}
