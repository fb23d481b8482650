//! gobig-io: filesystem, subprocess, and multi-pass orchestration.
//!
//! Wraps the sans-IO core in `gobig-tiling` with everything that touches
//! the outside world: PNG files in a samples directory, the external
//! pixel upscaler, command-line detailers, and the pass loop that chains
//! them.

pub mod detailer;
pub mod error;
pub mod raster;
pub mod run;
pub mod stage;
pub mod upscaler;

pub use detailer::{CommandDetailer, DetailerKind};
pub use error::{PipelineError, PipelineResult};
pub use run::{PassReport, PipelineEvent, RunReport, StdClock, UpscaleConfig, UpscalePipeline};
pub use stage::{StageId, StagePaths};
pub use upscaler::{PixelUpscaler, ProcessUpscaler, ResampleUpscaler, UpscalerKind};
