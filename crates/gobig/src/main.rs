//! gobig: tiled super-resolution from the command line.
//!
//! Upscales an image 2x per pass, re-renders it tile by tile through a
//! detailer, and recomposes the tiles with feathered seams.
//!
//! # Usage
//!
//! ```text
//! gobig detail --img photo.png --prompt "a castle at dusk" --passes 2
//! gobig detail --generated 00003 --detailer-command ./sd-img2img
//! gobig plan --width 1024 --height 1024 --json
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::error::Error;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gobig_io::{
    DetailerKind, PipelineEvent, StdClock, UpscaleConfig, UpscalePipeline, UpscalerKind, raster,
};
use gobig_tiling::{DetailParams, ResampleFilter, Size, TilePlan, TilingConfig};
use tracing_subscriber::EnvFilter;

/// Tiled super-resolution: upscale, re-detail tiles, and recompose.
#[derive(Parser)]
#[command(name = "gobig", version)]
struct Cli {
    /// Log more (repeat for trace output). Overridden by `RUST_LOG`.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
#[allow(clippy::large_enum_variant)]
enum Command {
    /// Upscale and detail images, one or more passes each.
    Detail(DetailArgs),
    /// Print the tile plan for a canvas size without touching any image.
    Plan(PlanArgs),
}

#[derive(Args)]
#[allow(clippy::struct_excessive_bools)]
struct DetailArgs {
    /// Copy this image into the samples directory and detail it.
    #[arg(long, conflicts_with = "generated")]
    img: Option<PathBuf>,

    /// Detail these base names already in the samples directory.
    #[arg(long, num_args = 1..)]
    generated: Vec<String>,

    /// Directory to write results to (stage files go in `samples/`).
    #[arg(long, default_value = "outputs/gobig-samples")]
    outdir: PathBuf,

    /// Prompt describing the image.
    #[arg(long, default_value = "")]
    prompt: String,

    /// Negative prompt.
    #[arg(long)]
    negative_prompt: Option<String>,

    /// Noising strength per tile (0.0 keeps the tile, 1.0 discards it).
    #[arg(long, default_value_t = DetailParams::DEFAULT_STRENGTH)]
    strength: f32,

    /// Sampling steps when detailing.
    #[arg(long, default_value_t = DetailParams::DEFAULT_STEPS)]
    detail_steps: u32,

    /// Guidance scale when detailing.
    #[arg(long, default_value_t = DetailParams::DEFAULT_GUIDANCE_SCALE)]
    detail_scale: f32,

    /// Sampler seed.
    #[arg(long, default_value_t = DetailParams::DEFAULT_SEED)]
    seed: u64,

    /// Ask the detailer for seamless (circular) tiling.
    #[arg(long)]
    seamless: bool,

    /// Number of upscale-and-detail passes.
    #[arg(long, default_value_t = UpscaleConfig::DEFAULT_PASSES, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    passes: u32,

    /// Tile width in pixels.
    #[arg(long, default_value_t = TilingConfig::DEFAULT_TILE_WIDTH)]
    tile_width: u32,

    /// Tile height in pixels.
    #[arg(long, default_value_t = TilingConfig::DEFAULT_TILE_HEIGHT)]
    tile_height: u32,

    /// Pixels shared between neighbouring tiles.
    #[arg(long, default_value_t = TilingConfig::DEFAULT_OVERLAP)]
    overlap: u32,

    /// Resize the canvas to the plan's adjusted size before cropping.
    #[arg(long)]
    maximize: bool,

    /// Real-ESRGAN executable used for the pixel upscale.
    #[arg(long, default_value = UpscalerKind::DEFAULT_EXECUTABLE)]
    realesrgan: PathBuf,

    /// Upscale in process with this filter instead of Real-ESRGAN.
    #[arg(long, value_enum)]
    resample_upscale: Option<Filter>,

    /// Executable run once per tile. Without it tiles pass through
    /// unchanged.
    #[arg(long)]
    detailer_command: Option<PathBuf>,

    /// Extra argument for the detailer command (repeatable).
    #[arg(long = "detailer-arg", allow_hyphen_values = true)]
    detailer_args: Vec<String>,

    /// Mirror every stage output to this file as it is written.
    #[arg(long)]
    progress_file: Option<PathBuf>,

    /// Skip passes whose detailed output already exists.
    #[arg(long)]
    resume: bool,

    /// Print pass diagnostics as JSON instead of a report.
    #[arg(long)]
    json: bool,

    /// Full run config as a JSON string.
    ///
    /// When provided, all detail and tiling flags are ignored. The JSON
    /// must be a valid `UpscaleConfig` serialization; missing fields take
    /// their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct PlanArgs {
    /// Canvas width in pixels.
    #[arg(long)]
    width: u32,

    /// Canvas height in pixels.
    #[arg(long)]
    height: u32,

    /// Tile width in pixels.
    #[arg(long, default_value_t = TilingConfig::DEFAULT_TILE_WIDTH)]
    tile_width: u32,

    /// Tile height in pixels.
    #[arg(long, default_value_t = TilingConfig::DEFAULT_TILE_HEIGHT)]
    tile_height: u32,

    /// Pixels shared between neighbouring tiles.
    #[arg(long, default_value_t = TilingConfig::DEFAULT_OVERLAP)]
    overlap: u32,

    /// Print the plan as JSON.
    #[arg(long)]
    json: bool,
}

/// Resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

impl From<Filter> for ResampleFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// Build an [`UpscaleConfig`] from CLI arguments.
///
/// `--config-json` wins over every individual flag.
fn config_from_cli(args: &DetailArgs) -> Result<UpscaleConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let upscaler = args.resample_upscale.map_or_else(
        || UpscalerKind::Realesrgan {
            executable: args.realesrgan.clone(),
            model: UpscalerKind::DEFAULT_MODEL.to_owned(),
        },
        |filter| UpscalerKind::Resample {
            filter: filter.into(),
        },
    );
    let detailer = args
        .detailer_command
        .as_ref()
        .map_or(DetailerKind::Passthrough, |program| DetailerKind::Command {
            program: program.clone(),
            args: args.detailer_args.clone(),
        });

    Ok(UpscaleConfig {
        tiling: TilingConfig {
            tile_width: args.tile_width,
            tile_height: args.tile_height,
            overlap: args.overlap,
            maximize: args.maximize,
            ..TilingConfig::default()
        },
        detail: DetailParams {
            prompt: args.prompt.clone(),
            negative_prompt: args.negative_prompt.clone(),
            strength: args.strength,
            guidance_scale: args.detail_scale,
            steps: args.detail_steps,
            seed: args.seed,
            seamless: args.seamless,
        },
        passes: args.passes,
        upscaler,
        detailer,
        resume: args.resume,
    })
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.cmd {
        Command::Detail(args) => detail(&args),
        Command::Plan(args) => plan(&args),
    }
}

fn detail(args: &DetailArgs) -> ExitCode {
    let config = match config_from_cli(args) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let samples = args.outdir.join("samples");
    let mut pipeline = match UpscalePipeline::new(config, &samples, StdClock) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", error_chain(&e));
            return ExitCode::FAILURE;
        }
    };

    let progress_file = args.progress_file.as_deref();
    let mut on_event = |event: &PipelineEvent| mirror_progress(event, progress_file);

    let bases = if let Some(ref img) = args.img {
        match pipeline.import(img, &mut on_event) {
            Ok(base) => vec![base],
            Err(e) => {
                eprintln!("Error: {}", error_chain(&e));
                return ExitCode::FAILURE;
            }
        }
    } else {
        args.generated.clone()
    };
    if bases.is_empty() {
        eprintln!("Nothing to do: pass --img or --generated");
        return ExitCode::FAILURE;
    }

    for base in &bases {
        let report = match pipeline.run(base, &mut on_event) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Error: {}", error_chain(&e));
                return ExitCode::FAILURE;
            }
        };

        if args.json {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            for pass in &report.passes {
                match &pass.diagnostics {
                    Some(diag) => println!("Pass {} ({})\n{}\n", pass.pass, pass.base, diag.report()),
                    None => println!("Pass {} ({}) skipped: output exists\n", pass.pass, pass.base),
                }
            }
            println!("Output: {}", report.output.display());
        }
    }

    ExitCode::SUCCESS
}

/// Copy each stage file to the progress file, if one was requested.
fn mirror_progress(event: &PipelineEvent, progress_file: Option<&Path>) {
    let (PipelineEvent::StageWritten { stage, path, .. }, Some(target)) = (event, progress_file)
    else {
        return;
    };
    match raster::copy_file(path, target, *stage) {
        Ok(()) => tracing::debug!(from = %path.display(), to = %target.display(), "progress saved"),
        Err(e) => tracing::warn!(error = %e, "could not update progress file"),
    }
}

fn plan(args: &PlanArgs) -> ExitCode {
    let canvas = Size::new(args.width, args.height);
    let tile = Size::new(args.tile_width, args.tile_height);
    let plan = match gobig_tiling::plan::plan(canvas, tile, args.overlap) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", error_chain(&e));
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&plan) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing plan: {e}");
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    print!("{}", render_plan(&plan));
    ExitCode::SUCCESS
}

/// Human-readable plan table, one row per tile in draw order.
fn render_plan(plan: &TilePlan) -> String {
    let mut out = format!(
        "Canvas {}, tile {}, overlap {}px: {} tiles\n",
        plan.canvas_size(),
        plan.tile_size(),
        plan.overlap(),
        plan.len()
    );
    let _ = writeln!(out, "Adjusted canvas: {}\n", plan.adjusted_canvas());
    let _ = writeln!(out, "{:>5}  {:>12}", "Draw", "Position");
    for (i, position) in plan.positions().iter().enumerate() {
        let marker = if *position == plan.center() { "  center" } else { "" };
        let _ = writeln!(out, "{i:>5}  {:>12}{marker}", position.to_string());
    }
    out
}

/// `err` followed by each cause not already shown in the line above it.
fn error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut shown = out.clone();
    let mut cause = err.source();
    while let Some(e) = cause {
        let text = e.to_string();
        if !shown.ends_with(&text) {
            let _ = write!(out, "\n  caused by: {text}");
        }
        shown = text;
        cause = e.source();
    }
    out
}
