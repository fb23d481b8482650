//! End-to-end runs against the filesystem using the in-process upscaler.
//!
//! Output lands in the workspace `target/` directory.

#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use gobig_io::{
    PipelineError, PipelineEvent, ResampleUpscaler, StageId, StdClock, UpscaleConfig,
    UpscalePipeline, UpscalerKind, raster,
};
use gobig_tiling::{
    DetailError, DetailParams, ErrorKind, ResampleFilter, RgbImage, Size, Tile, TilingConfig,
};

fn scratch(name: &str) -> PathBuf {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../target/gobig-io-tests/integration")
        .join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn config(passes: u32) -> UpscaleConfig {
    UpscaleConfig {
        tiling: TilingConfig {
            tile_width: 64,
            tile_height: 64,
            overlap: 16,
            ..TilingConfig::default()
        },
        passes,
        upscaler: UpscalerKind::Resample {
            filter: ResampleFilter::Triangle,
        },
        ..UpscaleConfig::default()
    }
}

fn source_image() -> RgbImage {
    RgbImage::from_fn(48, 40, |x, y| image::Rgb([(x * 5) as u8, (y * 6) as u8, 80]))
}

#[test]
fn two_passes_chain_names_and_quadruple_size() {
    let dir = scratch("two-pass");
    let input = dir.join("input.png");
    raster::save_png(&source_image(), &input, StageId::Source).unwrap();
    let samples = dir.join("samples");

    let mut pipeline = UpscalePipeline::new(config(2), &samples, StdClock).unwrap();
    let mut events = Vec::new();
    let base = pipeline.import(&input, |e| events.push(e.clone())).unwrap();
    assert_eq!(base, "00000");

    let report = pipeline.run(&base, |e| events.push(e.clone())).unwrap();

    assert_eq!(report.passes.len(), 2);
    assert_eq!(report.output, samples.join("00000udud.png"));
    for name in ["00000.png", "00000u.png", "00000ud.png", "00000udu.png", "00000udud.png"] {
        assert!(samples.join(name).exists(), "missing {name}");
    }

    let first = raster::load_rgb(&samples.join("00000ud.png"), StageId::Source).unwrap();
    let second = raster::load_rgb(&report.output, StageId::Source).unwrap();
    assert_eq!(Size::of(&first), Size::new(96, 80));
    assert_eq!(Size::of(&second), Size::new(192, 160));

    let written: Vec<StageId> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StageWritten { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        written,
        [
            StageId::Source,
            StageId::Upscale,
            StageId::Save,
            StageId::Upscale,
            StageId::Save
        ]
    );
    let tiles = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::TileDetailed { .. }))
        .count();
    let planned: usize = report
        .passes
        .iter()
        .filter_map(|p| p.diagnostics.as_ref())
        .map(|d| d.tile_durations.len())
        .sum();
    assert_eq!(tiles, planned);
}

#[test]
fn imported_jpeg_is_stored_as_png() {
    let dir = scratch("jpeg-import");
    let input = dir.join("photo.jpg");
    source_image()
        .save_with_format(&input, image::ImageFormat::Jpeg)
        .unwrap();
    let samples = dir.join("samples");

    let mut pipeline = UpscalePipeline::new(config(1), &samples, StdClock).unwrap();
    let base = pipeline.import(&input, |_| {}).unwrap();
    let stored = std::fs::read(samples.join(format!("{base}.png"))).unwrap();
    assert!(stored.starts_with(b"\x89PNG"));

    let report = pipeline.run(&base, |_| {}).unwrap();
    let output = raster::load_rgb(&report.output, StageId::Source).unwrap();
    assert_eq!(Size::of(&output), Size::new(96, 80));
}

#[test]
fn passthrough_pass_equals_upscaled_canvas() {
    let dir = scratch("passthrough");
    let samples = dir.join("samples");
    raster::save_png(&source_image(), &samples.join("base.png"), StageId::Source).unwrap();

    let mut pipeline = UpscalePipeline::new(config(1), &samples, StdClock).unwrap();
    pipeline.run("base", |_| {}).unwrap();

    let upscaled = raster::load_rgb(&samples.join("baseu.png"), StageId::Source).unwrap();
    let detailed = raster::load_rgb(&samples.join("baseud.png"), StageId::Source).unwrap();
    assert_eq!(upscaled, detailed);
}

#[test]
fn resume_skips_finished_pass() {
    let dir = scratch("resume");
    let samples = dir.join("samples");
    raster::save_png(&source_image(), &samples.join("00000.png"), StageId::Source).unwrap();

    let mut pipeline = UpscalePipeline::new(config(1), &samples, StdClock).unwrap();
    pipeline.run("00000", |_| {}).unwrap();

    let resumed = UpscaleConfig {
        passes: 2,
        resume: true,
        ..config(2)
    };
    let mut pipeline = UpscalePipeline::new(resumed, &samples, StdClock).unwrap();
    let mut skipped = 0;
    let report = pipeline
        .run("00000", |e| {
            if matches!(e, PipelineEvent::PassSkipped { pass: 1, .. }) {
                skipped += 1;
            }
        })
        .unwrap();
    assert_eq!(skipped, 1);
    assert!(report.passes[0].skipped);
    assert!(report.passes[0].diagnostics.is_none());
    assert!(!report.passes[1].skipped);
    assert!(samples.join("00000udud.png").exists());
}

#[test]
fn detailer_failure_keeps_earlier_files_and_writes_no_output() {
    let dir = scratch("detail-failure");
    let samples = dir.join("samples");
    raster::save_png(&source_image(), &samples.join("00000.png"), StageId::Source).unwrap();

    let failing = |tile: &Tile, _: &DetailParams| -> Result<RgbImage, DetailError> {
        if tile.index == 1 {
            Err(DetailError::new("sampler crashed"))
        } else {
            Ok(tile.image.clone())
        }
    };
    let mut pipeline = UpscalePipeline::new(config(1), &samples, StdClock)
        .unwrap()
        .with_detailer(Box::new(failing));
    let err = pipeline.run("00000", |_| {}).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExternalDetailFailure);
    assert!(err.to_string().contains("sampler crashed"), "{err}");
    assert!(samples.join("00000u.png").exists());
    assert!(!samples.join("00000ud.png").exists());
}

#[test]
fn missing_source_is_io_failure_naming_path() {
    let dir = scratch("missing-source");
    let mut pipeline = UpscalePipeline::new(config(1), dir.join("samples"), StdClock)
        .unwrap()
        .with_upscaler(Box::new(ResampleUpscaler::default()));
    let err = pipeline.run("00042", |_| {}).unwrap_err();
    assert!(matches!(err, PipelineError::Io { stage: StageId::Source, .. }));
    assert!(err.to_string().contains("00042.png"), "{err}");
}
