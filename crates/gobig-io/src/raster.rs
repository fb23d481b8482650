//! Reading and writing stage rasters.

use std::path::Path;

use gobig_tiling::RgbImage;
use image::{ImageFormat, ImageReader};

use crate::error::{PipelineError, PipelineResult};
use crate::stage::StageId;

/// Decode any supported raster at `path` as RGB.
///
/// The format is sniffed from the file's contents, not its extension.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the file cannot be read and
/// [`PipelineError::Image`] if it cannot be decoded.
pub fn load_rgb(path: &Path, stage: StageId) -> PipelineResult<RgbImage> {
    let image = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|source| PipelineError::io(stage, path, source))?
        .decode()
        .map_err(|source| PipelineError::image(stage, path, source))?;
    Ok(image.into_rgb8())
}

/// Encode `image` as PNG at `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the directory cannot be created or
/// the file cannot be written, and [`PipelineError::Image`] if encoding
/// fails.
pub fn save_png(image: &RgbImage, path: &Path, stage: StageId) -> PipelineResult<()> {
    ensure_parent_dir(path, stage)?;
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| PipelineError::image(stage, path, source))
}

/// Copy `from` to `to` byte for byte, creating parent directories.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] naming whichever path failed.
pub fn copy_file(from: &Path, to: &Path, stage: StageId) -> PipelineResult<()> {
    ensure_parent_dir(to, stage)?;
    std::fs::copy(from, to).map_err(|source| {
        let path = if from.exists() { to } else { from };
        PipelineError::io(stage, path, source)
    })?;
    Ok(())
}

/// Create the parent directory of `path` if it has one.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path, stage: StageId) -> PipelineResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| PipelineError::io(stage, parent, source))?;
    }
    Ok(())
}
