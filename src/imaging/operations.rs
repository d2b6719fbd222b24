//! High-level image operations.
//!
//! These functions decide paths and parameters, then hand the pixel work to
//! the backend.

use super::backend::{BackendError, ImageBackend};
use super::params::{ComposeParams, ConvertParams, OverlayLayout, Quality};
use crate::files::unique_path;
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Re-encode `source` as a JPEG next to it (`shot.webp` → `shot.jpg`,
/// `shot_1.jpg` if that name is taken) and return the new path.
pub fn convert_to_jpeg(
    backend: &impl ImageBackend,
    source: &Path,
    quality: Quality,
) -> Result<PathBuf> {
    let output = unique_path(&source.with_extension("jpg"));
    backend.convert_to_jpeg(&ConvertParams {
        source: source.to_path_buf(),
        output: output.clone(),
        quality,
    })?;
    Ok(output)
}

/// Plan a composite without executing it.
pub fn plan_compose(
    primary: &Path,
    secondary: &Path,
    output: &Path,
    layout: OverlayLayout,
    quality: Quality,
) -> ComposeParams {
    ComposeParams {
        primary: primary.to_path_buf(),
        secondary: secondary.to_path_buf(),
        output: output.to_path_buf(),
        layout,
        quality,
    }
}

/// Composite `secondary` onto `primary` and save to `output`.
pub fn compose(
    backend: &impl ImageBackend,
    primary: &Path,
    secondary: &Path,
    output: &Path,
    layout: OverlayLayout,
    quality: Quality,
) -> Result<()> {
    backend.compose(&plan_compose(primary, secondary, output, layout, quality))
}
