//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image::ImageReader` with content sniffing |
//! | Drop alpha | `DynamicImage::to_rgb8` |
//! | Resize overlay | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Rounded mask | [`inside_rounded_rect`] rendered into a `GrayImage` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//!
//! Encoding goes to an in-memory buffer first; the output file is only
//! created once the encoder has succeeded.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{inside_rounded_rect, overlay_dimensions};
use super::params::{ComposeParams, ConvertParams, OverlayLayout};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, ImageReader, Luma, RgbImage};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk, sniffing the format from content.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(|e| BackendError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| BackendError::io(path, e))?
        .decode()
        .map_err(|e| BackendError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Encode RGB pixels as a JPEG and write them to `path`.
fn save_jpeg(img: &RgbImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100) as u8)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    std::fs::write(path, buf).map_err(|e| BackendError::io(path, e))
}

/// Opacity mask for a rounded rectangle: 255 inside, 0 outside.
pub fn rounded_mask(width: u32, height: u32, radius: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        if inside_rounded_rect(x, y, width, height, radius) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Blend `overlay` onto `base` at `offset`, weighting each pixel by `mask`.
///
/// Pixels falling outside `base` are clipped.
pub fn paste_masked(base: &mut RgbImage, overlay: &RgbImage, mask: &GrayImage, offset: (u32, u32)) {
    for (x, y, src) in overlay.enumerate_pixels() {
        let (Some(bx), Some(by)) = (offset.0.checked_add(x), offset.1.checked_add(y)) else {
            continue;
        };
        if bx >= base.width() || by >= base.height() {
            continue;
        }
        let alpha = u16::from(mask.get_pixel(x, y)[0]);
        if alpha == 0 {
            continue;
        }
        let dst = base.get_pixel_mut(bx, by);
        for c in 0..3 {
            let blended =
                (u16::from(src[c]) * alpha + u16::from(dst[c]) * (255 - alpha) + 127) / 255;
            dst[c] = blended as u8;
        }
    }
}

/// Build the picture-in-picture composite in memory.
pub fn compose_images(
    primary: &DynamicImage,
    secondary: &DynamicImage,
    layout: &OverlayLayout,
) -> Result<RgbImage, BackendError> {
    let mut base = primary.to_rgb8();
    let (w, h) = overlay_dimensions((base.width(), base.height()), layout.scale);
    if w == 0 || h == 0 {
        return Err(BackendError::ProcessingFailed(format!(
            "overlay for a {}x{} primary would be empty",
            base.width(),
            base.height()
        )));
    }

    let overlay = secondary.resize_exact(w, h, FilterType::Lanczos3).to_rgb8();
    let mask = rounded_mask(w, h, layout.corner_radius);
    paste_masked(&mut base, &overlay, &mask, layout.offset);
    Ok(base)
}

impl ImageBackend for RustBackend {
    fn convert_to_jpeg(&self, params: &ConvertParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        save_jpeg(&img.to_rgb8(), &params.output, params.quality.value())
    }

    fn compose(&self, params: &ComposeParams) -> Result<(), BackendError> {
        let primary = load_image(&params.primary)?;
        let secondary = load_image(&params.secondary)?;
        let composite = compose_images(&primary, &secondary, &params.layout)?;
        save_jpeg(&composite, &params.output, params.quality.value())
    }
}
