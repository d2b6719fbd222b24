//! Shared test utilities for the recap test suite.
//!
//! Synthetic images are generated with the `image` encoders so tests never
//! depend on binary fixtures.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let layout = PostLayout::new(tmp.path());
//! create_test_webp(&layout.input.join("front.webp"), 64, 48);
//! write_manifest(&layout.manifest, &[post_json("front.webp", "back.jpg", None)]);
//! ```

use image::{ImageEncoder, RgbImage, RgbaImage};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use crate::config::RecapConfig;

// =========================================================================
// Synthetic images
// =========================================================================

/// A `width`×`height` image filled with one color.
pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, image::Rgb(color))
}

/// Write a gradient JPEG with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a lossless RGBA WebP with a half-transparent right side.
pub fn create_test_webp(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let alpha = if x < width / 2 { 255 } else { 128 };
        image::Rgba([(y % 256) as u8, 90, (x % 256) as u8, alpha])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::webp::WebPEncoder::new_lossless(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
}

// =========================================================================
// Post folders and manifests
// =========================================================================

/// The folder layout of one test run, rooted in a temp directory.
pub struct PostLayout {
    pub input: PathBuf,
    pub output: PathBuf,
    pub combined: PathBuf,
    pub manifest: PathBuf,
}

impl PostLayout {
    /// Create `post/` under `root`; output folders are left to the pipeline.
    pub fn new(root: &Path) -> Self {
        let input = root.join("post");
        std::fs::create_dir_all(&input).unwrap();
        Self {
            output: input.join("__processed"),
            combined: input.join("__combined"),
            manifest: root.join("posts.json"),
            input,
        }
    }

    pub fn config(&self) -> RecapConfig {
        RecapConfig {
            input_folder: self.input.clone(),
            output_folder: self.output.clone(),
            combined_folder: self.combined.clone(),
            manifest_path: self.manifest.clone(),
            ..RecapConfig::default()
        }
    }
}

/// One manifest entry in the export's shape. Paths get a fake remote prefix
/// so tests exercise the file-name re-rooting.
pub fn post_json(primary: &str, secondary: &str, caption: Option<&str>) -> Value {
    json!({
        "primary": { "path": format!("/Photos/export/{primary}") },
        "secondary": { "path": format!("/Photos/export/{secondary}") },
        "takenAt": "2024-07-14T09:30:05.000Z",
        "caption": caption,
    })
}

pub fn write_manifest(path: &Path, entries: &[Value]) {
    std::fs::write(path, serde_json::to_string_pretty(entries).unwrap()).unwrap();
}

/// Names of the immediate entries of `dir`, sorted. Missing dir → empty.
pub fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
