//! Run configuration.
//!
//! Handles loading, validating, and merging `recap.toml`. Stock defaults are
//! overridden by the user file, which is in turn overridden by CLI flags.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! input_folder = "Photos/post"
//! output_folder = "Photos/post/__processed"
//! combined_folder = "Photos/post/__combined"
//! manifest_path = "posts.json"
//!
//! [output]
//! jpeg_quality = 80         # 1-100
//!
//! [thumbnail]
//! scale = [1, 3]            # secondary size relative to the primary
//! offset = [50, 50]         # paste position from the top-left corner
//! corner_radius = 30
//! ```
//!
//! Config files are sparse; override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::imaging::{OverlayLayout, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "recap.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Everything a run needs to know, passed explicitly to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecapConfig {
    /// Folder holding the exported source images.
    pub input_folder: PathBuf,
    /// Where converted/copied and stamped sources go.
    pub output_folder: PathBuf,
    /// Where the per-post composites go.
    pub combined_folder: PathBuf,
    /// JSON array of posts.
    pub manifest_path: PathBuf,
    pub output: OutputConfig,
    pub thumbnail: ThumbnailConfig,
}

impl Default for RecapConfig {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::from("Photos/post"),
            output_folder: PathBuf::from("Photos/post/__processed"),
            combined_folder: PathBuf::from("Photos/post/__combined"),
            manifest_path: PathBuf::from("posts.json"),
            output: OutputConfig::default(),
            thumbnail: ThumbnailConfig::default(),
        }
    }
}

impl RecapConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::Validation(
                "output.jpeg_quality must be 1-100".into(),
            ));
        }
        let [num, denom] = self.thumbnail.scale;
        if num == 0 || denom == 0 {
            return Err(ConfigError::Validation(
                "thumbnail.scale values must be non-zero".into(),
            ));
        }
        if num > denom {
            return Err(ConfigError::Validation(
                "thumbnail.scale must not enlarge the secondary image".into(),
            ));
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.output.jpeg_quality)
    }

    pub fn layout(&self) -> OverlayLayout {
        OverlayLayout {
            scale: self.thumbnail.scale,
            offset: (self.thumbnail.offset[0], self.thumbnail.offset[1]),
            corner_radius: self.thumbnail.corner_radius,
        }
    }
}

/// JPEG encoding settings, shared by conversions and composites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub jpeg_quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { jpeg_quality: 80 }
    }
}

/// Picture-in-picture placement of the secondary shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailConfig {
    /// `[numerator, denominator]` applied to both primary dimensions.
    pub scale: [u32; 2],
    /// `[x, y]` of the overlay's top-left corner.
    pub offset: [u32; 2],
    pub corner_radius: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            scale: [1, 3],
            offset: [50, 50],
            corner_radius: 30,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(RecapConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` when it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<RecapConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RecapConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config at `path`.
///
/// A missing file yields the stock defaults, unless `required` is set (the
/// user named the file explicitly), in which case it is an error.
pub fn load_config(path: &Path, required: bool) -> Result<RecapConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if overlay.is_none() && required {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    resolve_config(overlay)
}

/// Returns a fully-commented stock `recap.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Recap Configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.
#
# Relative paths are resolved against the working directory.

# Folder holding the exported images named in the manifest.
input_folder = "Photos/post"

# Converted/copied source images, stamped with capture metadata.
output_folder = "Photos/post/__processed"

# One picture-in-picture composite per post: {YYYYMMDD_HHMMSS}_combined.jpg
combined_folder = "Photos/post/__combined"

# JSON array of posts (primary/secondary paths, takenAt, caption, location).
manifest_path = "posts.json"

# ---------------------------------------------------------------------------
# JPEG output
# ---------------------------------------------------------------------------
[output]
# Encoding quality for converted images and composites (1 = worst, 100 = best).
jpeg_quality = 80

# ---------------------------------------------------------------------------
# Composite overlay
# ---------------------------------------------------------------------------
[thumbnail]
# Secondary shot size as [numerator, denominator] of the primary's size.
scale = [1, 3]

# Top-left corner of the overlay, in pixels from the primary's top-left.
offset = [50, 50]

# Rounded-corner radius of the overlay, in pixels.
corner_radius = 30
"##
}
