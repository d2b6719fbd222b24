//! Post manifest loading.
//!
//! The manifest is the export's `posts.json`: a JSON array with one object
//! per post. Only a handful of fields are read; everything else in the export
//! is ignored.
//!
//! ```json
//! [
//!   {
//!     "primary":   { "path": "/Photos/abc/post/front.webp" },
//!     "secondary": { "path": "/Photos/abc/post/back.webp" },
//!     "takenAt":   "2024-07-14T09:30:05.123Z",
//!     "caption":   "Lunch",
//!     "location":  { "latitude": 45.76, "longitude": 4.83 }
//!   }
//! ]
//! ```
//!
//! Loading is two-level. [`load_manifest`] only checks that the document is a
//! JSON array; each element is deserialized on its own with
//! [`PostEntry::from_value`], so one malformed post never hides the rest.

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// `takenAt` layout: UTC with a fractional-seconds part and a literal `Z`.
/// The fraction must be present with 1 to 6 digits; see [`parse_taken_at`].
pub const TAKEN_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// File name layout of a post's composite, minus the `_combined.jpg` suffix.
pub const COMBINED_STEM_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Manifest {0} is not a JSON array")]
    NotAnArray(PathBuf),
}

#[derive(Error, Debug)]
pub enum TakenAtError {
    #[error("expected a fractional part of 1 to 6 digits before the trailing Z")]
    Fraction,
    #[error(transparent)]
    Layout(#[from] chrono::ParseError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaRef {
    pub path: String,
}

/// Where the post was taken. Reported by the dry run; not stamped.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// One post of the manifest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostEntry {
    pub primary: MediaRef,
    pub secondary: MediaRef,
    pub taken_at: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

impl PostEntry {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    pub fn taken_at(&self) -> Result<NaiveDateTime, TakenAtError> {
        parse_taken_at(&self.taken_at)
    }
}

/// Read the manifest and return its elements, unparsed.
pub fn load_manifest(path: &Path) -> Result<Vec<Value>, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ManifestError::NotFound(path.to_path_buf())
        } else {
            ManifestError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let document: Value = serde_json::from_str(&content).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    match document {
        Value::Array(entries) => Ok(entries),
        _ => Err(ManifestError::NotAnArray(path.to_path_buf())),
    }
}

pub fn parse_taken_at(value: &str) -> Result<NaiveDateTime, TakenAtError> {
    // chrono's `%.f` also accepts a missing fraction or nanosecond precision
    let fraction_ok = value
        .strip_suffix('Z')
        .and_then(|v| v.rsplit_once('.'))
        .is_some_and(|(_, f)| (1..=6).contains(&f.len()) && f.bytes().all(|b| b.is_ascii_digit()));
    if !fraction_ok {
        return Err(TakenAtError::Fraction);
    }
    Ok(NaiveDateTime::parse_from_str(value, TAKEN_AT_FORMAT)?)
}

/// `20240714_093005_combined.jpg`
pub fn combined_file_name(taken_at: &NaiveDateTime) -> String {
    format!("{}_combined.jpg", taken_at.format(COMBINED_STEM_FORMAT))
}

/// Re-root a manifest path under `input_folder`, keeping only its file name.
///
/// The export records paths from the service's storage layout; the files
/// themselves sit flat in the input folder. `None` when the path has no
/// file-name component.
pub fn resolve_source(input_folder: &Path, manifest_path: &str) -> Option<PathBuf> {
    // Export paths always use `/`, whatever the host platform.
    let name = manifest_path.rsplit('/').next()?;
    let name = Path::new(name).file_name()?;
    Some(input_folder.join(name))
}
