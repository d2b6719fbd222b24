//! Capture metadata stamping.
//!
//! Every output JPEG is stamped with what the post knows about the moment it
//! was taken. Two containers carry it, and they are written independently:
//!
//! - **EXIF** (APP1): `DateTimeOriginal` and, when the stamp carries a location,
//!   GPS latitude/longitude. Other primary-IFD fields already in the file are
//!   kept.
//! - **IPTC** (APP13): Caption-Abstract (`IPTC:2:120`), the field photo tools
//!   show as "Caption". Other datasets and 8BIM resources are kept.
//!
//! [`MetadataWriter`] always attempts every container in a fixed order and
//! reports each outcome separately, so a corrupt EXIF block never costs the
//! caption and vice versa.
//!
//! ```text
//! MetadataWriter::standard()
//!   ├── ExifContainer  → Written / Written { recovered } / Err
//!   └── IptcContainer  → Written / Unchanged / Err
//! ```

use crate::imaging::exif_block::{self, CaptureFields, GpsPoint};
use crate::imaging::iptc;
use crate::imaging::jpeg::JpegFile;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use crate::imaging::iptc::{IptcData, read_iptc};

/// EXIF `DateTimeOriginal` layout.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unreadable {container} metadata in {path}: {reason}")]
    Read {
        container: &'static str,
        path: PathBuf,
        reason: String,
    },
    #[error("failed to write {container} metadata to {path}: {reason}")]
    Write {
        container: &'static str,
        path: PathBuf,
        reason: String,
    },
}

impl MetadataError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write(container: &'static str, path: &Path, reason: impl ToString) -> Self {
        Self::Write {
            container,
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// What gets stamped onto an output image.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureStamp {
    pub taken_at: NaiveDateTime,
    pub caption: Option<String>,
    pub location: Option<GpsPoint>,
}

/// Result of a successful container write.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The container was rewritten. `recovered` holds a read failure of the
    /// previous block, which was discarded and replaced.
    Written { recovered: Option<MetadataError> },
    /// Nothing to write; the file was left untouched.
    Unchanged,
}

/// One metadata container inside a JPEG.
pub trait ContainerWriter {
    fn name(&self) -> &'static str;

    fn write(&self, path: &Path, stamp: &CaptureStamp) -> Result<WriteOutcome, MetadataError>;
}

fn load_jpeg(container: &'static str, path: &Path) -> Result<JpegFile, MetadataError> {
    let bytes = std::fs::read(path).map_err(|e| MetadataError::io(path, e))?;
    JpegFile::parse(&bytes).map_err(|e| MetadataError::write(container, path, e))
}

fn save_jpeg(path: &Path, jpeg: &JpegFile) -> Result<(), MetadataError> {
    std::fs::write(path, jpeg.to_bytes()).map_err(|e| MetadataError::io(path, e))
}

/// Timestamp and GPS position, in the EXIF block.
pub struct ExifContainer;

impl ContainerWriter for ExifContainer {
    fn name(&self) -> &'static str {
        "EXIF"
    }

    fn write(&self, path: &Path, stamp: &CaptureStamp) -> Result<WriteOutcome, MetadataError> {
        let name = self.name();
        let mut jpeg = load_jpeg(name, path)?;
        let taken_at = stamp.taken_at.format(EXIF_DATETIME_FORMAT).to_string();

        let mut recovered = None;
        exif_block::update_capture(&mut jpeg, &taken_at, stamp.location, |e| {
            recovered = Some(MetadataError::Read {
                container: name,
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        })
        .map_err(|e| MetadataError::write(name, path, e))?;

        save_jpeg(path, &jpeg)?;
        Ok(WriteOutcome::Written { recovered })
    }
}

/// Caption, in the IPTC block.
pub struct IptcContainer;

impl ContainerWriter for IptcContainer {
    fn name(&self) -> &'static str {
        "IPTC"
    }

    fn write(&self, path: &Path, stamp: &CaptureStamp) -> Result<WriteOutcome, MetadataError> {
        let mut jpeg = load_jpeg(self.name(), path)?;
        let changed = iptc::update_caption(&mut jpeg, stamp.caption.as_deref())
            .map_err(|e| MetadataError::write(self.name(), path, e))?;
        if !changed {
            return Ok(WriteOutcome::Unchanged);
        }
        save_jpeg(path, &jpeg)?;
        Ok(WriteOutcome::Written { recovered: None })
    }
}

/// Per-container outcome of one [`MetadataWriter::write`] call.
#[derive(Debug)]
pub struct ContainerResult {
    pub container: &'static str,
    pub outcome: Result<WriteOutcome, MetadataError>,
}

#[derive(Debug, Default)]
pub struct MetadataReport {
    pub results: Vec<ContainerResult>,
}

impl MetadataReport {
    pub fn is_ok(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_ok())
    }

    /// Containers that could not be written.
    pub fn errors(&self) -> impl Iterator<Item = &MetadataError> {
        self.results.iter().filter_map(|r| r.outcome.as_ref().err())
    }

    /// Unreadable blocks that were replaced.
    pub fn recovered(&self) -> impl Iterator<Item = &MetadataError> {
        self.results.iter().filter_map(|r| match &r.outcome {
            Ok(WriteOutcome::Written {
                recovered: Some(e),
            }) => Some(e),
            _ => None,
        })
    }
}

/// Writes every container in order, each independently fallible.
pub struct MetadataWriter {
    containers: Vec<Box<dyn ContainerWriter>>,
}

impl MetadataWriter {
    /// EXIF first, then IPTC.
    pub fn standard() -> Self {
        Self::with_containers(vec![Box::new(ExifContainer), Box::new(IptcContainer)])
    }

    pub fn with_containers(containers: Vec<Box<dyn ContainerWriter>>) -> Self {
        Self { containers }
    }

    pub fn write(&self, path: &Path, stamp: &CaptureStamp) -> MetadataReport {
        MetadataReport {
            results: self
                .containers
                .iter()
                .map(|c| ContainerResult {
                    container: c.name(),
                    outcome: c.write(path, stamp),
                })
                .collect(),
        }
    }
}

impl Default for MetadataWriter {
    fn default() -> Self {
        Self::standard()
    }
}

/// Read back the EXIF capture fields of a JPEG file.
pub fn read_capture(path: &Path) -> Result<CaptureFields, MetadataError> {
    let jpeg = load_jpeg("EXIF", path)?;
    exif_block::read_capture_fields(&jpeg).map_err(|e| MetadataError::Read {
        container: "EXIF",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
