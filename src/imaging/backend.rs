//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two pixel operations the pipeline
//! needs: re-encode a file as JPEG, and composite a post's two shots.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{ComposeParams, ConvertParams};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

impl BackendError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Decode `params.source`, drop any alpha channel and write it as a JPEG
    /// to `params.output`. Nothing is written on failure.
    fn convert_to_jpeg(&self, params: &ConvertParams) -> Result<(), BackendError>;

    /// Paste a scaled, rounded copy of the secondary shot onto the primary
    /// and save the result as a JPEG.
    fn compose(&self, params: &ComposeParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// SOI, empty SOS, EOI: no pixels, but enough structure for metadata
    /// splicing.
    pub const MOCK_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9];

    /// Mock backend that records operations instead of touching pixels.
    ///
    /// Both operations write [`MOCK_JPEG`], a header-only JPEG, so callers
    /// can move and stamp the result afterwards.
    #[derive(Default)]
    pub struct MockBackend {
        pub operations: Mutex<Vec<RecordedOp>>,
        pub fail_convert: bool,
        pub fail_compose: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Convert {
            source: String,
            output: String,
            quality: u32,
        },
        Compose {
            primary: String,
            secondary: String,
            output: String,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_convert() -> Self {
            Self {
                fail_convert: true,
                ..Self::default()
            }
        }

        pub fn failing_compose() -> Self {
            Self {
                fail_compose: true,
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl ImageBackend for MockBackend {
        fn convert_to_jpeg(&self, params: &ConvertParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Convert {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                quality: params.quality.value(),
            });
            if self.fail_convert {
                return Err(BackendError::Decode {
                    path: params.source.clone(),
                    reason: "mock decode failure".to_string(),
                });
            }
            std::fs::write(&params.output, MOCK_JPEG)
                .map_err(|e| BackendError::io(&params.output, e))
        }

        fn compose(&self, params: &ComposeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Compose {
                primary: params.primary.to_string_lossy().to_string(),
                secondary: params.secondary.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
            });
            if self.fail_compose {
                return Err(BackendError::Encode {
                    path: params.output.clone(),
                    reason: "mock encode failure".to_string(),
                });
            }
            std::fs::write(&params.output, MOCK_JPEG)
                .map_err(|e| BackendError::io(&params.output, e))
        }
    }

    #[test]
    fn mock_records_convert() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.jpg");
        let backend = MockBackend::new();

        backend
            .convert_to_jpeg(&ConvertParams {
                source: "/in/shot.webp".into(),
                output: output.clone(),
                quality: crate::imaging::Quality::new(80),
            })
            .unwrap();

        assert!(output.exists());
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Convert { source, quality: 80, .. } if source == "/in/shot.webp"
        ));
    }

    #[test]
    fn mock_failing_compose_reports_encode_error() {
        let backend = MockBackend::failing_compose();
        let result = backend.compose(&ComposeParams {
            primary: "/a.jpg".into(),
            secondary: "/b.jpg".into(),
            output: "/c.jpg".into(),
            layout: crate::imaging::OverlayLayout::default(),
            quality: crate::imaging::Quality::default(),
        });
        assert!(matches!(result, Err(BackendError::Encode { .. })));
        assert_eq!(backend.get_operations().len(), 1);
    }
}
