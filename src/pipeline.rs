//! Post processing pipeline.
//!
//! Takes the manifest and the exported images and produces, for each post:
//!
//! ```text
//! Photos/post/__processed/
//! ├── front.jpg                          # primary (WEBP re-encoded as JPEG)
//! └── back.jpg                           # secondary (copied, times preserved)
//! Photos/post/__combined/
//! └── 20240714_093005_combined.jpg       # secondary pasted over primary
//! ```
//!
//! Every output is stamped with the post's capture time and caption (see
//! [`crate::metadata`]). The post's location is parsed and shown by
//! [`check`] but not written into the images.
//!
//! ## Error boundaries
//!
//! Only an unusable manifest aborts the run. Each post runs inside its own
//! boundary: a failure is reported as [`PipelineEvent::EntryFailed`] with a
//! [`FailureKind`] and the next post starts. Inside a post, a WEBP that can't
//! be converted and a metadata container that can't be written are reported
//! and skipped without failing the post.
//!
//! ## Progress events
//!
//! The pipeline never prints. Callers pass an optional channel and receive
//! [`PipelineEvent`]s in processing order; [`crate::output`] renders them.

use crate::config::RecapConfig;
use crate::files::{
    copy_preserving, count_by_extension, ensure_dir, has_extension, move_file,
    purge_backup_files, unique_path,
};
use crate::imaging::{BackendError, ImageBackend, RustBackend, compose, convert_to_jpeg};
use crate::manifest::{
    ManifestError, PostEntry, combined_file_name, load_manifest, resolve_source,
};
use crate::metadata::{CaptureStamp, MetadataError, MetadataWriter, WriteOutcome};
use chrono::NaiveDateTime;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),
    #[error(transparent)]
    Manifest(ManifestError),
}

impl From<ManifestError> for PipelineError {
    fn from(e: ManifestError) -> Self {
        match e {
            ManifestError::NotFound(path) => Self::ManifestNotFound(path),
            other => Self::Manifest(other),
        }
    }
}

/// What went wrong, independent of where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Decode,
    Encode,
    MetadataRead,
    MetadataWrite,
    Parse,
    NotFound,
    Io,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Encode => "encode",
            Self::MetadataRead => "metadata-read",
            Self::MetadataWrite => "metadata-write",
            Self::Parse => "parse",
            Self::NotFound => "not-found",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&BackendError> for FailureKind {
    fn from(e: &BackendError) -> Self {
        match e {
            BackendError::Decode { .. } => Self::Decode,
            BackendError::Encode { .. } | BackendError::ProcessingFailed(_) => Self::Encode,
            BackendError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                Self::NotFound
            }
            BackendError::Io { .. } => Self::Io,
        }
    }
}

impl From<&MetadataError> for FailureKind {
    fn from(e: &MetadataError) -> Self {
        match e {
            MetadataError::Read { .. } => Self::MetadataRead,
            MetadataError::Write { .. } => Self::MetadataWrite,
            MetadataError::Io { .. } => Self::Io,
        }
    }
}

/// Failure that ends one post.
#[derive(Error, Debug)]
pub enum EntryError {
    #[error("malformed entry: {0}")]
    Parse(String),
    #[error("source image not found: {0}")]
    NotFound(PathBuf),
    #[error(transparent)]
    Imaging(#[from] BackendError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EntryError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Parse(_) => FailureKind::Parse,
            Self::NotFound(_) => FailureKind::NotFound,
            Self::Imaging(e) => e.into(),
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                FailureKind::NotFound
            }
            Self::Io { .. } => FailureKind::Io,
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
    /// End of a run.
    Done,
}

/// Progress reported while running.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RunStarted {
        input_folder: PathBuf,
        webp_files: usize,
    },
    ManifestFailed {
        path: PathBuf,
        reason: String,
    },
    Converted {
        source: PathBuf,
        output: PathBuf,
    },
    Copied {
        source: PathBuf,
        output: PathBuf,
    },
    /// A source image was skipped; the post goes on without it.
    ImageFailed {
        source: PathBuf,
        kind: FailureKind,
        reason: String,
    },
    MetadataFailed {
        path: PathBuf,
        container: &'static str,
        kind: FailureKind,
        reason: String,
    },
    Combined {
        output: PathBuf,
    },
    EntryFailed {
        index: usize,
        kind: FailureKind,
        reason: String,
        /// The entry as it appeared in the manifest.
        entry: String,
    },
    BackupRemoved {
        path: PathBuf,
    },
    BackupFailed {
        path: PathBuf,
        reason: String,
    },
    Finished {
        entries: usize,
        failed: usize,
    },
}

impl PipelineEvent {
    pub fn level(&self) -> Level {
        match self {
            Self::ManifestFailed { .. }
            | Self::ImageFailed { .. }
            | Self::MetadataFailed { .. }
            | Self::EntryFailed { .. }
            | Self::BackupFailed { .. } => Level::Error,
            Self::Finished { .. } => Level::Done,
            _ => Level::Info,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::RunStarted {
                input_folder,
                webp_files,
            } => format!(
                "Found {webp_files} WEBP files in {}",
                input_folder.display()
            ),
            Self::ManifestFailed { path, reason } => {
                format!("Cannot load manifest {}: {reason}. Exiting.", path.display())
            }
            Self::Converted { source, .. } => format!("Converted {} to JPEG", source.display()),
            Self::Copied { source, .. } => format!("Copied {}", source.display()),
            Self::ImageFailed { source, reason, .. } => {
                format!("Error converting {} to JPEG: {reason}", source.display())
            }
            Self::MetadataFailed {
                path,
                container,
                reason,
                ..
            } => format!(
                "Failed to update {container} data for {}: {reason}",
                path.display()
            ),
            Self::Combined { output } => format!("Combined post into {}", output.display()),
            Self::EntryFailed { index, reason, .. } => {
                format!("Error processing entry #{}: {reason}", index + 1)
            }
            Self::BackupRemoved { path } => format!("Removed backup file: {}", path.display()),
            Self::BackupFailed { path, reason } => {
                format!("Error removing {}: {reason}", path.display())
            }
            Self::Finished { entries, .. } => format!("Finished processing {entries} entries"),
        }
    }

    /// Structured context, rendered after the message.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Converted { output, .. } | Self::Copied { output, .. } => {
                vec![("output", output.display().to_string())]
            }
            Self::ImageFailed { kind, .. } => vec![("kind", kind.to_string())],
            Self::MetadataFailed { kind, .. } => vec![("kind", kind.to_string())],
            Self::EntryFailed { kind, entry, .. } => {
                vec![("kind", kind.to_string()), ("entry", entry.clone())]
            }
            _ => Vec::new(),
        }
    }
}

struct Events(Option<Sender<PipelineEvent>>);

impl Events {
    fn send(&self, event: PipelineEvent) {
        if let Some(tx) = &self.0 {
            // A closed receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }
}

// ============================================================================
// Run
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EntryFailure {
    pub index: usize,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub entries: usize,
    pub failures: Vec<EntryFailure>,
    /// Stamped copies of the source images.
    pub outputs: Vec<PathBuf>,
    pub composites: Vec<PathBuf>,
    pub backups_removed: usize,
}

/// Run with the pure-Rust image backend and the standard metadata writers.
pub fn run(
    config: &RecapConfig,
    events: Option<Sender<PipelineEvent>>,
) -> Result<RunReport, PipelineError> {
    run_with(
        &RustBackend::new(),
        &MetadataWriter::standard(),
        config,
        events,
    )
}

/// Run with explicit collaborators (allows testing with mocks).
pub fn run_with(
    backend: &impl ImageBackend,
    metadata: &MetadataWriter,
    config: &RecapConfig,
    events: Option<Sender<PipelineEvent>>,
) -> Result<RunReport, PipelineError> {
    let events = Events(events);

    for dir in [&config.output_folder, &config.combined_folder] {
        ensure_dir(dir).map_err(|source| PipelineError::CreateDir {
            path: dir.clone(),
            source,
        })?;
    }

    events.send(PipelineEvent::RunStarted {
        input_folder: config.input_folder.clone(),
        webp_files: count_by_extension(&config.input_folder, "webp"),
    });

    let entries = match load_manifest(&config.manifest_path) {
        Ok(entries) => entries,
        Err(e) => {
            events.send(PipelineEvent::ManifestFailed {
                path: config.manifest_path.clone(),
                reason: e.to_string(),
            });
            return Err(e.into());
        }
    };

    let mut report = RunReport {
        entries: entries.len(),
        ..RunReport::default()
    };
    let runner = EntryRunner {
        backend,
        metadata,
        config,
        events: &events,
    };

    for (index, value) in entries.iter().enumerate() {
        if let Err(e) = runner.process(value, &mut report) {
            let kind = e.kind();
            events.send(PipelineEvent::EntryFailed {
                index,
                kind,
                reason: e.to_string(),
                entry: value.to_string(),
            });
            report.failures.push(EntryFailure {
                index,
                kind,
                message: e.to_string(),
            });
        }
    }

    for dir in [&config.output_folder, &config.combined_folder] {
        let purge = purge_backup_files(dir);
        report.backups_removed += purge.removed.len();
        for path in purge.removed {
            events.send(PipelineEvent::BackupRemoved { path });
        }
        for (path, e) in purge.failed {
            events.send(PipelineEvent::BackupFailed {
                path,
                reason: e.to_string(),
            });
        }
    }

    events.send(PipelineEvent::Finished {
        entries: report.entries,
        failed: report.failures.len(),
    });
    Ok(report)
}

/// A manifest entry resolved against the config.
#[derive(Debug, Clone)]
struct ParsedEntry {
    post: PostEntry,
    taken_at: NaiveDateTime,
    primary: PathBuf,
    secondary: PathBuf,
}

fn parse_entry(config: &RecapConfig, value: &Value) -> Result<ParsedEntry, EntryError> {
    let post = PostEntry::from_value(value).map_err(|e| EntryError::Parse(e.to_string()))?;
    let taken_at = post
        .taken_at()
        .map_err(|e| EntryError::Parse(format!("takenAt {:?}: {e}", post.taken_at)))?;
    let resolve = |path: &str| {
        resolve_source(&config.input_folder, path)
            .ok_or_else(|| EntryError::Parse(format!("no file name in {path:?}")))
    };
    Ok(ParsedEntry {
        primary: resolve(&post.primary.path)?,
        secondary: resolve(&post.secondary.path)?,
        post,
        taken_at,
    })
}

struct EntryRunner<'a, B: ImageBackend> {
    backend: &'a B,
    metadata: &'a MetadataWriter,
    config: &'a RecapConfig,
    events: &'a Events,
}

impl<B: ImageBackend> EntryRunner<'_, B> {
    fn process(&self, value: &Value, report: &mut RunReport) -> Result<(), EntryError> {
        let entry = parse_entry(self.config, value)?;
        let stamp = CaptureStamp {
            taken_at: entry.taken_at,
            caption: entry.post.caption.clone(),
            location: None,
        };

        for source in [&entry.primary, &entry.secondary] {
            if let Some(output) = self.process_source(source, &stamp)? {
                report.outputs.push(output);
            }
        }

        for source in [&entry.primary, &entry.secondary] {
            if !source.exists() {
                return Err(EntryError::NotFound(source.clone()));
            }
        }
        let combined = unique_path(
            &self
                .config
                .combined_folder
                .join(combined_file_name(&entry.taken_at)),
        );
        compose(
            self.backend,
            &entry.primary,
            &entry.secondary,
            &combined,
            self.config.layout(),
            self.config.quality(),
        )?;
        self.events.send(PipelineEvent::Combined {
            output: combined.clone(),
        });
        self.stamp(&combined, &stamp);
        report.composites.push(combined);
        Ok(())
    }

    /// Bring one source into the output folder as a stamped JPEG.
    ///
    /// `Ok(None)` when the source is absent or can't be converted.
    fn process_source(
        &self,
        source: &Path,
        stamp: &CaptureStamp,
    ) -> Result<Option<PathBuf>, EntryError> {
        let Some(name) = source.file_name().filter(|_| source.is_file()) else {
            return Ok(None);
        };
        let dest = unique_path(&self.config.output_folder.join(name));

        let output = if has_extension(source, "webp") {
            let converted = match convert_to_jpeg(self.backend, source, self.config.quality()) {
                Ok(converted) => converted,
                Err(e) => {
                    self.events.send(PipelineEvent::ImageFailed {
                        source: source.to_path_buf(),
                        kind: (&e).into(),
                        reason: e.to_string(),
                    });
                    return Ok(None);
                }
            };
            let dest = unique_path(&dest.with_extension("jpg"));
            move_file(&converted, &dest).map_err(|e| EntryError::io(&dest, e))?;
            self.events.send(PipelineEvent::Converted {
                source: source.to_path_buf(),
                output: dest.clone(),
            });
            dest
        } else {
            copy_preserving(source, &dest).map_err(|e| EntryError::io(&dest, e))?;
            self.events.send(PipelineEvent::Copied {
                source: source.to_path_buf(),
                output: dest.clone(),
            });
            dest
        };

        self.stamp(&output, stamp);
        Ok(Some(output))
    }

    fn stamp(&self, path: &Path, stamp: &CaptureStamp) {
        let report = self.metadata.write(path, stamp);
        for result in &report.results {
            let (kind, reason) = match &result.outcome {
                Ok(WriteOutcome::Written {
                    recovered: Some(e),
                }) => (FailureKind::MetadataRead, e.to_string()),
                Err(e) => (e.into(), e.to_string()),
                Ok(_) => continue,
            };
            self.events.send(PipelineEvent::MetadataFailed {
                path: path.to_path_buf(),
                container: result.container,
                kind,
                reason,
            });
        }
    }
}

// ============================================================================
// Check (dry run)
// ============================================================================

/// What a run would do with one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEntry {
    pub index: usize,
    pub taken_at: NaiveDateTime,
    pub primary: PathBuf,
    pub primary_exists: bool,
    pub secondary: PathBuf,
    pub secondary_exists: bool,
    pub combined_name: String,
    pub has_caption: bool,
    pub has_location: bool,
}

#[derive(Debug)]
pub struct CheckReport {
    pub manifest: PathBuf,
    pub webp_files: usize,
    pub entries: Vec<Result<PlannedEntry, EntryFailure>>,
}

/// Parse the manifest and resolve every entry without writing anything.
pub fn check(config: &RecapConfig) -> Result<CheckReport, PipelineError> {
    let entries = load_manifest(&config.manifest_path)?;
    let entries = entries
        .iter()
        .enumerate()
        .map(|(index, value)| {
            parse_entry(config, value)
                .map(|e| PlannedEntry {
                    index,
                    taken_at: e.taken_at,
                    primary_exists: e.primary.is_file(),
                    primary: e.primary,
                    secondary_exists: e.secondary.is_file(),
                    secondary: e.secondary,
                    combined_name: combined_file_name(&e.taken_at),
                    has_caption: e.post.caption.is_some_and(|c| !c.trim().is_empty()),
                    has_location: e.post.location.is_some(),
                })
                .map_err(|e| EntryFailure {
                    index,
                    kind: e.kind(),
                    message: e.to_string(),
                })
        })
        .collect();

    Ok(CheckReport {
        manifest: config.manifest_path.clone(),
        webp_files: count_by_extension(&config.input_folder, "webp"),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MOCK_JPEG, MockBackend, RecordedOp};
    use crate::metadata::{read_capture, read_iptc};
    use crate::test_helpers::{PostLayout, file_names, post_json, write_manifest};
    use std::fs;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn run_mock(
        backend: &MockBackend,
        config: &RecapConfig,
    ) -> (Result<RunReport, PipelineError>, Vec<PipelineEvent>) {
        let (tx, rx) = mpsc::channel();
        let result = run_with(backend, &MetadataWriter::standard(), config, Some(tx));
        (result, rx.iter().collect())
    }

    fn write_source(layout: &PostLayout, name: &str) -> PathBuf {
        let path = layout.input.join(name);
        fs::write(&path, MOCK_JPEG).unwrap();
        path
    }

    // =========================================================================
    // Happy path
    // =========================================================================

    #[test]
    fn webp_and_jpg_post_produces_outputs_and_composite() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        write_source(&layout, "front.webp");
        write_source(&layout, "back.jpg");
        write_manifest(
            &layout.manifest,
            &[post_json("front.webp", "back.jpg", Some("Lunch"))],
        );
        let backend = MockBackend::new();

        let (result, events) = run_mock(&backend, &layout.config());
        let report = result.unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(file_names(&layout.output), vec!["back.jpg", "front.jpg"]);
        assert_eq!(
            file_names(&layout.combined),
            vec!["20240714_093005_combined.jpg"]
        );
        // The converted sibling was moved, not left behind
        assert_eq!(
            file_names(&layout.input),
            vec!["__combined", "__processed", "back.jpg", "front.webp"]
        );

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RecordedOp::Convert { quality: 80, .. }));
        assert!(matches!(
            &ops[1],
            RecordedOp::Compose { primary, .. } if primary.ends_with("front.webp")
        ));

        assert!(matches!(
            events.first(),
            Some(PipelineEvent::RunStarted { webp_files: 1, .. })
        ));
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::Finished { entries: 1, failed: 0 })
        ));
        assert!(events.iter().all(|e| e.level() != Level::Error));
    }

    #[test]
    fn outputs_are_stamped() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        write_source(&layout, "a.jpg");
        write_source(&layout, "b.jpg");
        write_manifest(&layout.manifest, &[post_json("a.jpg", "b.jpg", Some("Hello"))]);

        let (result, _) = run_mock(&MockBackend::new(), &layout.config());
        let report = result.unwrap();

        for path in report.outputs.iter().chain(&report.composites) {
            let capture = read_capture(path).unwrap();
            assert_eq!(capture.taken_at.as_deref(), Some("2024:07:14 09:30:05"));
            assert_eq!(read_iptc(path).caption.as_deref(), Some("Hello"));
        }
        assert_eq!(report.outputs.len(), 2);
        assert_eq!(report.composites.len(), 1);
    }

    #[test]
    fn location_is_not_stamped_by_the_pipeline() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        write_source(&layout, "a.jpg");
        write_source(&layout, "b.jpg");
        let mut post = post_json("a.jpg", "b.jpg", None);
        post["location"] = serde_json::json!({ "latitude": -33.85, "longitude": 151.2 });
        write_manifest(&layout.manifest, &[post]);

        let (result, _) = run_mock(&MockBackend::new(), &layout.config());
        let report = result.unwrap();

        for path in report.outputs.iter().chain(&report.composites) {
            let capture = read_capture(path).unwrap();
            assert_eq!(capture.taken_at.as_deref(), Some("2024:07:14 09:30:05"));
            assert!(capture.gps.is_none());
        }
    }

    #[test]
    fn existing_outputs_are_never_overwritten() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        write_source(&layout, "a.jpg");
        write_source(&layout, "b.jpg");
        write_manifest(&layout.manifest, &[post_json("a.jpg", "b.jpg", None)]);
        fs::create_dir_all(&layout.output).unwrap();
        fs::create_dir_all(&layout.combined).unwrap();
        fs::write(layout.output.join("a.jpg"), b"keep").unwrap();
        fs::write(layout.combined.join("20240714_093005_combined.jpg"), b"keep").unwrap();

        run_mock(&MockBackend::new(), &layout.config()).0.unwrap();

        assert_eq!(fs::read(layout.output.join("a.jpg")).unwrap(), b"keep");
        assert!(layout.output.join("a_1.jpg").exists());
        assert!(layout.combined.join("20240714_093005_combined_1.jpg").exists());
    }

    // =========================================================================
    // Per-entry isolation
    // =========================================================================

    #[test]
    fn missing_primary_fails_only_that_entry() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        write_source(&layout, "back1.jpg");
        write_source(&layout, "front2.jpg");
        write_source(&layout, "back2.jpg");
        let mut second = post_json("front2.jpg", "back2.jpg", None);
        second["takenAt"] = serde_json::json!("2024-07-15T10:00:00.000Z");
        write_manifest(
            &layout.manifest,
            &[post_json("front1.jpg", "back1.jpg", None), second],
        );

        let (result, events) = run_mock(&MockBackend::new(), &layout.config());
        let report = result.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 0);
        assert_eq!(report.failures[0].kind, FailureKind::NotFound);
        // The secondary of the failed post was still processed
        assert!(layout.output.join("back1.jpg").exists());
        assert_eq!(
            file_names(&layout.combined),
            vec!["20240715_100000_combined.jpg"]
        );
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::EntryFailed { index: 0, kind: FailureKind::NotFound, .. }
        )));
    }

    #[test]
    fn malformed_entries_are_parse_failures() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        write_source(&layout, "a.jpg");
        write_source(&layout, "b.jpg");
        let mut bad_date = post_json("a.jpg", "b.jpg", None);
        bad_date["takenAt"] = serde_json::json!("yesterday");
        write_manifest(
            &layout.manifest,
            &[
                serde_json::json!({ "primary": {} }),
                bad_date,
                post_json("a.jpg", "b.jpg", None),
            ],
        );

        let (result, _) = run_mock(&MockBackend::new(), &layout.config());
        let report = result.unwrap();

        let kinds: Vec<_> = report.failures.iter().map(|f| (f.index, f.kind)).collect();
        assert_eq!(kinds, vec![(0, FailureKind::Parse), (1, FailureKind::Parse)]);
        assert_eq!(report.composites.len(), 1);
    }

    #[test]
    fn conversion_failure_skips_image_but_still_composes() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        write_source(&layout, "front.webp");
        write_source(&layout, "back.jpg");
        write_manifest(&layout.manifest, &[post_json("front.webp", "back.jpg", None)]);
        let backend = MockBackend::failing_convert();

        let (result, events) = run_mock(&backend, &layout.config());
        let report = result.unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(file_names(&layout.output), vec!["back.jpg"]);
        assert_eq!(report.composites.len(), 1);
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::ImageFailed { kind: FailureKind::Decode, .. }
        )));
    }

    #[test]
    fn compose_failure_is_encode_failure() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        write_source(&layout, "a.jpg");
        write_source(&layout, "b.jpg");
        write_manifest(&layout.manifest, &[post_json("a.jpg", "b.jpg", None)]);

        let (result, _) = run_mock(&MockBackend::failing_compose(), &layout.config());
        let report = result.unwrap();

        assert_eq!(report.failures[0].kind, FailureKind::Encode);
        assert_eq!(report.outputs.len(), 2);
    }

    #[test]
    fn unwritable_metadata_is_reported_without_failing_entry() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        // Not a JPEG: copied fine, but neither container can be written
        fs::write(layout.input.join("a.jpg"), b"text").unwrap();
        write_source(&layout, "b.jpg");
        write_manifest(&layout.manifest, &[post_json("a.jpg", "b.jpg", Some("x"))]);

        let (result, events) = run_mock(&MockBackend::new(), &layout.config());

        assert!(result.unwrap().failures.is_empty());
        let metadata_failures: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::MetadataFailed {
                    container, kind, ..
                } => Some((*container, *kind)),
                _ => None,
            })
            .collect();
        assert_eq!(
            metadata_failures,
            vec![
                ("EXIF", FailureKind::MetadataWrite),
                ("IPTC", FailureKind::MetadataWrite)
            ]
        );
    }

    // =========================================================================
    // Run-level behavior
    // =========================================================================

    #[test]
    fn missing_manifest_aborts_with_empty_folders() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        let backend = MockBackend::new();

        let (result, events) = run_mock(&backend, &layout.config());

        assert!(matches!(result, Err(PipelineError::ManifestNotFound(p)) if p == layout.manifest));
        assert!(layout.output.is_dir());
        assert!(layout.combined.is_dir());
        assert!(file_names(&layout.output).is_empty());
        assert!(file_names(&layout.combined).is_empty());
        assert!(backend.get_operations().is_empty());
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::ManifestFailed { .. })
        ));
    }

    #[test]
    fn non_array_manifest_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        fs::write(&layout.manifest, r#"{"posts": []}"#).unwrap();

        let (result, _) = run_mock(&MockBackend::new(), &layout.config());
        assert!(matches!(
            result,
            Err(PipelineError::Manifest(ManifestError::NotAnArray(_)))
        ));
    }

    #[test]
    fn backup_files_are_purged_after_run() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        fs::create_dir_all(&layout.output).unwrap();
        fs::create_dir_all(&layout.combined).unwrap();
        fs::write(layout.output.join("old.jpg~"), b"x").unwrap();
        fs::write(layout.combined.join("old_combined.jpg~"), b"x").unwrap();
        write_manifest(&layout.manifest, &[]);

        let (result, events) = run_mock(&MockBackend::new(), &layout.config());

        assert_eq!(result.unwrap().backups_removed, 2);
        assert!(file_names(&layout.output).is_empty());
        assert!(file_names(&layout.combined).is_empty());
        let removed = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::BackupRemoved { .. }))
            .count();
        assert_eq!(removed, 2);
    }

    #[test]
    fn run_without_listener() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        write_manifest(&layout.manifest, &[]);
        let report = run_with(
            &MockBackend::new(),
            &MetadataWriter::standard(),
            &layout.config(),
            None,
        )
        .unwrap();
        assert_eq!(report.entries, 0);
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn check_reports_entries_without_writing() {
        let tmp = TempDir::new().unwrap();
        let layout = PostLayout::new(tmp.path());
        write_source(&layout, "front.webp");
        write_manifest(
            &layout.manifest,
            &[
                post_json("front.webp", "back.jpg", Some("Lunch")),
                serde_json::json!("not a post"),
            ],
        );

        let report = check(&layout.config()).unwrap();

        assert_eq!(report.webp_files, 1);
        let planned = report.entries[0].as_ref().unwrap();
        assert!(planned.primary_exists);
        assert!(!planned.secondary_exists);
        assert!(planned.has_caption);
        assert_eq!(planned.combined_name, "20240714_093005_combined.jpg");
        assert!(matches!(
            &report.entries[1],
            Err(EntryFailure { kind: FailureKind::Parse, .. })
        ));
        assert!(!layout.output.exists());
        assert!(!layout.combined.exists());
    }

    // =========================================================================
    // Failure kinds and events
    // =========================================================================

    #[test]
    fn backend_errors_map_to_failure_kinds() {
        let not_found = BackendError::Io {
            path: "/x".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let denied = BackendError::Io {
            path: "/x".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(FailureKind::from(&not_found), FailureKind::NotFound);
        assert_eq!(FailureKind::from(&denied), FailureKind::Io);
        assert_eq!(
            FailureKind::from(&BackendError::ProcessingFailed("empty".into())),
            FailureKind::Encode
        );
    }

    #[test]
    fn event_levels() {
        let finished = PipelineEvent::Finished {
            entries: 3,
            failed: 1,
        };
        assert_eq!(finished.level(), Level::Done);
        assert_eq!(finished.message(), "Finished processing 3 entries");
        assert!(finished.fields().is_empty());

        let failed = PipelineEvent::EntryFailed {
            index: 0,
            kind: FailureKind::Parse,
            reason: "bad".into(),
            entry: "{}".into(),
        };
        assert_eq!(failed.level(), Level::Error);
        assert_eq!(failed.message(), "Error processing entry #1: bad");
    }
}
