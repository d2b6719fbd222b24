//! CLI output formatting.
//!
//! # Run log
//!
//! Every [`PipelineEvent`] becomes one line:
//!
//! ```text
//! 2024-07-14 09:30:05,123 - INFO - Converted Photos/post/front.webp to JPEG output=Photos/post/__processed/front.jpg
//! 2024-07-14 09:30:05,456 - ERROR - Error processing entry #2: source image not found: Photos/post/x.jpg kind=not-found entry={…}
//! 2024-07-14 09:30:06,001 - INFO - Finished processing 2 entries
//! ```
//!
//! With [`Palette::Ansi`], info lines are green, errors red and the final
//! line blue and bold. The whole line is colored, timestamp included.
//!
//! # Check
//!
//! ```text
//! Manifest posts.json (1 WEBP files in input)
//! 001 2024-07-14 09:30:05 → 20240714_093005_combined.jpg
//!     Primary: Photos/post/front.webp
//!     Secondary: Photos/post/back.jpg (missing)
//!     Caption, location
//! 002 error (parse): malformed entry: missing field `takenAt`
//! ```
//!
//! # Architecture
//!
//! `format_*` functions are pure and return strings for testability; the
//! `print_*` wrappers add the clock and write to stdout.

use crate::pipeline::{CheckReport, Level, PipelineEvent};
use std::io::IsTerminal;
use std::path::Path;

const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const BLUE_BOLD: &str = "\x1b[94m\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Layout of the timestamp prefix (`2024-07-14 09:30:05,123`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// How log lines are decorated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Plain,
    Ansi,
}

impl Palette {
    /// ANSI colors unless disabled by flag, by a non-empty `NO_COLOR`, or
    /// because stdout is not a terminal.
    pub fn detect(no_color: bool) -> Self {
        let env_disabled = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        if no_color || env_disabled || !std::io::stdout().is_terminal() {
            Palette::Plain
        } else {
            Palette::Ansi
        }
    }

    fn color(self, level: Level) -> Option<&'static str> {
        match (self, level) {
            (Palette::Plain, _) => None,
            (Palette::Ansi, Level::Info) => Some(GREEN),
            (Palette::Ansi, Level::Error) => Some(RED),
            (Palette::Ansi, Level::Done) => Some(BLUE_BOLD),
        }
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Info | Level::Done => "INFO",
        Level::Error => "ERROR",
    }
}

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

// ============================================================================
// Run log
// ============================================================================

/// Render one event as a log line.
pub fn format_event(event: &PipelineEvent, timestamp: &str, palette: Palette) -> String {
    let mut line = format!(
        "{} - {} - {}",
        timestamp,
        level_name(event.level()),
        event.message()
    );
    for (key, value) in event.fields() {
        line.push_str(&format!(" {key}={value}"));
    }
    match palette.color(event.level()) {
        Some(color) => format!("{color}{line}{RESET}"),
        None => line,
    }
}

/// Print one event to stdout, stamped with the local time.
pub fn print_event(event: &PipelineEvent, palette: Palette) {
    let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    println!("{}", format_event(event, &timestamp, palette));
}

// ============================================================================
// Check output
// ============================================================================

fn source_line(label: &str, path: &Path, exists: bool) -> String {
    let missing = if exists { "" } else { " (missing)" };
    format!("    {}: {}{}", label, path.display(), missing)
}

/// Format the dry-run report.
pub fn format_check_output(report: &CheckReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Manifest {} ({} WEBP files in input)",
        report.manifest.display(),
        report.webp_files
    )];

    for (i, entry) in report.entries.iter().enumerate() {
        match entry {
            Ok(planned) => {
                lines.push(format!(
                    "{} {} \u{2192} {}",
                    format_index(i + 1),
                    planned.taken_at.format("%Y-%m-%d %H:%M:%S"),
                    planned.combined_name
                ));
                lines.push(source_line("Primary", &planned.primary, planned.primary_exists));
                lines.push(source_line(
                    "Secondary",
                    &planned.secondary,
                    planned.secondary_exists,
                ));
                let extras: Vec<&str> = [
                    planned.has_caption.then_some("Caption"),
                    planned.has_location.then_some("location"),
                ]
                .into_iter()
                .flatten()
                .collect();
                if !extras.is_empty() {
                    lines.push(format!("    {}", extras.join(", ")));
                }
            }
            Err(failure) => {
                lines.push(format!(
                    "{} error ({}): {}",
                    format_index(i + 1),
                    failure.kind,
                    failure.message
                ));
            }
        }
    }

    lines
}

pub fn print_check_output(report: &CheckReport) {
    for line in format_check_output(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_taken_at;
    use crate::pipeline::{EntryFailure, FailureKind, PlannedEntry};
    use std::path::PathBuf;

    const TS: &str = "2024-07-14 09:30:05,123";

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn plain_info_line() {
        let event = PipelineEvent::Converted {
            source: PathBuf::from("in/a.webp"),
            output: PathBuf::from("out/a.jpg"),
        };
        assert_eq!(
            format_event(&event, TS, Palette::Plain),
            "2024-07-14 09:30:05,123 - INFO - Converted in/a.webp to JPEG output=out/a.jpg"
        );
    }

    #[test]
    fn error_line_carries_kind_and_entry() {
        let event = PipelineEvent::EntryFailed {
            index: 1,
            kind: FailureKind::NotFound,
            reason: "source image not found: x.jpg".into(),
            entry: r#"{"a":1}"#.into(),
        };
        let line = format_event(&event, TS, Palette::Plain);
        assert!(line.starts_with("2024-07-14 09:30:05,123 - ERROR - Error processing entry #2"));
        assert!(line.ends_with(r#"kind=not-found entry={"a":1}"#));
    }

    #[test]
    fn ansi_colors_by_level() {
        let info = PipelineEvent::Combined {
            output: PathBuf::from("c.jpg"),
        };
        let error = PipelineEvent::BackupFailed {
            path: PathBuf::from("x~"),
            reason: "denied".into(),
        };
        let done = PipelineEvent::Finished {
            entries: 1,
            failed: 0,
        };

        assert!(format_event(&info, TS, Palette::Ansi).starts_with(GREEN));
        assert!(format_event(&error, TS, Palette::Ansi).starts_with(RED));
        let done_line = format_event(&done, TS, Palette::Ansi);
        assert!(done_line.starts_with(BLUE_BOLD));
        assert!(done_line.ends_with(RESET));
        assert!(done_line.contains(" - INFO - Finished processing 1 entries"));
    }

    #[test]
    fn plain_has_no_escape_codes() {
        let event = PipelineEvent::Finished {
            entries: 0,
            failed: 0,
        };
        assert!(!format_event(&event, TS, Palette::Plain).contains('\x1b'));
    }

    #[test]
    fn completion_line_has_no_failure_count() {
        let event = PipelineEvent::Finished {
            entries: 2,
            failed: 1,
        };
        assert_eq!(
            format_event(&event, TS, Palette::Plain),
            "2024-07-14 09:30:05,123 - INFO - Finished processing 2 entries"
        );
    }

    #[test]
    fn detect_honors_flag() {
        assert_eq!(Palette::detect(true), Palette::Plain);
    }

    #[test]
    fn check_output_lists_entries() {
        let report = CheckReport {
            manifest: PathBuf::from("posts.json"),
            webp_files: 1,
            entries: vec![
                Ok(PlannedEntry {
                    index: 0,
                    taken_at: parse_taken_at("2024-07-14T09:30:05.000Z").unwrap(),
                    primary: PathBuf::from("post/front.webp"),
                    primary_exists: true,
                    secondary: PathBuf::from("post/back.jpg"),
                    secondary_exists: false,
                    combined_name: "20240714_093005_combined.jpg".into(),
                    has_caption: true,
                    has_location: false,
                }),
                Err(EntryFailure {
                    index: 1,
                    kind: FailureKind::Parse,
                    message: "malformed entry: missing field `takenAt`".into(),
                }),
            ],
        };

        let lines = format_check_output(&report);
        assert_eq!(
            lines,
            vec![
                "Manifest posts.json (1 WEBP files in input)",
                "001 2024-07-14 09:30:05 \u{2192} 20240714_093005_combined.jpg",
                "    Primary: post/front.webp",
                "    Secondary: post/back.jpg (missing)",
                "    Caption",
                "002 error (parse): malformed entry: missing field `takenAt`",
            ]
        );
    }
}
