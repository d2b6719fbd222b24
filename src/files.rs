//! Filesystem helpers shared by the pipeline.
//!
//! Output paths are never overwritten: [`unique_path`] probes `name_1.ext`,
//! `name_2.ext`, … until it finds a free slot. The check is best effort; the
//! probe and the later write are separate syscalls, so two processes racing
//! on the same folder can still collide. recap is meant to be run once at a
//! time against a given output tree.

use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Suffix that marks editor/tool backup files (`photo.jpg~`).
pub const BACKUP_SUFFIX: char = '~';

/// Return `candidate` if nothing exists there, otherwise the first
/// `stem_N.ext` (N starting at 1) that does not exist.
///
/// The counter is unbounded. It only stops once a free name is found, which
/// in practice happens after as many probes as there are existing
/// collisions.
pub fn unique_path(candidate: &Path) -> PathBuf {
    if !candidate.exists() {
        return candidate.to_path_buf();
    }

    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter: u64 = 1;
    loop {
        let probe = candidate.with_file_name(format!("{stem}_{counter}{ext}"));
        if !probe.exists() {
            return probe;
        }
        counter += 1;
    }
}

/// Immediate (non-recursive) files in `folder`.
fn immediate_files(folder: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .map(|e| e.into_path())
}

/// Count immediate entries in `folder` whose extension matches `extension`
/// (case-insensitive, without the leading dot). A missing folder counts 0.
pub fn count_by_extension(folder: &Path, extension: &str) -> usize {
    immediate_files(folder)
        .filter(|p| has_extension(p, extension))
        .count()
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Outcome of a backup purge over one directory.
#[derive(Debug, Default)]
pub struct PurgeReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

/// Delete every immediate entry of `directory` whose name ends with `~`.
///
/// A failed deletion is recorded and the sweep moves on to the next file.
pub fn purge_backup_files(directory: &Path) -> PurgeReport {
    let mut report = PurgeReport::default();

    let backups = immediate_files(directory).filter(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(BACKUP_SUFFIX))
    });

    for backup in backups {
        match fs::remove_file(&backup) {
            Ok(()) => report.removed.push(backup),
            Err(e) => report.failed.push((backup, e)),
        }
    }

    report
}

/// Create `dir` and any missing parents. No error if it already exists.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Copy `src` to `dst`, carrying over permissions and access/modification
/// times.
pub fn copy_preserving(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst)?;

    let meta = fs::metadata(src)?;
    let mut times = FileTimes::new().set_modified(meta.modified()?);
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    File::options().write(true).open(dst)?.set_times(times)
}

/// Move `src` to `dst`. Falls back to copy + delete when a plain rename is
/// refused (e.g. across filesystems).
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_preserving(src, dst)?;
            fs::remove_file(src)
        }
    }
}
