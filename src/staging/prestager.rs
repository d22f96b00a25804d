//! Pre-staging of trees moved into the watched directory.
//!
//! Every regular file under a moved-in directory gets a `PRE-STAGED` line
//! appended and a status dotfile written next to it. A moved-in plain file
//! is left untouched. Failures on individual files are logged and skipped so
//! a single bad entry never stops the pass.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use walkdir::WalkDir;

use super::locks::PathLocks;
use super::status::{is_status_file, record_status};
use crate::error::StagingError;

/// Line appended to every pre-staged file.
pub const MARKER: &str = "PRE-STAGED\n";

/// Default maximum recursion depth below the moved-in directory.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default cap on files processed per walk.
pub const DEFAULT_MAX_FILES: usize = 100_000;

/// Bounds on a single pre-stage walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageLimits {
    /// Maximum depth below the walk root.
    pub max_depth: usize,
    /// Maximum number of files staged in one walk.
    pub max_files: usize,
}

impl Default for StageLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

/// A file that has been pre-staged.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub status_path: PathBuf,
    pub staged_at: DateTime<Local>,
}

/// Outcome of one pre-stage pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreStageReport {
    /// Path that was moved in.
    pub root: PathBuf,
    /// Files marked and recorded.
    pub staged: usize,
    /// Entries skipped (symlinks, status dotfiles).
    pub skipped: usize,
    /// Entries that failed with an I/O error.
    pub errors: usize,
    /// Whether the walk stopped at the file cap.
    pub truncated: bool,
}

/// Walks moved-in trees and marks their files.
#[derive(Debug, Clone)]
pub struct PreStager {
    limits: StageLimits,
    locks: Arc<PathLocks>,
}

impl Default for PreStager {
    fn default() -> Self {
        Self::new(StageLimits::default())
    }
}

impl PreStager {
    #[must_use]
    pub fn new(limits: StageLimits) -> Self {
        Self::with_locks(limits, PathLocks::new())
    }

    /// Create a stager sharing an existing lock set.
    #[must_use]
    pub fn with_locks(limits: StageLimits, locks: Arc<PathLocks>) -> Self {
        Self { limits, locks }
    }

    #[must_use]
    pub const fn limits(&self) -> StageLimits {
        self.limits
    }

    /// Pre-stage `directory/name`, the target of a moved-in event.
    ///
    /// Only directories are processed; any other entry is a no-op.
    pub fn pre_stage(&self, directory: &Path, name: &str) -> PreStageReport {
        let fullpath = directory.join(name);

        match fullpath.symlink_metadata() {
            Ok(meta) if meta.file_type().is_symlink() => {
                tracing::warn!(path = %fullpath.display(), "Skipping symlink moved into tree");
                PreStageReport {
                    root: fullpath,
                    skipped: 1,
                    ..PreStageReport::default()
                }
            }
            Ok(meta) if meta.is_dir() => self.stage_tree(&fullpath),
            Ok(_) => {
                tracing::debug!(path = %fullpath.display(), "Moved-in file, nothing to pre-stage");
                PreStageReport {
                    root: fullpath,
                    ..PreStageReport::default()
                }
            }
            Err(e) => {
                tracing::warn!(path = %fullpath.display(), error = %e, "Moved-in entry unavailable");
                PreStageReport {
                    root: fullpath,
                    errors: 1,
                    ..PreStageReport::default()
                }
            }
        }
    }

    /// Pre-stage every regular file beneath `root`.
    pub fn stage_tree(&self, root: &Path) -> PreStageReport {
        let mut report = PreStageReport {
            root: root.to_path_buf(),
            ..PreStageReport::default()
        };

        let files = self.collect_files(root, &mut report);
        self.stage_collected(&files, &mut report);

        tracing::info!(
            path = %root.display(),
            staged = report.staged,
            skipped = report.skipped,
            errors = report.errors,
            truncated = report.truncated,
            "Pre-stage pass complete"
        );

        report
    }

    /// Pre-stage an already collected list of files under `root`.
    ///
    /// A file that fails is counted and skipped; the rest are still staged.
    pub fn stage_files(&self, root: &Path, files: &[PathBuf]) -> PreStageReport {
        let mut report = PreStageReport {
            root: root.to_path_buf(),
            ..PreStageReport::default()
        };
        self.stage_collected(files, &mut report);
        report
    }

    fn stage_collected(&self, files: &[PathBuf], report: &mut PreStageReport) {
        for file in files {
            match self.stage_file(file) {
                Ok(staged) => {
                    tracing::debug!(
                        path = %staged.path.display(),
                        status = %staged.status_path.display(),
                        "Pre-staged file"
                    );
                    report.staged += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping file");
                    report.errors += 1;
                }
            }
        }
    }

    /// Append the marker to `file` and record its status.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for append (including
    /// when it no longer exists) or the status cannot be written.
    pub fn stage_file(&self, file: &Path) -> Result<StagedFile, StagingError> {
        self.locks.with_lock(file, || -> Result<StagedFile, StagingError> {
            append_marker(file).map_err(|e| StagingError::file(file, &e))?;

            let staged_at = Local::now();
            let status_path = record_status(file, &staged_at)?;

            Ok(StagedFile {
                path: file.to_path_buf(),
                status_path,
                staged_at,
            })
        })
    }

    /// List the files to stage before touching anything, so status dotfiles
    /// written during the pass are never picked up.
    fn collect_files(&self, root: &Path, report: &mut PreStageReport) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .max_depth(self.limits.max_depth);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Error walking moved-in tree");
                    report.errors += 1;
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }

            if file_type.is_symlink() {
                tracing::warn!(path = %entry.path().display(), "Skipping symlink");
                report.skipped += 1;
                continue;
            }

            if !file_type.is_file() || is_status_file(entry.path()) {
                report.skipped += 1;
                continue;
            }

            if files.len() >= self.limits.max_files {
                tracing::warn!(
                    path = %root.display(),
                    max_files = self.limits.max_files,
                    "File cap reached, remaining files left unstaged"
                );
                report.truncated = true;
                break;
            }

            files.push(entry.into_path());
        }

        files
    }
}

/// Append [`MARKER`] as its own line, terminating an unfinished last line first.
fn append_marker(file: &Path) -> std::io::Result<()> {
    let mut handle = OpenOptions::new().read(true).append(true).open(file)?;

    if handle.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        handle.seek(SeekFrom::End(-1))?;
        handle.read_exact(&mut last)?;
        if last[0] != b'\n' {
            handle.write_all(b"\n")?;
        }
    }

    handle.write_all(MARKER.as_bytes())
}
