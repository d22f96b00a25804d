//! Status dotfiles recording when a file was pre-staged.
//!
//! For a file `d/name` the record lives at `d/.namestatus`. Each pre-stage
//! pass appends one `<timestamp>: Pre-staged` line. Nothing is kept in
//! memory; the dotfile is the record.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::StagingError;

/// Timestamp layout used in status lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Suffix of every status line.
pub const STATUS_SUFFIX: &str = ": Pre-staged";

const STATUS_PREFIX: char = '.';
const STATUS_EXTENSION: &str = "status";

/// Path of the status dotfile for `file`.
///
/// Returns `None` if `file` has no file name.
#[must_use]
pub fn status_path_for(file: &Path) -> Option<PathBuf> {
    let name = file.file_name()?.to_string_lossy();
    let status_name = format!("{STATUS_PREFIX}{name}{STATUS_EXTENSION}");
    Some(file.with_file_name(status_name))
}

/// Whether `path` is the status dotfile of an existing sibling file.
#[must_use]
pub fn is_status_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    name.strip_prefix(STATUS_PREFIX)
        .and_then(|rest| rest.strip_suffix(STATUS_EXTENSION))
        .filter(|stem| !stem.is_empty())
        .is_some_and(|stem| path.with_file_name(stem).is_file())
}

/// Render a status line for the given time.
#[must_use]
pub fn status_line(when: &DateTime<Local>) -> String {
    format!("{}{STATUS_SUFFIX}\n", when.format(TIMESTAMP_FORMAT))
}

/// Append a status line for `file` and return the dotfile path.
///
/// # Errors
///
/// Returns an error if the dotfile cannot be opened or written.
pub fn record_status(file: &Path, when: &DateTime<Local>) -> Result<PathBuf, StagingError> {
    let status_path = status_path_for(file).ok_or_else(|| StagingError::StatusFailed {
        path: file.display().to_string(),
        reason: "path has no file name".to_string(),
    })?;

    let mut status = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&status_path)
        .map_err(|e| StagingError::status(&status_path, &e))?;

    status
        .write_all(status_line(when).as_bytes())
        .map_err(|e| StagingError::status(&status_path, &e))?;

    tracing::trace!(path = %status_path.display(), "Status recorded");
    Ok(status_path)
}
