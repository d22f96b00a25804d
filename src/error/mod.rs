//! Error types and Result aliases for watchfilesd.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for watchfilesd operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Change notifier error.
    #[error("notifier error: {0}")]
    Notifier(#[from] NotifierError),

    /// Pre-staging error.
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),

    /// Log sink error.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised while running the external change notifier.
#[derive(Error, Debug)]
pub enum NotifierError {
    /// The notifier process could not be started.
    #[error("failed to launch '{program}': {reason}")]
    LaunchFailed { program: String, reason: String },

    /// The notifier process started without a readable stdout.
    #[error("notifier '{0}' has no stdout")]
    NoStdout(String),

    /// The restart policy gave up.
    #[error("notifier restarts exhausted after {0} attempts")]
    RestartsExhausted(u32),
}

/// Errors raised while pre-staging files.
#[derive(Error, Debug)]
pub enum StagingError {
    /// A single file could not be marked.
    #[error("failed to stage '{path}': {reason}")]
    FileFailed { path: String, reason: String },

    /// Status dotfile could not be written.
    #[error("failed to record status for '{path}': {reason}")]
    StatusFailed { path: String, reason: String },

    /// Worker pool error.
    #[error("staging pool error: {0}")]
    Pool(String),
}

/// Errors raised by a log sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Unknown syslog facility name.
    #[error("unknown syslog facility '{0}'")]
    UnknownFacility(String),

    /// Record could not be delivered.
    #[error("failed to deliver record to {target}: {reason}")]
    Delivery { target: String, reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl StagingError {
    /// Create a per-file staging error from an I/O failure.
    pub fn file(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::FileFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Create a status-record error from an I/O failure.
    pub fn status(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::StatusFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}
