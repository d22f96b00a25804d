//! Configuration settings and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sink::{Facility, SinkKind, DEFAULT_TAG};
use crate::staging::{
    PoolConfig, StageLimits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILES, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_WORKERS,
};
use crate::watcher::{MessageStyle, RestartPolicy};
use crate::{Error, Result};

/// Main configuration for the daemon.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the watched tree.
    pub watch_root: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Destination of event records.
    pub sink: SinkKind,

    /// Identity tag on every record.
    pub tag: String,

    /// Syslog facility name.
    pub facility: String,

    /// Rendering of `Modified`/`Created` records.
    pub message_style: MessageStyle,

    /// Staging worker threads.
    pub workers: usize,

    /// Pending pre-stage jobs before dispatch blocks.
    pub queue_capacity: usize,

    /// Maximum depth of a pre-stage walk.
    pub max_depth: usize,

    /// Maximum files per pre-stage walk.
    pub max_files: usize,

    /// Notifier restart policy.
    pub restart: RestartPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_root: PathBuf::from("."),
            log_level: "info".to_string(),
            sink: SinkKind::default(),
            tag: DEFAULT_TAG.to_string(),
            facility: "local0".to_string(),
            message_style: MessageStyle::default(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            max_files: DEFAULT_MAX_FILES,
            restart: RestartPolicy::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.tag.is_empty() {
            return Err(Error::config("tag cannot be empty"));
        }

        self.facility()?;

        if self.workers == 0 {
            return Err(Error::config("workers cannot be 0"));
        }

        if self.workers > 64 {
            return Err(Error::config("workers cannot exceed 64"));
        }

        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity cannot be 0"));
        }

        if self.max_depth == 0 {
            return Err(Error::config("max_depth cannot be 0"));
        }

        if self.max_files == 0 {
            return Err(Error::config("max_files cannot be 0"));
        }

        if self.restart.initial_backoff.is_zero() {
            return Err(Error::config("restart backoff cannot be 0"));
        }

        if self.restart.initial_backoff > self.restart.max_backoff {
            return Err(Error::config(
                "restart backoff cannot exceed the maximum backoff",
            ));
        }

        Ok(())
    }

    /// Record identity built from `tag` and `facility`.
    ///
    /// # Errors
    ///
    /// Returns an error if the facility name is unknown.
    pub fn facility(&self) -> Result<Facility> {
        Ok(Facility::new(self.tag.clone(), &self.facility)?)
    }

    /// Limits for a single pre-stage walk.
    #[must_use]
    pub const fn stage_limits(&self) -> StageLimits {
        StageLimits {
            max_depth: self.max_depth,
            max_files: self.max_files,
        }
    }

    /// Staging pool sizing.
    #[must_use]
    pub const fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }
}

/// Directory containing the running executable.
///
/// # Errors
///
/// Returns an error if the executable path cannot be determined.
pub fn install_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::internal(format!("{} has no parent", exe.display())))
}

/// Resolve the directory to watch.
///
/// `subdir` is taken relative to `install_dir`. When it is absent or does not
/// name an existing directory, `install_dir` itself is watched.
#[must_use]
pub fn resolve_watch_root(install_dir: &Path, subdir: Option<&Path>) -> PathBuf {
    let Some(subdir) = subdir else {
        return install_dir.to_path_buf();
    };

    let candidate = install_dir.join(subdir);
    if candidate.is_dir() {
        candidate
    } else {
        tracing::warn!(
            requested = %candidate.display(),
            fallback = %install_dir.display(),
            "Watch directory not found, falling back"
        );
        install_dir.to_path_buf()
    }
}

/// Backoff helper for building a policy from milliseconds.
#[must_use]
pub fn restart_policy(
    enabled: bool,
    max_restarts: Option<u32>,
    initial_ms: u64,
    max_ms: u64,
) -> RestartPolicy {
    RestartPolicy {
        enabled,
        max_restarts,
        initial_backoff: Duration::from_millis(initial_ms),
        max_backoff: Duration::from_millis(max_ms),
    }
}
