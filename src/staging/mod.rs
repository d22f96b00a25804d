//! Pre-staging of moved-in trees.
//!
//! This module provides:
//! - The recursive pre-stage walk
//! - Status dotfile tracking
//! - A bounded worker pool with per-file locking

mod locks;
mod pool;
mod prestager;
mod status;

pub use locks::PathLocks;
pub use pool::{
    PoolConfig, StageJob, StagingPool, StagingStats, StagingStatsSnapshot, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_WORKERS,
};
pub use prestager::{
    PreStageReport, PreStager, StageLimits, StagedFile, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILES,
    MARKER,
};
pub use status::{
    is_status_file, record_status, status_line, status_path_for, STATUS_SUFFIX, TIMESTAMP_FORMAT,
};
