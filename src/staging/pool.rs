//! Staging worker pool.
//!
//! Runs pre-stage walks on dedicated threads so the dispatch loop keeps
//! draining notifier events while a large tree is processed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};

use super::prestager::PreStager;
use crate::error::StagingError;
use crate::Result;

/// Default number of staging threads.
pub const DEFAULT_WORKERS: usize = 2;

/// Default capacity of the pending job queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A moved-in entry waiting to be pre-staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageJob {
    pub directory: PathBuf,
    pub name: String,
}

/// Pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Pending jobs allowed before `submit` blocks.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Counters across all staging workers.
#[derive(Debug, Default)]
pub struct StagingStats {
    pub jobs_submitted: AtomicU64,
    pub walks_completed: AtomicU64,
    pub files_staged: AtomicU64,
    pub files_skipped: AtomicU64,
    pub errors: AtomicU64,
}

impl StagingStats {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> StagingStatsSnapshot {
        StagingStatsSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            walks_completed: self.walks_completed.load(Ordering::Relaxed),
            files_staged: self.files_staged.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of staging stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingStatsSnapshot {
    pub jobs_submitted: u64,
    pub walks_completed: u64,
    pub files_staged: u64,
    pub files_skipped: u64,
    pub errors: u64,
}

/// Bounded queue of pre-stage jobs served by a fixed set of threads.
pub struct StagingPool {
    job_tx: Option<Sender<StageJob>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<StagingStats>,
}

impl StagingPool {
    /// Start the worker threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is empty or a thread cannot be spawned.
    pub fn new(stager: PreStager, config: PoolConfig) -> Result<Self> {
        if config.workers == 0 || config.queue_capacity == 0 {
            return Err(StagingError::Pool(
                "workers and queue capacity must be non-zero".to_string(),
            )
            .into());
        }

        let (job_tx, job_rx) = bounded(config.queue_capacity);
        let stager = Arc::new(stager);
        let stats = StagingStats::new();
        let mut workers = Vec::with_capacity(config.workers);

        for i in 0..config.workers {
            let rx = job_rx.clone();
            let stager = Arc::clone(&stager);
            let stats = Arc::clone(&stats);

            let handle = std::thread::Builder::new()
                .name(format!("staging-worker-{i}"))
                .spawn(move || worker_loop(&stager, &rx, &stats))
                .map_err(|e| StagingError::Pool(format!("failed to spawn worker: {e}")))?;

            workers.push(handle);
        }

        tracing::info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Staging pool started"
        );

        Ok(Self {
            job_tx: Some(job_tx),
            workers,
            stats,
        })
    }

    /// Queue a job, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool has shut down.
    pub fn submit(&self, job: StageJob) -> Result<()> {
        let tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| StagingError::Pool("pool closed".to_string()))?;

        tx.send(job)
            .map_err(|_| StagingError::Pool("all workers exited".to_string()))?;
        self.stats.jobs_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Get current stats.
    #[must_use]
    pub fn stats(&self) -> Arc<StagingStats> {
        Arc::clone(&self.stats)
    }

    /// Stop accepting jobs, finish queued work and join the workers.
    pub fn shutdown(mut self) -> StagingStatsSnapshot {
        self.close();
        self.stats.snapshot()
    }

    fn close(&mut self) {
        if self.job_tx.take().is_none() {
            return;
        }

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Staging worker panicked");
            }
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            walks = snapshot.walks_completed,
            staged = snapshot.files_staged,
            errors = snapshot.errors,
            "Staging pool drained"
        );
    }
}

impl Drop for StagingPool {
    fn drop(&mut self) {
        self.close();
    }
}

/// Worker loop: process jobs until the queue is closed and empty.
fn worker_loop(stager: &PreStager, job_rx: &Receiver<StageJob>, stats: &StagingStats) {
    while let Ok(job) = job_rx.recv() {
        let report = stager.pre_stage(&job.directory, &job.name);

        stats.walks_completed.fetch_add(1, Ordering::Relaxed);
        stats
            .files_staged
            .fetch_add(report.staged as u64, Ordering::Relaxed);
        stats
            .files_skipped
            .fetch_add(report.skipped as u64, Ordering::Relaxed);
        stats
            .errors
            .fetch_add(report.errors as u64, Ordering::Relaxed);
    }

    tracing::debug!("Staging worker shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_pool_rejects_zero_workers() {
        let config = PoolConfig {
            workers: 0,
            ..PoolConfig::default()
        };
        assert!(StagingPool::new(PreStager::default(), config).is_err());
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let tmp = TempDir::new().unwrap();
        for i in 0..10 {
            let dir = tmp.path().join(format!("d{i}"));
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("f.txt"), "x").unwrap();
        }

        let pool = StagingPool::new(
            PreStager::default(),
            PoolConfig {
                workers: 2,
                queue_capacity: 2,
            },
        )
        .unwrap();

        for i in 0..10 {
            pool.submit(StageJob {
                directory: tmp.path().to_path_buf(),
                name: format!("d{i}"),
            })
            .unwrap();
        }

        let snapshot = pool.shutdown();
        assert_eq!(snapshot.jobs_submitted, 10);
        assert_eq!(snapshot.walks_completed, 10);
        assert_eq!(snapshot.files_staged, 10);

        for i in 0..10 {
            let file = tmp.path().join(format!("d{i}")).join("f.txt");
            assert_eq!(fs::read_to_string(file).unwrap(), "x\nPRE-STAGED\n");
        }
    }

    #[test]
    fn test_same_directory_queued_twice() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("incoming");
        fs::create_dir(&dir).unwrap();
        for i in 0..20 {
            fs::write(dir.join(format!("f{i}.txt")), "").unwrap();
        }

        let pool = StagingPool::new(
            PreStager::default(),
            PoolConfig {
                workers: 4,
                queue_capacity: 8,
            },
        )
        .unwrap();

        for _ in 0..2 {
            pool.submit(StageJob {
                directory: tmp.path().to_path_buf(),
                name: "incoming".to_string(),
            })
            .unwrap();
        }
        pool.shutdown();

        for i in 0..20 {
            let content = fs::read_to_string(dir.join(format!("f{i}.txt"))).unwrap();
            assert_eq!(content, "PRE-STAGED\nPRE-STAGED\n");
            let status = fs::read_to_string(dir.join(format!(".f{i}.txtstatus"))).unwrap();
            assert_eq!(status.lines().count(), 2);
        }
    }
}
