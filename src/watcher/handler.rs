//! Change event handler.
//!
//! Classifies each raw event, emits its record to the log sink and hands
//! moved-in entries to the staging pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::events::{classify, MessageStyle, RawEvent, SemanticEvent};
use crate::sink::{Facility, LogSink};
use crate::staging::{StageJob, StagingPool, StagingStatsSnapshot};

/// Statistics for event dispatch.
#[derive(Debug, Default)]
pub struct WatcherStats {
    pub events_received: AtomicU64,
    pub events_ignored: AtomicU64,
    pub removed: AtomicU64,
    pub modified: AtomicU64,
    pub created: AtomicU64,
    pub moved_in: AtomicU64,
    pub sink_errors: AtomicU64,
    pub submit_errors: AtomicU64,
}

impl WatcherStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            modified: self.modified.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            moved_in: self.moved_in.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            submit_errors: self.submit_errors.load(Ordering::Relaxed),
        }
    }

    fn count(&self, event: &SemanticEvent) {
        let counter = match event {
            SemanticEvent::Removed { .. } => &self.removed,
            SemanticEvent::Modified { .. } => &self.modified,
            SemanticEvent::Created { .. } => &self.created,
            SemanticEvent::MovedIn { .. } => &self.moved_in,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of watcher stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherStatsSnapshot {
    pub events_received: u64,
    pub events_ignored: u64,
    pub removed: u64,
    pub modified: u64,
    pub created: u64,
    pub moved_in: u64,
    pub sink_errors: u64,
    pub submit_errors: u64,
}

/// Final counters once the handler has drained.
#[derive(Debug, Clone, Copy)]
pub struct HandlerSummary {
    pub events: WatcherStatsSnapshot,
    pub staging: StagingStatsSnapshot,
}

/// Event handler that logs changes and queues pre-staging.
pub struct EventHandler {
    sink: Arc<dyn LogSink>,
    facility: Facility,
    style: MessageStyle,
    pool: StagingPool,
    stats: Arc<WatcherStats>,
}

impl EventHandler {
    /// Create a new event handler.
    #[must_use]
    pub fn new(
        sink: Arc<dyn LogSink>,
        facility: Facility,
        style: MessageStyle,
        pool: StagingPool,
    ) -> Self {
        Self {
            sink,
            facility,
            style,
            pool,
            stats: WatcherStats::new(),
        }
    }

    /// Handle one raw event. Returns the classified event, if any.
    ///
    /// Sink and queue failures are logged and counted, never returned.
    pub fn handle(&self, raw: &RawEvent) -> Option<SemanticEvent> {
        self.stats.events_received.fetch_add(1, Ordering::Relaxed);

        let Some(event) = classify(raw) else {
            tracing::trace!(kind = %raw.kind, name = %raw.name, "Ignoring event");
            self.stats.events_ignored.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        self.stats.count(&event);

        let message = event.message(self.style);
        if let Err(e) = self.sink.emit(&message, &self.facility) {
            tracing::warn!(error = %e, %message, "Failed to emit record");
            self.stats.sink_errors.fetch_add(1, Ordering::Relaxed);
        }

        if let SemanticEvent::MovedIn { directory, name } = &event {
            let job = StageJob {
                directory: directory.clone(),
                name: name.clone(),
            };
            if let Err(e) = self.pool.submit(job) {
                tracing::warn!(error = %e, name = %name, "Failed to queue pre-stage");
                self.stats.submit_errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        Some(event)
    }

    /// Handle events until the channel closes.
    ///
    /// Blocks the calling thread; run it on a blocking task.
    pub fn run(&self, mut events: mpsc::Receiver<RawEvent>) {
        while let Some(raw) = events.blocking_recv() {
            self.handle(&raw);
        }
        tracing::debug!("Event stream closed");
    }

    /// Get current stats.
    #[must_use]
    pub fn stats(&self) -> Arc<WatcherStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for queued pre-stage work and return the final counters.
    pub fn shutdown(self) -> HandlerSummary {
        let events = self.stats.snapshot();
        let staging = self.pool.shutdown();

        tracing::debug!(
            received = events.events_received,
            ignored = events.events_ignored,
            moved_in = events.moved_in,
            staged = staging.files_staged,
            "Handler shut down"
        );

        HandlerSummary { events, staging }
    }
}
