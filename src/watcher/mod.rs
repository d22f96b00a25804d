//! Directory-tree watching.
//!
//! This module provides:
//! - Raw event parsing and classification
//! - The `inotifywait` notifier with supervised restarts
//! - The event handler dispatching to the log sink and staging pool

mod events;
mod handler;
mod notifier;

pub use events::{classify, EventKind, MessageStyle, RawEvent, SemanticEvent};
pub use handler::{EventHandler, HandlerSummary, WatcherStats, WatcherStatsSnapshot};
pub use notifier::{
    parse_line, run_notifier, NotifierCommand, RestartPolicy, DEFAULT_PROGRAM, WATCHED_EVENTS,
};
