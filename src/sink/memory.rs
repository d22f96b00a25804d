//! In-memory sink, used by tests and dry runs.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{Facility, LogSink};
use crate::error::SinkError;

/// A record captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub tag: String,
    pub facility: &'static str,
    pub message: String,
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all records emitted so far.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Messages emitted so far, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, message: &str, facility: &Facility) -> Result<(), SinkError> {
        self.records.lock().push(Record {
            tag: facility.tag().to_string(),
            facility: facility.name(),
            message: message.to_string(),
        });
        Ok(())
    }
}
