//! Log sinks for semantic event records.
//!
//! Every recognized change event produces one text record that is handed to a
//! [`LogSink`] together with the daemon's [`Facility`] identity. The sink is
//! injected into the event handler so the system log can be swapped out.

mod memory;
#[cfg(unix)]
mod syslog;

use std::str::FromStr;

pub use memory::{MemorySink, Record};
#[cfg(unix)]
pub use syslog::{SyslogSink, DEFAULT_SOCKET};

use crate::error::SinkError;

/// Identity tag used when none is configured.
pub const DEFAULT_TAG: &str = "watchfilesd";

/// Syslog severity for informational records.
const SEVERITY_INFO: u8 = 6;

/// Syslog facility names and their codes.
const FACILITIES: &[(&str, u8)] = &[
    ("kern", 0),
    ("user", 1),
    ("mail", 2),
    ("daemon", 3),
    ("auth", 4),
    ("syslog", 5),
    ("lpr", 6),
    ("news", 7),
    ("uucp", 8),
    ("cron", 9),
    ("authpriv", 10),
    ("ftp", 11),
    ("local0", 16),
    ("local1", 17),
    ("local2", 18),
    ("local3", 19),
    ("local4", 20),
    ("local5", 21),
    ("local6", 22),
    ("local7", 23),
];

/// Identity attached to every emitted record: a tag and a syslog facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facility {
    tag: String,
    name: &'static str,
    code: u8,
}

impl Facility {
    /// Build a facility from a tag and a facility name such as `local0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the facility name is unknown.
    pub fn new(tag: impl Into<String>, facility: &str) -> Result<Self, SinkError> {
        let (name, code) = FACILITIES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(facility))
            .copied()
            .ok_or_else(|| SinkError::UnknownFacility(facility.to_string()))?;

        Ok(Self {
            tag: tag.into(),
            name,
            code,
        })
    }

    /// Identity tag, e.g. `watchfilesd`.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Facility name, e.g. `local0`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Syslog PRI value for an informational record.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        self.code * 8 + SEVERITY_INFO
    }
}

impl Default for Facility {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG.to_string(),
            name: "local0",
            code: 16,
        }
    }
}

/// Destination for formatted event records.
pub trait LogSink: Send + Sync {
    /// Emit one record under the given facility.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be delivered.
    fn emit(&self, message: &str, facility: &Facility) -> Result<(), SinkError>;
}

/// Sink that forwards records to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, message: &str, facility: &Facility) -> Result<(), SinkError> {
        tracing::info!(
            tag = facility.tag(),
            facility = facility.name(),
            "{message}"
        );
        Ok(())
    }
}

/// Which sink the daemon writes records to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    /// The system log via `/dev/log`.
    #[default]
    Syslog,
    /// The process's own tracing output.
    Tracing,
}

impl FromStr for SinkKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "syslog" => Ok(Self::Syslog),
            "tracing" | "stdout" => Ok(Self::Tracing),
            other => Err(crate::Error::config(format!(
                "invalid sink '{other}', must be one of: syslog, tracing"
            ))),
        }
    }
}
