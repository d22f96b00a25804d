//! Syslog sink writing RFC 3164 datagrams to the local log socket.

use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use chrono::Local;

use super::{Facility, LogSink};
use crate::error::SinkError;

/// Local syslog socket.
pub const DEFAULT_SOCKET: &str = "/dev/log";

/// Sink that sends each record to the system log, tagged with the process id.
#[derive(Debug)]
pub struct SyslogSink {
    socket: UnixDatagram,
    path: PathBuf,
    pid: u32,
}

impl SyslogSink {
    /// Create a sink targeting `/dev/log`.
    ///
    /// # Errors
    ///
    /// Returns an error if the local socket cannot be created.
    pub fn new() -> Result<Self, SinkError> {
        Self::with_socket(DEFAULT_SOCKET)
    }

    /// Create a sink targeting a specific datagram socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the local socket cannot be created.
    pub fn with_socket(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let socket = UnixDatagram::unbound().map_err(|e| SinkError::Delivery {
            target: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            socket,
            path,
            pid: std::process::id(),
        })
    }

    fn format(&self, message: &str, facility: &Facility) -> String {
        format!(
            "<{}>{} {}[{}]: {}",
            facility.priority(),
            Local::now().format("%b %e %H:%M:%S"),
            facility.tag(),
            self.pid,
            message
        )
    }
}

impl LogSink for SyslogSink {
    fn emit(&self, message: &str, facility: &Facility) -> Result<(), SinkError> {
        let record = self.format(message, facility);
        self.socket
            .send_to(record.as_bytes(), &self.path)
            .map_err(|e| SinkError::Delivery {
                target: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
