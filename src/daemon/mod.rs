//! Daemon lifecycle.
//!
//! Wires the notifier, event handler and staging pool together, runs until
//! the event stream ends or a shutdown signal arrives, then drains queued
//! pre-stage work before returning.

mod observability;

use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use observability::init_tracing;

use crate::config::Config;
#[cfg(unix)]
use crate::sink::SyslogSink;
use crate::sink::{LogSink, SinkKind, TracingSink};
use crate::staging::{PreStager, StagingPool};
use crate::watcher::{run_notifier, EventHandler, HandlerSummary, NotifierCommand};
use crate::{Error, Result};

/// Raw events buffered between the notifier and the dispatcher.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Build the sink selected by configuration.
///
/// # Errors
///
/// Returns an error if the syslog socket cannot be created, or if the
/// syslog sink is selected on a host without Unix sockets.
pub fn build_sink(kind: SinkKind) -> Result<Arc<dyn LogSink>> {
    let sink: Arc<dyn LogSink> = match kind {
        #[cfg(unix)]
        SinkKind::Syslog => Arc::new(SyslogSink::new()?),
        #[cfg(not(unix))]
        SinkKind::Syslog => {
            return Err(Error::config("syslog sink requires a Unix host"));
        }
        SinkKind::Tracing => Arc::new(TracingSink),
    };
    Ok(sink)
}

/// The watcher daemon.
pub struct Daemon {
    config: Config,
    sink: Arc<dyn LogSink>,
    command: Option<NotifierCommand>,
}

impl Daemon {
    #[must_use]
    pub fn new(config: Config, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            sink,
            command: None,
        }
    }

    /// Replace the default `inotifywait` invocation.
    #[must_use]
    pub fn with_notifier(mut self, command: NotifierCommand) -> Self {
        self.command = Some(command);
        self
    }

    /// Run until the notifier stops or SIGINT/SIGTERM is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the notifier
    /// cannot be started.
    pub async fn run(self) -> Result<HandlerSummary> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until the notifier stops or `stop` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the notifier
    /// cannot be started.
    pub async fn run_until(
        self,
        stop: impl Future<Output = ()> + Send + 'static,
    ) -> Result<HandlerSummary> {
        let Self {
            config,
            sink,
            command,
        } = self;

        config.validate()?;
        let root = config.watch_root.clone();

        let pool = StagingPool::new(
            PreStager::new(config.stage_limits()),
            config.pool_config(),
        )?;
        let handler = EventHandler::new(sink, config.facility()?, config.message_style, pool);

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let dispatcher = tokio::task::spawn_blocking(move || {
            handler.run(event_rx);
            handler.shutdown()
        });

        let shutdown = CancellationToken::new();
        let stop_token = shutdown.clone();
        let stop_task = tokio::spawn(async move {
            stop.await;
            stop_token.cancel();
        });

        tracing::info!(path = %root.display(), "Watching {}", root.display());

        let command = command.unwrap_or_else(|| NotifierCommand::inotifywait(&root));
        let result = run_notifier(command, config.restart, event_tx, shutdown).await;
        stop_task.abort();

        let summary = dispatcher
            .await
            .map_err(|e| Error::internal(format!("dispatcher task failed: {e}")))?;

        tracing::info!(
            events = summary.events.events_received,
            moved_in = summary.events.moved_in,
            staged = summary.staging.files_staged,
            staging_errors = summary.staging.errors,
            "Watcher terminated"
        );

        result.map(|()| summary)
    }
}

/// Wait for SIGTERM or Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = Config {
            workers: 0,
            ..Config::default()
        };
        let daemon = Daemon::new(config, Arc::new(MemorySink::new()));
        assert!(daemon.run_until(std::future::pending()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_notifier_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            watch_root: tmp.path().to_path_buf(),
            ..Config::default()
        };
        let daemon = Daemon::new(config, Arc::new(MemorySink::new()))
            .with_notifier(NotifierCommand::custom("/nonexistent/inotifywait", ["-m"]));

        let err = daemon.run_until(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, Error::Notifier(_)));
    }

    #[tokio::test]
    async fn test_stop_request_ends_notifier() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            watch_root: tmp.path().to_path_buf(),
            ..Config::default()
        };
        let daemon = Daemon::new(config, Arc::new(MemorySink::new()))
            .with_notifier(NotifierCommand::custom("sleep", ["30"]));

        let summary = daemon
            .run_until(tokio::time::sleep(std::time::Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(summary.events.events_received, 0);
        assert_eq!(summary.staging.jobs_submitted, 0);
    }

    #[test]
    fn test_build_tracing_sink() {
        assert!(build_sink(SinkKind::Tracing).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_build_syslog_sink() {
        assert!(build_sink(SinkKind::Syslog).is_ok());
    }

    #[cfg(not(unix))]
    #[test]
    fn test_syslog_sink_rejected_off_unix() {
        let err = build_sink(SinkKind::Syslog).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
