//! watchfilesd - directory-tree watcher daemon
//!
//! Entry point for the daemon.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;

use clap::Parser;
use watchfilesd::config::{install_dir, resolve_watch_root, restart_policy};
use watchfilesd::daemon::{build_sink, init_tracing, Daemon};
use watchfilesd::{Config, Result};

/// watchfilesd - log changes under a directory tree and pre-stage moved-in trees
#[derive(Parser, Debug)]
#[command(name = "watchfilesd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subdirectory to watch, relative to the program's install directory
    subdir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "WATCHFILESD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "WATCHFILESD_LOG_JSON")]
    log_json: bool,

    /// Where event records go (syslog, tracing)
    #[arg(long, env = "WATCHFILESD_SINK", default_value = "syslog")]
    sink: String,

    /// Identity tag on event records
    #[arg(long, env = "WATCHFILESD_TAG", default_value = "watchfilesd")]
    tag: String,

    /// Syslog facility for event records
    #[arg(long, env = "WATCHFILESD_FACILITY", default_value = "local0")]
    facility: String,

    /// Rendering of modified/created records (legacy, joined)
    #[arg(long, env = "WATCHFILESD_MESSAGE_STYLE", default_value = "legacy")]
    message_style: String,

    /// Number of pre-staging worker threads
    #[arg(long, env = "WATCHFILESD_WORKERS", default_value = "2")]
    workers: usize,

    /// Pending pre-stage jobs before event dispatch blocks
    #[arg(long, env = "WATCHFILESD_QUEUE_CAPACITY", default_value = "256")]
    queue_capacity: usize,

    /// Maximum directory depth of a pre-stage walk
    #[arg(long, env = "WATCHFILESD_MAX_DEPTH", default_value = "64")]
    max_depth: usize,

    /// Maximum files processed per pre-stage walk
    #[arg(long, env = "WATCHFILESD_MAX_FILES", default_value = "100000")]
    max_files: usize,

    /// Exit when the notifier exits instead of restarting it
    #[arg(long, env = "WATCHFILESD_NO_RESTART")]
    no_restart: bool,

    /// Give up after this many consecutive notifier restarts
    #[arg(long, env = "WATCHFILESD_MAX_RESTARTS")]
    max_restarts: Option<u32>,

    /// Initial notifier restart delay in milliseconds
    #[arg(long, env = "WATCHFILESD_RESTART_BACKOFF_MS", default_value = "1000")]
    restart_backoff_ms: u64,

    /// Maximum notifier restart delay in milliseconds
    #[arg(long, env = "WATCHFILESD_RESTART_BACKOFF_MAX_MS", default_value = "60000")]
    restart_backoff_max_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    tracing::info!("watchfilesd v{} starting...", env!("CARGO_PKG_VERSION"));

    let base = install_dir()?;
    let watch_root = resolve_watch_root(&base, cli.subdir.as_deref());

    let config = Config {
        watch_root,
        log_level: cli.log_level,
        sink: cli.sink.parse()?,
        tag: cli.tag,
        facility: cli.facility,
        message_style: cli.message_style.parse()?,
        workers: cli.workers,
        queue_capacity: cli.queue_capacity,
        max_depth: cli.max_depth,
        max_files: cli.max_files,
        restart: restart_policy(
            !cli.no_restart,
            cli.max_restarts,
            cli.restart_backoff_ms,
            cli.restart_backoff_max_ms,
        ),
    };

    tracing::debug!(?config, "Configuration loaded");

    config.validate()?;

    let sink = build_sink(config.sink)?;
    Daemon::new(config, sink).run().await?;

    Ok(())
}
