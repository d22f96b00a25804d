//! External change notifier (`inotifywait`) and its supervisor.
//!
//! The notifier is a child process printing one line per change:
//! `<directory> <kind>[,<kind>...] <name>`. Lines are parsed into
//! [`RawEvent`]s and forwarded to the dispatcher. When the child exits it is
//! restarted with exponential backoff, unless restarts are disabled.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::events::RawEvent;
use crate::error::NotifierError;
use crate::Result;

/// Default notifier program.
pub const DEFAULT_PROGRAM: &str = "inotifywait";

/// Event categories the notifier is asked to report.
pub const WATCHED_EVENTS: &str = "modify,delete,create,moved_to";

/// Program and arguments used to launch the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl NotifierCommand {
    /// `inotifywait` monitoring `root` recursively for the four watched kinds.
    #[must_use]
    pub fn inotifywait(root: &Path) -> Self {
        Self {
            program: DEFAULT_PROGRAM.into(),
            args: vec![
                "-q".into(),
                "-m".into(),
                "-r".into(),
                "-e".into(),
                WATCHED_EVENTS.into(),
                root.as_os_str().to_owned(),
            ],
        }
    }

    /// Arbitrary program producing notifier-formatted lines.
    pub fn custom<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn spawn(&self) -> std::result::Result<Child, NotifierError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| NotifierError::LaunchFailed {
                program: self.program_name(),
                reason: e.to_string(),
            })
    }
}

/// Restart behaviour when the notifier exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Restart at all.
    pub enabled: bool,
    /// Give up after this many consecutive restarts. `None` retries forever.
    pub max_restarts: Option<u32>,
    /// Delay before the first restart.
    pub initial_backoff: Duration,
    /// Upper bound on the delay. A run lasting this long resets the count.
    pub max_backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_restarts: None,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RestartPolicy {
    /// Never restart; the watch loop ends with the notifier.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay before restart number `attempt` (1-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Parse one notifier output line.
///
/// `inotifywait` prints the directory with a trailing `/` and entry names
/// never contain one, so the directory runs up to the last `/` and may hold
/// spaces. Lines without a `/` fall back to splitting on whitespace. The
/// kind is the next field and the rest of the line is the entry name, so
/// names containing spaces are kept whole. Lines missing a field yield `None`.
#[must_use]
pub fn parse_line(line: &str) -> Option<RawEvent> {
    let line = line.trim_end_matches(['\r', '\n']);

    let (directory, rest) = match line.rfind('/') {
        Some(end) if line[end + 1..].starts_with(char::is_whitespace) => {
            let directory = line[..=end].trim_start();
            (directory, &line[end + 1..])
        }
        _ => next_field(line)?,
    };
    let (kind, rest) = next_field(rest)?;
    let name = rest.trim_start();

    if name.is_empty() {
        return None;
    }

    Some(RawEvent::new(directory, kind, name))
}

fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace)?;
    Some((&s[..end], &s[end..]))
}

/// Why a notifier run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    /// Shutdown was requested.
    Shutdown,
    /// The dispatcher is gone.
    ReceiverClosed,
    /// The child's output stream closed.
    StreamClosed,
}

/// Run the notifier until shutdown, restarting it per `policy`.
///
/// # Errors
///
/// Returns an error if the first launch fails or restarts are exhausted.
pub async fn run_notifier(
    command: NotifierCommand,
    policy: RestartPolicy,
    events: mpsc::Sender<RawEvent>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut attempt: u32 = 0;
    let mut started_once = false;

    loop {
        let started = Instant::now();

        match command.spawn() {
            Ok(child) => {
                started_once = true;
                tracing::info!(program = %command.program_name(), "Notifier listening");

                match pump(child, &events, &shutdown).await? {
                    RunEnd::Shutdown | RunEnd::ReceiverClosed => return Ok(()),
                    RunEnd::StreamClosed => {}
                }
            }
            Err(e) if !started_once => return Err(e.into()),
            Err(e) => tracing::warn!(error = %e, "Notifier restart failed"),
        }

        if !policy.enabled {
            tracing::info!("Notifier exited, restart disabled");
            return Ok(());
        }

        if started.elapsed() >= policy.max_backoff {
            attempt = 0;
        }
        attempt += 1;

        if policy.max_restarts.is_some_and(|max| attempt > max) {
            return Err(NotifierError::RestartsExhausted(attempt - 1).into());
        }

        let delay = policy.backoff_for(attempt);
        tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Restarting notifier");

        tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Forward parsed lines from one child until it exits or shutdown.
async fn pump(
    mut child: Child,
    events: &mpsc::Sender<RawEvent>,
    shutdown: &CancellationToken,
) -> Result<RunEnd> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| NotifierError::NoStdout(format!("pid {:?}", child.id())))?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::warn!(target: "notifier", "{line}");
            }
        });
    }

    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    let end = loop {
        buf.clear();
        tokio::select! {
            () = shutdown.cancelled() => break RunEnd::Shutdown,
            read = reader.read_until(b'\n', &mut buf) => match read {
                Ok(0) => break RunEnd::StreamClosed,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let Some(event) = parse_line(&line) else {
                        tracing::trace!(line = %line.trim_end(), "Ignoring malformed notifier line");
                        continue;
                    };
                    if events.send(event).await.is_err() {
                        break RunEnd::ReceiverClosed;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Notifier stream read failed");
                    break RunEnd::StreamClosed;
                }
            },
        }
    };

    if end != RunEnd::StreamClosed {
        let _ = child.start_kill();
    }

    match child.wait().await {
        Ok(status) => tracing::info!(%status, "Notifier exited"),
        Err(e) => tracing::warn!(error = %e, "Failed to reap notifier"),
    }

    Ok(end)
}
