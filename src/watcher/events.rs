//! Change event types and classification.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A raw change notification as reported by the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Directory containing the changed entry, as reported (usually with a trailing `/`).
    pub directory: PathBuf,
    /// Event kind token, possibly qualified, e.g. `CREATE,ISDIR`.
    pub kind: String,
    /// Name of the changed entry within `directory`.
    pub name: String,
}

impl RawEvent {
    pub fn new(directory: impl Into<PathBuf>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Recognized kind of this event, if any.
    #[must_use]
    pub fn event_kind(&self) -> Option<EventKind> {
        EventKind::from_token(&self.kind)
    }
}

/// Recognized raw event kinds, in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Modify,
    Create,
    Delete,
    MovedTo,
}

impl EventKind {
    /// All recognized kinds in the order they are matched.
    pub const ALL: [Self; 4] = [Self::Modify, Self::Create, Self::Delete, Self::MovedTo];

    /// Token prefix identifying this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Modify => "MODIFY",
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::MovedTo => "MOVED_TO",
        }
    }

    /// Match a kind token by prefix. Case-sensitive.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| token.starts_with(kind.prefix()))
    }
}

/// A classified change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticEvent {
    /// Entry was deleted.
    Removed { directory: PathBuf, name: String },
    /// File content was modified.
    Modified { directory: PathBuf, name: String },
    /// Entry was created.
    Created { directory: PathBuf, name: String },
    /// Entry was moved into the watched tree.
    MovedIn { directory: PathBuf, name: String },
}

impl SemanticEvent {
    /// Directory the event occurred in.
    #[must_use]
    pub fn directory(&self) -> &Path {
        match self {
            Self::Removed { directory, .. }
            | Self::Modified { directory, .. }
            | Self::Created { directory, .. }
            | Self::MovedIn { directory, .. } => directory,
        }
    }

    /// Name of the affected entry.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Removed { name, .. }
            | Self::Modified { name, .. }
            | Self::Created { name, .. }
            | Self::MovedIn { name, .. } => name,
        }
    }

    /// Whether this event triggers pre-staging.
    #[must_use]
    pub fn is_moved_in(&self) -> bool {
        matches!(self, Self::MovedIn { .. })
    }

    /// Human-readable log record for this event.
    #[must_use]
    pub fn message(&self, style: MessageStyle) -> String {
        let dir = self.directory().display();
        let name = self.name();
        match self {
            Self::Removed { .. } => format!("{name} was removed from {dir}"),
            Self::Modified { .. } => format!("The file {} was modified", style.file_path(self)),
            Self::Created { .. } => format!("The file {} was created", style.file_path(self)),
            Self::MovedIn { .. } => format!("{name} was moved to {dir}"),
        }
    }
}

/// How file paths are rendered in `Modified` and `Created` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageStyle {
    /// Directory and name concatenated as reported, e.g. `/data/a.txt` or `/dataa.txt`.
    #[default]
    Legacy,
    /// Directory and name joined with a separator.
    Joined,
}

impl MessageStyle {
    fn file_path(self, event: &SemanticEvent) -> String {
        match self {
            Self::Legacy => format!("{}{}", event.directory().display(), event.name()),
            Self::Joined => event.directory().join(event.name()).display().to_string(),
        }
    }
}

impl FromStr for MessageStyle {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "joined" => Ok(Self::Joined),
            other => Err(crate::Error::config(format!(
                "invalid message style '{other}', must be one of: legacy, joined"
            ))),
        }
    }
}

/// Classify a raw event. Unrecognized kinds yield `None`.
#[must_use]
pub fn classify(raw: &RawEvent) -> Option<SemanticEvent> {
    let directory = raw.directory.clone();
    let name = raw.name.clone();

    Some(match raw.event_kind()? {
        EventKind::Modify => SemanticEvent::Modified { directory, name },
        EventKind::Create => SemanticEvent::Created { directory, name },
        EventKind::Delete => SemanticEvent::Removed { directory, name },
        EventKind::MovedTo => SemanticEvent::MovedIn { directory, name },
    })
}
