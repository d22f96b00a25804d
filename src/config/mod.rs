//! Configuration management for watchfilesd.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{install_dir, resolve_watch_root, restart_policy, Config};
