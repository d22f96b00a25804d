//! watchfilesd library
//!
//! Directory-tree watcher daemon: logs every change under a root directory
//! and pre-stages trees moved into it.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod daemon;
pub mod error;
pub mod sink;
pub mod staging;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
