//! Provider backend.
//!
//! Watches directories of provider YAML files, keeps a typed in-memory copy
//! of every record up to date, and serves it read-only over HTTP.
//!
//! - [`watcher`]: notify-backed watcher dispatching filtered events to callbacks
//! - [`provider`]: provider models and the concurrent store
//! - [`server`]: HTTP read layer (feature `http-server`)

pub mod config;
pub mod logging;
pub mod provider;
#[cfg(feature = "http-server")]
pub mod server;
pub mod watcher;

pub use config::Settings;
pub use provider::{LanguageModel, ProviderStore, ProviderType, Record};
pub use watcher::{ChangeEvent, FileWatcher, Op, WatchError};
