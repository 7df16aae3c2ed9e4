//! Error types for the file watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("File system event error: {details}")]
    EventError { details: String, paths: Vec<PathBuf> },

    #[error("Failed to list {path} for replay: {source}")]
    ReplayFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn dispatch thread: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Watcher already started")]
    AlreadyStarted,

    #[error("Watcher is closed")]
    Closed,
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        let paths = e.paths.clone();
        WatchError::EventError {
            details: e.to_string(),
            paths,
        }
    }
}
