//! Callback-based file watcher.
//!
//! Wraps a single notify backend and routes its events to registered
//! callbacks, filtered by an operation bitmask.
//!
//! # Architecture
//!
//! ```text
//! notify::RecommendedWatcher
//!   |  ChangeEvent / WatchError (bounded channels)
//!   v
//! dispatch thread (select over events, errors, shutdown)
//!   |  mask.contains(event.op), registration order
//!   v
//! EventHandler ... EventHandler      ErrorHandler ... ErrorHandler
//! ```

mod error;
mod event;
mod file_watcher;
mod handler;
pub mod handlers;

pub use error::WatchError;
pub use event::{ChangeEvent, Op};
pub use file_watcher::{FileWatcher, FileWatcherBuilder};
pub use handler::{ErrorHandler, EventHandler};
