//! Handler traits and registrations for the file watcher.

use std::sync::Arc;

use super::WatchError;
use super::event::{ChangeEvent, Op};

/// Receives change events from the dispatch loop.
///
/// Handlers run synchronously on the dispatch thread. A handler that blocks
/// stalls delivery of every later event, so long work belongs elsewhere.
///
/// Any `Fn(&ChangeEvent) + Send + Sync` closure is a handler.
pub trait EventHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &str {
        "handler"
    }

    /// Handle one change event.
    fn handle(&self, event: &ChangeEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn handle(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// Receives errors raised by the notification backend or by startup replay.
pub trait ErrorHandler: Send + Sync {
    fn handle_error(&self, error: &WatchError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&WatchError) + Send + Sync,
{
    fn handle_error(&self, error: &WatchError) {
        self(error)
    }
}

/// An event handler paired with the operations it subscribes to.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) mask: Op,
    pub(crate) handler: Arc<dyn EventHandler>,
}

impl Registration {
    pub(crate) fn new(mask: Op, handler: Arc<dyn EventHandler>) -> Self {
        Self { mask, handler }
    }

    /// Invoke the handler if the event falls inside this registration's mask.
    ///
    /// Returns whether the handler ran.
    pub(crate) fn dispatch(&self, event: &ChangeEvent) -> bool {
        if event.matches(self.mask) {
            self.handler.handle(event);
            true
        } else {
            false
        }
    }
}
