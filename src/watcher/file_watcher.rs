//! Callback-based file watcher over a single notify backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded};
use notify::{RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};

use super::error::WatchError;
use super::event::{ChangeEvent, Op};
use super::handler::{ErrorHandler, EventHandler, Registration};

const DEFAULT_CHANNEL_CAPACITY: usize = 100;
const DISPATCH_THREAD_NAME: &str = "calp-watcher";

/// Registered handlers plus the closed flag, shared with the dispatch thread.
pub(crate) struct Dispatcher {
    registrations: RwLock<Vec<Registration>>,
    error_handlers: RwLock<Vec<Arc<dyn ErrorHandler>>>,
    closed: AtomicBool,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            error_handlers: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deliver an event to every registration whose mask matches, in
    /// registration order.
    pub(crate) fn emit_event(&self, event: &ChangeEvent) {
        // Snapshot so handlers may register further handlers.
        let registrations = self.registrations.read().clone();

        let mut fired = 0usize;
        for registration in &registrations {
            if registration.dispatch(event) {
                fired += 1;
            }
        }

        if fired == 0 {
            crate::debug_event!(
                "watcher",
                "unmatched",
                "{:?} {}",
                event.op,
                event.path.display()
            );
        } else {
            crate::debug_event!(
                "watcher",
                "dispatched",
                "{:?} {} to {fired} handlers",
                event.op,
                event.path.display()
            );
        }
    }

    pub(crate) fn emit_error(&self, error: &WatchError) {
        let handlers = self.error_handlers.read().clone();
        if handlers.is_empty() {
            crate::warn_event!("watcher", "unhandled error", "{error}");
        }
        for handler in &handlers {
            handler.handle_error(error);
        }
    }
}

/// Receiving ends consumed by the dispatch loop.
pub(crate) struct LoopChannels {
    pub(crate) events: Receiver<ChangeEvent>,
    pub(crate) errors: Receiver<WatchError>,
    pub(crate) shutdown: Receiver<()>,
    pub(crate) done: Sender<()>,
}

/// File watcher that routes change events to registered callbacks.
///
/// Wraps one `notify::RecommendedWatcher`. Paths are bound with
/// [`add_path`](Self::add_path), handlers with [`handle`](Self::handle) and
/// [`handle_error`](Self::handle_error). [`start`](Self::start) optionally
/// replays existing directory entries as creation events and then spawns a
/// single dispatch thread. [`close`](Self::close) tears the backend down and
/// the loop exits, signalling [`done`](Self::done).
///
/// # Example
///
/// ```no_run
/// use calp::watcher::{ChangeEvent, FileWatcher, Op};
///
/// let watcher = FileWatcher::new(true)?;
/// watcher.add_path("./providers")?;
/// watcher.handle(Op::CREATE | Op::WRITE, |event: &ChangeEvent| {
///     println!("changed: {}", event.path.display());
/// });
/// watcher.start()?;
/// # Ok::<(), calp::watcher::WatchError>(())
/// ```
pub struct FileWatcher {
    /// The notify backend. `None` once closed.
    backend: Mutex<Option<notify::RecommendedWatcher>>,
    /// Whether `start` replays existing entries as creations.
    replay_existing: bool,
    /// Successfully bound paths, in bind order.
    paths: Mutex<Vec<PathBuf>>,
    dispatcher: Arc<Dispatcher>,
    /// Loop inputs, taken by `start`.
    channels: Mutex<Option<LoopChannels>>,
    /// Dropped on close to wake the loop.
    shutdown: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
}

impl FileWatcher {
    /// Create a watcher with default channel capacity.
    ///
    /// When `replay_existing` is true, every entry already present in a
    /// watched directory is emitted as an [`Op::CREATE`] event on `start`.
    pub fn new(replay_existing: bool) -> Result<Self, WatchError> {
        Self::builder().replay_existing(replay_existing).build()
    }

    /// Create a builder for configuring the watcher.
    pub fn builder() -> FileWatcherBuilder {
        FileWatcherBuilder::new()
    }

    /// Bind the backend to `path`, non-recursively.
    ///
    /// Bind failures are returned here and never reach the error handlers.
    pub fn add_path(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = path.as_ref();

        let mut backend = self.backend.lock();
        let watcher = backend.as_mut().ok_or(WatchError::Closed)?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        self.paths.lock().push(path.to_path_buf());
        crate::debug_event!("watcher", "watching", "{}", path.display());

        Ok(())
    }

    /// Register `handler` for every event whose operation is contained in `mask`.
    ///
    /// Registrations are never removed. Registering the same handler twice
    /// makes it fire twice.
    pub fn handle(&self, mask: Op, handler: impl EventHandler + 'static) {
        self.handle_shared(mask, Arc::new(handler));
    }

    /// Register an already shared handler.
    pub fn handle_shared(&self, mask: Op, handler: Arc<dyn EventHandler>) {
        crate::debug_event!("watcher", "registered", "{} for {mask:?}", handler.name());
        self.dispatcher
            .registrations
            .write()
            .push(Registration::new(mask, handler));
    }

    /// Register a handler for backend and replay errors.
    pub fn handle_error(&self, handler: impl ErrorHandler + 'static) {
        self.dispatcher.error_handlers.write().push(Arc::new(handler));
    }

    /// Replay existing entries (if enabled) and spawn the dispatch thread.
    ///
    /// Replayed events are dispatched on the calling thread before the loop
    /// exists, so they always precede live events. A second call returns
    /// [`WatchError::AlreadyStarted`].
    pub fn start(&self) -> Result<(), WatchError> {
        if self.dispatcher.is_closed() {
            return Err(WatchError::Closed);
        }

        let channels = self
            .channels
            .lock()
            .take()
            .ok_or(WatchError::AlreadyStarted)?;

        if self.replay_existing {
            self.replay_existing_entries();
        }

        let dispatcher = self.dispatcher.clone();
        thread::Builder::new()
            .name(DISPATCH_THREAD_NAME.to_string())
            .spawn(move || run_loop(dispatcher, channels))
            .map_err(WatchError::SpawnFailed)?;

        crate::log_event!(
            "watcher",
            "started",
            "{} paths, replay {}",
            self.paths.lock().len(),
            self.replay_existing
        );

        Ok(())
    }

    /// Close the backend. The dispatch loop stops at its next wakeup, dropping
    /// anything still queued, and then signals [`done`](Self::done).
    ///
    /// A handler that is mid-call is not interrupted. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), WatchError> {
        self.dispatcher.closed.store(true, Ordering::SeqCst);

        let backend = self.backend.lock().take();
        self.shutdown.lock().take();
        // Not started yet: release the receivers so the backend never blocks.
        self.channels.lock().take();

        if backend.is_some() {
            crate::log_event!("watcher", "closed");
        }

        Ok(())
    }

    /// Completion signal: receives one `()` after the dispatch loop exits.
    pub fn done(&self) -> Receiver<()> {
        self.done.clone()
    }

    /// Paths bound so far, in bind order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }

    fn replay_existing_entries(&self) {
        let paths = self.paths.lock().clone();

        for dir in &paths {
            let entries = match list_dir_sorted(dir) {
                Ok(entries) => entries,
                Err(source) => {
                    self.dispatcher.emit_error(&WatchError::ReplayFailed {
                        path: dir.clone(),
                        source,
                    });
                    continue;
                }
            };

            crate::debug_event!(
                "watcher",
                "replaying",
                "{} entries in {}",
                entries.len(),
                dir.display()
            );

            for entry in entries {
                self.dispatcher.emit_event(&ChangeEvent::created(entry));
            }
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// List a directory's entries ordered by file name.
fn list_dir_sorted(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut names = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<std::io::Result<Vec<_>>>()?;
    names.sort();

    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}

/// The dispatch loop. Exits when any input disconnects or the watcher is
/// marked closed.
pub(crate) fn run_loop(dispatcher: Arc<Dispatcher>, channels: LoopChannels) {
    let LoopChannels {
        events,
        errors,
        shutdown,
        done,
    } = channels;

    loop {
        crossbeam_channel::select! {
            recv(events) -> msg => match msg {
                Ok(event) => {
                    if dispatcher.is_closed() {
                        break;
                    }
                    dispatcher.emit_event(&event);
                }
                Err(_) => break,
            },
            recv(errors) -> msg => match msg {
                Ok(error) => {
                    if dispatcher.is_closed() {
                        break;
                    }
                    dispatcher.emit_error(&error);
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        }
    }

    crate::debug_event!("watcher", "dispatch loop exited");
    let _ = done.send(());
}

/// Builder for constructing a [`FileWatcher`].
pub struct FileWatcherBuilder {
    replay_existing: bool,
    channel_capacity: usize,
}

impl FileWatcherBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            replay_existing: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Emit existing directory entries as creation events on start.
    pub fn replay_existing(mut self, enabled: bool) -> Self {
        self.replay_existing = enabled;
        self
    }

    /// Bound of the event and error queues between backend and loop.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Build the FileWatcher.
    pub fn build(self) -> Result<FileWatcher, WatchError> {
        let (event_tx, event_rx) = bounded(self.channel_capacity);
        let (error_tx, error_rx) = bounded(self.channel_capacity);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded(1);

        let backend = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for change in ChangeEvent::from_notify(event) {
                        let _ = event_tx.send(change);
                    }
                }
                Err(e) => {
                    let _ = error_tx.send(WatchError::from(e));
                }
            }
        })
        .map_err(|e| WatchError::InitFailed {
            reason: e.to_string(),
        })?;

        Ok(FileWatcher {
            backend: Mutex::new(Some(backend)),
            replay_existing: self.replay_existing,
            paths: Mutex::new(Vec::new()),
            dispatcher: Arc::new(Dispatcher::new()),
            channels: Mutex::new(Some(LoopChannels {
                events: event_rx,
                errors: error_rx,
                shutdown: shutdown_rx,
                done: done_tx,
            })),
            shutdown: Mutex::new(Some(shutdown_tx)),
            done: done_rx,
        })
    }
}

impl Default for FileWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn recorder() -> (Arc<Mutex<Vec<ChangeEvent>>>, impl EventHandler + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |event: &ChangeEvent| sink.lock().push(event.clone()))
    }

    #[test]
    fn test_add_path_missing_fails() {
        let temp = TempDir::new().unwrap();
        let watcher = FileWatcher::new(true).unwrap();

        let result = watcher.add_path(temp.path().join("missing"));

        assert!(matches!(result, Err(WatchError::PathWatchFailed { .. })));
        // Failed binds are not replayed
        assert!(watcher.paths().is_empty());
    }

    #[test]
    fn test_replay_emits_creation_per_entry_in_name_order() {
        let temp = TempDir::new().unwrap();
        for name in ["rust.yaml", "go.yaml", "c.yaml"] {
            std::fs::write(temp.path().join(name), "id: x\ntype: language\n").unwrap();
        }

        let watcher = FileWatcher::new(true).unwrap();
        watcher.add_path(temp.path()).unwrap();
        let (seen, handler) = recorder();
        watcher.handle(Op::CREATE, handler);

        watcher.start().unwrap();

        // Replay is synchronous, so the events are already here
        let seen = seen.lock().clone();
        let names: Vec<_> = seen
            .iter()
            .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["c.yaml", "go.yaml", "rust.yaml"]);
        assert!(seen.iter().all(|e| e.op == Op::CREATE));

        watcher.close().unwrap();
    }

    #[test]
    fn test_replay_disabled_emits_nothing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.yaml"), "id: go\n").unwrap();

        let watcher = FileWatcher::new(false).unwrap();
        watcher.add_path(temp.path()).unwrap();
        let (seen, handler) = recorder();
        watcher.handle(Op::all(), handler);

        watcher.start().unwrap();

        assert!(seen.lock().is_empty());
        watcher.close().unwrap();
    }

    #[test]
    fn test_replay_skips_non_matching_masks() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.yaml"), "id: go\n").unwrap();

        let watcher = FileWatcher::new(true).unwrap();
        watcher.add_path(temp.path()).unwrap();
        let (writes, write_handler) = recorder();
        let (creates, create_handler) = recorder();
        watcher.handle(Op::WRITE | Op::REMOVE, write_handler);
        watcher.handle(Op::CREATE | Op::WRITE, create_handler);

        watcher.start().unwrap();

        assert!(writes.lock().is_empty());
        assert_eq!(creates.lock().len(), 1);
        watcher.close().unwrap();
    }

    #[test]
    fn test_duplicate_registrations_both_fire_in_order() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.yaml"), "id: go\n").unwrap();

        let watcher = FileWatcher::new(true).unwrap();
        watcher.add_path(temp.path()).unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = order.clone();
            watcher.handle(Op::CREATE, move |_: &ChangeEvent| order.lock().push(tag));
        }

        watcher.start().unwrap();

        assert_eq!(*order.lock(), vec!["first", "second"]);
        watcher.close().unwrap();
    }

    #[test]
    fn test_replay_listing_failure_goes_to_error_handlers() {
        let temp = TempDir::new().unwrap();
        let gone = temp.path().join("gone");
        let kept = temp.path().join("kept");
        std::fs::create_dir(&gone).unwrap();
        std::fs::create_dir(&kept).unwrap();
        std::fs::write(kept.join("go.yaml"), "id: go\n").unwrap();

        let watcher = FileWatcher::new(true).unwrap();
        watcher.add_path(&gone).unwrap();
        watcher.add_path(&kept).unwrap();
        std::fs::remove_dir(&gone).unwrap();

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        watcher.handle_error(move |e: &WatchError| sink.lock().push(e.to_string()));
        let (seen, handler) = recorder();
        watcher.handle(Op::CREATE, handler);

        // Listing failure is not returned from start
        watcher.start().unwrap();

        let replay_errors = errors
            .lock()
            .iter()
            .filter(|e| e.contains("for replay"))
            .count();
        assert_eq!(replay_errors, 1);
        // Replay continued with the next path
        assert_eq!(seen.lock().len(), 1);
        watcher.close().unwrap();
    }

    #[test]
    fn test_start_twice_fails() {
        let watcher = FileWatcher::new(false).unwrap();
        watcher.start().unwrap();

        assert!(matches!(watcher.start(), Err(WatchError::AlreadyStarted)));
        watcher.close().unwrap();
    }

    #[test]
    fn test_close_signals_done_once() {
        let temp = TempDir::new().unwrap();
        let watcher = FileWatcher::new(false).unwrap();
        watcher.add_path(temp.path()).unwrap();
        watcher.start().unwrap();

        let done = watcher.done();
        watcher.close().unwrap();

        assert!(done.recv_timeout(Duration::from_secs(5)).is_ok());
        // Sender is gone after the single signal
        assert!(done.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(watcher.is_closed());
    }

    #[test]
    fn test_closed_watcher_rejects_paths_and_start() {
        let temp = TempDir::new().unwrap();
        let watcher = FileWatcher::new(false).unwrap();
        watcher.close().unwrap();
        watcher.close().unwrap();

        assert!(matches!(
            watcher.add_path(temp.path()),
            Err(WatchError::Closed)
        ));
        assert!(matches!(watcher.start(), Err(WatchError::Closed)));
    }

    #[test]
    fn test_loop_drops_queued_events_after_close() {
        let dispatcher = Arc::new(Dispatcher::new());
        let (seen, handler) = recorder();
        dispatcher
            .registrations
            .write()
            .push(Registration::new(Op::all(), Arc::new(handler)));

        let (event_tx, events) = bounded(8);
        let (_error_tx, errors) = bounded(8);
        let (_shutdown_tx, shutdown) = bounded(1);
        let (done, done_rx) = bounded(1);

        // Queue events, then close before the loop sees them
        event_tx.send(ChangeEvent::created("/p/a.yaml")).unwrap();
        event_tx.send(ChangeEvent::created("/p/b.yaml")).unwrap();
        dispatcher.closed.store(true, Ordering::SeqCst);

        run_loop(
            dispatcher,
            LoopChannels {
                events,
                errors,
                shutdown,
                done,
            },
        );

        assert!(seen.lock().is_empty());
        assert!(done_rx.try_recv().is_ok());
    }

    #[test]
    fn test_loop_dispatches_in_order_until_disconnect() {
        let dispatcher = Arc::new(Dispatcher::new());
        let (seen, handler) = recorder();
        dispatcher
            .registrations
            .write()
            .push(Registration::new(Op::CREATE | Op::WRITE, Arc::new(handler)));

        let (event_tx, events) = bounded(8);
        let (_error_tx, errors) = bounded(8);
        let (_shutdown_tx, shutdown) = bounded(1);
        let (done, done_rx) = bounded(1);

        event_tx.send(ChangeEvent::new("/p/a.yaml", Op::WRITE)).unwrap();
        event_tx.send(ChangeEvent::new("/p/a.yaml", Op::REMOVE)).unwrap();
        event_tx.send(ChangeEvent::new("/p/b.yaml", Op::CREATE)).unwrap();
        // Closing the event source ends the loop once the queue drains
        drop(event_tx);

        run_loop(
            dispatcher,
            LoopChannels {
                events,
                errors,
                shutdown,
                done,
            },
        );

        assert_eq!(
            *seen.lock(),
            vec![
                ChangeEvent::new("/p/a.yaml", Op::WRITE),
                ChangeEvent::new("/p/b.yaml", Op::CREATE),
            ]
        );
        assert!(done_rx.try_recv().is_ok());
    }

    #[test]
    fn test_loop_routes_errors_to_every_handler_and_stops_on_error_disconnect() {
        let dispatcher = Arc::new(Dispatcher::new());
        let calls = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second"] {
            let sink = calls.clone();
            let handler = move |e: &WatchError| sink.lock().push(format!("{label}: {e}"));
            dispatcher.error_handlers.write().push(Arc::new(handler));
        }

        // Event and shutdown senders stay alive for the whole run
        let (_event_tx, events) = bounded::<ChangeEvent>(8);
        let (error_tx, errors) = bounded(8);
        let (_shutdown_tx, shutdown) = bounded(1);
        let (done, done_rx) = bounded(1);

        error_tx
            .send(WatchError::EventError {
                details: "queue overflow".to_string(),
                paths: vec![PathBuf::from("/p")],
            })
            .unwrap();
        drop(error_tx);

        run_loop(
            dispatcher,
            LoopChannels {
                events,
                errors,
                shutdown,
                done,
            },
        );

        assert_eq!(
            *calls.lock(),
            vec![
                "first: File system event error: queue overflow".to_string(),
                "second: File system event error: queue overflow".to_string(),
            ]
        );
        assert!(done_rx.try_recv().is_ok());
    }
}
