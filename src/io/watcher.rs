use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::io::store::{Store, StoreError};

/// How long after one of our own writes a change event is treated as its echo.
pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_millis(1000);

/// How long a caller waits before trying to attach a lost watch again.
pub const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Events sent from the change notifier to the UI loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    /// The document was changed by another process; carries the new content.
    Changed(String),
}

/// Error type for attaching the file system watch
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("could not watch {path}: {source}")]
    Attach {
        path: PathBuf,
        source: notify::Error,
    },
}

/// A raw file system event for the document, stamped when it was delivered.
#[derive(Debug, Clone, Copy)]
struct RawEvent {
    at: Instant,
}

/// An attached OS watch. Dropping it releases the handle.
struct Watch {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<RawEvent>,
}

/// Reports changes to the task document made by other processes.
///
/// Watching starts with [`start`](Self::start) and the UI loop drains
/// events with [`poll`](Self::poll) each tick. Events landing within the
/// suppression window after a write through the store are dropped as
/// echoes of that write.
pub struct ChangeNotifier {
    store: Store,
    window: Duration,
    watch: Option<Watch>,
}

impl ChangeNotifier {
    pub fn new(store: Store) -> Self {
        Self::with_window(store, DEFAULT_SUPPRESSION_WINDOW)
    }

    pub fn with_window(store: Store, window: Duration) -> Self {
        ChangeNotifier {
            store,
            window,
            watch: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Begin watching the document. Any existing watch is dropped first.
    ///
    /// The document's directory is watched rather than the file itself so
    /// that editors which save by writing a temp file and renaming it over
    /// the original keep being observed. On failure the notifier is left
    /// idle and `start` may be called again.
    pub fn start(&mut self) -> Result<(), WatchError> {
        self.stop();

        let dir = self.store.dir().to_path_buf();
        match attach(&dir, self.store.path().file_name().map(OsString::from)) {
            Ok(watch) => {
                info!(path = %self.store.path().display(), "watching task file");
                self.watch = Some(watch);
                Ok(())
            }
            Err(source) => {
                warn!(path = %dir.display(), error = %source, "could not attach file watch");
                Err(WatchError::Attach { path: dir, source })
            }
        }
    }

    /// Stop watching. Safe to call when idle.
    pub fn stop(&mut self) {
        if self.watch.take().is_some() {
            info!("stopped watching task file");
        }
    }

    /// Non-blocking poll for external changes.
    ///
    /// All queued raw events are drained; if any of them is not an echo of
    /// our own write the document is read once and a single
    /// [`NotifierEvent::Changed`] is returned, so the burst of events an
    /// editor produces for one save collapses into one change.
    pub fn poll(&mut self) -> Result<Vec<NotifierEvent>, StoreError> {
        let Some(watch) = &self.watch else {
            return Ok(Vec::new());
        };

        let mut raw = Vec::new();
        let mut disconnected = false;
        loop {
            match watch.rx.try_recv() {
                Ok(event) => raw.push(event),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            warn!("file watch channel closed");
            self.watch = None;
        }

        let external = raw.iter().any(|e| !self.is_self_echo(e.at));
        if !external {
            return Ok(Vec::new());
        }
        let content = self.store.read()?;
        info!(bytes = content.len(), "task file changed externally");
        Ok(vec![NotifierEvent::Changed(content)])
    }

    /// Apply the suppression rule to a single event observed at `at`.
    /// Returns the document content when the event counts as external.
    pub fn handle_event(&self, at: Instant) -> Result<Option<NotifierEvent>, StoreError> {
        if self.is_self_echo(at) {
            return Ok(None);
        }
        let content = self.store.read()?;
        Ok(Some(NotifierEvent::Changed(content)))
    }

    /// True when `at` falls inside the window that follows the last write.
    /// Events older than the last write cannot be its echo.
    fn is_self_echo(&self, at: Instant) -> bool {
        let echo = self
            .store
            .last_write()
            .and_then(|written| at.checked_duration_since(written))
            .is_some_and(|elapsed| elapsed < self.window);
        if echo {
            debug!("suppressed change event from our own write");
        }
        echo
    }
}

fn attach(dir: &std::path::Path, file_name: Option<OsString>) -> Result<Watch, notify::Error> {
    let (tx, rx) = mpsc::channel();

    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| {
            let at = Instant::now();
            let event = match result {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "file watch error");
                    return;
                }
            };

            // Removes are skipped: a move-replace save is followed by a create
            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {}
                _ => return,
            }

            let relevant = event
                .paths
                .iter()
                .any(|p| p.file_name().map(OsString::from) == file_name);
            if relevant {
                let _ = tx.send(RawEvent { at });
            }
        },
        Config::default(),
    )?;

    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(Watch {
        _watcher: watcher,
        rx,
    })
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        self.stop();
    }
}
