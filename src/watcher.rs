use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::debouncer::Pusher;
use crate::events::ChangeEvent;
use crate::filter::EventFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bridges raw notify events into the filter and the debouncer.
pub struct FileWatcher {
    watcher: Option<RecommendedWatcher>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FileWatcher {
    pub fn new<P: AsRef<Path>>(
        path: P,
        recursive: bool,
        filter: EventFilter,
        pusher: Pusher,
    ) -> Result<Self> {
        let root = path.as_ref();
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();

        let mut watcher = notify::recommended_watcher(tx)
            .context("Failed to create file system watcher")?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(root, mode)
            .with_context(|| format!("Failed to start watching {}", root.display()))?;

        let running = Arc::new(AtomicBool::new(true));
        let still_running = Arc::clone(&running);

        let worker = thread::Builder::new()
            .name("autorun-watch".to_string())
            .spawn(move || {
                while still_running.load(Ordering::SeqCst) {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(Ok(event)) => {
                            route_event(&filter, &pusher, &event);
                        }
                        Ok(Err(err)) => {
                            tracing::error!("File watcher error: {}", err);
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .context("Failed to spawn watcher thread")?;

        tracing::debug!(path = %root.display(), recursive, "watching");

        Ok(Self {
            watcher: Some(watcher),
            running,
            worker: Some(worker),
        })
    }

    /// Stop receiving events. Already-pushed changes stay with the debouncer.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        drop(self.watcher.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("watcher thread panicked");
            }
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run every path of a raw event through the filter and push the survivors.
/// Returns how many changes were pushed.
pub fn route_event(filter: &EventFilter, pusher: &Pusher, event: &Event) -> usize {
    let mut accepted = 0;

    for change in ChangeEvent::from_notify(event) {
        if filter.accept(&change) {
            tracing::info!(path = %change.path.display(), kind = %change.kind, "change accepted");
            pusher.push(change);
            accepted += 1;
        } else {
            tracing::debug!(path = %change.path.display(), kind = %change.kind, "change ignored");
        }
    }

    accepted
}
