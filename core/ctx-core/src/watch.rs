//! Recursive filesystem watch rooted at the active repository.
//!
//! The notify backend invokes its callback on its own thread. That callback
//! only moves paths into a bounded channel; a consumer thread owned by the
//! watch hands them to the sink, where the store writes happen. Stopping a
//! watch drops the backend, lets the consumer drain what was already queued,
//! and waits for it up to a deadline.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CtxError, Result};

/// Receives the absolute path of every modified file under the root.
pub type EventSink = Arc<dyn Fn(&Path) + Send + Sync>;

pub trait WatchFactory: Send + Sync {
    fn start(&self, root: &Path, sink: EventSink) -> Result<Box<dyn WatchHandle>>;
}

pub trait WatchHandle: Send {
    fn root(&self) -> &Path;

    /// Stops delivery and waits at most `timeout` for in-flight events.
    fn stop(self: Box<Self>, timeout: Duration);
}

#[derive(Debug, Clone)]
pub struct NotifyWatchFactory {
    queue_capacity: usize,
}

impl NotifyWatchFactory {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue_capacity: queue_capacity.max(1),
        }
    }
}

impl Default for NotifyWatchFactory {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl WatchFactory for NotifyWatchFactory {
    fn start(&self, root: &Path, sink: EventSink) -> Result<Box<dyn WatchHandle>> {
        let (tx, rx) = mpsc::sync_channel::<PathBuf>(self.queue_capacity);

        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !is_content_change(&event.kind) {
                        return;
                    }
                    for path in event.paths {
                        match tx.try_send(path) {
                            Ok(()) => {}
                            Err(TrySendError::Full(path)) => {
                                warn!(path = %path.display(), "Watch queue full, dropping event");
                            }
                            Err(TrySendError::Disconnected(_)) => return,
                        }
                    }
                }
                Err(err) => warn!(error = %err, "Watch backend error"),
            })
            .map_err(|source| CtxError::Watch {
                path: root.to_path_buf(),
                source,
            })?;

        let (done_tx, done_rx) = mpsc::channel::<()>();
        thread::Builder::new()
            .name("ctx-watch".to_string())
            .spawn(move || {
                for path in rx {
                    sink(&path);
                }
                let _ = done_tx.send(());
            })
            .map_err(CtxError::io("spawn watch consumer"))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| CtxError::Watch {
                path: root.to_path_buf(),
                source,
            })?;

        debug!(root = %root.display(), "Watch started");
        Ok(Box::new(NotifyWatch {
            root: root.to_path_buf(),
            watcher,
            done: done_rx,
        }))
    }
}

struct NotifyWatch {
    root: PathBuf,
    watcher: RecommendedWatcher,
    done: mpsc::Receiver<()>,
}

impl WatchHandle for NotifyWatch {
    fn root(&self) -> &Path {
        &self.root
    }

    fn stop(self: Box<Self>, timeout: Duration) {
        let NotifyWatch {
            root,
            watcher,
            done,
        } = *self;
        // Dropping the backend releases the sender, which ends the consumer loop.
        drop(watcher);

        match done.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                debug!(root = %root.display(), "Watch stopped");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    root = %root.display(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Watch consumer still busy after stop timeout"
                );
            }
        }
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}
