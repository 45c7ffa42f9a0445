//! `notify`-backed event source.
//!
//! Raw notifications are bridged from notify's callback thread into tokio and
//! coalesced: the first change opens a window of `coalesce` length, and
//! everything that arrives before it closes is flushed as one batch with one
//! entry per path.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{EventKind, ModifyKind};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use super::source::{BATCH_CHANNEL_CAPACITY, ChangeKind, EventSource, EventSubscription, FsChange};
use crate::{PaperwatchError, Result};

/// Capacity of the raw notify bridge.
const RAW_CHANNEL_CAPACITY: usize = 1024;
/// A batch is flushed early once it holds this many distinct paths.
const MAX_BATCH_EVENTS: usize = 1024;

/// Event source backed by the platform's recommended `notify` watcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyEventSource;

impl NotifyEventSource {
    pub fn new() -> Self {
        Self
    }
}

enum WatchMessage {
    Event(Event),
    Error(String),
}

impl fmt::Debug for WatchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMessage::Event(event) => f
                .debug_struct("WatchMessage::Event")
                .field("kind", &event.kind)
                .field("path_count", &event.paths.len())
                .finish(),
            WatchMessage::Error(message) => f
                .debug_struct("WatchMessage::Error")
                .field("message", message)
                .finish(),
        }
    }
}

impl EventSource for NotifyEventSource {
    fn subscribe(
        &self,
        root: &Path,
        coalesce: Duration,
        recursive: bool,
    ) -> Result<EventSubscription> {
        let subscription_error = |reason: String| PaperwatchError::Subscription {
            path: root.to_path_buf(),
            reason,
        };

        let runtime = Handle::try_current()
            .map_err(|err| subscription_error(format!("no async runtime available: {err}")))?;

        let (raw_tx, raw_rx) = mpsc::channel::<WatchMessage>(RAW_CHANNEL_CAPACITY);
        let path_clone = root.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let Err(err) = raw_tx.blocking_send(WatchMessage::Event(event)) {
                        warn!(
                            "watch channel send failed for {}: {}",
                            path_clone.display(),
                            err
                        );
                    }
                }
                Err(err) => {
                    let _ = raw_tx.blocking_send(WatchMessage::Error(err.to_string()));
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|err| subscription_error(format!("failed to create watcher: {err}")))?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(root, mode)
            .map_err(|err| subscription_error(err.to_string()))?;

        let (batch_tx, batch_rx) = mpsc::channel(BATCH_CHANNEL_CAPACITY);
        runtime.spawn(coalesce_loop(root.to_path_buf(), raw_rx, batch_tx, coalesce));

        Ok(EventSubscription::new(batch_rx, watcher))
    }
}

/// Runs until the watcher (and with it the raw sender) is dropped or the
/// subscriber goes away.
async fn coalesce_loop(
    root: PathBuf,
    mut raw_rx: mpsc::Receiver<WatchMessage>,
    batch_tx: mpsc::Sender<Vec<FsChange>>,
    window: Duration,
) {
    let mut pending = PendingBatch::default();
    let mut deadline: Option<Instant> = None;

    loop {
        let msg = match deadline {
            None => raw_rx.recv().await,
            Some(at) => match timeout_at(at, raw_rx.recv()).await {
                Ok(msg) => msg,
                Err(_) => {
                    deadline = None;
                    if !flush(&batch_tx, &mut pending).await {
                        break;
                    }
                    continue;
                }
            },
        };

        let Some(msg) = msg else {
            flush(&batch_tx, &mut pending).await;
            break;
        };

        match msg {
            WatchMessage::Event(event) => {
                for change in convert_event(&event) {
                    pending.merge(change);
                }
                if pending.is_empty() {
                    continue;
                }
                if pending.len() >= MAX_BATCH_EVENTS {
                    deadline = None;
                    if !flush(&batch_tx, &mut pending).await {
                        break;
                    }
                } else if deadline.is_none() {
                    deadline = Some(Instant::now() + window);
                }
            }
            WatchMessage::Error(error) => {
                warn!(root = %root.display(), "filesystem watcher error: {}", error);
            }
        }
    }

    debug!(root = %root.display(), "coalescing loop finished");
}

/// Returns `false` once the subscriber has gone away.
async fn flush(batch_tx: &mpsc::Sender<Vec<FsChange>>, pending: &mut PendingBatch) -> bool {
    let batch = pending.take();
    if batch.is_empty() {
        return !batch_tx.is_closed();
    }
    batch_tx.send(batch).await.is_ok()
}

/// Ordered set of changes keyed by path.
#[derive(Debug, Default)]
struct PendingBatch {
    changes: Vec<FsChange>,
    index: HashMap<PathBuf, usize>,
}

impl PendingBatch {
    /// Folds `change` into the batch. A creation sticks until the path is
    /// removed again, in which case the entry is dropped altogether.
    fn merge(&mut self, change: FsChange) {
        match self.index.get(&change.path).copied() {
            Some(slot) => {
                let existing = self.changes[slot].kind;
                match (existing, change.kind) {
                    (ChangeKind::Created, ChangeKind::Removed) => self.remove(slot),
                    (ChangeKind::Created, _) => {}
                    (_, kind) => self.changes[slot].kind = kind,
                }
            }
            None => {
                self.index.insert(change.path.clone(), self.changes.len());
                self.changes.push(change);
            }
        }
    }

    fn remove(&mut self, slot: usize) {
        let removed = self.changes.remove(slot);
        self.index.remove(&removed.path);
        for position in self.index.values_mut() {
            if *position > slot {
                *position -= 1;
            }
        }
    }

    fn take(&mut self) -> Vec<FsChange> {
        self.index.clear();
        std::mem::take(&mut self.changes)
    }

    fn len(&self) -> usize {
        self.changes.len()
    }

    fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn convert_event(event: &Event) -> Vec<FsChange> {
    let Some(kind) = classify_event(&event.kind) else {
        return Vec::new();
    };
    event
        .paths
        .iter()
        .map(|path| FsChange::new(path.clone(), kind))
        .collect()
}

fn classify_event(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Renamed),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Access(_) => None,
        EventKind::Any | EventKind::Other => Some(ChangeKind::Other),
    }
}
