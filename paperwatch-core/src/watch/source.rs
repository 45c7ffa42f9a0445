use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::{PaperwatchError, Result};

/// Capacity of the batch channel handed to subscribers.
pub(crate) const BATCH_CHANNEL_CAPACITY: usize = 64;

/// Kind of a filesystem change, as far as the pipeline cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Renamed,
    Removed,
    Other,
}

/// One path-level change inside a coalesced batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FsChange {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Created,
        }
    }

    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Keeps a subscription alive; dropping it stops delivery.
pub struct SubscriptionGuard(#[allow(dead_code)] Box<dyn Any + Send>);

impl SubscriptionGuard {
    pub fn new(inner: impl Any + Send) -> Self {
        Self(Box::new(inner))
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SubscriptionGuard")
    }
}

/// Live stream of coalesced change batches for one directory.
#[derive(Debug)]
pub struct EventSubscription {
    receiver: mpsc::Receiver<Vec<FsChange>>,
    guard: SubscriptionGuard,
}

impl EventSubscription {
    pub fn new(receiver: mpsc::Receiver<Vec<FsChange>>, guard: impl Any + Send) -> Self {
        Self {
            receiver,
            guard: SubscriptionGuard::new(guard),
        }
    }

    pub fn into_parts(self) -> (mpsc::Receiver<Vec<FsChange>>, SubscriptionGuard) {
        (self.receiver, self.guard)
    }
}

/// Source of filesystem change notifications.
///
/// Production code uses [`super::NotifyEventSource`]; tests drive the
/// pipeline through [`ChannelEventSource`].
pub trait EventSource: Send + Sync {
    /// Subscribe to changes under `root`, batching notifications that arrive
    /// within `coalesce` of each other.
    fn subscribe(
        &self,
        root: &Path,
        coalesce: Duration,
        recursive: bool,
    ) -> Result<EventSubscription>;
}

type SenderMap = HashMap<PathBuf, mpsc::Sender<Vec<FsChange>>>;

/// Synthetic event source: batches are injected with [`ChannelEventSource::emit`].
#[derive(Default, Clone)]
pub struct ChannelEventSource {
    senders: Arc<Mutex<SenderMap>>,
    refused: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ChannelEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future subscriptions for `root` fail.
    pub fn refuse(&self, root: impl Into<PathBuf>) {
        lock(&self.refused).insert(root.into());
    }

    /// Deliver `batch` to the subscriber of `root`. Returns `false` when
    /// nobody is subscribed.
    pub async fn emit(&self, root: &Path, batch: Vec<FsChange>) -> bool {
        let sender = lock(&self.senders).get(root).cloned();
        match sender {
            Some(sender) => sender.send(batch).await.is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self, root: &Path) -> bool {
        lock(&self.senders).contains_key(root)
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.senders).len()
    }
}

impl fmt::Debug for ChannelEventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEventSource")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventSource for ChannelEventSource {
    fn subscribe(
        &self,
        root: &Path,
        _coalesce: Duration,
        _recursive: bool,
    ) -> Result<EventSubscription> {
        if lock(&self.refused).contains(root) {
            return Err(PaperwatchError::Subscription {
                path: root.to_path_buf(),
                reason: "subscription refused".to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(BATCH_CHANNEL_CAPACITY);
        lock(&self.senders).insert(root.to_path_buf(), tx);

        let guard = ChannelGuard {
            root: root.to_path_buf(),
            senders: Arc::clone(&self.senders),
        };
        Ok(EventSubscription::new(rx, guard))
    }
}

struct ChannelGuard {
    root: PathBuf,
    senders: Arc<Mutex<SenderMap>>,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        lock(&self.senders).remove(&self.root);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
