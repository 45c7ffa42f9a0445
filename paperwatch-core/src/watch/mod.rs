//! Folder watching pipeline.
//!
//! A [`FolderWatcher`] owns one directory: a one-off sweep of the documents
//! already present, plus a live [`EventSource`] subscription whose creation
//! events are each processed on their own task. Outcomes are reported to a
//! [`WatchObserver`].

mod folder_watcher;
mod notify_source;
mod processor;
mod source;

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::types::ids::FolderID;

pub use folder_watcher::{FolderWatcher, WatchRuntime};
pub use notify_source::NotifyEventSource;
pub use processor::{FileProcessor, ProcessOutcome, RenamePlan};
pub use source::{
    ChangeKind, ChannelEventSource, EventSource, EventSubscription, FsChange, SubscriptionGuard,
};

/// Runtime knobs for folder watchers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchConfig {
    /// Window during which filesystem notifications are batched together.
    pub coalesce_latency: Duration,
    /// Pause between documents during the startup sweep.
    pub sweep_delay: Duration,
    /// Lower-cased extensions (without dot) treated as documents.
    pub extensions: Vec<String>,
    /// Watch subdirectories as well.
    pub recursive: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            coalesce_latency: Duration::from_secs(1),
            sweep_delay: Duration::from_millis(500),
            extensions: vec!["pdf".to_string()],
            recursive: false,
        }
    }
}

impl WatchConfig {
    /// Case-insensitive extension check.
    pub fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Label for status messages, e.g. `PDF`.
    pub fn type_label(&self) -> String {
        match self.extensions.as_slice() {
            [single] => single.to_uppercase(),
            _ => "document".to_string(),
        }
    }
}

/// Receives the outcome of every processed file.
///
/// `on_error` doubles as the status channel: informational notices such as
/// the sweep's file count or an already correct name arrive there too.
pub trait WatchObserver: Send + Sync {
    fn on_file_processed(&self, folder_id: FolderID, new_name: &str);
    fn on_error(&self, folder_id: FolderID, message: &str);
}

/// A single observer notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchNotice {
    FileProcessed { folder_id: FolderID, new_name: String },
    Status { folder_id: FolderID, message: String },
}

/// Forwards notifications into an unbounded channel so emitters never block.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<WatchNotice>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<WatchNotice>) -> Self {
        Self { tx }
    }

    /// Observer plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WatchNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, notice: WatchNotice) {
        if let Err(err) = self.tx.send(notice) {
            debug!("watch notice dropped, receiver closed: {:?}", err.0);
        }
    }
}

impl WatchObserver for ChannelObserver {
    fn on_file_processed(&self, folder_id: FolderID, new_name: &str) {
        self.forward(WatchNotice::FileProcessed {
            folder_id,
            new_name: new_name.to_string(),
        });
    }

    fn on_error(&self, folder_id: FolderID, message: &str) {
        self.forward(WatchNotice::Status {
            folder_id,
            message: message.to_string(),
        });
    }
}
