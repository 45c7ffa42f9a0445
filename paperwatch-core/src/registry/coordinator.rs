use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use super::events::{RegistryEvent, RegistryEventBus, RegistrySnapshot};
use crate::Result;
use crate::persistence::FolderStore;
use crate::types::{FolderID, MonitoredFolder};
use crate::watch::WatchNotice;

#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) folders: Vec<MonitoredFolder>,
    pub(crate) total_processed_files: u64,
    pub(crate) last_status_message: Option<String>,
}

impl RegistryState {
    pub(crate) fn is_monitoring(&self) -> bool {
        self.folders.iter().any(|folder| folder.is_active)
    }

    pub(crate) fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            folders: self.folders.clone(),
            total_processed_files: self.total_processed_files,
            is_monitoring: self.is_monitoring(),
            last_status_message: self.last_status_message.clone(),
        }
    }

    fn folder_mut(&mut self, folder_id: FolderID) -> Option<&mut MonitoredFolder> {
        self.folders.iter_mut().find(|folder| folder.id == folder_id)
    }
}

/// State shared between the registry handle and its coordination task.
pub(crate) struct RegistryShared {
    pub(crate) store: Arc<dyn FolderStore>,
    pub(crate) state: Mutex<RegistryState>,
    pub(crate) events: RegistryEventBus,
}

impl fmt::Debug for RegistryShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryShared")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl RegistryShared {
    /// Turn a failed store write into the status message rather than an
    /// error for the caller; the in-memory state stays authoritative.
    pub(crate) fn persisted<T>(
        &self,
        state: &mut RegistryState,
        written: Result<T>,
    ) -> Option<T> {
        match written {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!("failed to save monitored folders: {}", err);
                let message = format!("Failed to save folders: {err}");
                state.last_status_message = Some(message.clone());
                self.events.publish(RegistryEvent::Status {
                    folder_id: None,
                    message,
                });
                None
            }
        }
    }

    pub(crate) async fn apply(&self, notice: WatchNotice) {
        let mut state = self.state.lock().await;
        match notice {
            WatchNotice::FileProcessed {
                folder_id,
                new_name,
            } => {
                let Some(folder) = state.folder_mut(folder_id) else {
                    debug!(folder_id = %folder_id, "ignoring result for a removed folder");
                    return;
                };
                folder.processed_count += 1;
                let processed_count = folder.processed_count;
                state.total_processed_files += 1;
                state.last_status_message = Some(format!("Processed: {new_name}"));
                let total_processed_files = state.total_processed_files;

                let written = self
                    .store
                    .record_processed(folder_id, processed_count)
                    .await;
                if self.persisted(&mut state, written) == Some(false) {
                    debug!(folder_id = %folder_id, "folder no longer stored, count not saved");
                }
                self.events.publish(RegistryEvent::FileProcessed {
                    folder_id,
                    new_name,
                    processed_count,
                    total_processed_files,
                });
            }
            WatchNotice::Status { folder_id, message } => {
                state.last_status_message = Some(message.clone());
                self.events.publish(RegistryEvent::Status {
                    folder_id: Some(folder_id),
                    message,
                });
            }
        }
    }
}

/// Single writer for notifications coming from every watcher. Ends once all
/// observers have been dropped.
pub(crate) async fn run(
    shared: Arc<RegistryShared>,
    mut notices: mpsc::UnboundedReceiver<WatchNotice>,
) {
    while let Some(notice) = notices.recv().await {
        shared.apply(notice).await;
    }
    debug!("registry coordination task finished");
}
