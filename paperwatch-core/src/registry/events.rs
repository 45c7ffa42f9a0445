use std::fmt;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::{FolderID, MonitoredFolder};

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Change to registry state, published for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    FolderAdded(MonitoredFolder),
    FolderRemoved {
        folder_id: FolderID,
    },
    FileProcessed {
        folder_id: FolderID,
        new_name: String,
        processed_count: u64,
        total_processed_files: u64,
    },
    /// The last status message changed. Registry-level notices carry no folder.
    Status {
        folder_id: Option<FolderID>,
        message: String,
    },
}

/// Read-only view of the registry at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub folders: Vec<MonitoredFolder>,
    pub total_processed_files: u64,
    pub is_monitoring: bool,
    pub last_status_message: Option<String>,
}

pub(crate) struct RegistryEventBus {
    sender: broadcast::Sender<RegistryEvent>,
    capacity: usize,
}

impl fmt::Debug for RegistryEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl RegistryEventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&self, event: RegistryEvent) {
        // No subscribers is normal.
        let _ = self.sender.send(event);
    }
}
