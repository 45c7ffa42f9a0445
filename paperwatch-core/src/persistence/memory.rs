use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{FolderStore, Preferences};
use crate::types::{FolderID, MonitoredFolder};
use crate::{PaperwatchError, Result};

#[derive(Debug, Default)]
struct MemoryState {
    folders: Vec<MonitoredFolder>,
    preferences: Preferences,
    saves: Vec<Vec<MonitoredFolder>>,
    fail_saves: bool,
}

/// Store kept in memory; records every folder save for inspection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFolderStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryFolderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folders(folders: Vec<MonitoredFolder>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                folders,
                ..MemoryState::default()
            })),
        }
    }

    /// The stored set after every write, oldest first.
    pub async fn saves(&self) -> Vec<Vec<MonitoredFolder>> {
        self.state.lock().await.saves.clone()
    }

    pub async fn stored(&self) -> Vec<MonitoredFolder> {
        self.state.lock().await.folders.clone()
    }

    /// Make subsequent saves fail.
    pub async fn fail_saves(&self, fail: bool) {
        self.state.lock().await.fail_saves = fail;
    }

    /// Apply a per-folder write and record the resulting set as a save.
    async fn modify<T>(&self, apply: impl FnOnce(&mut Vec<MonitoredFolder>) -> T) -> Result<T> {
        let mut state = self.state.lock().await;
        if state.fail_saves {
            return Err(PaperwatchError::Persistence("in-memory store refused save".into()));
        }
        let outcome = apply(&mut state.folders);
        let snapshot = state.folders.clone();
        state.saves.push(snapshot);
        Ok(outcome)
    }
}

#[async_trait]
impl FolderStore for InMemoryFolderStore {
    async fn load(&self) -> Result<Vec<MonitoredFolder>> {
        Ok(self.state.lock().await.folders.clone())
    }

    async fn save(&self, folders: &[MonitoredFolder]) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.fail_saves {
            return Err(PaperwatchError::Persistence("in-memory store refused save".into()));
        }
        state.folders = folders.to_vec();
        state.saves.push(folders.to_vec());
        Ok(())
    }

    async fn upsert(&self, folder: &MonitoredFolder) -> Result<()> {
        self.modify(|folders| {
            match folders.iter_mut().find(|stored| stored.id == folder.id) {
                Some(stored) => *stored = folder.clone(),
                None => folders.push(folder.clone()),
            }
        })
        .await
    }

    async fn remove(&self, folder_id: FolderID) -> Result<bool> {
        self.modify(|folders| {
            let before = folders.len();
            folders.retain(|stored| stored.id != folder_id);
            folders.len() != before
        })
        .await
    }

    async fn record_processed(&self, folder_id: FolderID, processed_count: u64) -> Result<bool> {
        self.modify(|folders| {
            match folders.iter_mut().find(|stored| stored.id == folder_id) {
                Some(stored) => {
                    stored.processed_count = processed_count;
                    true
                }
                None => false,
            }
        })
        .await
    }

    async fn load_preferences(&self) -> Result<Preferences> {
        Ok(self.state.lock().await.preferences.clone())
    }

    async fn save_preferences(&self, preferences: &Preferences) -> Result<()> {
        self.state.lock().await.preferences = preferences.clone();
        Ok(())
    }
}
