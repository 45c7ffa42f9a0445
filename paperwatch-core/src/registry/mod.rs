//! The owning collection of monitored folders.
//!
//! [`FolderRegistry`] starts one [`FolderWatcher`] per persisted folder,
//! keeps aggregate counters, and saves the folder set whenever it changes.
//! Watchers report through a [`ChannelObserver`]; a single coordination task
//! drains that queue and is the only writer of counters and status.

mod coordinator;
mod events;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::naming::NamingTemplate;
use crate::persistence::FolderStore;
use crate::types::{FolderID, MonitoredFolder};
use crate::watch::{ChannelObserver, FolderWatcher, WatchRuntime};
use crate::{PaperwatchError, Result};

use coordinator::{RegistryShared, RegistryState};

pub use events::{DEFAULT_EVENT_CAPACITY, RegistryEvent, RegistrySnapshot};

pub struct FolderRegistry {
    shared: Arc<RegistryShared>,
    runtime: WatchRuntime,
    watchers: Mutex<HashMap<FolderID, FolderWatcher>>,
    observer: ChannelObserver,
    coordinator: JoinHandle<()>,
}

impl fmt::Debug for FolderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolderRegistry")
            .field("runtime", &self.runtime)
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}

impl FolderRegistry {
    /// Load the persisted folder set and start one watcher per entry.
    pub async fn start(store: Arc<dyn FolderStore>, runtime: WatchRuntime) -> Result<Self> {
        let folders = store.load().await?;
        let total_processed_files = folders.iter().map(|folder| folder.processed_count).sum();

        let shared = Arc::new(RegistryShared {
            store,
            state: Mutex::new(RegistryState {
                folders: folders.clone(),
                total_processed_files,
                last_status_message: None,
            }),
            events: events::RegistryEventBus::new(DEFAULT_EVENT_CAPACITY),
        });
        let (observer, notices) = ChannelObserver::channel();
        let coordinator = tokio::spawn(coordinator::run(Arc::clone(&shared), notices));

        let registry = Self {
            shared,
            runtime,
            watchers: Mutex::new(HashMap::new()),
            observer,
            coordinator,
        };

        let mut watchers = registry.watchers.lock().await;
        for folder in &folders {
            let watcher = registry.start_watcher(folder).await;
            watchers.insert(folder.id, watcher);
        }
        {
            let mut state = registry.shared.state.lock().await;
            for folder in state.folders.iter_mut() {
                folder.is_active = watchers
                    .get(&folder.id)
                    .is_some_and(FolderWatcher::is_active);
            }
            info!(
                folders = state.folders.len(),
                monitoring = state.is_monitoring(),
                "folder registry started"
            );
        }
        drop(watchers);

        Ok(registry)
    }

    async fn start_watcher(&self, folder: &MonitoredFolder) -> FolderWatcher {
        FolderWatcher::start(
            folder.id,
            folder.path.clone(),
            Some(folder.template),
            &self.runtime,
            Arc::new(self.observer.clone()),
        )
        .await
    }

    /// Begin monitoring `path` with `template` and store the new folder.
    pub async fn add_folder(
        &self,
        path: impl Into<PathBuf>,
        template: NamingTemplate,
    ) -> Result<MonitoredFolder> {
        let path = path.into();
        let mut watchers = self.watchers.lock().await;
        if self
            .shared
            .state
            .lock()
            .await
            .folders
            .iter()
            .any(|folder| folder.path == path)
        {
            return Err(PaperwatchError::AlreadyMonitored(path));
        }

        let mut folder = MonitoredFolder::new(path, template);
        let watcher = self.start_watcher(&folder).await;
        folder.is_active = watcher.is_active();
        watchers.insert(folder.id, watcher);

        let mut state = self.shared.state.lock().await;
        state.folders.push(folder.clone());
        let written = self.shared.store.upsert(&folder).await;
        self.shared.persisted(&mut state, written);
        drop(state);

        info!(
            folder_id = %folder.id,
            path = %folder.path.display(),
            template = %folder.template,
            "added monitored folder"
        );
        self.shared
            .events
            .publish(RegistryEvent::FolderAdded(folder.clone()));
        Ok(folder)
    }

    /// Stop the folder's watcher, forget the folder and drop it from the store.
    pub async fn remove_folder(&self, folder_id: FolderID) -> Result<MonitoredFolder> {
        let mut watchers = self.watchers.lock().await;
        let mut state = self.shared.state.lock().await;
        let index = state
            .folders
            .iter()
            .position(|folder| folder.id == folder_id)
            .ok_or(PaperwatchError::FolderNotFound(folder_id))?;

        if let Some(mut watcher) = watchers.remove(&folder_id) {
            watcher.stop();
        }
        let removed = state.folders.remove(index);
        let written = self.shared.store.remove(folder_id).await;
        self.shared.persisted(&mut state, written);
        drop(state);

        info!(
            folder_id = %folder_id,
            path = %removed.path.display(),
            "removed monitored folder"
        );
        self.shared
            .events
            .publish(RegistryEvent::FolderRemoved { folder_id });
        Ok(removed)
    }

    pub async fn snapshot(&self) -> RegistrySnapshot {
        self.shared.state.lock().await.snapshot()
    }

    pub async fn monitored_folders(&self) -> Vec<MonitoredFolder> {
        self.shared.state.lock().await.folders.clone()
    }

    pub async fn folder(&self, folder_id: FolderID) -> Option<MonitoredFolder> {
        self.shared
            .state
            .lock()
            .await
            .folders
            .iter()
            .find(|folder| folder.id == folder_id)
            .cloned()
    }

    pub async fn total_processed_files(&self) -> u64 {
        self.shared.state.lock().await.total_processed_files
    }

    /// True when at least one watcher is running.
    pub async fn is_monitoring(&self) -> bool {
        self.shared.state.lock().await.is_monitoring()
    }

    pub async fn last_status_message(&self) -> Option<String> {
        self.shared.state.lock().await.last_status_message.clone()
    }

    pub async fn watcher_count(&self) -> usize {
        self.watchers.lock().await.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.shared.events.subscribe()
    }

    /// Stop every watcher. Folders stay registered; results of processing
    /// already underway are still counted.
    pub async fn shutdown(&self) {
        let mut watchers = self.watchers.lock().await;
        let stopped = watchers.len();
        for (_, mut watcher) in watchers.drain() {
            watcher.stop();
        }
        drop(watchers);

        let mut state = self.shared.state.lock().await;
        for folder in state.folders.iter_mut() {
            folder.is_active = false;
        }
        info!(watchers = stopped, "folder registry shut down");
    }

    /// Shut down and wait until every outstanding notification is applied.
    pub async fn close(self) -> RegistrySnapshot {
        self.shutdown().await;
        let Self {
            shared,
            watchers,
            observer,
            coordinator,
            ..
        } = self;
        drop(watchers);
        drop(observer);
        if let Err(err) = coordinator.await {
            warn!("registry coordination task failed: {}", err);
        }
        shared.state.lock().await.snapshot()
    }
}
