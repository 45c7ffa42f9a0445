//! Where the monitored-folder set and user preferences live between runs.

mod json;
mod memory;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::naming::NamingTemplate;
use crate::types::{FolderID, MonitoredFolder};

pub use json::{JsonFolderStore, STATE_VERSION};
pub use memory::InMemoryFolderStore;

/// User choices remembered alongside the folder set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub default_template: Option<NamingTemplate>,
    #[serde(default)]
    pub last_selected_folder: Option<PathBuf>,
}

/// Load and save the monitored-folder set.
///
/// `save` replaces the whole set. The per-folder writes touch only the entry
/// they name, so several processes sharing one store keep each other's
/// folders. Folder and preference writes must not clobber each other.
#[async_trait]
pub trait FolderStore: Send + Sync {
    async fn load(&self) -> Result<Vec<MonitoredFolder>>;

    async fn save(&self, folders: &[MonitoredFolder]) -> Result<()>;

    /// Store `folder`, replacing any entry with the same id.
    async fn upsert(&self, folder: &MonitoredFolder) -> Result<()>;

    /// Forget `folder_id`. Returns whether it was stored.
    async fn remove(&self, folder_id: FolderID) -> Result<bool>;

    /// Set the processed count of a stored folder. A folder that is no longer
    /// stored stays absent; returns whether it was found.
    async fn record_processed(&self, folder_id: FolderID, processed_count: u64) -> Result<bool>;

    async fn load_preferences(&self) -> Result<Preferences>;

    async fn save_preferences(&self, preferences: &Preferences) -> Result<()>;
}
