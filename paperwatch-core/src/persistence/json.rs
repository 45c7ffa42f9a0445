use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use super::{FolderStore, Preferences};
use crate::types::{FolderID, MonitoredFolder};
use crate::{PaperwatchError, Result};

/// Format version written by this build.
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    #[serde(default)]
    folders: Vec<MonitoredFolder>,
    #[serde(default)]
    preferences: Preferences,
}

/// Single JSON file holding folders and preferences.
///
/// Writes go to a temporary file next to the target which is then renamed
/// over it, so a crash never leaves a half-written state file behind.
pub struct JsonFolderStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl fmt::Debug for JsonFolderStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFolderStore")
            .field("path", &self.path)
            .finish()
    }
}

impl JsonFolderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<StateDocument> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet");
                return Ok(StateDocument {
                    version: STATE_VERSION,
                    ..StateDocument::default()
                });
            }
            Err(err) => return Err(err.into()),
        };

        let document: StateDocument = serde_json::from_slice(&bytes)?;
        if document.version > STATE_VERSION {
            return Err(PaperwatchError::Persistence(format!(
                "{} was written by a newer version (format {}, supported {})",
                self.path.display(),
                document.version,
                STATE_VERSION
            )));
        }
        Ok(document)
    }

    async fn write_document(&self, mut document: StateDocument) -> Result<()> {
        document.version = STATE_VERSION;
        let bytes = serde_json::to_vec_pretty(&document)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|err| PaperwatchError::Internal(format!("state write task failed: {err}")))?
    }

    /// Read-modify-write of the whole document under the write lock.
    async fn update<F, T>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut StateDocument) -> T + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        let outcome = apply(&mut document);
        self.write_document(document).await?;
        Ok(outcome)
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| PaperwatchError::Io(err.error))?;
    Ok(())
}

#[async_trait]
impl FolderStore for JsonFolderStore {
    async fn load(&self) -> Result<Vec<MonitoredFolder>> {
        Ok(self.read_document().await?.folders)
    }

    async fn save(&self, folders: &[MonitoredFolder]) -> Result<()> {
        let folders = folders.to_vec();
        self.update(move |document| document.folders = folders).await
    }

    async fn upsert(&self, folder: &MonitoredFolder) -> Result<()> {
        let folder = folder.clone();
        self.update(move |document| {
            match document.folders.iter_mut().find(|stored| stored.id == folder.id) {
                Some(stored) => *stored = folder,
                None => document.folders.push(folder),
            }
        })
        .await
    }

    async fn remove(&self, folder_id: FolderID) -> Result<bool> {
        self.update(move |document| {
            let before = document.folders.len();
            document.folders.retain(|stored| stored.id != folder_id);
            document.folders.len() != before
        })
        .await
    }

    async fn record_processed(&self, folder_id: FolderID, processed_count: u64) -> Result<bool> {
        self.update(move |document| {
            match document.folders.iter_mut().find(|stored| stored.id == folder_id) {
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
        Ok(self.read_document().await?.preferences)
    }

    async fn save_preferences(&self, preferences: &Preferences) -> Result<()> {
        let preferences = preferences.clone();
        self.update(move |document| document.preferences = preferences)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingTemplate;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFolderStore::new(dir.path().join("state.json"));
        assert!(store.load().await.unwrap().is_empty());
        assert_eq!(store.load_preferences().await.unwrap(), Preferences::default());
    }

    #[tokio::test]
    async fn folders_and_preferences_do_not_clobber_each_other() {
        let dir = tempdir().unwrap();
        let store = JsonFolderStore::new(dir.path().join("nested").join("state.json"));

        let folder = MonitoredFolder::new("/papers", NamingTemplate::YearAuthorTitle);
        store.save(std::slice::from_ref(&folder)).await.unwrap();

        let preferences = Preferences {
            default_template: Some(NamingTemplate::AuthorYearTitle),
            last_selected_folder: Some(PathBuf::from("/papers")),
        };
        store.save_preferences(&preferences).await.unwrap();

        assert_eq!(store.load().await.unwrap(), vec![folder]);
        assert_eq!(store.load_preferences().await.unwrap(), preferences);
    }

    #[tokio::test]
    async fn per_folder_writes_keep_entries_written_elsewhere() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let running = JsonFolderStore::new(&path);
        let other_process = JsonFolderStore::new(&path);

        let mut watched = MonitoredFolder::new("/papers", NamingTemplate::default());
        running.upsert(&watched).await.unwrap();
        let added_elsewhere = MonitoredFolder::new("/inbox", NamingTemplate::AuthorYearTitle);
        other_process.upsert(&added_elsewhere).await.unwrap();

        assert!(running.record_processed(watched.id, 3).await.unwrap());
        watched.processed_count = 3;
        assert_eq!(
            other_process.load().await.unwrap(),
            vec![watched.clone(), added_elsewhere.clone()]
        );

        assert!(other_process.remove(watched.id).await.unwrap());
        assert!(!running.record_processed(watched.id, 4).await.unwrap());
        assert_eq!(running.load().await.unwrap(), vec![added_elsewhere]);
        assert!(!running.remove(watched.id).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_newer_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"version": 99, "folders": []}"#).unwrap();

        let err = JsonFolderStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, PaperwatchError::Persistence(_)));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let err = JsonFolderStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, PaperwatchError::Serialization(_)));
    }
}
