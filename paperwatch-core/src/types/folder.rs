use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::FolderID;
use crate::naming::NamingTemplate;

/// A directory the registry watches, as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredFolder {
    pub id: FolderID,
    pub path: PathBuf,
    pub template: NamingTemplate,
    /// Successful renames since the folder was added.
    #[serde(default)]
    pub processed_count: u64,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub added_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl MonitoredFolder {
    pub fn new(path: impl Into<PathBuf>, template: NamingTemplate) -> Self {
        Self {
            id: FolderID::new(),
            path: path.into(),
            template,
            processed_count: 0,
            is_active: true,
            added_at: Utc::now(),
        }
    }

    /// Last path component, for menus and log lines.
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
