use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Strongly typed ID for monitored folders. Generated once when the folder is
/// added and never reused.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FolderID(pub Uuid);

impl Default for FolderID {
    fn default() -> Self {
        Self::new()
    }
}

impl FolderID {
    pub fn new() -> Self {
        FolderID(Uuid::now_v7())
    }
}

impl std::fmt::Display for FolderID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FolderID {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(FolderID)
    }
}
