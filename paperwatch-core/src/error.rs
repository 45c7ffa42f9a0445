use std::path::PathBuf;

use thiserror::Error;

use crate::types::ids::FolderID;

#[derive(Error, Debug)]
pub enum PaperwatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unable to open document {}: {reason}", path.display())]
    UnreadableDocument { path: PathBuf, reason: String },

    #[error("Error scanning folder {}: {source}", path.display())]
    DirectoryListing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No naming pattern set for {}", path.display())]
    NoTemplateConfigured { path: PathBuf },

    #[error("File {} already exists", target.display())]
    NameCollision { target: PathBuf },

    #[error("Failed to watch {}: {reason}", path.display())]
    Subscription { path: PathBuf, reason: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Folder {} is already monitored", .0.display())]
    AlreadyMonitored(PathBuf),

    #[error("Monitored folder not found: {0}")]
    FolderNotFound(FolderID),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PaperwatchError>;
