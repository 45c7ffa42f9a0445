pub mod folder;
pub mod ids;

pub use folder::MonitoredFolder;
pub use ids::FolderID;
