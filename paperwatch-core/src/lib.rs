//! # Paperwatch Core
//!
//! Watches folders for newly arrived papers and renames each one from its
//! embedded metadata.
//!
//! ## Overview
//!
//! - **Metadata**: read the PDF Info dictionary, falling back to heuristics on
//!   the text of the first pages when title or author are missing
//! - **Naming**: five fixed templates that turn metadata into a sanitized
//!   filename
//! - **Watching**: one [`watch::FolderWatcher`] per directory, combining a
//!   startup sweep with a live subscription to creation events
//! - **Registry**: [`registry::FolderRegistry`] owns the watchers, keeps the
//!   aggregate counters and persists the folder set
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use paperwatch_core::{
//!     naming::NamingTemplate,
//!     persistence::JsonFolderStore,
//!     registry::FolderRegistry,
//!     watch::{WatchConfig, WatchRuntime},
//! };
//!
//! async fn watch_downloads() -> paperwatch_core::Result<()> {
//!     let store = Arc::new(JsonFolderStore::new("state.json"));
//!     let runtime = WatchRuntime::native(WatchConfig::default());
//!     let registry = FolderRegistry::start(store, runtime).await?;
//!     registry
//!         .add_folder("/home/me/Downloads", NamingTemplate::AuthorTitleJournalYear)
//!         .await?;
//!     registry.close().await;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Error types shared by every module
pub mod error;

/// Document metadata extraction
pub mod metadata;

/// Filename templates and sanitization
pub mod naming;

/// Storage of the monitored-folder set and preferences
pub mod persistence;

pub mod registry;

/// Identifiers and persisted entities
pub mod types;

pub mod watch;

pub use error::{PaperwatchError, Result};
pub use types::{FolderID, MonitoredFolder};
