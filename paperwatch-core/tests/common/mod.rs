#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use paperwatch_core::metadata::{DocumentMetadata, MetadataExtractor};
use paperwatch_core::watch::{ChannelEventSource, WatchConfig, WatchNotice, WatchRuntime};
use paperwatch_core::{PaperwatchError, Result};
use tokio::sync::mpsc;

/// Extractor answering from a table keyed by file name. Unknown files are
/// unreadable.
#[derive(Debug, Default, Clone)]
pub struct TableExtractor {
    entries: Arc<Mutex<HashMap<String, DocumentMetadata>>>,
}

impl TableExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file_name: &str, metadata: DocumentMetadata) {
        self.entries
            .lock()
            .unwrap()
            .insert(file_name.to_string(), metadata);
    }
}

impl MetadataExtractor for TableExtractor {
    fn extract(&self, path: &Path) -> Result<DocumentMetadata> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.entries
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .ok_or_else(|| PaperwatchError::UnreadableDocument {
                path: path.to_path_buf(),
                reason: "not a PDF".to_string(),
            })
    }
}

pub fn paper(author: &str, title: &str, year: i32) -> DocumentMetadata {
    DocumentMetadata {
        author: Some(author.to_string()),
        title: Some(title.to_string()),
        creation_date: Some(date(year)),
        ..DocumentMetadata::default()
    }
}

pub fn date(year: i32) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(&format!("{year}-06-01T12:00:00+00:00")).unwrap()
}

pub fn fast_config() -> WatchConfig {
    WatchConfig {
        coalesce_latency: Duration::from_millis(20),
        sweep_delay: Duration::ZERO,
        ..WatchConfig::default()
    }
}

pub fn runtime(source: &ChannelEventSource, extractor: &TableExtractor) -> WatchRuntime {
    WatchRuntime::new(
        Arc::new(source.clone()),
        Arc::new(extractor.clone()),
        fast_config(),
    )
}

/// Next notice, failing the test after a generous timeout.
pub async fn next_notice(rx: &mut mpsc::UnboundedReceiver<WatchNotice>) -> WatchNotice {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a watch notice")
        .expect("notice channel closed")
}

/// Poll `check` until it holds or a timeout expires.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached before timeout");
}
