use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, spawn_blocking};
use tracing::{debug, error, info, warn};

use super::processor::{FileProcessor, ProcessOutcome};
use super::source::{ChangeKind, EventSource, FsChange, SubscriptionGuard};
use super::{NotifyEventSource, WatchConfig, WatchObserver};
use crate::metadata::{MetadataExtractor, PdfMetadataExtractor};
use crate::naming::NamingTemplate;
use crate::types::ids::FolderID;
use crate::{PaperwatchError, Result};

/// Collaborators shared by every watcher.
#[derive(Clone)]
pub struct WatchRuntime {
    pub source: Arc<dyn EventSource>,
    pub extractor: Arc<dyn MetadataExtractor>,
    pub config: WatchConfig,
}

impl WatchRuntime {
    pub fn new(
        source: Arc<dyn EventSource>,
        extractor: Arc<dyn MetadataExtractor>,
        config: WatchConfig,
    ) -> Self {
        Self {
            source,
            extractor,
            config,
        }
    }

    /// Native filesystem notifications and the PDF extractor.
    pub fn native(config: WatchConfig) -> Self {
        Self::new(
            Arc::new(NotifyEventSource::new()),
            Arc::new(PdfMetadataExtractor::new()),
            config,
        )
    }
}

impl fmt::Debug for WatchRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRuntime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// How long a rename we made ourselves may still echo back as a creation.
const RENAME_ECHO_GRACE: Duration = Duration::from_secs(10);

/// Targets this watcher has just renamed documents to.
///
/// Linking a document to its new name is itself a creation in the watched
/// folder; the first creation event for a claimed target is swallowed.
#[derive(Debug, Default, Clone)]
struct RecentRenames {
    targets: Arc<Mutex<HashMap<PathBuf, Instant>>>,
}

impl RecentRenames {
    fn claim(&self, target: &Path) {
        self.lock().insert(claim_key(target), Instant::now());
    }

    fn release(&self, target: &Path) {
        self.lock().remove(&claim_key(target));
    }

    /// Consume the claim on `path`, if one is still fresh.
    fn take(&self, path: &Path, window: Duration) -> bool {
        let mut targets = self.lock();
        let now = Instant::now();
        targets.retain(|_, claimed| now.duration_since(*claimed) <= window);
        targets.remove(&claim_key(path)).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Instant>> {
        self.targets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Event paths may name the folder differently from how it was configured
/// (symlinked temp dirs, for one), so claims are keyed by the resolved parent.
fn claim_key(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

struct WatchContext {
    folder_id: FolderID,
    root: PathBuf,
    processor: FileProcessor,
    observer: Arc<dyn WatchObserver>,
    config: WatchConfig,
    stopped: AtomicBool,
    recent_renames: RecentRenames,
}

impl WatchContext {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn echo_window(&self) -> Duration {
        self.config.coalesce_latency + RENAME_ECHO_GRACE
    }

    fn report(&self, message: &str) {
        self.observer.on_error(self.folder_id, message);
    }

    /// Process one document on a blocking thread and emit exactly one
    /// notification for it.
    async fn process_and_report(self: Arc<Self>, path: PathBuf) {
        let processor = self.processor.clone();
        let recent = self.recent_renames.clone();
        let task_path = path.clone();
        let result = spawn_blocking(move || -> Result<ProcessOutcome> {
            let plan = processor.plan(&task_path)?;
            if plan.is_noop() {
                return processor.commit(plan);
            }
            let target = plan.target.clone();
            recent.claim(&target);
            processor.commit(plan).inspect_err(|_| recent.release(&target))
        })
        .await;
        let file_name = display_name(&path);

        match result {
            Ok(Ok(ProcessOutcome::Renamed { new_name, .. })) => {
                self.observer.on_file_processed(self.folder_id, &new_name);
            }
            Ok(Ok(ProcessOutcome::AlreadyNamed { name })) => {
                self.report(&format!("File {name} already has correct name"));
            }
            Ok(Err(err)) => {
                warn!(
                    folder_id = %self.folder_id,
                    path = %path.display(),
                    "processing failed: {}",
                    err
                );
                self.report(&failure_message(&file_name, &err));
            }
            Err(join_err) => {
                error!(path = %path.display(), "processing task failed: {}", join_err);
                self.report(&format!("Failed to process {file_name}: {join_err}"));
            }
        }
    }
}

/// Live monitoring of one directory.
///
/// Starting a watcher kicks off a sweep of the documents already present and
/// subscribes to creation events. Stopping it releases the subscription and
/// halts the sweep after the current document; processing that is already
/// underway runs to completion and still reports.
pub struct FolderWatcher {
    context: Arc<WatchContext>,
    active: bool,
    guard: Option<SubscriptionGuard>,
    dispatch_task: Option<JoinHandle<()>>,
    sweep_task: JoinHandle<()>,
}

impl FolderWatcher {
    /// Start watching `root`. A subscription failure is reported to the
    /// observer and leaves the watcher inactive; the sweep runs regardless.
    pub async fn start(
        folder_id: FolderID,
        root: PathBuf,
        template: Option<NamingTemplate>,
        runtime: &WatchRuntime,
        observer: Arc<dyn WatchObserver>,
    ) -> Self {
        let context = Arc::new(WatchContext {
            folder_id,
            root: root.clone(),
            processor: FileProcessor::new(Arc::clone(&runtime.extractor), template),
            observer,
            config: runtime.config.clone(),
            stopped: AtomicBool::new(false),
            recent_renames: RecentRenames::default(),
        });

        let sweep_task = tokio::spawn(run_sweep(Arc::clone(&context)));

        let source = Arc::clone(&runtime.source);
        let latency = runtime.config.coalesce_latency;
        let recursive = runtime.config.recursive;
        let subscribe_root = root.clone();
        let subscription = spawn_blocking(move || {
            source.subscribe(&subscribe_root, latency, recursive)
        })
        .await
        .unwrap_or_else(|join_err| {
            Err(PaperwatchError::Internal(format!(
                "watcher initialization panicked: {join_err}"
            )))
        });

        match subscription {
            Ok(subscription) => {
                let (batches, guard) = subscription.into_parts();
                let dispatch_task = tokio::spawn(dispatch_loop(Arc::clone(&context), batches));
                info!(folder_id = %folder_id, path = %root.display(), "watching folder");
                Self {
                    context,
                    active: true,
                    guard: Some(guard),
                    dispatch_task: Some(dispatch_task),
                    sweep_task,
                }
            }
            Err(err) => {
                error!(
                    folder_id = %folder_id,
                    path = %root.display(),
                    "failed to subscribe to folder changes: {}",
                    err
                );
                context.report(&err.to_string());
                Self {
                    context,
                    active: false,
                    guard: None,
                    dispatch_task: None,
                    sweep_task,
                }
            }
        }
    }

    /// Whether the live subscription is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Stop delivering notifications. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.context.stopped.store(true, Ordering::Release);
        if let Some(task) = self.dispatch_task.take() {
            task.abort();
        }
        if self.guard.take().is_some() {
            info!(
                folder_id = %self.context.folder_id,
                path = %self.context.root.display(),
                "stopped watching folder"
            );
        }
        self.active = false;
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolderWatcher")
            .field("folder_id", &self.context.folder_id)
            .field("root", &self.context.root)
            .field("active", &self.active)
            .field("sweep_finished", &self.sweep_task.is_finished())
            .finish()
    }
}

async fn run_sweep(context: Arc<WatchContext>) {
    let documents = match list_documents(&context.root, &context.config).await {
        Ok(documents) => documents,
        Err(err) => {
            warn!(folder_id = %context.folder_id, "startup sweep failed: {}", err);
            let message = match &err {
                PaperwatchError::DirectoryListing { source, .. } => {
                    format!("Error scanning folder: {source}")
                }
                other => other.to_string(),
            };
            context.report(&message);
            return;
        }
    };

    context.report(&format!(
        "Found {} {} files to process",
        documents.len(),
        context.config.type_label()
    ));

    for path in documents {
        if context.is_stopped() {
            debug!(folder_id = %context.folder_id, "sweep halted by shutdown");
            break;
        }
        Arc::clone(&context).process_and_report(path).await;
        tokio::time::sleep(context.config.sweep_delay).await;
    }
}

async fn dispatch_loop(context: Arc<WatchContext>, mut batches: mpsc::Receiver<Vec<FsChange>>) {
    while let Some(batch) = batches.recv().await {
        if context.is_stopped() {
            break;
        }
        for change in batch {
            if change.kind != ChangeKind::Created {
                continue;
            }
            if !context.config.is_document(&change.path) {
                debug!(path = %change.path.display(), "ignoring non-document creation");
                continue;
            }
            if context.recent_renames.take(&change.path, context.echo_window()) {
                debug!(path = %change.path.display(), "ignoring our own rename");
                continue;
            }
            tokio::spawn(Arc::clone(&context).process_and_report(change.path));
        }
    }
    debug!(folder_id = %context.folder_id, "dispatch loop finished");
}

/// Documents directly inside `root`, sorted by path.
pub(crate) async fn list_documents(root: &Path, config: &WatchConfig) -> Result<Vec<PathBuf>> {
    let listing_error = |source: std::io::Error| PaperwatchError::DirectoryListing {
        path: root.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(root).await.map_err(listing_error)?;
    let mut documents = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(listing_error)? {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|kind| kind.is_file())
            .unwrap_or(false);
        if is_file && config.is_document(&path) {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn failure_message(file_name: &str, err: &PaperwatchError) -> String {
    match err {
        PaperwatchError::NameCollision { target } => {
            format!("File {} already exists", display_name(target))
        }
        PaperwatchError::NoTemplateConfigured { .. } => "No naming pattern set".to_string(),
        other => format!("Failed to process {file_name}: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_only_matching_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.PDF"), b"").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("folder.pdf")).unwrap();

        let documents = list_documents(dir.path(), &WatchConfig::default()).await.unwrap();
        let names: Vec<String> = documents.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);
    }

    #[tokio::test]
    async fn missing_directory_is_a_listing_failure() {
        let dir = tempdir().unwrap();
        let err = list_documents(&dir.path().join("absent"), &WatchConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PaperwatchError::DirectoryListing { .. }));
    }

    #[test]
    fn claimed_targets_are_swallowed_once() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Smith_2021_Graph_Methods.pdf");
        let renames = RecentRenames::default();

        renames.claim(&target);
        assert!(renames.take(&target, RENAME_ECHO_GRACE));
        assert!(!renames.take(&target, RENAME_ECHO_GRACE));
    }

    #[test]
    fn stale_or_released_claims_do_not_swallow_events() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Smith_2021_Graph_Methods.pdf");
        let renames = RecentRenames::default();

        renames.claim(&target);
        renames.release(&target);
        assert!(!renames.take(&target, RENAME_ECHO_GRACE));

        renames.claim(&target);
        std::thread::sleep(Duration::from_millis(5));
        assert!(!renames.take(&target, Duration::ZERO));
    }

    #[test]
    fn failure_messages_name_the_file() {
        let collision = PaperwatchError::NameCollision {
            target: PathBuf::from("/p/Smith_2020.pdf"),
        };
        assert_eq!(
            failure_message("a.pdf", &collision),
            "File Smith_2020.pdf already exists"
        );
        let no_template = PaperwatchError::NoTemplateConfigured {
            path: PathBuf::from("/p/a.pdf"),
        };
        assert_eq!(failure_message("a.pdf", &no_template), "No naming pattern set");
        let internal = PaperwatchError::Internal("boom".into());
        assert_eq!(
            failure_message("a.pdf", &internal),
            "Failed to process a.pdf: Internal error: boom"
        );
    }
}
