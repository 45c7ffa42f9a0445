mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::{TableExtractor, fast_config, next_notice, paper, runtime};
use paperwatch_core::metadata::{DocumentMetadata, MetadataExtractor};
use paperwatch_core::naming::NamingTemplate;
use paperwatch_core::{FolderID, Result};
use paperwatch_core::watch::{
    ChannelEventSource, ChannelObserver, FolderWatcher, FsChange, NotifyEventSource, WatchNotice,
    WatchRuntime,
};
use tempfile::tempdir;

#[tokio::test]
async fn sweep_reports_count_then_renames_existing_documents() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("download.pdf"), b"one").unwrap();
    fs::write(dir.path().join("readme.txt"), b"skip").unwrap();

    let extractor = TableExtractor::new();
    extractor.insert("download.pdf", paper("Jane Smith", "Graph Methods", 2021));
    let source = ChannelEventSource::new();
    let (observer, mut notices) = ChannelObserver::channel();
    let folder_id = FolderID::new();

    let _watcher = FolderWatcher::start(
        folder_id,
        dir.path().to_path_buf(),
        Some(NamingTemplate::AuthorYearTitle),
        &runtime(&source, &extractor),
        Arc::new(observer),
    )
    .await;

    assert_eq!(
        next_notice(&mut notices).await,
        WatchNotice::Status {
            folder_id,
            message: "Found 1 PDF files to process".into(),
        }
    );
    assert_eq!(
        next_notice(&mut notices).await,
        WatchNotice::FileProcessed {
            folder_id,
            new_name: "Smith_2021_Graph_Methods.pdf".into(),
        }
    );
    assert!(dir.path().join("Smith_2021_Graph_Methods.pdf").exists());
    assert!(dir.path().join("readme.txt").exists());
}

#[tokio::test]
async fn created_documents_are_processed_and_others_ignored() {
    let dir = tempdir().unwrap();
    let extractor = TableExtractor::new();
    extractor.insert("new.pdf", paper("Ada Lovelace", "Analytical Engines", 1843));
    let source = ChannelEventSource::new();
    let (observer, mut notices) = ChannelObserver::channel();
    let folder_id = FolderID::new();

    let watcher = FolderWatcher::start(
        folder_id,
        dir.path().to_path_buf(),
        Some(NamingTemplate::AuthorTitleYear),
        &runtime(&source, &extractor),
        Arc::new(observer),
    )
    .await;
    assert!(watcher.is_active());
    assert_eq!(
        next_notice(&mut notices).await,
        WatchNotice::Status {
            folder_id,
            message: "Found 0 PDF files to process".into(),
        }
    );

    fs::write(dir.path().join("new.pdf"), b"pdf").unwrap();
    fs::write(dir.path().join("notes.txt"), b"txt").unwrap();
    let delivered = source
        .emit(
            dir.path(),
            vec![
                FsChange::created(dir.path().join("notes.txt")),
                FsChange::created(dir.path().join("new.pdf")),
            ],
        )
        .await;
    assert!(delivered);

    assert_eq!(
        next_notice(&mut notices).await,
        WatchNotice::FileProcessed {
            folder_id,
            new_name: "Lovelace_Analytical_Engines_1843.pdf".into(),
        }
    );
    assert!(dir.path().join("notes.txt").exists());
}

#[tokio::test]
async fn collision_leaves_both_files_untouched() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("incoming.pdf"), b"incoming").unwrap();
    fs::write(dir.path().join("Smith_2020_Results.pdf"), b"existing").unwrap();

    let extractor = TableExtractor::new();
    extractor.insert("incoming.pdf", paper("J. Smith", "Results", 2020));
    extractor.insert("Smith_2020_Results.pdf", paper("J. Smith", "Results", 2020));
    let source = ChannelEventSource::new();
    let (observer, mut notices) = ChannelObserver::channel();
    let folder_id = FolderID::new();

    let _watcher = FolderWatcher::start(
        folder_id,
        dir.path().to_path_buf(),
        Some(NamingTemplate::AuthorYearTitle),
        &runtime(&source, &extractor),
        Arc::new(observer),
    )
    .await;

    let mut messages = Vec::new();
    for _ in 0..3 {
        match next_notice(&mut notices).await {
            WatchNotice::Status { message, .. } => messages.push(message),
            other => panic!("unexpected notice {other:?}"),
        }
    }

    assert_eq!(
        messages,
        vec![
            "Found 2 PDF files to process".to_string(),
            "File Smith_2020_Results.pdf already has correct name".to_string(),
            "File Smith_2020_Results.pdf already exists".to_string(),
        ]
    );
    assert_eq!(fs::read(dir.path().join("incoming.pdf")).unwrap(), b"incoming");
    assert_eq!(
        fs::read(dir.path().join("Smith_2020_Results.pdf")).unwrap(),
        b"existing"
    );
}

#[tokio::test]
async fn missing_template_and_unreadable_documents_are_reported() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), b"a").unwrap();

    let extractor = TableExtractor::new();
    let source = ChannelEventSource::new();
    let (observer, mut notices) = ChannelObserver::channel();
    let folder_id = FolderID::new();

    let _unbound = FolderWatcher::start(
        folder_id,
        dir.path().to_path_buf(),
        None,
        &runtime(&source, &extractor),
        Arc::new(observer.clone()),
    )
    .await;
    assert!(matches!(next_notice(&mut notices).await, WatchNotice::Status { .. }));
    assert_eq!(
        next_notice(&mut notices).await,
        WatchNotice::Status {
            folder_id,
            message: "No naming pattern set".into(),
        }
    );

    let other_dir = tempdir().unwrap();
    fs::write(other_dir.path().join("b.pdf"), b"b").unwrap();
    let other_id = FolderID::new();
    let _bound = FolderWatcher::start(
        other_id,
        other_dir.path().to_path_buf(),
        Some(NamingTemplate::default()),
        &runtime(&source, &extractor),
        Arc::new(observer),
    )
    .await;
    assert!(matches!(next_notice(&mut notices).await, WatchNotice::Status { .. }));
    match next_notice(&mut notices).await {
        WatchNotice::Status { folder_id, message } => {
            assert_eq!(folder_id, other_id);
            assert!(message.starts_with("Failed to process b.pdf:"), "{message}");
        }
        other => panic!("unexpected notice {other:?}"),
    }
    assert!(other_dir.path().join("b.pdf").exists());
}

#[tokio::test]
async fn refused_subscription_marks_inactive_but_still_sweeps() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("old.pdf"), b"old").unwrap();

    let extractor = TableExtractor::new();
    extractor.insert("old.pdf", paper("Grace Hopper", "Compilers", 1952));
    let source = ChannelEventSource::new();
    source.refuse(dir.path());
    let (observer, mut notices) = ChannelObserver::channel();
    let folder_id = FolderID::new();

    let watcher = FolderWatcher::start(
        folder_id,
        dir.path().to_path_buf(),
        Some(NamingTemplate::YearAuthorTitle),
        &runtime(&source, &extractor),
        Arc::new(observer),
    )
    .await;
    assert!(!watcher.is_active());

    let mut processed = None;
    let mut saw_failure = false;
    for _ in 0..3 {
        match next_notice(&mut notices).await {
            WatchNotice::FileProcessed { new_name, .. } => processed = Some(new_name),
            WatchNotice::Status { message, .. } => {
                saw_failure |= message.starts_with("Failed to watch");
            }
        }
    }
    assert!(saw_failure);
    assert_eq!(processed.as_deref(), Some("1952_Hopper_Compilers.pdf"));
}

#[tokio::test]
async fn stop_releases_subscription_and_is_idempotent() {
    let dir = tempdir().unwrap();
    let extractor = TableExtractor::new();
    let source = ChannelEventSource::new();
    let (observer, _notices) = ChannelObserver::channel();

    let mut watcher = FolderWatcher::start(
        FolderID::new(),
        dir.path().to_path_buf(),
        Some(NamingTemplate::default()),
        &runtime(&source, &extractor),
        Arc::new(observer),
    )
    .await;
    assert!(source.is_subscribed(dir.path()));

    watcher.stop();
    watcher.stop();

    assert!(!watcher.is_active());
    assert!(!source.is_subscribed(dir.path()));
    assert!(!source.emit(dir.path(), vec![FsChange::created(dir.path().join("x.pdf"))]).await);
}

#[tokio::test]
async fn unlistable_folder_reports_scan_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("gone");
    let extractor = TableExtractor::new();
    let source = ChannelEventSource::new();
    let (observer, mut notices) = ChannelObserver::channel();

    let _watcher = FolderWatcher::start(
        FolderID::new(),
        missing,
        Some(NamingTemplate::default()),
        &runtime(&source, &extractor),
        Arc::new(observer),
    )
    .await;

    match next_notice(&mut notices).await {
        WatchNotice::Status { message, .. } => {
            assert!(message.starts_with("Error scanning folder:"), "{message}")
        }
        other => panic!("unexpected notice {other:?}"),
    }
}

#[tokio::test]
async fn creation_echo_of_our_own_rename_is_ignored() {
    let dir = tempdir().unwrap();
    let extractor = TableExtractor::new();
    extractor.insert("new.pdf", paper("Ada Lovelace", "Analytical Engines", 1843));
    extractor.insert(
        "Lovelace_Analytical_Engines_1843.pdf",
        paper("Ada Lovelace", "Analytical Engines", 1843),
    );
    let source = ChannelEventSource::new();
    let (observer, mut notices) = ChannelObserver::channel();
    let folder_id = FolderID::new();

    let _watcher = FolderWatcher::start(
        folder_id,
        dir.path().to_path_buf(),
        Some(NamingTemplate::AuthorTitleYear),
        &runtime(&source, &extractor),
        Arc::new(observer),
    )
    .await;
    next_notice(&mut notices).await;

    fs::write(dir.path().join("new.pdf"), b"pdf").unwrap();
    source
        .emit(dir.path(), vec![FsChange::created(dir.path().join("new.pdf"))])
        .await;
    assert_eq!(
        next_notice(&mut notices).await,
        WatchNotice::FileProcessed {
            folder_id,
            new_name: "Lovelace_Analytical_Engines_1843.pdf".into(),
        }
    );

    let target = dir.path().join("Lovelace_Analytical_Engines_1843.pdf");
    source
        .emit(dir.path(), vec![FsChange::created(target.clone())])
        .await;
    assert_quiet(&mut notices).await;

    // A later creation under the same name is new work again.
    source
        .emit(dir.path(), vec![FsChange::created(target)])
        .await;
    assert_eq!(
        next_notice(&mut notices).await,
        WatchNotice::Status {
            folder_id,
            message: "File Lovelace_Analytical_Engines_1843.pdf already has correct name".into(),
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn native_events_yield_one_notice_per_dropped_file() {
    let dir = tempdir().unwrap();
    let extractor = TableExtractor::new();
    extractor.insert("new.pdf", paper("Ada Lovelace", "Analytical Engines", 1843));
    extractor.insert(
        "Lovelace_Analytical_Engines_1843.pdf",
        paper("Ada Lovelace", "Analytical Engines", 1843),
    );
    let runtime = WatchRuntime::new(
        Arc::new(NotifyEventSource::new()),
        Arc::new(extractor.clone()),
        fast_config(),
    );
    let (observer, mut notices) = ChannelObserver::channel();
    let folder_id = FolderID::new();

    let watcher = FolderWatcher::start(
        folder_id,
        dir.path().to_path_buf(),
        Some(NamingTemplate::AuthorTitleYear),
        &runtime,
        Arc::new(observer),
    )
    .await;
    assert!(watcher.is_active());
    next_notice(&mut notices).await;

    fs::write(dir.path().join("new.pdf"), b"pdf").unwrap();

    assert_eq!(
        next_notice(&mut notices).await,
        WatchNotice::FileProcessed {
            folder_id,
            new_name: "Lovelace_Analytical_Engines_1843.pdf".into(),
        }
    );
    assert_quiet(&mut notices).await;
    assert!(dir.path().join("Lovelace_Analytical_Engines_1843.pdf").exists());
}

async fn assert_quiet(notices: &mut tokio::sync::mpsc::UnboundedReceiver<WatchNotice>) {
    let extra = tokio::time::timeout(Duration::from_millis(500), notices.recv()).await;
    assert!(extra.is_err(), "unexpected notice {extra:?}");
}

#[derive(Debug)]
struct PanickingExtractor;

impl MetadataExtractor for PanickingExtractor {
    fn extract(&self, path: &Path) -> Result<DocumentMetadata> {
        panic!("malformed xref table in {}", path.display());
    }
}

#[tokio::test]
async fn extractor_panic_is_reported_and_the_sweep_continues() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("bad.pdf"), b"%PDF-1.4 broken").unwrap();
    fs::write(dir.path().join("worse.pdf"), b"%PDF-1.4 broken").unwrap();
    let runtime = WatchRuntime::new(
        Arc::new(ChannelEventSource::new()),
        Arc::new(PanickingExtractor),
        fast_config(),
    );
    let (observer, mut notices) = ChannelObserver::channel();
    let folder_id = FolderID::new();

    let watcher = FolderWatcher::start(
        folder_id,
        dir.path().to_path_buf(),
        Some(NamingTemplate::AuthorYearTitle),
        &runtime,
        Arc::new(observer),
    )
    .await;

    next_notice(&mut notices).await;
    for name in ["bad.pdf", "worse.pdf"] {
        match next_notice(&mut notices).await {
            WatchNotice::Status { message, .. } => {
                assert!(
                    message.starts_with(&format!("Failed to process {name}: ")),
                    "unexpected message {message}"
                );
            }
            other => panic!("unexpected notice {other:?}"),
        }
        assert!(dir.path().join(name).exists());
    }
    assert!(watcher.is_active());
}
