use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use paperwatch_config::Config;
use paperwatch_core::metadata::MetadataExtractor;
use paperwatch_core::naming::{self, NamingTemplate};
use paperwatch_core::persistence::{FolderStore, JsonFolderStore};
use paperwatch_core::registry::{FolderRegistry, RegistryEvent};
use paperwatch_core::watch::{FileProcessor, NotifyEventSource, ProcessOutcome, WatchRuntime};
use paperwatch_core::{FolderID, MonitoredFolder, PaperwatchError};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

fn open_store(config: &Config) -> JsonFolderStore {
    JsonFolderStore::new(&config.state_path)
}

/// Explicit choice, then the saved preference, then the configured default.
async fn resolve_template(
    store: &JsonFolderStore,
    config: &Config,
    explicit: Option<NamingTemplate>,
) -> anyhow::Result<NamingTemplate> {
    if let Some(template) = explicit {
        return Ok(template);
    }
    let preferences = store
        .load_preferences()
        .await
        .context("failed to read preferences")?;
    Ok(preferences.default_template.unwrap_or(config.default_template))
}

fn canonical_directory(path: &Path) -> anyhow::Result<PathBuf> {
    let canonical = std::fs::canonicalize(path)
        .with_context(|| format!("cannot access {}", path.display()))?;
    if !canonical.is_dir() {
        bail!("{} is not a directory", canonical.display());
    }
    Ok(canonical)
}

pub async fn run(
    config: &Config,
    folders: Vec<PathBuf>,
    template: Option<NamingTemplate>,
) -> anyhow::Result<()> {
    let store = Arc::new(open_store(config));
    let template = resolve_template(&store, config, template).await?;
    let runtime = WatchRuntime::new(
        Arc::new(NotifyEventSource::new()),
        Arc::new(config.watch.extractor()),
        config.watch.watch_config(),
    );

    let registry = FolderRegistry::start(store.clone(), runtime)
        .await
        .context("failed to start folder registry")?;
    let reporter = tokio::spawn(report_events(registry.subscribe()));

    for path in folders {
        let path = match canonical_directory(&path) {
            Ok(path) => path,
            Err(err) => {
                warn!("skipping folder: {:#}", err);
                continue;
            }
        };
        match registry.add_folder(&path, template).await {
            Ok(_) => {}
            Err(PaperwatchError::AlreadyMonitored(path)) => {
                info!(path = %path.display(), "folder already monitored");
            }
            Err(err) => warn!(path = %path.display(), "failed to add folder: {}", err),
        }
    }

    let snapshot = registry.snapshot().await;
    if snapshot.folders.is_empty() {
        warn!("no folders are monitored; add one with `paperwatch add <PATH>` or --folder");
    }
    info!(
        folders = snapshot.folders.len(),
        monitoring = snapshot.is_monitoring,
        "watching for new documents; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down");

    let snapshot = registry.close().await;
    reporter.abort();
    println!("Total processed files: {}", snapshot.total_processed_files);
    Ok(())
}

async fn report_events(mut events: broadcast::Receiver<RegistryEvent>) {
    loop {
        match events.recv().await {
            Ok(RegistryEvent::FileProcessed {
                new_name,
                total_processed_files,
                ..
            }) => {
                println!("Processed: {new_name}");
                info!(new_name = %new_name, total = total_processed_files, "document renamed");
            }
            Ok(RegistryEvent::Status { message, .. }) => println!("{message}"),
            Ok(RegistryEvent::FolderAdded(folder)) => {
                println!("Monitoring {} ({})", folder.path.display(), folder.template);
            }
            Ok(RegistryEvent::FolderRemoved { folder_id }) => {
                info!(folder_id = %folder_id, "folder removed");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "status reporter fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

pub async fn add(
    config: &Config,
    path: PathBuf,
    template: Option<NamingTemplate>,
) -> anyhow::Result<()> {
    let store = open_store(config);
    let path = canonical_directory(&path)?;
    let template = resolve_template(&store, config, template).await?;

    let folders = store
        .load()
        .await
        .context("failed to read monitored folders")?;
    if folders.iter().any(|folder| folder.path == path) {
        return Err(PaperwatchError::AlreadyMonitored(path).into());
    }

    let folder = MonitoredFolder::new(&path, template);
    store
        .upsert(&folder)
        .await
        .context("failed to save monitored folders")?;

    let mut preferences = store.load_preferences().await?;
    preferences.last_selected_folder = Some(path.clone());
    store.save_preferences(&preferences).await?;

    println!("Added {} ({}) as {}", path.display(), folder.template, folder.id);
    Ok(())
}

pub async fn remove(config: &Config, id: &str) -> anyhow::Result<()> {
    let folder_id: FolderID = id
        .parse()
        .with_context(|| format!("invalid folder id '{id}'"))?;
    let store = open_store(config);

    let folders = store
        .load()
        .await
        .context("failed to read monitored folders")?;
    let Some(folder) = folders.into_iter().find(|folder| folder.id == folder_id) else {
        return Err(PaperwatchError::FolderNotFound(folder_id).into());
    };
    let removed = store
        .remove(folder_id)
        .await
        .context("failed to save monitored folders")?;
    if !removed {
        return Err(PaperwatchError::FolderNotFound(folder_id).into());
    }

    println!("Removed {}", folder.path.display());
    Ok(())
}

pub async fn list(config: &Config, json: bool) -> anyhow::Result<()> {
    let folders = open_store(config)
        .load()
        .await
        .context("failed to read monitored folders")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&folders)?);
        return Ok(());
    }
    if folders.is_empty() {
        println!("No monitored folders");
        return Ok(());
    }
    for folder in &folders {
        println!(
            "{}  {}  template={}  processed={}  active={}",
            folder.id,
            folder.path.display(),
            folder.template,
            folder.processed_count,
            if folder.is_active { "yes" } else { "no" }
        );
    }
    let total: u64 = folders.iter().map(|folder| folder.processed_count).sum();
    println!("Total processed files: {total}");
    Ok(())
}

pub async fn templates(config: &Config) -> anyhow::Result<()> {
    let default = resolve_template(&open_store(config), config, None).await?;
    for template in NamingTemplate::ALL {
        let marker = if template == default { "*" } else { " " };
        println!(
            "{marker} {:<26} {:<38} e.g. {}",
            template.id(),
            template.description(),
            template.example_output()
        );
    }
    Ok(())
}

pub async fn set_default(config: &Config, template: NamingTemplate) -> anyhow::Result<()> {
    let store = open_store(config);
    let mut preferences = store.load_preferences().await?;
    preferences.default_template = Some(template);
    store
        .save_preferences(&preferences)
        .await
        .context("failed to save preferences")?;
    println!("Default template set to {template}");
    Ok(())
}

pub fn inspect(config: &Config, file: &Path, json: bool) -> anyhow::Result<()> {
    let metadata = config
        .watch
        .extractor()
        .extract(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let extension = file.extension().and_then(OsStr::to_str).unwrap_or_default();
    let names: Vec<(NamingTemplate, String)> = NamingTemplate::ALL
        .into_iter()
        .map(|template| (template, naming::generate(&metadata, template, extension)))
        .collect();

    if json {
        let names: serde_json::Map<String, serde_json::Value> = names
            .into_iter()
            .map(|(template, name)| (template.id().to_string(), name.into()))
            .collect();
        let output = serde_json::json!({
            "metadata": metadata,
            "first_author_surname": metadata.first_author_surname(),
            "year": metadata.year_string(),
            "names": names,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_field("Title", metadata.title.as_deref());
    print_field("Author", metadata.author.as_deref());
    print_field("Surname", metadata.first_author_surname().as_deref());
    print_field("Subject", metadata.subject.as_deref());
    print_field("Creator", metadata.creator.as_deref());
    print_field("Producer", metadata.producer.as_deref());
    print_field("Year", metadata.year_string().as_deref());
    if !metadata.keywords.is_empty() {
        print_field("Keywords", Some(&metadata.keywords.join(", ")));
    }
    println!();
    for (template, name) in names {
        println!("{:<26} {}", template.id(), name);
    }
    Ok(())
}

fn print_field(label: &str, value: Option<&str>) {
    println!("{label:<10} {}", value.unwrap_or("-"));
}

pub async fn rename(
    config: &Config,
    file: &Path,
    template: Option<NamingTemplate>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let template = resolve_template(&open_store(config), config, template).await?;
    let processor = FileProcessor::new(Arc::new(config.watch.extractor()), Some(template));

    if dry_run {
        let plan = processor
            .plan(file)
            .with_context(|| format!("failed to process {}", file.display()))?;
        if plan.is_noop() {
            println!("File {} already has correct name", plan.new_name);
        } else {
            println!("{} -> {}", file.display(), plan.new_name);
        }
        return Ok(());
    }

    match processor
        .process(file)
        .with_context(|| format!("failed to process {}", file.display()))?
    {
        ProcessOutcome::Renamed { target, .. } => {
            println!("Renamed {} -> {}", file.display(), target.display());
        }
        ProcessOutcome::AlreadyNamed { name } => {
            println!("File {name} already has correct name");
        }
    }
    Ok(())
}
