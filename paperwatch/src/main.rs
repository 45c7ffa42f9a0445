//! # Paperwatch
//!
//! Command-line front end: keeps watchers running for the monitored folders
//! and offers one-shot commands to manage the folder set, inspect documents
//! and rename single files.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use paperwatch_config::{Config, ConfigLoad, ConfigLoader};
use paperwatch_core::naming::NamingTemplate;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "paperwatch", version)]
#[command(about = "Watch folders for new papers and rename them from their metadata")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
struct GlobalArgs {
    /// Path to paperwatch.toml
    #[arg(long, global = true, env = "PAPERWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Path to a .env file (defaults to ./.env)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch every monitored folder until interrupted
    Run {
        /// Start monitoring this folder as well (repeatable)
        #[arg(long = "folder", value_name = "PATH")]
        folders: Vec<PathBuf>,
        /// Template for folders added with --folder
        #[arg(long)]
        template: Option<NamingTemplate>,
    },
    /// Add a folder to the monitored set
    Add {
        path: PathBuf,
        #[arg(long)]
        template: Option<NamingTemplate>,
    },
    /// Remove a monitored folder by id
    Remove { id: String },
    /// List monitored folders
    List {
        #[arg(long)]
        json: bool,
    },
    /// List naming templates
    Templates,
    /// Set the template used when none is given
    SetDefault { template: NamingTemplate },
    /// Show the metadata extracted from a document and the names it would get
    Inspect {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Rename a single document
    Rename {
        file: PathBuf,
        #[arg(long)]
        template: Option<NamingTemplate>,
        /// Print the new name without renaming
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,paperwatch_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli.global)?;

    match cli.command {
        Command::Run { folders, template } => {
            commands::run(&config, folders, template).await
        }
        Command::Add { path, template } => {
            commands::add(&config, path, template).await
        }
        Command::Remove { id } => commands::remove(&config, &id).await,
        Command::List { json } => commands::list(&config, json).await,
        Command::Templates => commands::templates(&config).await,
        Command::SetDefault { template } => {
            commands::set_default(&config, template).await
        }
        Command::Inspect { file, json } => {
            commands::inspect(&config, &file, json)
        }
        Command::Rename {
            file,
            template,
            dry_run,
        } => commands::rename(&config, &file, template, dry_run).await,
    }
}

fn load_config(args: &GlobalArgs) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }

    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    Ok(config)
}
