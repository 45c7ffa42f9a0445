pub mod error;

use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
};

use paperwatch_core::naming::NamingTemplate;
use tracing::debug;

use crate::models::{
    Config, ConfigMetadata, DEFAULT_COALESCE_LATENCY_MS, DEFAULT_STATE_PATH,
    DEFAULT_SWEEP_DELAY_MS, DEFAULT_TEXT_PAGE_LIMIT, WatchSettings,
    default_extensions,
};
use crate::sources::{EnvConfig, FileConfig, FileWatchConfig};
use crate::validation::ConfigWarnings;
use error::ConfigLoadError;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("paperwatch.toml"),
        PathBuf::from("config/paperwatch.toml"),
    ]
});

#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Load the `.env` file, read the process environment and compose the
    /// effective configuration.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Compose configuration from an already gathered environment.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let resolved = if let Some(explicit) = &self.config_path {
            Some((explicit.clone(), true))
        } else if let Some(from_env) = &env.config_path {
            Some((from_env.clone(), true))
        } else {
            DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .map(|path| (path.clone(), false))
        };

        let Some((path, explicit)) = resolved else {
            return Ok((None, None));
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        debug!(path = %path.display(), "reading configuration file");
        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if config_path.is_none() {
        warnings.push_with_hint(
            "No paperwatch.toml detected; using environment variables and defaults",
            "Create paperwatch.toml or pass --config to persist settings",
        );
    }

    let FileConfig {
        state_path: file_state_path,
        default_template: file_template,
        watch: file_watch,
    } = file_config.unwrap_or_default();
    let FileWatchConfig {
        coalesce_latency_ms: file_coalesce,
        sweep_delay_ms: file_sweep_delay,
        extensions: file_extensions,
        recursive: file_recursive,
        text_page_limit: file_text_page_limit,
    } = file_watch;

    let state_path = env
        .state_path
        .or(file_state_path)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH));

    let default_template = match env.default_template.or(file_template) {
        Some(raw) => raw.parse::<NamingTemplate>().map_err(|source| {
            ConfigLoadError::InvalidTemplate { value: raw, source }
        })?,
        None => NamingTemplate::default(),
    };

    let extensions = normalize_extensions(
        env.extensions.or(file_extensions).unwrap_or_else(default_extensions),
    );
    let extensions = if extensions.is_empty() {
        warnings.push_with_hint(
            "No document extensions configured; defaulting to pdf",
            "Set watch.extensions or PAPERWATCH_EXTENSIONS",
        );
        default_extensions()
    } else {
        extensions
    };

    let text_page_limit = env
        .text_page_limit
        .or(file_text_page_limit)
        .unwrap_or(DEFAULT_TEXT_PAGE_LIMIT);
    let text_page_limit = if text_page_limit == 0 {
        warnings.push("text_page_limit of 0 raised to 1");
        1
    } else {
        text_page_limit
    };

    let watch = WatchSettings {
        coalesce_latency_ms: env
            .coalesce_latency_ms
            .or(file_coalesce)
            .unwrap_or(DEFAULT_COALESCE_LATENCY_MS),
        sweep_delay_ms: env
            .sweep_delay_ms
            .or(file_sweep_delay)
            .unwrap_or(DEFAULT_SWEEP_DELAY_MS),
        extensions,
        recursive: env.recursive.or(file_recursive).unwrap_or(false),
        text_page_limit,
    };

    let config = Config {
        state_path,
        default_template,
        watch,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    Ok((config, warnings))
}

/// Lower-case, strip leading dots, drop blanks and duplicates.
fn normalize_extensions(raw: Vec<String>) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    for value in raw {
        let normalized = value.trim().trim_start_matches('.').to_ascii_lowercase();
        if !normalized.is_empty() && !extensions.contains(&normalized) {
            extensions.push(normalized);
        }
    }
    extensions
}
