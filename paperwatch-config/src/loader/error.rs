use std::path::PathBuf;

use paperwatch_core::naming::UnknownTemplate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {}", path.display())]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid default template '{value}'")]
    InvalidTemplate {
        value: String,
        #[source]
        source: UnknownTemplate,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
