use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_template: Option<String>,
    #[serde(default)]
    pub watch: FileWatchConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileWatchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coalesce_latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_page_limit: Option<u32>,
}

/// Values read from `PAPERWATCH_*` environment variables. Unparseable
/// numbers and booleans are ignored.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
    pub default_template: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub coalesce_latency_ms: Option<u64>,
    pub sweep_delay_ms: Option<u64>,
    pub recursive: Option<bool>,
    pub text_page_limit: Option<u32>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: std::env::var("PAPERWATCH_CONFIG").ok().map(PathBuf::from),
            state_path: std::env::var("PAPERWATCH_STATE_PATH")
                .ok()
                .map(PathBuf::from),
            default_template: std::env::var("PAPERWATCH_DEFAULT_TEMPLATE").ok(),
            extensions: parse_csv_var("PAPERWATCH_EXTENSIONS"),
            coalesce_latency_ms: std::env::var("PAPERWATCH_COALESCE_MS")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
            sweep_delay_ms: std::env::var("PAPERWATCH_SWEEP_DELAY_MS")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
            recursive: parse_bool_var("PAPERWATCH_RECURSIVE"),
            text_page_limit: std::env::var("PAPERWATCH_TEXT_PAGE_LIMIT")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
        }
    }
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

fn parse_bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    })
}
