use std::path::PathBuf;
use std::time::Duration;

use paperwatch_core::metadata::PdfMetadataExtractor;
use paperwatch_core::naming::NamingTemplate;
use paperwatch_core::watch::WatchConfig;

pub const DEFAULT_STATE_PATH: &str = "paperwatch-state.json";
pub const DEFAULT_COALESCE_LATENCY_MS: u64 = 1_000;
pub const DEFAULT_SWEEP_DELAY_MS: u64 = 500;
pub const DEFAULT_TEXT_PAGE_LIMIT: u32 = 2;

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON file holding monitored folders and preferences.
    pub state_path: PathBuf,
    pub default_template: NamingTemplate,
    pub watch: WatchSettings,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    pub coalesce_latency_ms: u64,
    pub sweep_delay_ms: u64,
    /// Lower-case, without the leading dot.
    pub extensions: Vec<String>,
    pub recursive: bool,
    /// Pages scanned by the title and author heuristics.
    pub text_page_limit: u32,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            coalesce_latency_ms: DEFAULT_COALESCE_LATENCY_MS,
            sweep_delay_ms: DEFAULT_SWEEP_DELAY_MS,
            extensions: default_extensions(),
            recursive: false,
            text_page_limit: DEFAULT_TEXT_PAGE_LIMIT,
        }
    }
}

impl WatchSettings {
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            coalesce_latency: Duration::from_millis(self.coalesce_latency_ms),
            sweep_delay: Duration::from_millis(self.sweep_delay_ms),
            extensions: self.extensions.clone(),
            recursive: self.recursive,
        }
    }

    pub fn extractor(&self) -> PdfMetadataExtractor {
        PdfMetadataExtractor::with_text_page_limit(self.text_page_limit)
    }
}

impl From<&WatchSettings> for WatchConfig {
    fn from(settings: &WatchSettings) -> Self {
        settings.watch_config()
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

pub(crate) fn default_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}
