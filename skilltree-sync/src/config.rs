//! Runtime tunables for the sync pipeline
//!
//! Resolved from the TOML config with compiled defaults. Credentials are
//! resolved separately by `skilltree_common::config`.

use skilltree_common::config::{TomlConfig, DEFAULT_API_BASE_URL};
use std::time::Duration;

/// Records requested per list page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Pause between catalog requests (list pages, tag lookups)
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(2000);

/// Machines per batch in batch mode
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default tracing filter for the binaries
pub const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Catalog API base URL, without trailing slash
    pub api_base_url: String,
    pub page_size: u32,
    pub request_delay: Duration,
    pub batch_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_delay: DEFAULT_REQUEST_DELAY,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SyncSettings {
    /// Overlay TOML values on the compiled defaults
    ///
    /// Zero page/batch sizes would never make progress and are ignored.
    pub fn from_toml(toml_config: &TomlConfig) -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: toml_config
                .api_base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            page_size: toml_config
                .page_size
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
            request_delay: toml_config
                .request_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_delay),
            batch_size: toml_config
                .batch_size
                .filter(|size| *size > 0)
                .unwrap_or(defaults.batch_size),
        }
    }

    /// Default tracing filter, honouring `log_level` from the TOML config
    pub fn log_filter(toml_config: &TomlConfig) -> String {
        match toml_config.log_level.as_deref() {
            Some(level) => format!("{},sqlx=warn", level),
            None => DEFAULT_LOG_FILTER.to_string(),
        }
    }
}
