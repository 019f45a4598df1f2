//! Configuration loading and credential resolution
//!
//! Values resolve in priority order:
//! 1. Environment variable (first non-blank of the accepted names)
//! 2. TOML config file
//! 3. Compiled default (tunables only; credentials have no default)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default base URL of the catalog API
pub const DEFAULT_API_BASE_URL: &str = "https://labs.hackthebox.com/api/v4";

/// Environment variable holding the catalog API token
pub const API_KEY_VARS: &[&str] = &["HTB_API_KEY"];

/// Environment variables holding the store endpoint, highest priority first
pub const STORE_URL_VARS: &[&str] = &["SKILLTREE_STORE_URL", "SUPABASE_URL", "VITE_SUPABASE_URL"];

/// Environment variables holding the store credential, highest priority first
pub const STORE_KEY_VARS: &[&str] = &[
    "SKILLTREE_STORE_KEY",
    "SUPABASE_SERVICE_ROLE_KEY",
    "VITE_SUPABASE_ANON_KEY",
];

/// Environment variable overriding the TOML config file location
pub const CONFIG_PATH_VAR: &str = "SKILLTREE_CONFIG";

/// Optional TOML configuration file contents
///
/// Every field is optional; a missing file is equivalent to an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Catalog API token (environment takes priority)
    pub api_key: Option<String>,
    /// Store endpoint (`sqlite:` URL or PostgREST base URL)
    pub store_url: Option<String>,
    /// Store credential (required for PostgREST endpoints)
    pub store_key: Option<String>,
    /// Catalog API base URL
    pub api_base_url: Option<String>,
    /// Records requested per list page
    pub page_size: Option<u32>,
    /// Pause between catalog requests in milliseconds
    pub request_delay_ms: Option<u64>,
    /// Machines per batch in batch mode
    pub batch_size: Option<usize>,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: Option<String>,
}

/// Where the relational store lives
#[derive(Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Embedded SQLite database, e.g. `sqlite://skilltree.db?mode=rwc`
    Sqlite(String),
    /// PostgREST endpoint (Supabase project URL) plus service key
    Rest { url: String, key: String },
}

impl fmt::Debug for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::Sqlite(url) => f.debug_tuple("Sqlite").field(url).finish(),
            StoreLocation::Rest { url, .. } => f
                .debug_struct("Rest")
                .field("url", url)
                .field("key", &"<redacted>")
                .finish(),
        }
    }
}

/// Strip quotes and surrounding whitespace; blank values count as absent.
///
/// `.env` files exported by hosting dashboards often wrap values in quotes.
pub fn clean_value(raw: &str) -> Option<String> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '"' && *c != '\'').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// First non-blank value among the given environment variables
pub fn env_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find_map(|raw| clean_value(&raw))
}

/// Location of the TOML config file
///
/// `SKILLTREE_CONFIG` wins; otherwise `<config dir>/skilltree/skilltree.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = env_value(&[CONFIG_PATH_VAR]) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("skilltree").join("skilltree.toml"))
}

/// Load the TOML config file
///
/// A missing file is not an error: defaults are used. A file that exists but
/// does not parse is a configuration error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        debug!("No config file location available, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        debug!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Resolve the catalog API token
pub fn resolve_api_key(toml_config: &TomlConfig) -> Result<String> {
    resolve_value(API_KEY_VARS, toml_config.api_key.as_deref()).ok_or_else(|| {
        Error::Config(
            "Catalog API key not configured. Set HTB_API_KEY or api_key in skilltree.toml"
                .to_string(),
        )
    })
}

/// Resolve the store endpoint and its credential
///
/// `sqlite:` URLs need no credential. Any other endpoint is treated as a
/// PostgREST base URL and requires a store key.
pub fn resolve_store(toml_config: &TomlConfig) -> Result<StoreLocation> {
    let url = resolve_value(STORE_URL_VARS, toml_config.store_url.as_deref()).ok_or_else(|| {
        Error::Config(
            "Store endpoint not configured. Set SKILLTREE_STORE_URL (or SUPABASE_URL) \
             or store_url in skilltree.toml"
                .to_string(),
        )
    })?;

    if url.starts_with("sqlite:") {
        return Ok(StoreLocation::Sqlite(url));
    }

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::Config(format!(
            "Unsupported store endpoint '{}': expected a sqlite: or http(s):// URL",
            url
        )));
    }

    let key = resolve_value(STORE_KEY_VARS, toml_config.store_key.as_deref()).ok_or_else(|| {
        Error::Config(
            "Store credential not configured. Set SKILLTREE_STORE_KEY \
             (or SUPABASE_SERVICE_ROLE_KEY) or store_key in skilltree.toml"
                .to_string(),
        )
    })?;

    Ok(StoreLocation::Rest {
        url: url.trim_end_matches('/').to_string(),
        key,
    })
}

fn resolve_value(env_names: &[&str], toml_value: Option<&str>) -> Option<String> {
    let env = env_value(env_names);
    let toml = toml_value.and_then(clean_value);

    if env.is_some() && toml.is_some() {
        warn!(
            variables = ?env_names,
            "Value found in both environment and TOML config, using environment"
        );
    }

    env.or(toml)
}
