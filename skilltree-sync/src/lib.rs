//! skilltree-sync library interface
//!
//! Catalog sync pipeline: rate-limited catalog client, paginated list
//! fetcher, per-machine technique fetcher, reconciliation engine and the
//! full/batch orchestrators. Also hosts the curated importer and the
//! technique report used by the companion binaries.

pub mod config;
pub mod db;
pub mod services;

pub use crate::config::SyncSettings;
pub use crate::db::{connect_store, CatalogStore};

use anyhow::Context;
use skilltree_common::config::{config_file_path, load_toml_config, TomlConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins; otherwise `default_filter` (e.g. "info,sqlx=warn").
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Shared binary startup: read the optional TOML file, then install tracing
pub fn bootstrap() -> anyhow::Result<TomlConfig> {
    let path = config_file_path();
    let toml_config =
        load_toml_config(path.as_deref()).context("Failed to load configuration file")?;
    init_tracing(&SyncSettings::log_filter(&toml_config));
    if let Some(path) = path.filter(|p| p.exists()) {
        tracing::info!(path = %path.display(), "Loaded configuration file");
    }
    Ok(toml_config)
}
