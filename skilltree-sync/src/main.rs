//! full-sync - refresh the whole machine catalog
//!
//! Lists active then retired machines from the catalog API, upserts each
//! machine and snapshot-replaces its technique links.
//!
//! **Usage:**
//! ```bash
//! HTB_API_KEY=... SKILLTREE_STORE_URL=sqlite://skilltree.db?mode=rwc full-sync
//! ```

use anyhow::{Context, Result};
use skilltree_common::config::{resolve_api_key, resolve_store};
use skilltree_sync::services::{RetryPolicy, SyncOrchestrator};
use skilltree_sync::{connect_store, SyncSettings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let toml_config = skilltree_sync::bootstrap()?;

    info!("Starting skilltree full sync");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let api_key = resolve_api_key(&toml_config).context("Catalog API key is not configured")?;
    let location = resolve_store(&toml_config).context("Store is not configured")?;
    let settings = SyncSettings::from_toml(&toml_config);
    info!(store = ?location, api = %settings.api_base_url, "Configuration resolved");

    let store = connect_store(&location)
        .await
        .context("Failed to open store")?;
    let orchestrator = SyncOrchestrator::new(store, &api_key, settings, RetryPolicy::full_sync())
        .context("Failed to build catalog client")?;

    let summary = orchestrator.run_full_sync().await;

    info!("Full sync completed: {}", summary.display_string());
    info!("  Succeeded: {}", summary.succeeded());

    Ok(())
}
