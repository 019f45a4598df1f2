//! sync-batch - refresh techniques for one slice of the stored machines
//!
//! **Usage:**
//! ```bash
//! sync-batch 3
//! ```
//!
//! Batches are 1-based; the run prints the next batch number to use.

use anyhow::{Context, Result};
use clap::Parser;
use skilltree_common::config::{resolve_api_key, resolve_store};
use skilltree_sync::services::{RetryPolicy, SyncOrchestrator};
use skilltree_sync::{connect_store, SyncSettings};
use tracing::info;

/// Refresh machine techniques in resumable batches
#[derive(Parser, Debug)]
#[clap(name = "sync-batch")]
#[clap(about = "Refresh technique links for one batch of stored machines")]
struct Args {
    /// Batch number (1-based)
    #[clap(default_value = "1")]
    batch: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = skilltree_sync::bootstrap()?;

    let api_key = resolve_api_key(&toml_config).context("Catalog API key is not configured")?;
    let location = resolve_store(&toml_config).context("Store is not configured")?;
    let settings = SyncSettings::from_toml(&toml_config);

    let store = connect_store(&location)
        .await
        .context("Failed to open store")?;
    let orchestrator = SyncOrchestrator::new(store, &api_key, settings, RetryPolicy::batch())
        .context("Failed to build catalog client")?;

    let outcome = orchestrator
        .run_batch(args.batch)
        .await
        .with_context(|| format!("Batch {} failed", args.batch))?;

    info!(
        "Batch {}/{} summary: {}",
        outcome.batch_number,
        outcome.total_batches,
        outcome.summary.display_string()
    );
    info!("  Succeeded: {}", outcome.summary.succeeded());
    info!("  Techniques written: {}", outcome.report.techniques_written);
    info!("  Links written: {}", outcome.report.links_written);

    match outcome.next_batch {
        Some(next) => info!("Next batch: sync-batch {}", next),
        None => info!("All batches completed"),
    }

    Ok(())
}
