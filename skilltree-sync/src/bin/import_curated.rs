//! import-curated - link the curated catalogue onto stored machines
//!
//! **Usage:**
//! ```bash
//! import-curated [s4vitar300.json]
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use skilltree_common::config::resolve_store;
use skilltree_sync::connect_store;
use skilltree_sync::services::CuratedImporter;
use std::path::PathBuf;
use tracing::info;

/// Import curated videos, certifications and techniques
#[derive(Parser, Debug)]
#[clap(name = "import-curated")]
#[clap(about = "Import the curated machine catalogue")]
struct Args {
    /// Curated catalogue JSON file
    #[clap(default_value = "s4vitar300.json")]
    path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = skilltree_sync::bootstrap()?;

    let location = resolve_store(&toml_config).context("Store is not configured")?;
    let store = connect_store(&location)
        .await
        .context("Failed to open store")?;

    let summary = CuratedImporter::new(store)
        .import_file(&args.path)
        .await
        .with_context(|| format!("Failed to import {}", args.path.display()))?;

    info!("Import completed");
    info!("  Entries: {}", summary.entries);
    info!("  Updated: {}", summary.updated);
    info!("  Not found: {}", summary.not_found);
    info!("  Errors: {}", summary.errors);
    info!(
        "  Techniques created/linked: {}/{}",
        summary.techniques_created, summary.techniques_linked
    );
    info!("  Certifications linked: {}", summary.certifications_linked);

    Ok(())
}
