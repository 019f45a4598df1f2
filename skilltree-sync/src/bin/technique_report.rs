//! technique-report - techniques by number of linked machines
//!
//! Read-only. Prints every used technique, most common first, then the
//! weak/default-configuration subset.

use anyhow::{Context, Result};
use skilltree_common::config::resolve_store;
use skilltree_sync::connect_store;
use skilltree_sync::services::technique_tiers::{classify, rank_by_usage, TechniqueTier};

#[tokio::main]
async fn main() -> Result<()> {
    let toml_config = skilltree_sync::bootstrap()?;

    let location = resolve_store(&toml_config).context("Store is not configured")?;
    let store = connect_store(&location)
        .await
        .context("Failed to open store")?;

    let ranked = rank_by_usage(
        store
            .technique_usage()
            .await
            .context("Failed to load technique usage")?,
    );

    println!("--- Techniques by machine count ---");
    for technique in &ranked {
        println!("{} ({})", technique.name, technique.machine_count);
    }

    println!("--- Entry-level techniques ---");
    for technique in ranked
        .iter()
        .filter(|t| classify(&t.name) == TechniqueTier::EntryLevel)
    {
        println!("{} ({})", technique.name, technique.machine_count);
    }

    println!("--- Specific weakness techniques ---");
    for technique in ranked
        .iter()
        .filter(|t| classify(&t.name) == TechniqueTier::Weakness)
    {
        println!("{} ({})", technique.name, technique.machine_count);
    }

    Ok(())
}
