//! Store access for the sync pipeline
//!
//! [`CatalogStore`] is the seam between the pipeline and the relational
//! store. Two backends implement it:
//! - [`SqliteStore`]: embedded SQLite via sqlx, transactional link rewrites
//! - [`RestStore`]: PostgREST (Supabase) over HTTP, no transactions

pub mod certifications;
pub mod machines;
pub mod rest_store;
pub mod sqlite_store;
pub mod techniques;

pub use rest_store::RestStore;
pub use sqlite_store::SqliteStore;

use async_trait::async_trait;
use skilltree_common::config::StoreLocation;
use skilltree_common::db::{
    Certification, Machine, MachineRef, Technique, TechniqueLink, TechniqueUsage,
};
use skilltree_common::{Error, Result};
use std::sync::Arc;
use thiserror::Error;

/// Behaviour when an upserted technique id already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Keep the stored row untouched
    IgnoreDuplicates,
    /// Overwrite name and category with the incoming values
    Overwrite,
}

/// Failure while rewriting API-provenance links
///
/// `Insert` means the previous links were already removed: the affected
/// machines are left with no API links until they are synced again.
#[derive(Debug, Error)]
pub enum LinkWriteError {
    #[error("failed to clear previous links: {0}")]
    Clear(#[source] Error),

    #[error("links cleared but insert failed: {0}")]
    Insert(#[source] Error),
}

/// Relational store operations used by the pipeline and the curated importer
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or fully overwrite a machine's attribute columns (keeps `video_url`)
    async fn upsert_machine(&self, machine: &Machine) -> Result<()>;

    /// All known machines ordered by id ascending
    async fn list_machines(&self) -> Result<Vec<MachineRef>>;

    /// Case-insensitive exact name lookup
    async fn find_machine_by_name(&self, name: &str) -> Result<Option<MachineRef>>;

    async fn set_video_url(&self, machine_id: i64, video_url: &str) -> Result<()>;

    async fn upsert_techniques(&self, techniques: &[Technique], policy: ConflictPolicy)
        -> Result<()>;

    async fn find_technique_by_name(&self, name: &str) -> Result<Option<Technique>>;

    /// Plain insert; fails if the id is taken
    async fn insert_technique(&self, technique: &Technique) -> Result<()>;

    /// Snapshot-replace the API links of every listed machine
    ///
    /// Each entry is `(machine_id, technique_ids)`; an empty id list clears the
    /// machine's API links. Curated links are never removed, and a curated row
    /// for the same pair is left in place. Returns the number of rows inserted.
    async fn replace_api_links(
        &self,
        links: &[(i64, Vec<i64>)],
    ) -> std::result::Result<usize, LinkWriteError>;

    /// Additive curated link (no-op if the pair already exists)
    async fn link_curated_technique(&self, machine_id: i64, technique_id: i64) -> Result<()>;

    async fn links_for_machine(&self, machine_id: i64) -> Result<Vec<TechniqueLink>>;

    async fn find_or_create_certification(&self, name: &str) -> Result<Certification>;

    async fn link_certification(&self, machine_id: i64, certification_id: i64) -> Result<()>;

    /// Every technique with its linked machine count
    async fn technique_usage(&self) -> Result<Vec<TechniqueUsage>>;
}

/// Open the store named by the resolved configuration
pub async fn connect_store(location: &StoreLocation) -> Result<Arc<dyn CatalogStore>> {
    match location {
        StoreLocation::Sqlite(url) => Ok(Arc::new(SqliteStore::connect(url).await?)),
        StoreLocation::Rest { url, key } => Ok(Arc::new(RestStore::new(url, key)?)),
    }
}
