//! Sync orchestrator
//!
//! Sequences the catalog client, paginator, tag fetcher and reconciler.
//!
//! # Modes
//! - **Full** ([`SyncOrchestrator::run_full_sync`]): list active then retired
//!   machines from the catalog and reconcile each one as it is visited.
//! - **Batch** ([`SyncOrchestrator::run_batch`]): take a numbered slice of the
//!   machines already in the store, fetch their techniques, and write the
//!   whole slice with one flush.
//!
//! Exactly one catalog request is in flight at any time. Per-machine
//! failures are counted and logged; the loop always continues.

use super::catalog_client::{CatalogClient, CatalogError, RetryPolicy};
use super::paginator::Paginator;
use super::reconciler::{ReconcileError, Reconciler};
use super::tag_fetcher::TagFetcher;
use crate::config::SyncSettings;
use crate::db::CatalogStore;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

mod batch_sync;
mod full_sync;
mod statistics;

pub use statistics::{BatchOutcome, SyncSummary};

/// List endpoint of active machines
pub const ACTIVE_MACHINES_ENDPOINT: &str = "/machine/paginated";

/// List endpoint of retired machines
pub const RETIRED_MACHINES_ENDPOINT: &str = "/machine/list/retired/paginated";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("catalog client error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to list stored machines: {0}")]
    Store(#[source] skilltree_common::Error),

    #[error("invalid batch number {0}: batches start at 1")]
    InvalidBatch(usize),

    #[error("batch flush failed: {0}")]
    Flush(#[from] ReconcileError),
}

/// Index range of batch `batch_number` (1-based) over `total` machines
///
/// Batches past the end yield an empty range at `total`.
pub fn batch_window(total: usize, batch_size: usize, batch_number: usize) -> Range<usize> {
    let start = batch_number
        .saturating_sub(1)
        .saturating_mul(batch_size)
        .min(total);
    let end = batch_number.saturating_mul(batch_size).min(total);
    start..end
}

pub fn total_batches(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size.max(1))
}

pub struct SyncOrchestrator {
    store: Arc<dyn CatalogStore>,
    paginator: Paginator,
    tag_fetcher: TagFetcher,
    reconciler: Reconciler,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        api_token: &str,
        settings: SyncSettings,
        policy: RetryPolicy,
    ) -> Result<Self, SyncError> {
        let client = Arc::new(CatalogClient::new(&settings.api_base_url, api_token, policy)?);

        Ok(Self {
            paginator: Paginator::new(Arc::clone(&client), settings.page_size, settings.request_delay),
            tag_fetcher: TagFetcher::new(client, settings.request_delay),
            reconciler: Reconciler::new(Arc::clone(&store)),
            store,
            settings,
        })
    }
}
