//! Sync pipeline services
//!
//! Leaf first: catalog client → paginator / tag fetcher → reconciler →
//! orchestrator. The curated importer and technique tiers sit beside the
//! pipeline and share its store.

pub mod catalog_client;
pub mod curated_importer;
pub mod machine_record;
pub mod paginator;
pub mod reconciler;
pub mod sync_orchestrator;
pub mod tag_fetcher;
pub mod technique_tiers;

pub use catalog_client::{CatalogClient, CatalogError, FetchOutcome, RetryDecision, RetryPolicy};
pub use curated_importer::{CuratedEntry, CuratedImporter, ImportSummary};
pub use machine_record::RawMachine;
pub use paginator::{PaginatedList, Paginator};
pub use reconciler::{BatchAccumulator, ReconcileError, ReconcileReport, Reconciler};
pub use sync_orchestrator::{BatchOutcome, SyncError, SyncOrchestrator, SyncSummary};
pub use tag_fetcher::TagFetcher;
pub use technique_tiers::{classify, TechniqueTier};
