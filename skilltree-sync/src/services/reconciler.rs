//! Reconciliation engine
//!
//! Keeps each machine's API-provenance technique links equal to the set the
//! catalog currently returns for it. Technique rows accumulate and are never
//! deleted; link rows are snapshot-replaced per machine.

use crate::db::{CatalogStore, ConflictPolicy, LinkWriteError};
use skilltree_common::db::{Machine, Technique};
use skilltree_common::Error;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// No links were touched for this machine
    #[error("failed to upsert machine {machine_id}: {source}")]
    MachineUpsert {
        machine_id: i64,
        #[source]
        source: Error,
    },

    /// Previous links are still in place
    #[error("failed to clear technique links for machines {machine_ids:?}: {source}")]
    LinkClear {
        machine_ids: Vec<i64>,
        #[source]
        source: Error,
    },

    /// Previous links were removed; the machines now have no API links
    #[error("technique links cleared but insert failed for machines {machine_ids:?}: {source}")]
    LinkInsert {
        machine_ids: Vec<i64>,
        #[source]
        source: Error,
    },
}

impl ReconcileError {
    fn from_link_write(links: &[(i64, Vec<i64>)], error: LinkWriteError) -> Self {
        let machine_ids = links.iter().map(|(machine_id, _)| *machine_id).collect();
        match error {
            LinkWriteError::Clear(source) => ReconcileError::LinkClear { machine_ids, source },
            LinkWriteError::Insert(source) => ReconcileError::LinkInsert { machine_ids, source },
        }
    }
}

/// Rows written by one reconcile or flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub techniques_written: usize,
    pub links_written: usize,
}

/// Tags and links gathered across one batch, written by a single flush
///
/// Only machines whose fetch succeeded are recorded; an empty technique list
/// still counts and clears that machine's API links on flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchAccumulator {
    techniques: BTreeMap<i64, Technique>,
    links: BTreeMap<i64, Vec<i64>>,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current technique set of `machine_id`
    pub fn record(&mut self, machine_id: i64, techniques: &[Technique]) {
        let ids = self.links.entry(machine_id).or_default();
        for technique in techniques {
            self.techniques
                .entry(technique.id)
                .or_insert_with(|| technique.clone());
            if !ids.contains(&technique.id) {
                ids.push(technique.id);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn machine_count(&self) -> usize {
        self.links.len()
    }

    pub fn technique_count(&self) -> usize {
        self.techniques.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.values().map(Vec::len).sum()
    }

    pub fn machine_ids(&self) -> Vec<i64> {
        self.links.keys().copied().collect()
    }

    fn into_parts(self) -> (Vec<Technique>, Vec<(i64, Vec<i64>)>) {
        (
            self.techniques.into_values().collect(),
            self.links.into_iter().collect(),
        )
    }
}

pub struct Reconciler {
    store: Arc<dyn CatalogStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn upsert_machine(&self, machine: &Machine) -> Result<(), ReconcileError> {
        self.store
            .upsert_machine(machine)
            .await
            .map_err(|source| ReconcileError::MachineUpsert {
                machine_id: machine.id,
                source,
            })
    }

    /// Upsert techniques (existing rows win) and snapshot-replace the
    /// machine's API links with exactly `techniques`
    pub async fn sync_techniques(
        &self,
        machine_id: i64,
        techniques: &[Technique],
    ) -> Result<ReconcileReport, ReconcileError> {
        let techniques_written = self
            .write_techniques(techniques, ConflictPolicy::IgnoreDuplicates)
            .await;

        let links = vec![(machine_id, techniques.iter().map(|t| t.id).collect())];
        let links_written = self
            .store
            .replace_api_links(&links)
            .await
            .map_err(|e| ReconcileError::from_link_write(&links, e))?;

        debug!(machine_id, links_written, "Technique links replaced");
        Ok(ReconcileReport {
            techniques_written,
            links_written,
        })
    }

    /// Upsert the machine, then its techniques and links
    ///
    /// A failed machine upsert aborts before any link is written.
    pub async fn reconcile(
        &self,
        machine: &Machine,
        techniques: &[Technique],
    ) -> Result<ReconcileReport, ReconcileError> {
        self.upsert_machine(machine).await?;
        self.sync_techniques(machine.id, techniques).await
    }

    /// Write a whole batch: techniques overwrite on conflict, then every
    /// recorded machine's API links are replaced in one store call
    pub async fn flush(
        &self,
        accumulator: BatchAccumulator,
    ) -> Result<ReconcileReport, ReconcileError> {
        let (techniques, links) = accumulator.into_parts();

        let techniques_written = self
            .write_techniques(&techniques, ConflictPolicy::Overwrite)
            .await;

        let links_written = self
            .store
            .replace_api_links(&links)
            .await
            .map_err(|e| ReconcileError::from_link_write(&links, e))?;

        Ok(ReconcileReport {
            techniques_written,
            links_written,
        })
    }

    /// Technique upsert failures are logged, not fatal
    async fn write_techniques(&self, techniques: &[Technique], policy: ConflictPolicy) -> usize {
        if techniques.is_empty() {
            return 0;
        }
        match self.store.upsert_techniques(techniques, policy).await {
            Ok(()) => techniques.len(),
            Err(e) => {
                warn!(count = techniques.len(), error = %e, "Failed to upsert techniques");
                0
            }
        }
    }
}
