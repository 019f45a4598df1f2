//! Full-catalog sync

use super::{SyncOrchestrator, SyncSummary, ACTIVE_MACHINES_ENDPOINT, RETIRED_MACHINES_ENDPOINT};
use crate::services::machine_record::RawMachine;
use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use skilltree_common::db::MachineStatus;
use tracing::{error, info, warn};

impl SyncOrchestrator {
    /// List every active and retired machine and reconcile each in turn
    ///
    /// The machine row is upserted before its tags are fetched, so a machine
    /// whose tag endpoint is inaccessible still gets fresh attributes.
    pub async fn run_full_sync(&self) -> SyncSummary {
        info!("Starting full sync");

        let active = self
            .paginator
            .fetch_all(ACTIVE_MACHINES_ENDPOINT, MachineStatus::Active.as_str())
            .await;
        tokio::time::sleep(self.settings.request_delay).await;
        let retired = self
            .paginator
            .fetch_all(RETIRED_MACHINES_ENDPOINT, MachineStatus::Retired.as_str())
            .await;

        let listed: Vec<(MachineStatus, Value)> = active
            .records
            .into_iter()
            .map(|record| (MachineStatus::Active, record))
            .chain(
                retired
                    .records
                    .into_iter()
                    .map(|record| (MachineStatus::Retired, record)),
            )
            .collect();

        let mut summary = SyncSummary::new(listed.len());
        info!(total = summary.total, "Machines to process");

        for (index, (status, record)) in listed.into_iter().enumerate() {
            match self.sync_machine(index, summary.total, status, record).await {
                Ok(()) => summary.record_success(),
                Err(e) => {
                    error!(position = index + 1, error = %format!("{:#}", e), "Machine sync failed");
                    summary.record_error();
                }
            }
        }

        info!(
            total = summary.total,
            processed = summary.processed,
            errors = summary.errors,
            "Full sync completed"
        );
        summary
    }

    async fn sync_machine(
        &self,
        index: usize,
        total: usize,
        status: MachineStatus,
        record: Value,
    ) -> anyhow::Result<()> {
        let raw = RawMachine::from_value(record).context("Malformed machine record")?;
        let machine_id = raw.id;

        info!(
            "[{}/{}] Processing: {} (ID: {})",
            index + 1,
            total,
            raw.name,
            machine_id
        );

        let machine = raw.into_machine(status, Utc::now());
        self.reconciler
            .upsert_machine(&machine)
            .await
            .context("Machine upsert failed, techniques skipped")?;

        let techniques = self
            .tag_fetcher
            .fetch_techniques(machine_id)
            .await
            .with_context(|| format!("Failed to fetch techniques for machine {}", machine_id))?;

        if techniques.is_empty() {
            warn!(machine_id, "No techniques found");
        }

        let report = self
            .reconciler
            .sync_techniques(machine_id, &techniques)
            .await?;

        info!(machine_id, links = report.links_written, "Machine synced");
        Ok(())
    }
}
