//! Resumable batch sync over machines already in the store

use super::{batch_window, total_batches, BatchOutcome, SyncError, SyncOrchestrator, SyncSummary};
use crate::services::reconciler::{BatchAccumulator, ReconcileReport};
use tracing::{error, info, warn};

impl SyncOrchestrator {
    /// Refresh techniques for batch `batch_number` (1-based)
    ///
    /// Tags are gathered into a [`BatchAccumulator`] and written by one flush
    /// at the end. Machines whose fetch failed are left untouched. A store
    /// listing or flush failure is returned; per-machine fetch failures are
    /// only counted.
    pub async fn run_batch(&self, batch_number: usize) -> Result<BatchOutcome, SyncError> {
        if batch_number < 1 {
            return Err(SyncError::InvalidBatch(batch_number));
        }

        let machines = self.store.list_machines().await.map_err(SyncError::Store)?;
        let total = machines.len();
        let batch_size = self.settings.batch_size;
        let total_batches = total_batches(total, batch_size);
        let window = batch_window(total, batch_size, batch_number);
        let next_batch = (batch_number < total_batches).then_some(batch_number + 1);

        info!(
            total,
            total_batches,
            batch_number,
            first = window.start + 1,
            last = window.end,
            "Starting batch"
        );

        let mut summary = SyncSummary::new(window.len());
        if window.is_empty() {
            warn!(batch_number, "No machines in this batch");
            return Ok(BatchOutcome {
                batch_number,
                total_batches,
                window,
                summary,
                report: ReconcileReport::default(),
                next_batch,
            });
        }

        let mut accumulator = BatchAccumulator::new();
        for (offset, machine) in machines[window.clone()].iter().enumerate() {
            info!(
                "[{}/{}] Processing: {} (ID: {})",
                window.start + offset + 1,
                total,
                machine.name,
                machine.id
            );

            match self.tag_fetcher.fetch_techniques(machine.id).await {
                Ok(techniques) => {
                    info!(machine_id = machine.id, count = techniques.len(), "Found techniques");
                    accumulator.record(machine.id, &techniques);
                    summary.record_success();
                }
                Err(e) => {
                    error!(machine_id = machine.id, error = %e, "Failed to fetch techniques");
                    summary.record_error();
                }
            }
        }

        info!(
            batch_number,
            processed = summary.processed,
            errors = summary.errors,
            techniques = accumulator.technique_count(),
            links = accumulator.link_count(),
            "Batch fetched, writing"
        );

        let report = if accumulator.is_empty() {
            ReconcileReport::default()
        } else {
            self.reconciler.flush(accumulator).await?
        };

        info!(
            batch_number,
            techniques_written = report.techniques_written,
            links_written = report.links_written,
            "Batch completed"
        );

        Ok(BatchOutcome {
            batch_number,
            total_batches,
            window,
            summary,
            report,
            next_batch,
        })
    }
}
