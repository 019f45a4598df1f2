//! Run counters and outcomes

use crate::services::reconciler::ReconcileReport;
use std::ops::Range;

/// Counters for one sync run
///
/// `processed` counts every machine attempted, including failed ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub total: usize,
    pub processed: usize,
    pub errors: usize,
}

impl SyncSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
    }

    pub fn record_error(&mut self) {
        self.processed += 1;
        self.errors += 1;
    }

    pub fn succeeded(&self) -> usize {
        self.processed.saturating_sub(self.errors)
    }

    pub fn display_string(&self) -> String {
        format!(
            "Total: {}, Processed: {}, Errors: {}",
            self.total, self.processed, self.errors
        )
    }
}

/// Result of one batch-mode run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// 1-based
    pub batch_number: usize,
    pub total_batches: usize,
    /// Index range of the stored machine list covered by this batch
    pub window: Range<usize>,
    pub summary: SyncSummary,
    pub report: ReconcileReport,
    /// `None` once the last batch has run
    pub next_batch: Option<usize>,
}

impl BatchOutcome {
    pub fn is_last(&self) -> bool {
        self.next_batch.is_none()
    }
}
