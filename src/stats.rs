//! Run statistics
//!
//! Atomic counters collected across one batch, snapshotted at the end.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::audit::AuditOutcome;

/// Counters for one batch run
#[derive(Debug, Default)]
pub struct RunStats {
    pub processed: AtomicU64,
    pub skipped: AtomicU64,
    pub ranks_found: AtomicU64,
    pub ranks_not_found: AtomicU64,
    pub deletion: AtomicU64,
    pub title_meta: AtomicU64,
    pub low_product_count: AtomicU64,
    pub content: AtomicU64,
    pub optimized: AtomicU64,
    pub task_errors: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rank_found(&self) {
        self.ranks_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rank_not_found(&self) {
        self.ranks_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_error(&self) {
        self.task_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit(&self, outcome: &AuditOutcome) {
        let counter = match outcome {
            AuditOutcome::Deletion { .. } => &self.deletion,
            AuditOutcome::TitleMetaIssue { .. } => &self.title_meta,
            AuditOutcome::LowProductCount { .. } => &self.low_product_count,
            AuditOutcome::ContentIssue { .. } => &self.content,
            AuditOutcome::Optimized { .. } => &self.optimized,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot for logging and serialization
    pub fn snapshot(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            ranks_found: self.ranks_found.load(Ordering::Relaxed),
            ranks_not_found: self.ranks_not_found.load(Ordering::Relaxed),
            deletion: self.deletion.load(Ordering::Relaxed),
            title_meta: self.title_meta.load(Ordering::Relaxed),
            low_product_count: self.low_product_count.load(Ordering::Relaxed),
            content: self.content.load(Ordering::Relaxed),
            optimized: self.optimized.load(Ordering::Relaxed),
            task_errors: self.task_errors.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of a run
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatsSnapshot {
    pub processed: u64,
    pub skipped: u64,
    pub ranks_found: u64,
    pub ranks_not_found: u64,
    pub deletion: u64,
    pub title_meta: u64,
    pub low_product_count: u64,
    pub content: u64,
    pub optimized: u64,
    pub task_errors: u64,
}
