use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::errors::{HandoffError, HandoffErrorKind};

/// Transition engine counters
#[derive(Debug, Default)]
pub struct TransitionMetrics {
    pub committed: AtomicU64,
    pub rolled_back: AtomicU64,
    pub not_found: AtomicU64,
    pub invalid_state: AtomicU64,
    pub unauthorized: AtomicU64,
    pub duplicates: AtomicU64,
    pub invalid_party: AtomicU64,
    pub storage_failures: AtomicU64,
}

impl TransitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    /// A unit of work that had opened a transaction was rolled back
    pub fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed transition by its error kind
    pub fn record_failure(&self, err: &HandoffError) {
        let counter = match err.kind() {
            HandoffErrorKind::HandoffNotFound => &self.not_found,
            HandoffErrorKind::InvalidStateTransition => &self.invalid_state,
            HandoffErrorKind::UnauthorizedActor => &self.unauthorized,
            HandoffErrorKind::DuplicateAction => &self.duplicates,
            HandoffErrorKind::InvalidParty => &self.invalid_party,
            _ => &self.storage_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> TransitionStats {
        TransitionStats {
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            invalid_state: self.invalid_state.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            invalid_party: self.invalid_party.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Handoff transition metrics: committed={}, rolled_back={}, not_found={}, invalid_state={}, unauthorized={}, duplicates={}, invalid_party={}, storage_failures={}",
            stats.committed,
            stats.rolled_back,
            stats.not_found,
            stats.invalid_state,
            stats.unauthorized,
            stats.duplicates,
            stats.invalid_party,
            stats.storage_failures
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionStats {
    pub committed: u64,
    pub rolled_back: u64,
    pub not_found: u64,
    pub invalid_state: u64,
    pub unauthorized: u64,
    pub duplicates: u64,
    pub invalid_party: u64,
    pub storage_failures: u64,
}

/// Global metrics instance
static TRANSITION_METRICS: std::sync::LazyLock<TransitionMetrics> =
    std::sync::LazyLock::new(TransitionMetrics::new);

pub fn transition_metrics() -> &'static TransitionMetrics {
    &TRANSITION_METRICS
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
