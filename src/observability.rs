use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};

use crate::workflow::errors::{ErrorKind, WorkflowError};

/// Transition engine counters
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    pub transitions_applied: AtomicU64,
    pub rejected_invalid: AtomicU64,
    pub rejected_unauthorized: AtomicU64,
    pub rejected_other: AtomicU64,
    pub timeouts: AtomicU64,
    pub store_retries: AtomicU64,
    pub conflict_retries: AtomicU64,
    pub audit_delivered: AtomicU64,
    pub sink_failures: AtomicU64,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_applied(&self) {
        self.transitions_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, error: &WorkflowError) {
        let counter = match error.kind() {
            ErrorKind::InvalidTransition => &self.rejected_invalid,
            ErrorKind::Unauthorized => &self.rejected_unauthorized,
            ErrorKind::Timeout => &self.timeouts,
            _ => &self.rejected_other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_retry(&self) {
        self.store_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict_retry(&self) {
        self.conflict_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_delivered(&self) {
        self.audit_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
        warn!("Audit sink delivery failed");
    }

    pub fn get_stats(&self) -> WorkflowStats {
        WorkflowStats {
            transitions_applied: self.transitions_applied.load(Ordering::Relaxed),
            rejected_invalid: self.rejected_invalid.load(Ordering::Relaxed),
            rejected_unauthorized: self.rejected_unauthorized.load(Ordering::Relaxed),
            rejected_other: self.rejected_other.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            store_retries: self.store_retries.load(Ordering::Relaxed),
            conflict_retries: self.conflict_retries.load(Ordering::Relaxed),
            audit_delivered: self.audit_delivered.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Workflow metrics: applied={}, invalid={}, unauthorized={}, other={}, timeouts={}, store_retries={}, conflict_retries={}, audit_delivered={}, sink_failures={}",
            stats.transitions_applied,
            stats.rejected_invalid,
            stats.rejected_unauthorized,
            stats.rejected_other,
            stats.timeouts,
            stats.store_retries,
            stats.conflict_retries,
            stats.audit_delivered,
            stats.sink_failures
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct WorkflowStats {
    pub transitions_applied: u64,
    pub rejected_invalid: u64,
    pub rejected_unauthorized: u64,
    pub rejected_other: u64,
    pub timeouts: u64,
    pub store_retries: u64,
    pub conflict_retries: u64,
    pub audit_delivered: u64,
    pub sink_failures: u64,
}

/// Create a span for one workflow operation, correlated across log lines
pub fn create_workflow_span(workflow: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "workflow",
        workflow.name = workflow,
        correlation.id = correlation_id,
    )
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
        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
