// Status transition engine.
//
// A request runs under the per-complaint lock, validates against the rules,
// then commits through the store's version-checked write. The audit event is
// queued only after that write returns. Each request runs on its own task, so
// a caller that stops waiting cannot separate a durable write from its event.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

use super::errors::WorkflowError;
use super::intake;
use super::locks::ComplaintLocks;
use super::rules::TransitionPolicy;
use super::types::{
    Actor, Complaint, ComplaintDraft, ComplaintFilter, ComplaintId, HistoryEntry, Status,
    TransitionEvent, TransitionOutcome,
};
use crate::audit::{AuditDispatcher, AuditSink};
use crate::config::EngineConfig;
use crate::observability::{OperationTimer, WorkflowMetrics};
use crate::retry::{retry_with_backoff, RetryConfig, RetryExhausted};
use crate::store::{ComplaintStore, StoreError};
use crate::telemetry::{create_transition_span, generate_correlation_id};

#[derive(Clone)]
pub struct TransitionEngine {
    store: Arc<dyn ComplaintStore>,
    audit: AuditDispatcher,
    locks: ComplaintLocks,
    policy: TransitionPolicy,
    config: EngineConfig,
    metrics: Arc<WorkflowMetrics>,
}

impl TransitionEngine {
    pub fn new(
        store: Arc<dyn ComplaintStore>,
        audit: AuditDispatcher,
        config: EngineConfig,
        metrics: Arc<WorkflowMetrics>,
    ) -> Self {
        Self {
            store,
            audit,
            locks: ComplaintLocks::new(),
            policy: config.policy(),
            config,
            metrics,
        }
    }

    /// Build an engine together with its audit dispatcher. Must be called
    /// inside a Tokio runtime.
    pub fn spawn(
        store: Arc<dyn ComplaintStore>,
        sink: Arc<dyn AuditSink>,
        config: EngineConfig,
        audit_retry: RetryConfig,
    ) -> Self {
        let metrics = Arc::new(WorkflowMetrics::new());
        let audit = AuditDispatcher::spawn(sink, audit_retry, Arc::clone(&metrics));
        Self::new(store, audit, config, metrics)
    }

    pub fn policy(&self) -> &TransitionPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<WorkflowMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<dyn ComplaintStore> {
        &self.store
    }

    /// Move complaint `id` to `target` on behalf of `actor`.
    ///
    /// On any error the stored complaint is unchanged and no audit event is
    /// emitted. Concurrent requests for the same complaint are applied one at
    /// a time, each validated against the state left by the previous one.
    /// Dropping the returned future does not abandon the request: it runs to
    /// completion, audit event included.
    pub async fn request_transition(
        &self,
        id: &ComplaintId,
        target: Status,
        actor: &Actor,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let engine = self.clone();
        let id = id.clone();
        let actor = actor.clone();
        let task =
            tokio::spawn(async move { engine.run_transition(&id, target, &actor).await });

        match task.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                std::panic::resume_unwind(join_error.into_panic())
            }
            Err(join_error) => Err(WorkflowError::StoreUnavailable {
                attempts: 0,
                reason: format!("transition task did not finish: {join_error}"),
            }),
        }
    }

    async fn run_transition(
        &self,
        id: &ComplaintId,
        target: Status,
        actor: &Actor,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span(id, target, actor, &correlation_id);
        let timer = OperationTimer::new("request_transition");

        let result = self.transition_locked(id, target, actor).instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(outcome) => {
                self.metrics.record_applied();
                info!(
                    complaint.id = %id,
                    to = %outcome.status,
                    "Transition applied"
                );
            }
            Err(err) => {
                self.metrics.record_rejection(err);
                if err.kind().is_transient() {
                    warn!(error = %err, kind = err.kind().as_str(), "Transition failed");
                } else {
                    info!(error = %err, kind = err.kind().as_str(), "Transition rejected");
                }
            }
        });
        timer.finish();
        result
    }

    async fn transition_locked(
        &self,
        id: &ComplaintId,
        target: Status,
        actor: &Actor,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let _lease = self
            .locks
            .acquire_timeout(id, Duration::from_millis(self.config.lock_timeout_ms))
            .await
            .ok_or_else(|| WorkflowError::Timeout {
                id: id.clone(),
                waited_ms: self.config.lock_timeout_ms,
            })?;

        let mut conflicts = 0u32;
        loop {
            let complaint = self.load(id).await?;
            self.policy.validate(&complaint, target, actor)?;

            let from = complaint.status;
            let entry = HistoryEntry::new(target, actor, Utc::now());
            let written = self
                .store_call("compare_and_set_status", || {
                    self.store
                        .compare_and_set_status(id, complaint.version, entry.clone())
                })
                .await;

            match written {
                Ok(updated) => {
                    self.audit.enqueue(TransitionEvent {
                        complaint_id: id.clone(),
                        from,
                        to: target,
                        actor_id: actor.id.clone(),
                        actor_role: actor.role,
                        timestamp: entry.timestamp,
                    });
                    return Ok(TransitionOutcome {
                        status: updated.status,
                        history_entry: entry,
                    });
                }
                Err(RetryExhausted {
                    error: StoreError::VersionConflict { expected, found, .. },
                    ..
                }) => {
                    conflicts += 1;
                    if conflicts > self.config.max_conflict_retries {
                        return Err(WorkflowError::StoreUnavailable {
                            attempts: conflicts,
                            reason: format!(
                                "complaint kept changing underneath the request (expected version {expected}, found {found})"
                            ),
                        });
                    }
                    self.metrics.record_conflict_retry();
                    debug!(expected, found, conflicts, "Version conflict, re-validating");
                }
                Err(exhausted) => return Err(store_failure(id, exhausted)),
            }
        }
    }

    async fn load(&self, id: &ComplaintId) -> Result<Complaint, WorkflowError> {
        self.store_call("get", || self.store.get(id))
            .await
            .map_err(|exhausted| store_failure(id, exhausted))?
            .ok_or_else(|| WorkflowError::ComplaintNotFound { id: id.clone() })
    }

    /// Run a store operation, retrying transient failures with backoff.
    async fn store_call<T, F, Fut>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, RetryExhausted<StoreError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut calls = 0u32;
        let result = retry_with_backoff(
            &self.config.store_retry,
            operation_name,
            StoreError::is_transient,
            || {
                calls += 1;
                operation()
            },
        )
        .await;
        for _ in 1..calls {
            self.metrics.record_store_retry();
        }
        result
    }

    pub async fn submit_complaint(
        &self,
        actor: &Actor,
        draft: ComplaintDraft,
    ) -> Result<Complaint, WorkflowError> {
        let result = intake::submit_complaint(self.store.as_ref(), actor, draft).await;
        if let Err(err) = &result {
            info!(actor.id = %actor.id, error = %err, "Submission rejected");
        }
        result
    }

    pub async fn get_complaint(&self, id: &ComplaintId) -> Result<Complaint, WorkflowError> {
        self.load(id).await
    }

    pub async fn list_complaints(
        &self,
        filter: &ComplaintFilter,
    ) -> Result<Vec<Complaint>, WorkflowError> {
        self.store_call("list", || self.store.list(filter))
            .await
            .map_err(|exhausted| WorkflowError::StoreUnavailable {
                attempts: exhausted.attempts,
                reason: exhausted.error.to_string(),
            })
    }

    /// Targets `actor` could request for `complaint` right now.
    pub fn available_transitions(&self, complaint: &Complaint, actor: &Actor) -> Vec<Status> {
        self.policy
            .available_transitions(complaint.status, actor.role)
    }

    /// Wait until every audit event queued so far has reached the sink.
    pub async fn flush_audit(&self) {
        self.audit.flush().await;
    }
}

fn store_failure(id: &ComplaintId, exhausted: RetryExhausted<StoreError>) -> WorkflowError {
    match exhausted.error {
        StoreError::NotFound(_) => WorkflowError::ComplaintNotFound { id: id.clone() },
        error => WorkflowError::StoreUnavailable {
            attempts: exhausted.attempts,
            reason: error.to_string(),
        },
    }
}
