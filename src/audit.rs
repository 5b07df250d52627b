// Audit delivery for applied transitions.
//
// The engine enqueues an event once the store write is durable and moves on.
// A background dispatcher drains the queue into the configured sink, retrying
// failed deliveries; a sink that keeps failing is logged and counted, never
// surfaced to the requester.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::config::{AuditConfig, AuditSinkKind};
use crate::observability::WorkflowMetrics;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::workflow::types::TransitionEvent;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("audit sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit event could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("audit sink rejected event: {0}")]
    Rejected(String),
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &TransitionEvent) -> Result<(), SinkError>;
}

/// Writes each event as a structured log line.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        info!(
            target: "complaint_audit",
            complaint_id = %event.complaint_id,
            from = %event.from,
            to = %event.to,
            actor_id = %event.actor_id,
            actor_role = %event.actor_role,
            timestamp = %event.timestamp.to_rfc3339(),
            "Complaint status changed"
        );
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditLine<'a> {
    #[serde(flatten)]
    event: &'a TransitionEvent,
    host: &'a str,
}

/// Appends one JSON object per event to a file.
pub struct JsonLinesAuditSink {
    path: PathBuf,
    host: String,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonLinesAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            path: path.into(),
            host,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditSink {
    async fn record(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&AuditLine {
            event,
            host: &self.host,
        })?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps events in memory. Useful for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<TransitionEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event.clone());
        Ok(())
    }
}

/// Build the sink named by configuration.
pub fn sink_from_config(config: &AuditConfig) -> Arc<dyn AuditSink> {
    match config.sink {
        AuditSinkKind::Tracing => Arc::new(TracingAuditSink),
        AuditSinkKind::Jsonl => {
            let path = config
                .path
                .clone()
                .unwrap_or_else(|| PathBuf::from(".complaint-workflow/audit.jsonl"));
            Arc::new(JsonLinesAuditSink::new(path))
        }
    }
}

enum AuditMessage {
    Deliver(TransitionEvent),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background delivery task.
#[derive(Clone)]
pub struct AuditDispatcher {
    tx: mpsc::UnboundedSender<AuditMessage>,
}

impl AuditDispatcher {
    /// Spawn the delivery task on the current runtime.
    pub fn spawn(
        sink: Arc<dyn AuditSink>,
        retry: RetryConfig,
        metrics: Arc<WorkflowMetrics>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    AuditMessage::Deliver(event) => {
                        deliver(sink.as_ref(), &retry, &metrics, &event).await;
                    }
                    AuditMessage::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Audit dispatcher stopped");
        });

        Self { tx }
    }

    /// Queue an event. Never blocks and never fails the caller.
    pub fn enqueue(&self, event: TransitionEvent) {
        if let Err(mpsc::error::SendError(AuditMessage::Deliver(event))) =
            self.tx.send(AuditMessage::Deliver(event))
        {
            error!(
                complaint.id = %event.complaint_id,
                "Audit dispatcher is gone, transition event dropped"
            );
        }
    }

    /// Wait until every event queued before this call has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(AuditMessage::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn deliver(
    sink: &dyn AuditSink,
    retry: &RetryConfig,
    metrics: &WorkflowMetrics,
    event: &TransitionEvent,
) {
    let result = retry_with_backoff(retry, "audit_delivery", |_: &SinkError| true, || {
        sink.record(event)
    })
    .await;

    match result {
        Ok(()) => metrics.record_audit_delivered(),
        Err(exhausted) => {
            error!(
                complaint.id = %event.complaint_id,
                from = %event.from,
                to = %event.to,
                attempts = exhausted.attempts,
                error = %exhausted.error,
                "Audit event could not be delivered"
            );
            metrics.record_sink_failure();
        }
    }
}
