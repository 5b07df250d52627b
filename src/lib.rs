// Complaint Workflow Library - lifecycle engine for citizen complaints
// This exposes the core components for testing and integration

pub mod attachments;
pub mod audit;
pub mod config;
pub mod observability;
pub mod retry;
pub mod roles;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use attachments::{AttachError, AttachmentBinder, StoreAttachmentBinder};
pub use audit::{AuditDispatcher, AuditSink, JsonLinesAuditSink, MemoryAuditSink, SinkError, TracingAuditSink};
pub use config::{config, WorkflowConfig};
pub use observability::{create_workflow_span, OperationTimer, WorkflowMetrics, WorkflowStats};
pub use retry::RetryConfig;
pub use roles::{resolve_actor, AuthError, RoleAuthority, StaticRoleAuthority};
pub use store::{open_store, ComplaintStore, FileComplaintStore, InMemoryComplaintStore, StoreError};
pub use telemetry::{create_transition_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    Actor, Complaint, ComplaintDraft, ComplaintFilter, ComplaintId, ErrorKind, Role, Status,
    TransitionEngine, TransitionOutcome, TransitionPolicy, WorkflowError,
};
