use serde::Serialize;
use thiserror::Error;

use super::types::{ComplaintId, Status};

/// Failures surfaced by the workflow core. Every variant is distinguishable
/// by the caller through [`WorkflowError::kind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("complaint not found: {id}")]
    ComplaintNotFound { id: ComplaintId },

    /// `allowed` lists only the targets the calling actor could request from
    /// `from`, never the whole graph.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: Status,
        to: Status,
        allowed: Vec<Status>,
    },

    #[error("actor is not authorized to perform this transition")]
    Unauthorized,

    #[error("complaint {id} has no evidence attached; attach a file before accepting it")]
    EvidenceRequired { id: ComplaintId },

    #[error("invalid submission: {field} {reason}")]
    InvalidSubmission { field: &'static str, reason: String },

    #[error("timed out after {waited_ms}ms waiting to modify complaint {id}")]
    Timeout { id: ComplaintId, waited_ms: u64 },

    #[error("complaint store unavailable after {attempts} attempt(s): {reason}")]
    StoreUnavailable { attempts: u32, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ComplaintNotFound,
    InvalidTransition,
    Unauthorized,
    EvidenceRequired,
    InvalidSubmission,
    Timeout,
    StoreUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ComplaintNotFound => "complaint_not_found",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::EvidenceRequired => "evidence_required",
            ErrorKind::InvalidSubmission => "invalid_submission",
            ErrorKind::Timeout => "timeout",
            ErrorKind::StoreUnavailable => "store_unavailable",
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::ComplaintNotFound => 3,
            ErrorKind::InvalidTransition => 4,
            ErrorKind::Unauthorized => 5,
            ErrorKind::EvidenceRequired => 6,
            ErrorKind::InvalidSubmission => 7,
            ErrorKind::Timeout => 8,
            ErrorKind::StoreUnavailable => 9,
        }
    }

    /// Transient failures may succeed if the caller tries again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::StoreUnavailable)
    }
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::ComplaintNotFound { .. } => ErrorKind::ComplaintNotFound,
            WorkflowError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            WorkflowError::Unauthorized => ErrorKind::Unauthorized,
            WorkflowError::EvidenceRequired { .. } => ErrorKind::EvidenceRequired,
            WorkflowError::InvalidSubmission { .. } => ErrorKind::InvalidSubmission,
            WorkflowError::Timeout { .. } => ErrorKind::Timeout,
            WorkflowError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
        }
    }
}
