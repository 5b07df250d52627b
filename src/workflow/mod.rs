// Complaint lifecycle core: statuses, transition rules, and the engine that
// applies them.

pub mod engine;
pub mod errors;
pub mod intake;
pub mod locks;
pub mod rules;
pub mod types;

pub use engine::TransitionEngine;
pub use errors::{ErrorKind, WorkflowError};
pub use rules::{TransitionPolicy, TRANSITIONS};
pub use types::{
    Actor, AttachmentId, AttachmentRef, Complaint, ComplaintDraft, ComplaintFilter, ComplaintId,
    HistoryEntry, Role, Status, TransitionEvent, TransitionOutcome,
};
