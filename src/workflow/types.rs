use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of a complaint.
///
/// The set is closed: every stored complaint is in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Diterima,
    Diproses,
    Dilaksanakan,
    Selesai,
    Ditolak,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Pending,
        Status::Diterima,
        Status::Diproses,
        Status::Dilaksanakan,
        Status::Selesai,
        Status::Ditolak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Diterima => "diterima",
            Status::Diproses => "diproses",
            Status::Dilaksanakan => "dilaksanakan",
            Status::Selesai => "selesai",
            Status::Ditolak => "ditolak",
        }
    }

    /// `selesai` and `ditolak` have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Selesai | Status::Ditolak)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| ParseEnumError {
                kind: "status",
                value: s.to_string(),
            })
    }
}

/// Authorization level of an actor, as resolved by the role authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Admin,
    MasterAdmin,
    Pimpinan,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Citizen, Role::Admin, Role::MasterAdmin, Role::Pimpinan];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Admin => "admin",
            Role::MasterAdmin => "master_admin",
            Role::Pimpinan => "pimpinan",
        }
    }

    /// Every non-citizen role, pimpinan included.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Citizen)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| ParseEnumError {
                kind: "role",
                value: s.to_string(),
            })
    }
}

/// An authenticated caller. Always passed explicitly; the engine never looks
/// up a session on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplaintId(pub String);

impl ComplaintId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_sequence(seq: u64) -> Self {
        Self(seq.to_string())
    }

    /// Numeric sequence number for store-allocated ids. Accepts the `#99`
    /// form residents see on the tracking page.
    pub fn sequence(&self) -> Option<u64> {
        self.0.trim().trim_start_matches('#').parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComplaintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComplaintId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(pub String);

impl AttachmentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Evidence reference bound to a complaint. The file itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub id: AttachmentId,
    pub file_ref: String,
    pub attached_by: String,
    pub attached_at: DateTime<Utc>,
}

/// One audit-trail row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub status: Status,
    pub actor_id: String,
    pub actor_role: Role,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(status: Status, actor: &Actor, timestamp: DateTime<Utc>) -> Self {
        Self {
            status,
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: ComplaintId,
    pub status: Status,
    pub reporter_id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub attachments: Vec<AttachmentRef>,
    pub created_at: DateTime<Utc>,
    pub status_history: Vec<HistoryEntry>,
    /// Compare-and-swap token, bumped on every mutation.
    pub version: u64,
}

impl Complaint {
    /// Materialize a freshly submitted complaint. The first history row
    /// records the submission itself so the trail always ends at `status`.
    pub fn from_new(id: ComplaintId, new: NewComplaint) -> Self {
        let first_entry = HistoryEntry {
            status: Status::Pending,
            actor_id: new.reporter_id.clone(),
            actor_role: new.reporter_role,
            timestamp: new.created_at,
        };

        Self {
            id,
            status: Status::Pending,
            reporter_id: new.reporter_id,
            category_id: new.category_id,
            title: new.title,
            description: new.description,
            location: new.location,
            attachments: Vec::new(),
            created_at: new.created_at,
            status_history: vec![first_entry],
            version: 0,
        }
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.status_history.last()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_evidence(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Citizen-facing submission payload, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintDraft {
    pub title: String,
    pub description: String,
    pub location: String,
    pub category_id: String,
}

/// A validated submission ready to be inserted by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComplaint {
    pub reporter_id: String,
    pub reporter_role: Role,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintFilter {
    pub reporter_id: Option<String>,
    pub status: Option<Status>,
}

impl ComplaintFilter {
    pub fn by_reporter(reporter_id: impl Into<String>) -> Self {
        Self {
            reporter_id: Some(reporter_id.into()),
            status: None,
        }
    }

    pub fn by_status(status: Status) -> Self {
        Self {
            reporter_id: None,
            status: Some(status),
        }
    }

    pub fn matches(&self, complaint: &Complaint) -> bool {
        let reporter_ok = self
            .reporter_id
            .as_deref()
            .is_none_or(|reporter| complaint.reporter_id == reporter);
        let status_ok = self.status.is_none_or(|status| complaint.status == status);
        reporter_ok && status_ok
    }
}

/// Event handed to the audit sink after a transition is durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub complaint_id: ComplaintId,
    pub from: Status,
    pub to: Status,
    pub actor_id: String,
    pub actor_role: Role,
    pub timestamp: DateTime<Utc>,
}

/// Successful response of a transition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub status: Status,
    pub history_entry: HistoryEntry,
}
