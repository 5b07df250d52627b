// Complaint record store - durable home of complaints and their audit trail.
// The transition engine is the only caller of `compare_and_set_status`.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

use crate::workflow::types::{
    AttachmentRef, Complaint, ComplaintFilter, ComplaintId, HistoryEntry, NewComplaint,
};

pub mod file;
pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

pub use file::FileComplaintStore;
pub use memory::InMemoryComplaintStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteComplaintStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("complaint not found: {0}")]
    NotFound(ComplaintId),

    #[error("version conflict on complaint {id}: expected {expected}, found {found}")]
    VersionConflict {
        id: ComplaintId,
        expected: u64,
        found: u64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Errors worth retrying with backoff. Conflicts are handled separately
    /// by re-reading and re-validating.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Io(_))
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Allocate an id and persist a new `pending` complaint.
    async fn insert(&self, new: NewComplaint) -> Result<Complaint, StoreError>;

    async fn get(&self, id: &ComplaintId) -> Result<Option<Complaint>, StoreError>;

    /// Complaints matching `filter`, ordered by id.
    async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>, StoreError>;

    /// Set `status = entry.status` and append `entry` to the history, but only
    /// if the stored version still equals `expected_version`. Returns the
    /// updated complaint once the write is durable.
    async fn compare_and_set_status(
        &self,
        id: &ComplaintId,
        expected_version: u64,
        entry: HistoryEntry,
    ) -> Result<Complaint, StoreError>;

    /// Append an evidence reference. Never touches status or history.
    async fn append_attachment(
        &self,
        id: &ComplaintId,
        attachment: AttachmentRef,
    ) -> Result<Complaint, StoreError>;
}

/// Open the backend named by `config`.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn ComplaintStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryComplaintStore::new())),
        StoreBackend::File => Ok(Arc::new(FileComplaintStore::new(&config.path))),
        #[cfg(feature = "database")]
        StoreBackend::Sqlite => Ok(Arc::new(SqliteComplaintStore::connect(&config.path, true).await?)),
        #[cfg(not(feature = "database"))]
        StoreBackend::Sqlite => Err(StoreError::Unavailable(
            "sqlite backend requires the `database` feature".to_string(),
        )),
    }
}

/// In-place CAS shared by the in-process and file stores.
pub(crate) fn apply_status_change(
    complaint: &mut Complaint,
    expected_version: u64,
    entry: HistoryEntry,
) -> Result<(), StoreError> {
    if complaint.version != expected_version {
        return Err(StoreError::VersionConflict {
            id: complaint.id.clone(),
            expected: expected_version,
            found: complaint.version,
        });
    }
    complaint.status = entry.status;
    complaint.status_history.push(entry);
    complaint.version += 1;
    Ok(())
}

pub(crate) fn apply_attachment(complaint: &mut Complaint, attachment: AttachmentRef) {
    complaint.attachments.push(attachment);
    complaint.version += 1;
}

/// Sort by numeric sequence when ids are store-allocated, lexically otherwise.
pub(crate) fn sort_by_id(complaints: &mut [Complaint]) {
    complaints.sort_by(|a, b| match (a.id.sequence(), b.id.sequence()) {
        (Some(left), Some(right)) => left.cmp(&right),
        _ => a.id.cmp(&b.id),
    });
}
