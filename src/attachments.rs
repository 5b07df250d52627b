// Attachment binder: records evidence references against a complaint.
// Status and history are never touched here.

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::store::{ComplaintStore, StoreError};
use crate::workflow::errors::WorkflowError;
use crate::workflow::types::{Actor, AttachmentId, AttachmentRef, ComplaintId};

#[derive(Debug, Error)]
pub enum AttachError {
    #[error("complaint not found: {0}")]
    ComplaintNotFound(ComplaintId),
    #[error("file reference is empty")]
    EmptyReference,
    #[error("unsupported evidence file: {0}")]
    UnsupportedFile(String),
    #[error("only the reporter or staff may attach evidence")]
    Unauthorized,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AttachError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AttachError::ComplaintNotFound(id),
            other => AttachError::Store(other),
        }
    }
}

impl From<AttachError> for WorkflowError {
    fn from(err: AttachError) -> Self {
        match err {
            AttachError::ComplaintNotFound(id) => WorkflowError::ComplaintNotFound { id },
            AttachError::Unauthorized => WorkflowError::Unauthorized,
            AttachError::EmptyReference => WorkflowError::InvalidSubmission {
                field: "fileRef",
                reason: "must not be blank".to_string(),
            },
            AttachError::UnsupportedFile(file) => WorkflowError::InvalidSubmission {
                field: "fileRef",
                reason: format!("{file} is not an accepted evidence file"),
            },
            AttachError::Store(err) => WorkflowError::StoreUnavailable {
                attempts: 1,
                reason: err.to_string(),
            },
        }
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AttachmentBinder: Send + Sync {
    async fn attach(
        &self,
        complaint_id: &ComplaintId,
        file_ref: &str,
        actor: &Actor,
    ) -> Result<AttachmentId, AttachError>;
}

/// Binder that appends references straight to the complaint store.
pub struct StoreAttachmentBinder {
    store: Arc<dyn ComplaintStore>,
    accepted: Regex,
}

impl StoreAttachmentBinder {
    pub fn new(store: Arc<dyn ComplaintStore>, accepted_extensions: &[String]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = accepted_extensions
            .iter()
            .map(|ext| regex::escape(ext.trim_start_matches('.')))
            .collect();
        let accepted = Regex::new(&format!(r"(?i)\.(?:{})$", alternatives.join("|")))?;
        Ok(Self { store, accepted })
    }

    pub fn accepts(&self, file_ref: &str) -> bool {
        self.accepted.is_match(file_ref.trim())
    }
}

#[async_trait]
impl AttachmentBinder for StoreAttachmentBinder {
    async fn attach(
        &self,
        complaint_id: &ComplaintId,
        file_ref: &str,
        actor: &Actor,
    ) -> Result<AttachmentId, AttachError> {
        let file_ref = file_ref.trim();
        if file_ref.is_empty() {
            return Err(AttachError::EmptyReference);
        }
        if !self.accepts(file_ref) {
            return Err(AttachError::UnsupportedFile(file_ref.to_string()));
        }

        let complaint = self
            .store
            .get(complaint_id)
            .await?
            .ok_or_else(|| AttachError::ComplaintNotFound(complaint_id.clone()))?;
        if !actor.role.is_staff() && complaint.reporter_id != actor.id {
            return Err(AttachError::Unauthorized);
        }

        let attachment = AttachmentRef {
            id: AttachmentId::generate(),
            file_ref: file_ref.to_string(),
            attached_by: actor.id.clone(),
            attached_at: Utc::now(),
        };
        let id = attachment.id.clone();
        self.store.append_attachment(complaint_id, attachment).await?;

        info!(
            complaint.id = %complaint_id,
            attachment.id = %id,
            actor.id = %actor.id,
            "Evidence attached"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttachmentConfig;
    use crate::store::InMemoryComplaintStore;
    use crate::workflow::types::{NewComplaint, Role, Status};

    async fn setup() -> (Arc<InMemoryComplaintStore>, StoreAttachmentBinder, ComplaintId) {
        let store = Arc::new(InMemoryComplaintStore::new());
        let complaint = store
            .insert(NewComplaint {
                reporter_id: "warga-1".to_string(),
                reporter_role: Role::Citizen,
                category_id: "jalan".to_string(),
                title: "Jalan rusak".to_string(),
                description: "Berlubang".to_string(),
                location: "RT 01".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let binder = StoreAttachmentBinder::new(
            store.clone(),
            &AttachmentConfig::default().accepted_extensions,
        )
        .unwrap();
        (store, binder, complaint.id)
    }

    #[tokio::test]
    async fn test_attach_appends_without_touching_status() {
        let (store, binder, id) = setup().await;
        let reporter = Actor::new("warga-1", Role::Citizen);

        binder.attach(&id, "uploads/foto-1.JPG", &reporter).await.unwrap();
        binder.attach(&id, "uploads/foto-2.png", &reporter).await.unwrap();

        let complaint = store.get(&id).await.unwrap().unwrap();
        assert_eq!(complaint.attachments.len(), 2);
        assert_eq!(complaint.attachments[0].file_ref, "uploads/foto-1.JPG");
        assert_eq!(complaint.status, Status::Pending);
        assert_eq!(complaint.status_history.len(), 1);
        assert_eq!(complaint.version, 2);
    }

    #[tokio::test]
    async fn test_rejects_bad_references() {
        let (_store, binder, id) = setup().await;
        let reporter = Actor::new("warga-1", Role::Citizen);

        assert!(matches!(
            binder.attach(&id, "  ", &reporter).await,
            Err(AttachError::EmptyReference)
        ));
        assert!(matches!(
            binder.attach(&id, "malware.exe", &reporter).await,
            Err(AttachError::UnsupportedFile(_))
        ));
        assert!(matches!(
            binder.attach(&ComplaintId::new("77"), "a.png", &reporter).await,
            Err(AttachError::ComplaintNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_other_citizens_cannot_attach() {
        let (_store, binder, id) = setup().await;
        assert!(matches!(
            binder
                .attach(&id, "a.png", &Actor::new("warga-2", Role::Citizen))
                .await,
            Err(AttachError::Unauthorized)
        ));
        assert!(binder
            .attach(&id, "a.png", &Actor::new("staff-1", Role::Admin))
            .await
            .is_ok());
        assert!(binder
            .attach(&id, "b.pdf", &Actor::new("camat", Role::Pimpinan))
            .await
            .is_ok());
    }
}
