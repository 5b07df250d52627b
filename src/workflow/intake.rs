// Complaint intake: validates a citizen's draft and stores it as `pending`.

use chrono::Utc;
use tracing::info;

use super::errors::WorkflowError;
use super::types::{Actor, Complaint, ComplaintDraft, NewComplaint, Role};
use crate::store::ComplaintStore;

pub const MAX_DESCRIPTION_CHARS: usize = 5_000;

fn require(field: &'static str, value: &str) -> Result<String, WorkflowError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WorkflowError::InvalidSubmission {
            field,
            reason: "must not be blank".to_string(),
        });
    }
    Ok(value.to_string())
}

/// Check a draft and return the cleaned fields. Does not touch the store.
pub fn validate_draft(draft: &ComplaintDraft) -> Result<ComplaintDraft, WorkflowError> {
    let cleaned = ComplaintDraft {
        title: require("title", &draft.title)?,
        description: require("description", &draft.description)?,
        location: require("location", &draft.location)?,
        category_id: require("categoryId", &draft.category_id)?,
    };

    let length = cleaned.description.chars().count();
    if length > MAX_DESCRIPTION_CHARS {
        return Err(WorkflowError::InvalidSubmission {
            field: "description",
            reason: format!("is {length} characters, limit is {MAX_DESCRIPTION_CHARS}"),
        });
    }

    Ok(cleaned)
}

/// Create a complaint on behalf of a citizen. The stored record starts in
/// `pending` with the submission as its first history entry.
pub async fn submit_complaint(
    store: &dyn ComplaintStore,
    actor: &Actor,
    draft: ComplaintDraft,
) -> Result<Complaint, WorkflowError> {
    if actor.role != Role::Citizen {
        return Err(WorkflowError::Unauthorized);
    }
    let draft = validate_draft(&draft)?;

    let complaint = store
        .insert(NewComplaint {
            reporter_id: actor.id.clone(),
            reporter_role: actor.role,
            category_id: draft.category_id,
            title: draft.title,
            description: draft.description,
            location: draft.location,
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| WorkflowError::StoreUnavailable {
            attempts: 1,
            reason: e.to_string(),
        })?;

    info!(
        complaint.id = %complaint.id,
        reporter.id = %complaint.reporter_id,
        category = %complaint.category_id,
        "Complaint submitted"
    );
    Ok(complaint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryComplaintStore;
    use crate::workflow::types::Status;

    fn draft() -> ComplaintDraft {
        ComplaintDraft {
            title: "  Lampu jalan mati ".to_string(),
            description: "Sudah seminggu".to_string(),
            location: "Jl. Merdeka".to_string(),
            category_id: "penerangan".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_creates_pending_complaint() {
        let store = InMemoryComplaintStore::new();
        let citizen = Actor::new("warga-9", Role::Citizen);

        let complaint = submit_complaint(&store, &citizen, draft()).await.unwrap();

        assert_eq!(complaint.status, Status::Pending);
        assert_eq!(complaint.title, "Lampu jalan mati");
        assert_eq!(complaint.reporter_id, "warga-9");
        assert_eq!(complaint.status_history.len(), 1);
        assert_eq!(complaint.status_history[0].actor_id, "warga-9");
    }

    #[tokio::test]
    async fn test_staff_cannot_submit() {
        let store = InMemoryComplaintStore::new();
        let result = submit_complaint(&store, &Actor::new("staff-1", Role::Admin), draft()).await;
        assert_eq!(result, Err(WorkflowError::Unauthorized));
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_blank_and_oversized_fields_rejected() {
        let mut blank = draft();
        blank.location = "   ".to_string();
        assert!(matches!(
            validate_draft(&blank),
            Err(WorkflowError::InvalidSubmission { field: "location", .. })
        ));

        let mut long = draft();
        long.description = "a".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert!(matches!(
            validate_draft(&long),
            Err(WorkflowError::InvalidSubmission { field: "description", .. })
        ));

        let mut exact = draft();
        exact.description = "é".repeat(MAX_DESCRIPTION_CHARS);
        assert!(validate_draft(&exact).is_ok());
    }
}
