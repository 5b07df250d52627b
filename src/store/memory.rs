use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{apply_attachment, apply_status_change, sort_by_id, ComplaintStore, StoreError};
use crate::workflow::types::{
    AttachmentRef, Complaint, ComplaintFilter, ComplaintId, HistoryEntry, NewComplaint,
};

#[derive(Debug, Default)]
struct MemoryState {
    last_sequence: u64,
    complaints: HashMap<ComplaintId, Complaint>,
}

/// Single-process store. Writes are durable as soon as the call returns.
#[derive(Debug, Default)]
pub struct InMemoryComplaintStore {
    state: RwLock<MemoryState>,
}

impl InMemoryComplaintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.complaints.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ComplaintStore for InMemoryComplaintStore {
    async fn insert(&self, new: NewComplaint) -> Result<Complaint, StoreError> {
        let mut state = self.state.write().await;
        state.last_sequence += 1;
        let id = ComplaintId::from_sequence(state.last_sequence);
        let complaint = Complaint::from_new(id.clone(), new);
        state.complaints.insert(id, complaint.clone());
        Ok(complaint)
    }

    async fn get(&self, id: &ComplaintId) -> Result<Option<Complaint>, StoreError> {
        Ok(self.state.read().await.complaints.get(id).cloned())
    }

    async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>, StoreError> {
        let state = self.state.read().await;
        let mut matching: Vec<Complaint> = state
            .complaints
            .values()
            .filter(|complaint| filter.matches(complaint))
            .cloned()
            .collect();
        sort_by_id(&mut matching);
        Ok(matching)
    }

    async fn compare_and_set_status(
        &self,
        id: &ComplaintId,
        expected_version: u64,
        entry: HistoryEntry,
    ) -> Result<Complaint, StoreError> {
        let mut state = self.state.write().await;
        let complaint = state
            .complaints
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        apply_status_change(complaint, expected_version, entry)?;
        Ok(complaint.clone())
    }

    async fn append_attachment(
        &self,
        id: &ComplaintId,
        attachment: AttachmentRef,
    ) -> Result<Complaint, StoreError> {
        let mut state = self.state.write().await;
        let complaint = state
            .complaints
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        apply_attachment(complaint, attachment);
        Ok(complaint.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{Actor, Role, Status};
    use chrono::Utc;

    fn new_complaint(reporter: &str) -> NewComplaint {
        NewComplaint {
            reporter_id: reporter.to_string(),
            reporter_role: Role::Citizen,
            category_id: "kebersihan".to_string(),
            title: "Sampah menumpuk".to_string(),
            description: "Belum diangkut seminggu".to_string(),
            location: "Pasar Junrejo".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_allocates_sequential_ids() {
        let store = InMemoryComplaintStore::new();
        let first = store.insert(new_complaint("warga-1")).await.unwrap();
        let second = store.insert(new_complaint("warga-2")).await.unwrap();

        assert_eq!(first.id.as_str(), "1");
        assert_eq!(second.id.as_str(), "2");
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_compare_and_set_rejects_stale_version() {
        let store = InMemoryComplaintStore::new();
        let complaint = store.insert(new_complaint("warga-1")).await.unwrap();
        let admin = Actor::new("staff-1", Role::Admin);

        let updated = store
            .compare_and_set_status(
                &complaint.id,
                0,
                HistoryEntry::new(Status::Diterima, &admin, Utc::now()),
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.status_history.len(), 2);

        let stale = store
            .compare_and_set_status(
                &complaint.id,
                0,
                HistoryEntry::new(Status::Ditolak, &admin, Utc::now()),
            )
            .await;
        assert!(matches!(
            stale,
            Err(StoreError::VersionConflict { expected: 0, found: 1, .. })
        ));

        let stored = store.get(&complaint.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Diterima);
        assert_eq!(stored.status_history.len(), 2);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_numerically() {
        let store = InMemoryComplaintStore::new();
        for i in 0..12 {
            let reporter = if i % 2 == 0 { "warga-even" } else { "warga-odd" };
            store.insert(new_complaint(reporter)).await.unwrap();
        }

        let even = store
            .list(&ComplaintFilter::by_reporter("warga-even"))
            .await
            .unwrap();
        let ids: Vec<&str> = even.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "5", "7", "9", "11"]);
    }

    #[tokio::test]
    async fn test_missing_complaint() {
        let store = InMemoryComplaintStore::new();
        let missing = ComplaintId::new("404");
        assert!(store.get(&missing).await.unwrap().is_none());
        assert!(matches!(
            store
                .compare_and_set_status(
                    &missing,
                    0,
                    HistoryEntry::new(Status::Diterima, &Actor::new("a", Role::Admin), Utc::now())
                )
                .await,
            Err(StoreError::NotFound(_))
        ));
    }
}
