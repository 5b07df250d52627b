//! Concurrency properties of the transition engine.
//!
//! Racing requests on one complaint must produce exactly one winner and one
//! history entry; the losers see the new state and fail as invalid. Separate
//! complaints never block each other.

use chrono::Utc;
use complaint_workflow::config::EngineConfig;
use complaint_workflow::store::{ComplaintStore, FileComplaintStore, InMemoryComplaintStore};
use complaint_workflow::workflow::types::NewComplaint;
use complaint_workflow::{
    Actor, ComplaintId, MemoryAuditSink, RetryConfig, Role, Status, TransitionEngine,
    WorkflowError,
};
use std::sync::Arc;
use tempfile::TempDir;

const RACERS: usize = 16;

fn new_complaint(n: usize) -> NewComplaint {
    NewComplaint {
        reporter_id: format!("warga-{n}"),
        reporter_role: Role::Citizen,
        category_id: "air".to_string(),
        title: "Air PDAM mati".to_string(),
        description: "Tidak mengalir sejak pagi".to_string(),
        location: format!("Blok {n}"),
        created_at: Utc::now(),
    }
}

fn engine_over(store: Arc<dyn ComplaintStore>, sink: &MemoryAuditSink) -> Arc<TransitionEngine> {
    Arc::new(TransitionEngine::spawn(
        store,
        Arc::new(sink.clone()),
        EngineConfig {
            max_conflict_retries: RACERS as u32,
            store_retry: RetryConfig::immediate(3),
            ..EngineConfig::default()
        },
        RetryConfig::immediate(1),
    ))
}

fn admin(n: usize) -> Actor {
    Actor::new(format!("staff-{n}"), Role::Admin)
}

/// `diterima` can go to `diproses` or `ditolak`; once either happens the
/// other is no longer an edge.
fn racing_target(n: usize) -> Status {
    if n % 2 == 0 {
        Status::Diproses
    } else {
        Status::Ditolak
    }
}

fn assert_single_winner(results: Vec<Result<Status, WorkflowError>>) -> Status {
    let winners: Vec<Status> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(winners.len(), 1, "expected exactly one winner: {results:?}");
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(err, WorkflowError::InvalidTransition { .. }),
                "loser failed with {err:?}"
            );
        }
    }
    winners[0]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_requests_have_one_winner() {
    let store = Arc::new(InMemoryComplaintStore::new());
    let sink = MemoryAuditSink::new();
    let engine = engine_over(store.clone(), &sink);

    let id = store.insert(new_complaint(1)).await.unwrap().id;
    engine
        .request_transition(&id, Status::Diterima, &admin(0))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..RACERS {
        let engine = Arc::clone(&engine);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .request_transition(&id, racing_target(n), &admin(n))
                .await
                .map(|outcome| outcome.status)
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    let winner = assert_single_winner(results);

    let complaint = engine.get_complaint(&id).await.unwrap();
    assert_eq!(complaint.status, winner);
    assert_eq!(complaint.status_history.len(), 3);

    engine.flush_audit().await;
    assert_eq!(sink.events().len(), 2);
    assert_eq!(engine.metrics().get_stats().transitions_applied, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_engines_sharing_a_file_store_have_one_winner() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("complaints.json");
    let sink = MemoryAuditSink::new();

    // Separate engines have separate lock tables; only the store's version
    // check stands between them.
    let engines: Vec<Arc<TransitionEngine>> = (0..4)
        .map(|_| engine_over(Arc::new(FileComplaintStore::new(&path)), &sink))
        .collect();

    let id = engines[0].store().insert(new_complaint(1)).await.unwrap().id;
    engines[0]
        .request_transition(&id, Status::Diterima, &admin(0))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..RACERS {
        let engine = Arc::clone(&engines[n % engines.len()]);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .request_transition(&id, racing_target(n), &admin(n))
                .await
                .map(|outcome| outcome.status)
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    let winner = assert_single_winner(results);

    let reopened = FileComplaintStore::new(&path);
    let complaint = reopened.get(&id).await.unwrap().unwrap();
    assert_eq!(complaint.status, winner);
    assert_eq!(complaint.status_history.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_complaints_proceed_independently() {
    let store = Arc::new(InMemoryComplaintStore::new());
    let sink = MemoryAuditSink::new();
    let engine = engine_over(store.clone(), &sink);

    let mut ids: Vec<ComplaintId> = Vec::new();
    for n in 0..RACERS {
        ids.push(store.insert(new_complaint(n)).await.unwrap().id);
    }

    let mut handles = Vec::new();
    for (n, id) in ids.iter().cloned().enumerate() {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.request_transition(&id, Status::Diterima, &admin(n)).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    for id in &ids {
        assert_eq!(engine.get_complaint(id).await.unwrap().status, Status::Diterima);
    }
    engine.flush_audit().await;
    assert_eq!(sink.events().len(), RACERS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_attachments_racing_transitions_are_not_lost() {
    use complaint_workflow::{AttachmentBinder, StoreAttachmentBinder};
    use complaint_workflow::config::AttachmentConfig;

    let store = Arc::new(InMemoryComplaintStore::new());
    let sink = MemoryAuditSink::new();
    let engine = engine_over(store.clone(), &sink);
    let binder = Arc::new(
        StoreAttachmentBinder::new(store.clone(), &AttachmentConfig::default().accepted_extensions)
            .unwrap(),
    );
    let id = store.insert(new_complaint(1)).await.unwrap().id;

    let attach = {
        let binder = Arc::clone(&binder);
        let id = id.clone();
        tokio::spawn(async move {
            let reporter = Actor::new("warga-1", Role::Citizen);
            for n in 0..8 {
                binder
                    .attach(&id, &format!("bukti-{n}.jpg"), &reporter)
                    .await
                    .unwrap();
            }
        })
    };
    let transition = {
        let engine = Arc::clone(&engine);
        let id = id.clone();
        tokio::spawn(async move {
            engine
                .request_transition(&id, Status::Diterima, &admin(0))
                .await
        })
    };

    attach.await.unwrap();
    assert!(transition.await.unwrap().is_ok());

    let complaint = store.get(&id).await.unwrap().unwrap();
    assert_eq!(complaint.attachments.len(), 8);
    assert_eq!(complaint.status, Status::Diterima);
    assert_eq!(complaint.version, 9);
}
