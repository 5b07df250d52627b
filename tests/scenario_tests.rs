//! End-to-end lifecycle scenarios: a complaint from submission to closure,
//! with identities resolved through the role authority and events checked
//! at the audit sink.

use complaint_workflow::config::{AttachmentConfig, EngineConfig, IdentityConfig};
use complaint_workflow::store::InMemoryComplaintStore;
use complaint_workflow::{
    resolve_actor, AttachmentBinder, ComplaintDraft, ComplaintFilter, MemoryAuditSink,
    RetryConfig, Role, Status, StaticRoleAuthority, StoreAttachmentBinder, TransitionEngine,
    WorkflowError,
};
use std::collections::HashMap;
use std::sync::Arc;

struct Portal {
    engine: TransitionEngine,
    binder: StoreAttachmentBinder,
    authority: StaticRoleAuthority,
    sink: MemoryAuditSink,
}

fn portal(config: EngineConfig) -> Portal {
    let store = Arc::new(InMemoryComplaintStore::new());
    let sink = MemoryAuditSink::new();
    let engine = TransitionEngine::spawn(
        store.clone(),
        Arc::new(sink.clone()),
        config,
        RetryConfig::immediate(1),
    );
    let binder =
        StoreAttachmentBinder::new(store, &AttachmentConfig::default().accepted_extensions).unwrap();

    let identities: HashMap<String, IdentityConfig> = [
        ("tok-warga", "warga-7", Role::Citizen),
        ("tok-admin", "staff-1", Role::Admin),
        ("tok-master", "root", Role::MasterAdmin),
        ("tok-camat", "camat", Role::Pimpinan),
    ]
    .into_iter()
    .map(|(token, actor_id, role)| {
        (
            token.to_string(),
            IdentityConfig {
                actor_id: actor_id.to_string(),
                role,
            },
        )
    })
    .collect();

    Portal {
        engine,
        binder,
        authority: StaticRoleAuthority::from_config(&identities),
        sink,
    }
}

fn draft() -> ComplaintDraft {
    ComplaintDraft {
        title: "Jembatan retak".to_string(),
        description: "Retakan makin lebar setelah hujan".to_string(),
        location: "Desa Sukamaju".to_string(),
        category_id: "infrastruktur".to_string(),
    }
}

#[tokio::test]
async fn test_full_lifecycle_scenario() {
    let p = portal(EngineConfig::default());
    let warga = resolve_actor(&p.authority, "tok-warga").await.unwrap();
    let admin = resolve_actor(&p.authority, "tok-admin").await.unwrap();
    let camat = resolve_actor(&p.authority, "tok-camat").await.unwrap();

    let complaint = p.engine.submit_complaint(&warga, draft()).await.unwrap();
    let id = complaint.id.clone();
    assert_eq!(complaint.status, Status::Pending);

    let outcome = p.engine.request_transition(&id, Status::Diterima, &admin).await.unwrap();
    assert_eq!(outcome.status, Status::Diterima);

    // Pimpinan cannot skip processing.
    assert!(matches!(
        p.engine.request_transition(&id, Status::Dilaksanakan, &camat).await,
        Err(WorkflowError::InvalidTransition {
            from: Status::Diterima,
            to: Status::Dilaksanakan,
            ..
        })
    ));

    p.engine.request_transition(&id, Status::Diproses, &camat).await.unwrap();
    p.engine.request_transition(&id, Status::Dilaksanakan, &camat).await.unwrap();

    // Only staff may close.
    assert_eq!(
        p.engine.request_transition(&id, Status::Selesai, &camat).await,
        Err(WorkflowError::Unauthorized)
    );

    let closed = p.engine.request_transition(&id, Status::Selesai, &admin).await.unwrap();
    assert_eq!(closed.status, Status::Selesai);
    assert_eq!(closed.history_entry.actor_id, "staff-1");
    assert_eq!(closed.history_entry.actor_role, Role::Admin);

    let complaint = p.engine.get_complaint(&id).await.unwrap();
    assert!(complaint.is_terminal());
    assert!(p.engine.available_transitions(&complaint, &admin).is_empty());
    let trail: Vec<Status> = complaint.status_history.iter().map(|e| e.status).collect();
    assert_eq!(
        trail,
        vec![
            Status::Pending,
            Status::Diterima,
            Status::Diproses,
            Status::Dilaksanakan,
            Status::Selesai
        ]
    );

    p.engine.flush_audit().await;
    let events = p.sink.events();
    let hops: Vec<(Status, Status)> = events.iter().map(|e| (e.from, e.to)).collect();
    assert_eq!(
        hops,
        vec![
            (Status::Pending, Status::Diterima),
            (Status::Diterima, Status::Diproses),
            (Status::Diproses, Status::Dilaksanakan),
            (Status::Dilaksanakan, Status::Selesai),
        ]
    );
    assert!(events.iter().all(|e| e.complaint_id == id));
    assert_eq!(events[3].actor_role, Role::Admin);
}

#[tokio::test]
async fn test_unknown_token_cannot_act() {
    let p = portal(EngineConfig::default());
    assert_eq!(
        resolve_actor(&p.authority, "tok-forged").await,
        Err(WorkflowError::Unauthorized)
    );
}

#[tokio::test]
async fn test_rejection_from_review() {
    let p = portal(EngineConfig::default());
    let warga = resolve_actor(&p.authority, "tok-warga").await.unwrap();
    let master = resolve_actor(&p.authority, "tok-master").await.unwrap();

    let id = p.engine.submit_complaint(&warga, draft()).await.unwrap().id;
    p.engine.request_transition(&id, Status::Diterima, &master).await.unwrap();
    p.engine.request_transition(&id, Status::Ditolak, &master).await.unwrap();

    let err = p
        .engine
        .request_transition(&id, Status::Diproses, &master)
        .await
        .unwrap_err();
    assert_eq!(err.kind().as_str(), "invalid_transition");
}

#[tokio::test]
async fn test_evidence_gate_when_configured() {
    let p = portal(EngineConfig {
        require_evidence_for_acceptance: true,
        ..EngineConfig::default()
    });
    let warga = resolve_actor(&p.authority, "tok-warga").await.unwrap();
    let admin = resolve_actor(&p.authority, "tok-admin").await.unwrap();

    let id = p.engine.submit_complaint(&warga, draft()).await.unwrap().id;
    assert_eq!(
        p.engine.request_transition(&id, Status::Diterima, &admin).await,
        Err(WorkflowError::EvidenceRequired { id: id.clone() })
    );

    p.binder.attach(&id, "uploads/retak.webp", &warga).await.unwrap();
    assert!(p.engine.request_transition(&id, Status::Diterima, &admin).await.is_ok());

    let complaint = p.engine.get_complaint(&id).await.unwrap();
    assert_eq!(complaint.attachments.len(), 1);
    assert_eq!(complaint.status_history.len(), 2);
}

#[tokio::test]
async fn test_dashboards_filter_by_status_and_reporter() {
    let p = portal(EngineConfig::default());
    let warga = resolve_actor(&p.authority, "tok-warga").await.unwrap();
    let admin = resolve_actor(&p.authority, "tok-admin").await.unwrap();

    let first = p.engine.submit_complaint(&warga, draft()).await.unwrap().id;
    let second = p.engine.submit_complaint(&warga, draft()).await.unwrap().id;
    p.engine.request_transition(&second, Status::Diterima, &admin).await.unwrap();

    let pending = p
        .engine
        .list_complaints(&ComplaintFilter::by_status(Status::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, first);

    let mine = p
        .engine
        .list_complaints(&ComplaintFilter::by_reporter("warga-7"))
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].id, first);

    assert!(matches!(
        p.engine.submit_complaint(&admin, draft()).await,
        Err(WorkflowError::Unauthorized)
    ));
}
