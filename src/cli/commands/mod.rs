use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use complaint_workflow::audit::sink_from_config;
use complaint_workflow::{
    open_store, resolve_actor, Actor, Complaint, ComplaintId, StaticRoleAuthority,
    StoreAttachmentBinder, TransitionEngine, WorkflowConfig, WorkflowError,
};

pub mod actions;
pub mod attach;
pub mod init;
pub mod list;
pub mod show;
pub mod submit;
pub mod transition;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, workspace: &Workspace) -> Result<()>;
}

/// Everything a command needs, built once from configuration.
pub struct Workspace {
    pub engine: TransitionEngine,
    pub binder: StoreAttachmentBinder,
    authority: StaticRoleAuthority,
    token: Option<String>,
}

impl Workspace {
    pub async fn open(config: &WorkflowConfig, token: Option<String>) -> Result<Self> {
        let store = open_store(&config.store).await?;
        let engine = TransitionEngine::spawn(
            Arc::clone(&store),
            sink_from_config(&config.audit),
            config.engine.clone(),
            config.audit.retry.clone(),
        );
        let binder = StoreAttachmentBinder::new(store, &config.attachments.accepted_extensions)?;

        Ok(Self {
            engine,
            binder,
            authority: StaticRoleAuthority::from_config(&config.identities),
            token,
        })
    }

    /// The actor behind `--token`.
    pub async fn actor(&self) -> Result<Actor, WorkflowError> {
        resolve_actor(&self.authority, self.token.as_deref().unwrap_or_default()).await
    }

    /// Drain pending audit events before the process exits.
    pub async fn close(&self) {
        self.engine.flush_audit().await;
        self.engine.metrics().log_stats();
    }
}

/// Citizens only see their own complaints; staff and pimpinan see all.
pub fn ensure_can_view(actor: &Actor, complaint: &Complaint) -> Result<(), WorkflowError> {
    if actor.role.is_staff() || complaint.reporter_id == actor.id {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized)
    }
}

/// Accepts `12` and `#12`.
pub fn parse_id(raw: &str) -> ComplaintId {
    let id = ComplaintId::from(raw.trim());
    id.sequence().map(ComplaintId::from_sequence).unwrap_or(id)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use complaint_workflow::Role;

    #[test]
    fn test_parse_id_accepts_hash_prefix() {
        assert_eq!(parse_id("#12"), ComplaintId::new("12"));
        assert_eq!(parse_id(" 7 "), ComplaintId::new("7"));
    }

    #[test]
    fn test_parse_status_rejects_unknown() {
        assert!("selesai".parse::<complaint_workflow::Status>().is_ok());
        assert!("closed".parse::<complaint_workflow::Status>().is_err());
    }

    #[test]
    fn test_citizens_only_view_their_own() {
        let complaint: Complaint = serde_json::from_value(serde_json::json!({
            "id": "1",
            "status": "pending",
            "reporterId": "warga-1",
            "categoryId": "jalan",
            "title": "Jalan rusak",
            "description": "Berlubang",
            "location": "RT 02",
            "attachments": [],
            "createdAt": "2025-01-01T00:00:00Z",
            "statusHistory": [{
                "status": "pending",
                "actorId": "warga-1",
                "actorRole": "citizen",
                "timestamp": "2025-01-01T00:00:00Z"
            }],
            "version": 0
        }))
        .unwrap();

        assert!(ensure_can_view(&Actor::new("warga-1", Role::Citizen), &complaint).is_ok());
        assert!(ensure_can_view(&Actor::new("warga-2", Role::Citizen), &complaint).is_err());
        assert!(ensure_can_view(&Actor::new("camat", Role::Pimpinan), &complaint).is_ok());
        assert!(ensure_can_view(&Actor::new("root", Role::MasterAdmin), &complaint).is_ok());
    }
}
