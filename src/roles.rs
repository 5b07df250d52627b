// Role authority: turns an authenticated identity into an actor.
// The workflow consumes it; credential issuance lives elsewhere.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::config::IdentityConfig;
use crate::workflow::errors::WorkflowError;
use crate::workflow::types::Actor;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no identity supplied")]
    MissingIdentity,
    #[error("identity is not recognized")]
    UnknownIdentity,
    #[error("role authority unavailable: {0}")]
    Unavailable(String),
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RoleAuthority: Send + Sync {
    async fn resolve(&self, identity: &str) -> Result<Actor, AuthError>;
}

/// Fixed token table, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleAuthority {
    identities: HashMap<String, Actor>,
}

impl StaticRoleAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(identities: &HashMap<String, IdentityConfig>) -> Self {
        let identities = identities
            .iter()
            .map(|(token, identity)| {
                (
                    token.clone(),
                    Actor::new(identity.actor_id.clone(), identity.role),
                )
            })
            .collect();
        Self { identities }
    }

    pub fn with_identity(mut self, token: impl Into<String>, actor: Actor) -> Self {
        self.identities.insert(token.into(), actor);
        self
    }
}

#[async_trait]
impl RoleAuthority for StaticRoleAuthority {
    async fn resolve(&self, identity: &str) -> Result<Actor, AuthError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(AuthError::MissingIdentity);
        }
        self.identities
            .get(identity)
            .cloned()
            .ok_or(AuthError::UnknownIdentity)
    }
}

/// Resolve `identity` for a workflow call. Any authority failure becomes
/// `Unauthorized`; there is no fallback role.
pub async fn resolve_actor(
    authority: &dyn RoleAuthority,
    identity: &str,
) -> Result<Actor, WorkflowError> {
    authority.resolve(identity).await.map_err(|e| {
        warn!(error = %e, "Identity could not be resolved");
        WorkflowError::Unauthorized
    })
}
