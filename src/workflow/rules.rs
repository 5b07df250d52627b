// Transition table and role gating for the complaint lifecycle.
//
// pending -> diterima -> diproses -> dilaksanakan -> selesai
//    \          \
//     +-> ditolak <+

use serde::{Deserialize, Serialize};

use super::errors::WorkflowError;
use super::types::{Actor, Complaint, Role, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: Status,
    pub to: Status,
    pub roles: &'static [Role],
}

const STAFF: &[Role] = &[Role::Admin, Role::MasterAdmin];
const STAFF_AND_PIMPINAN: &[Role] = &[Role::Admin, Role::MasterAdmin, Role::Pimpinan];
const PIMPINAN: &[Role] = &[Role::Pimpinan];

pub const TRANSITIONS: &[Edge] = &[
    Edge { from: Status::Pending, to: Status::Diterima, roles: STAFF },
    Edge { from: Status::Pending, to: Status::Ditolak, roles: STAFF },
    Edge { from: Status::Diterima, to: Status::Diproses, roles: STAFF_AND_PIMPINAN },
    Edge { from: Status::Diterima, to: Status::Ditolak, roles: STAFF },
    Edge { from: Status::Diproses, to: Status::Dilaksanakan, roles: PIMPINAN },
    Edge { from: Status::Dilaksanakan, to: Status::Selesai, roles: STAFF },
];

/// Pimpinan approving execution straight from `diterima`, skipping `diproses`.
/// Only part of the graph when [`TransitionPolicy::allow_direct_approval`] is set.
pub const DIRECT_APPROVAL: Edge = Edge {
    from: Status::Diterima,
    to: Status::Dilaksanakan,
    roles: PIMPINAN,
};

pub fn targets_from(from: Status) -> Vec<Status> {
    TransitionPolicy::default().targets_from(from)
}

pub fn available_transitions(from: Status, role: Role) -> Vec<Status> {
    TransitionPolicy::default().available_transitions(from, role)
}

/// Deployment-tunable checks layered on top of the fixed table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPolicy {
    /// Require at least one attachment before `pending -> diterima`.
    #[serde(default)]
    pub require_evidence_for_acceptance: bool,
    /// Add [`DIRECT_APPROVAL`] to the graph.
    #[serde(default)]
    pub allow_direct_approval: bool,
}

impl TransitionPolicy {
    pub fn edges(&self) -> impl Iterator<Item = &'static Edge> + '_ {
        let direct = self.allow_direct_approval.then_some(&DIRECT_APPROVAL);
        TRANSITIONS.iter().chain(direct)
    }

    pub fn edge(&self, from: Status, to: Status) -> Option<&'static Edge> {
        self.edges().find(|edge| edge.from == from && edge.to == to)
    }

    /// Every target reachable from `from` by some role.
    pub fn targets_from(&self, from: Status) -> Vec<Status> {
        self.edges()
            .filter(|edge| edge.from == from)
            .map(|edge| edge.to)
            .collect()
    }

    /// Targets `role` may request from `from`.
    pub fn available_transitions(&self, from: Status, role: Role) -> Vec<Status> {
        self.edges()
            .filter(|edge| edge.from == from && edge.roles.contains(&role))
            .map(|edge| edge.to)
            .collect()
    }

    /// Validate `complaint.status -> target` for `actor`.
    ///
    /// Edge existence is checked before the role so that an invalid request
    /// is reported as such regardless of who sent it.
    pub fn validate(
        &self,
        complaint: &Complaint,
        target: Status,
        actor: &Actor,
    ) -> Result<(), WorkflowError> {
        let Some(edge) = self.edge(complaint.status, target) else {
            return Err(WorkflowError::InvalidTransition {
                from: complaint.status,
                to: target,
                allowed: self.available_transitions(complaint.status, actor.role),
            });
        };

        if !edge.roles.contains(&actor.role) {
            return Err(WorkflowError::Unauthorized);
        }

        if self.require_evidence_for_acceptance
            && complaint.status == Status::Pending
            && target == Status::Diterima
            && !complaint.has_evidence()
        {
            return Err(WorkflowError::EvidenceRequired {
                id: complaint.id.clone(),
            });
        }

        Ok(())
    }
}
