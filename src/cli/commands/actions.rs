use anyhow::Result;
use serde_json::json;

use super::{ensure_can_view, parse_id, print_json, Command, Workspace};

/// Lists the statuses the caller could move a complaint to, i.e. which
/// action buttons a UI should render.
pub struct ActionsCommand {
    pub id: String,
}

impl Command for ActionsCommand {
    async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let actor = workspace.actor().await?;
        let complaint = workspace.engine.get_complaint(&parse_id(&self.id)).await?;
        ensure_can_view(&actor, &complaint)?;

        print_json(&json!({
            "complaintId": complaint.id,
            "status": complaint.status,
            "role": actor.role,
            "actions": workspace.engine.available_transitions(&complaint, &actor),
        }))
    }
}
