use anyhow::Result;

use super::{parse_id, print_json, Command, Workspace};
use complaint_workflow::Status;

pub struct TransitionCommand {
    pub id: String,
    pub status: String,
}

impl Command for TransitionCommand {
    async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let target: Status = self.status.parse()?;
        let actor = workspace.actor().await?;
        let outcome = workspace
            .engine
            .request_transition(&parse_id(&self.id), target, &actor)
            .await?;
        print_json(&outcome)
    }
}
