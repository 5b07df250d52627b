use anyhow::Result;

use super::{ensure_can_view, parse_id, print_json, Command, Workspace};

pub struct ShowCommand {
    pub id: String,
}

impl Command for ShowCommand {
    async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let actor = workspace.actor().await?;
        let complaint = workspace.engine.get_complaint(&parse_id(&self.id)).await?;
        ensure_can_view(&actor, &complaint)?;
        print_json(&complaint)
    }
}
