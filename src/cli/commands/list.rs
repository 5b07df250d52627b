use anyhow::Result;

use super::{print_json, Command, Workspace};
use complaint_workflow::{ComplaintFilter, Role, Status};

pub struct ListCommand {
    pub mine: bool,
    pub status: Option<String>,
}

impl Command for ListCommand {
    async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let actor = workspace.actor().await?;
        let status = self
            .status
            .as_deref()
            .map(str::parse::<Status>)
            .transpose()?;

        // Citizens never see other reporters' complaints.
        let reporter_id = (self.mine || actor.role == Role::Citizen).then(|| actor.id.clone());
        let filter = ComplaintFilter {
            reporter_id,
            status,
        };

        let complaints = workspace.engine.list_complaints(&filter).await?;
        print_json(&complaints)
    }
}
