use anyhow::Result;

use super::{print_json, Command, Workspace};
use complaint_workflow::ComplaintDraft;

pub struct SubmitCommand {
    pub draft: ComplaintDraft,
}

impl SubmitCommand {
    pub fn new(title: String, description: String, location: String, category_id: String) -> Self {
        Self {
            draft: ComplaintDraft {
                title,
                description,
                location,
                category_id,
            },
        }
    }
}

impl Command for SubmitCommand {
    async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let actor = workspace.actor().await?;
        let complaint = workspace
            .engine
            .submit_complaint(&actor, self.draft.clone())
            .await?;
        print_json(&complaint)
    }
}
