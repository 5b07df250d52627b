use anyhow::Result;
use serde_json::json;

use super::{parse_id, print_json, Command, Workspace};
use complaint_workflow::{AttachmentBinder, WorkflowError};

pub struct AttachCommand {
    pub id: String,
    pub file_ref: String,
}

impl Command for AttachCommand {
    async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let actor = workspace.actor().await?;
        let complaint_id = parse_id(&self.id);
        let attachment_id = workspace
            .binder
            .attach(&complaint_id, &self.file_ref, &actor)
            .await
            .map_err(WorkflowError::from)?;

        print_json(&json!({
            "complaintId": complaint_id,
            "attachmentId": attachment_id,
        }))
    }
}
