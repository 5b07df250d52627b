use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use complaint_workflow::WorkflowConfig;

pub const CONFIG_FILE: &str = "complaint-workflow.toml";

/// Writes a default configuration file. Refuses to overwrite without `--force`.
pub struct InitConfigCommand {
    pub force: bool,
    pub path: PathBuf,
}

impl InitConfigCommand {
    pub fn new(force: bool) -> Self {
        Self {
            force,
            path: PathBuf::from(CONFIG_FILE),
        }
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    pub fn execute(&self) -> Result<()> {
        if self.path.exists() && !self.force {
            return Err(anyhow!(
                "{} already exists; pass --force to overwrite it",
                self.path.display()
            ));
        }
        WorkflowConfig::default().save_to_file(&self.path)?;
        tracing::info!(path = %self.path.display(), "Wrote default configuration");
        println!("{}", self.path.display());
        Ok(())
    }
}
