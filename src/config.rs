use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::retry::RetryConfig;
use crate::workflow::rules::TransitionPolicy;
use crate::workflow::types::Role;

/// Main configuration structure for the complaint workflow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Where complaint records live
    pub store: StoreConfig,
    /// Transition engine settings
    pub engine: EngineConfig,
    /// Where transition events are sent
    pub audit: AuditConfig,
    /// Accepted evidence files
    pub attachments: AttachmentConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Bearer token -> actor, for the static role authority
    #[serde(default)]
    pub identities: HashMap<String, IdentityConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// JSON file path for `file`, database URL for `sqlite`
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// How long a request may wait for another request on the same complaint
    pub lock_timeout_ms: u64,
    /// Re-read/re-validate rounds after a version conflict
    pub max_conflict_retries: u32,
    /// Extension: require evidence before `pending -> diterima`
    pub require_evidence_for_acceptance: bool,
    /// Extension: let pimpinan approve straight from `diterima`
    pub allow_direct_approval: bool,
    /// Backoff for transient store failures
    pub store_retry: RetryConfig,
}

impl EngineConfig {
    pub fn policy(&self) -> TransitionPolicy {
        TransitionPolicy {
            require_evidence_for_acceptance: self.require_evidence_for_acceptance,
            allow_direct_approval: self.allow_direct_approval,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            max_conflict_retries: 3,
            require_evidence_for_acceptance: false,
            allow_direct_approval: false,
            store_retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    Tracing,
    Jsonl,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    pub sink: AuditSinkKind,
    /// Output file for the `jsonl` sink
    pub path: Option<PathBuf>,
    /// Backoff for failing sink deliveries
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttachmentConfig {
    /// Lower-case file extensions accepted as evidence
    pub accepted_extensions: Vec<String>,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: ["jpg", "jpeg", "png", "webp", "pdf"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level / EnvFilter directive
    pub log_level: String,
    /// JSON structured logs instead of compact text
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IdentityConfig {
    pub actor_id: String,
    pub role: Role,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::File,
                path: ".complaint-workflow/complaints.json".to_string(),
            },
            engine: EngineConfig::default(),
            audit: AuditConfig {
                sink: AuditSinkKind::Tracing,
                path: None,
                retry: RetryConfig::default(),
            },
            attachments: AttachmentConfig::default(),
            observability: ObservabilityConfig::default(),
            identities: HashMap::new(),
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (complaint-workflow.toml, .complaint-workflow-rc)
    /// 3. Environment variables (prefixed with COMPLAINT_WORKFLOW__)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`load`](Self::load) but looks for files under `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let defaults = Config::try_from(&WorkflowConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        let toml_path = dir.join("complaint-workflow.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".complaint-workflow-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("COMPLAINT_WORKFLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: WorkflowConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

static CONFIG: std::sync::LazyLock<Result<WorkflowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = WorkflowConfig::load_env_file();
        WorkflowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static WorkflowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
