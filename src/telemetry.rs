use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;
use crate::workflow::types::{Actor, ComplaintId, Status};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set. JSON output carries
/// the current span so correlation ids land on every line.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    tracing::debug!("Complaint workflow telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking related log lines
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping one transition request
pub fn create_transition_span(
    complaint_id: &ComplaintId,
    target: Status,
    actor: &Actor,
    correlation_id: &str,
) -> tracing::Span {
    tracing::info_span!(
        "complaint_transition",
        complaint.id = %complaint_id,
        to = %target,
        actor.id = %actor.id,
        actor.role = %actor.role,
        correlation.id = correlation_id,
    )
}
