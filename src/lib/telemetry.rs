//! Telemetry initialization and deploy attempt span helpers.

use std::time::Instant;

use anyhow::Result;
use tracing::{info, info_span, Span};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// Initialize `tracing` and format developer logs.
pub fn init_tracing() -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))
}

/// Span helper recording start and finish of one deploy attempt.
pub struct AttemptSpan {
    span: Span,
    started_at: Instant,
    attempt_id: Uuid,
}

impl AttemptSpan {
    /// Start an attempt span for the named server.
    pub fn start(attempt_id: Uuid, server: &str) -> Self {
        let span = info_span!(
            target: "mcp_forge::pipeline",
            "deploy_attempt",
            %attempt_id,
            server
        );
        Self {
            span,
            started_at: Instant::now(),
            attempt_id,
        }
    }

    /// Close the span while recording outcome and elapsed time.
    pub fn finish(self, outcome: &'static str, stage: Option<&str>) {
        let elapsed_ms = self.started_at.elapsed().as_millis();
        let _entered = self.span.enter();
        info!(
            target: "mcp_forge::pipeline",
            attempt_id = %self.attempt_id,
            outcome = outcome,
            stage = stage.unwrap_or(""),
            elapsed_ms = elapsed_ms,
            "Completed deploy attempt"
        );
    }
}
