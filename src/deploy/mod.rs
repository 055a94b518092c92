//! Deployment pipeline: image build/publish, managed-compute submission,
//! status reconciliation, and teardown.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::lib::errors::{ConfigError, GenerateError, ProcessError, StoreError};
use crate::store::Stage;

pub mod deleter;
pub mod driver;
pub mod image;
pub mod pipeline;
pub mod reconcile;

pub use deleter::{DeleteReport, Deleter};
pub use driver::{DeleteOutcome, DeploymentDriver, RemoteServiceRecord, ServiceSpec};
pub use image::{BuildContext, ImageBuilder};
pub use pipeline::{DeployOutcome, DeployOverrides, GitDeployRequest, Pipeline};
pub use reconcile::{ReconcileEntry, ReconcileStatus, Reconciler};

/// Trailing bytes of tool output carried into error reports.
pub const DIAGNOSTIC_LIMIT: usize = 4_096;

/// Failures along the deploy pipeline or the remote-service operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Server `{name}` has no tools configured; nothing to deploy")]
    NoTools { name: String },
    #[error("Failed to stage build context at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{stage} failed: `{tool}` exited with code {exit_code:?}: {diagnostic}")]
    ToolFailed {
        stage: Stage,
        tool: &'static str,
        exit_code: Option<i32>,
        diagnostic: String,
    },
    #[error("{stage} failed: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: ProcessError,
    },
    #[error("{stage} returned output that could not be parsed: {source}")]
    Parse {
        stage: Stage,
        #[source]
        source: serde_json::Error,
    },
    #[error("Server `{name}` was created from catalog tools; delete it before deploying a git repository under that name")]
    SourceMismatch { name: String },
}

impl PipelineError {
    /// Stage at which the failure occurred, when one applies.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::ToolFailed { stage, .. }
            | PipelineError::Transport { stage, .. }
            | PipelineError::Parse { stage, .. } => Some(*stage),
            PipelineError::Staging { .. } => Some(Stage::PrepareContext),
            _ => None,
        }
    }
}

/// Run an invocation, mapping transport failures to the given stage. The
/// output is returned as-is; callers decide what a non-zero exit means.
pub(crate) async fn run_tool(
    runner: &dyn crate::lib::process::ToolRunner,
    stage: Stage,
    invocation: crate::lib::process::ToolInvocation,
) -> Result<crate::lib::process::ToolOutput, PipelineError> {
    runner
        .run(invocation)
        .await
        .map_err(|source| PipelineError::Transport { stage, source })
}

/// Turn a non-zero exit into a stage-tagged failure carrying the tool's
/// diagnostic tail.
pub(crate) fn expect_success(
    stage: Stage,
    tool: &'static str,
    output: crate::lib::process::ToolOutput,
) -> Result<crate::lib::process::ToolOutput, PipelineError> {
    if output.success() {
        Ok(output)
    } else {
        Err(PipelineError::ToolFailed {
            stage,
            tool,
            exit_code: output.exit_code,
            diagnostic: output.diagnostic(DIAGNOSTIC_LIMIT),
        })
    }
}

/// Registry host for a region, e.g. `us-central1-docker.pkg.dev`.
pub fn registry_domain(region: &str) -> String {
    format!("{region}-docker.pkg.dev")
}

/// Full image reference `domain/project/repository/name`.
pub fn image_reference(region: &str, project: &str, repository: &str, name: &str) -> String {
    format!(
        "{domain}/{project}/{repository}/{name}",
        domain = registry_domain(region)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_reference_is_structured() {
        assert_eq!(
            image_reference("us-central1", "proj", "mcp-server-images", "calc"),
            "us-central1-docker.pkg.dev/proj/mcp-server-images/calc"
        );
    }
}
