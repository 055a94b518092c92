//! Managed-compute operations: submit, describe, enumerate, and delete
//! services through the host's `gcloud` CLI.

use std::{collections::BTreeMap, sync::Arc};

use serde::Deserialize;
use tracing::info;

use crate::lib::process::{ToolInvocation, ToolRunner};
use crate::store::Stage;

use super::{expect_success, run_tool, PipelineError, DIAGNOSTIC_LIMIT};

/// Everything the platform needs to run one service revision.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub image: String,
    pub container_port: u16,
    pub cpu: String,
    pub memory: String,
    pub startup_probe_path: String,
    pub env: BTreeMap<String, String>,
}

/// Observed remote state of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServiceRecord {
    pub name: String,
    pub url: Option<String>,
    pub ready: bool,
}

/// Result of a delete call against the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// The platform had no such service; treated as success so deletes
    /// are idempotent.
    AlreadyAbsent,
}

#[derive(Debug, Deserialize)]
struct RawService {
    metadata: RawMetadata,
    #[serde(default)]
    status: Option<RawStatus>,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    conditions: Option<Vec<RawCondition>>,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

impl RawService {
    fn into_record(self) -> RemoteServiceRecord {
        let (url, ready) = match self.status {
            Some(status) => {
                let ready = status
                    .conditions
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .any(|c| c.kind == "Ready" && c.status == "True");
                (status.url, ready)
            }
            None => (None, false),
        };
        RemoteServiceRecord {
            name: self.metadata.name,
            url,
            ready,
        }
    }
}

fn stderr_says_absent(stderr: &str) -> bool {
    let lowered = stderr.to_lowercase();
    lowered.contains("could not be found") || lowered.contains("not found")
}

/// Driver bound to one project and region.
pub struct DeploymentDriver {
    runner: Arc<dyn ToolRunner>,
    project: String,
    region: String,
}

impl DeploymentDriver {
    pub fn new(runner: Arc<dyn ToolRunner>, project: String, region: String) -> Self {
        Self {
            runner,
            project,
            region,
        }
    }

    fn scope_args(&self) -> [String; 6] {
        [
            "--platform".into(),
            "managed".into(),
            "--region".into(),
            self.region.clone(),
            "--project".into(),
            self.project.clone(),
        ]
    }

    /// Submit (create or replace) the service. Returns once the platform has
    /// accepted the revision; the URL is fetched separately by `describe`.
    pub async fn submit(&self, name: &str, spec: &ServiceSpec) -> Result<(), PipelineError> {
        info!(
            target: "mcp_forge::deploy",
            server = name,
            image = %spec.image,
            "Submitting service revision"
        );
        let mut args: Vec<String> = vec!["run".into(), "deploy".into(), name.into()];
        args.extend(["--image".into(), spec.image.clone()]);
        args.extend(self.scope_args());
        args.extend(["--port".into(), spec.container_port.to_string()]);
        args.extend(["--cpu".into(), spec.cpu.clone()]);
        args.extend(["--memory".into(), spec.memory.clone()]);
        args.extend([
            "--startup-probe".into(),
            format!("httpGet.path={}", spec.startup_probe_path),
        ]);
        if !spec.env.is_empty() {
            // BTreeMap iteration keeps the rendered list stable across runs.
            let pairs: Vec<String> = spec
                .env
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            args.extend(["--set-env-vars".into(), pairs.join(",")]);
        }
        args.extend(["--allow-unauthenticated".into(), "--quiet".into()]);

        expect_success(
            Stage::Submit,
            "gcloud",
            run_tool(
                self.runner.as_ref(),
                Stage::Submit,
                ToolInvocation::new("gcloud", args),
            )
            .await?,
        )?;
        Ok(())
    }

    /// Fetch the remote record for one service, `None` when the platform has
    /// no service under that name.
    pub async fn describe(&self, name: &str) -> Result<Option<RemoteServiceRecord>, PipelineError> {
        let mut args: Vec<String> = vec!["run".into(), "services".into(), "describe".into(), name.into()];
        args.extend(self.scope_args());
        args.extend(["--format".into(), "json".into()]);

        let output = run_tool(
            self.runner.as_ref(),
            Stage::DescribeService,
            ToolInvocation::new("gcloud", args),
        )
        .await?;
        if !output.success() {
            if stderr_says_absent(&output.stderr) {
                return Ok(None);
            }
            return Err(PipelineError::ToolFailed {
                stage: Stage::DescribeService,
                tool: "gcloud",
                exit_code: output.exit_code,
                diagnostic: output.diagnostic(DIAGNOSTIC_LIMIT),
            });
        }

        let raw: RawService =
            serde_json::from_str(&output.stdout).map_err(|source| PipelineError::Parse {
                stage: Stage::DescribeService,
                source,
            })?;
        Ok(Some(raw.into_record()))
    }

    /// All services in the project and region.
    pub async fn list(&self) -> Result<Vec<RemoteServiceRecord>, PipelineError> {
        let mut args: Vec<String> = vec!["run".into(), "services".into(), "list".into()];
        args.extend(self.scope_args());
        args.extend(["--format".into(), "json".into()]);

        let output = expect_success(
            Stage::ListServices,
            "gcloud",
            run_tool(
                self.runner.as_ref(),
                Stage::ListServices,
                ToolInvocation::new("gcloud", args),
            )
            .await?,
        )?;
        let raw: Vec<RawService> =
            serde_json::from_str(&output.stdout).map_err(|source| PipelineError::Parse {
                stage: Stage::ListServices,
                source,
            })?;
        Ok(raw.into_iter().map(RawService::into_record).collect())
    }

    /// Delete the remote service. Absence counts as success.
    pub async fn delete(&self, name: &str) -> Result<DeleteOutcome, PipelineError> {
        let mut args: Vec<String> = vec!["run".into(), "services".into(), "delete".into(), name.into()];
        args.extend(self.scope_args());
        args.push("--quiet".into());

        let output = run_tool(
            self.runner.as_ref(),
            Stage::DeleteService,
            ToolInvocation::new("gcloud", args),
        )
        .await?;
        if output.success() {
            return Ok(DeleteOutcome::Deleted);
        }
        if stderr_says_absent(&output.stderr) {
            info!(
                target: "mcp_forge::deploy",
                server = name,
                "Remote service already absent; treating delete as done"
            );
            return Ok(DeleteOutcome::AlreadyAbsent);
        }
        Err(PipelineError::ToolFailed {
            stage: Stage::DeleteService,
            tool: "gcloud",
            exit_code: output.exit_code,
            diagnostic: output.diagnostic(DIAGNOSTIC_LIMIT),
        })
    }
}
