//! Container image build and publish via the host's `gcloud` and `docker`.

use std::{path::PathBuf, sync::Arc};

use tracing::info;

use crate::lib::process::{ToolInvocation, ToolRunner};
use crate::store::Stage;

use super::{expect_success, registry_domain, run_tool, PipelineError, DIAGNOSTIC_LIMIT};

/// On-disk build context: a staged directory and the dockerfile inside it.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub dir: PathBuf,
    pub dockerfile: PathBuf,
}

/// Builds and publishes one image per server through external tooling.
pub struct ImageBuilder {
    runner: Arc<dyn ToolRunner>,
}

impl ImageBuilder {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    /// Make sure the target artifact repository exists, creating it when the
    /// describe call reports it missing. A create that races another deploy
    /// and loses is treated as success.
    pub async fn ensure_repository(
        &self,
        project: &str,
        region: &str,
        repository: &str,
    ) -> Result<(), PipelineError> {
        let describe = run_tool(
            self.runner.as_ref(),
            Stage::EnsureRepository,
            ToolInvocation::new(
                "gcloud",
                [
                    "artifacts",
                    "repositories",
                    "describe",
                    repository,
                    "--project",
                    project,
                    "--location",
                    region,
                ],
            ),
        )
        .await?;
        if describe.success() {
            return Ok(());
        }
        if !describe.stderr.contains("NOT_FOUND") {
            return Err(PipelineError::ToolFailed {
                stage: Stage::EnsureRepository,
                tool: "gcloud",
                exit_code: describe.exit_code,
                diagnostic: describe.diagnostic(DIAGNOSTIC_LIMIT),
            });
        }

        info!(
            target: "mcp_forge::deploy",
            repository,
            region,
            "Artifact repository missing; creating"
        );
        let create = run_tool(
            self.runner.as_ref(),
            Stage::EnsureRepository,
            ToolInvocation::new(
                "gcloud",
                [
                    "artifacts",
                    "repositories",
                    "create",
                    repository,
                    "--project",
                    project,
                    "--location",
                    region,
                    "--repository-format",
                    "docker",
                    "--description",
                    "MCP server images",
                ],
            ),
        )
        .await?;
        if create.success() || create.stderr.contains("ALREADY_EXISTS") {
            Ok(())
        } else {
            Err(PipelineError::ToolFailed {
                stage: Stage::EnsureRepository,
                tool: "gcloud",
                exit_code: create.exit_code,
                diagnostic: create.diagnostic(DIAGNOSTIC_LIMIT),
            })
        }
    }

    /// Log the local docker daemon into the regional registry using a
    /// short-lived access token piped over stdin. The token is never placed
    /// on a command line or in an environment variable.
    pub async fn authenticate(&self, region: &str) -> Result<(), PipelineError> {
        let token = expect_success(
            Stage::Authenticate,
            "gcloud",
            run_tool(
                self.runner.as_ref(),
                Stage::Authenticate,
                ToolInvocation::new("gcloud", ["auth", "print-access-token"]),
            )
            .await?,
        )?;

        let domain = registry_domain(region);
        let login = ToolInvocation::new(
            "docker",
            [
                "login",
                "-u",
                "oauth2accesstoken",
                "--password-stdin",
                &format!("https://{domain}"),
            ],
        )
        .stdin(token.stdout.trim().as_bytes().to_vec());
        expect_success(
            Stage::Authenticate,
            "docker",
            run_tool(self.runner.as_ref(), Stage::Authenticate, login).await?,
        )?;
        Ok(())
    }

    /// Build the image from a staged context.
    pub async fn build(&self, context: &BuildContext, image: &str) -> Result<(), PipelineError> {
        info!(target: "mcp_forge::deploy", image, "Building container image");
        let invocation = ToolInvocation::new(
            "docker",
            [
                "build",
                "-f",
                &context.dockerfile.to_string_lossy(),
                "-t",
                image,
                &context.dir.to_string_lossy(),
            ],
        );
        expect_success(
            Stage::BuildImage,
            "docker",
            run_tool(self.runner.as_ref(), Stage::BuildImage, invocation).await?,
        )?;
        Ok(())
    }

    /// Push the built image to the registry.
    pub async fn push(&self, image: &str) -> Result<(), PipelineError> {
        info!(target: "mcp_forge::deploy", image, "Pushing container image");
        expect_success(
            Stage::PushImage,
            "docker",
            run_tool(
                self.runner.as_ref(),
                Stage::PushImage,
                ToolInvocation::new("docker", ["push", image]),
            )
            .await?,
        )?;
        Ok(())
    }
}
