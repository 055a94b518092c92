//! Deploy attempt orchestration.
//!
//! One attempt walks the stages in order, persisting each state transition
//! before the next stage starts so a crash at any point leaves an accurate
//! record behind. The per-server deploy lock is held for the whole attempt;
//! a concurrent attempt against the same name fails fast with `Busy`. Failed
//! attempts are never retried automatically.

use std::{collections::BTreeMap, fs, io, path::Path, sync::Arc, time::Duration};

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    catalog::ToolCatalog,
    codegen::{self, GeneratedService},
    config::Settings,
    lib::{
        errors::StoreError,
        process::{ToolInvocation, ToolRunner},
        telemetry::AttemptSpan,
    },
    store::{
        DeploymentDescriptor, DeploymentState, GitRepoSource, ServerRecord, ServerStore, Stage,
    },
};

use super::{
    expect_success, image_reference, run_tool,
    driver::{DeploymentDriver, ServiceSpec},
    image::{BuildContext, ImageBuilder},
    PipelineError,
};

/// Per-attempt parameter overrides from the command line.
#[derive(Debug, Clone, Default)]
pub struct DeployOverrides {
    pub container_port: Option<u16>,
    pub startup_probe_path: Option<String>,
}

/// Request to deploy an externally maintained, already-containerized repo.
#[derive(Debug, Clone)]
pub struct GitDeployRequest {
    pub name: String,
    pub url: String,
    pub dockerfile_path: String,
    pub env_overrides: BTreeMap<String, String>,
}

/// Result of a successful deploy attempt, shaped for CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    pub name: String,
    pub attempt_id: Uuid,
    pub image: String,
    pub url: Option<String>,
    pub state: DeploymentState,
    pub source_digest: Option<String>,
}

/// Deployment descriptor seeded from the current settings.
pub fn descriptor_from(settings: &Settings) -> DeploymentDescriptor {
    DeploymentDescriptor {
        container_port: settings.deploy.container_port,
        cpu: settings.deploy.cpu.clone(),
        memory: settings.deploy.memory.clone(),
        startup_probe_path: "/".to_string(),
        region: settings.deploy.region.clone(),
        project: settings.deploy.project.clone(),
    }
}

enum DriveInput<'a> {
    Generated(&'a GeneratedService),
    Git(GitRepoSource),
}

/// Rewrites the stage tag on stage-carrying errors; used when one remote
/// call serves two pipeline stages.
fn retag(err: PipelineError, stage: Stage) -> PipelineError {
    match err {
        PipelineError::ToolFailed {
            tool,
            exit_code,
            diagnostic,
            ..
        } => PipelineError::ToolFailed {
            stage,
            tool,
            exit_code,
            diagnostic,
        },
        PipelineError::Transport { source, .. } => PipelineError::Transport { stage, source },
        PipelineError::Parse { source, .. } => PipelineError::Parse { stage, source },
        other => other,
    }
}

fn staging_error(path: &Path) -> impl FnOnce(io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Staging {
        path: path.to_path_buf(),
        source,
    }
}

/// Runs deploy attempts end to end.
pub struct Pipeline {
    store: ServerStore,
    catalog: ToolCatalog,
    settings: Settings,
    runner: Arc<dyn ToolRunner>,
}

impl Pipeline {
    pub fn new(
        store: ServerStore,
        catalog: ToolCatalog,
        settings: Settings,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            store,
            catalog,
            settings,
            runner,
        }
    }

    /// Deploy an existing server record to the given project.
    ///
    /// Catalog-backed servers are regenerated first; a reference to a tool
    /// that has left the catalog fails here, before any build step runs or
    /// the record is touched.
    pub async fn deploy_server(
        &self,
        name: &str,
        project: &str,
        overrides: &DeployOverrides,
    ) -> Result<DeployOutcome, PipelineError> {
        let mut record = self.store.get(name)?;
        self.apply_overrides(&mut record, project, overrides);

        if record.git_repo.is_some() {
            return self.run_locked(record, project, None).await;
        }
        if record.tools.is_empty() {
            return Err(PipelineError::NoTools {
                name: name.to_string(),
            });
        }
        let generated = codegen::generate(&record, &self.catalog)?;
        self.run_locked(record, project, Some(generated)).await
    }

    /// Deploy a git-hosted repository as a server, creating the record on
    /// first use and updating it on redeploys.
    pub async fn deploy_git_repo(
        &self,
        request: GitDeployRequest,
        project: &str,
        overrides: &DeployOverrides,
    ) -> Result<DeployOutcome, PipelineError> {
        let source = GitRepoSource {
            url: request.url,
            dockerfile_path: request.dockerfile_path,
        };
        let mut record = match self.store.get(&request.name) {
            Ok(record) if record.git_repo.is_none() => {
                return Err(PipelineError::SourceMismatch { name: request.name });
            }
            Ok(record) => record,
            Err(StoreError::NotFound { .. }) => {
                let draft = ServerRecord::git_draft(
                    request.name.clone(),
                    source.clone(),
                    request.env_overrides.clone(),
                    descriptor_from(&self.settings),
                );
                self.store.create(draft.clone())?;
                draft
            }
            Err(err) => return Err(err.into()),
        };
        record.git_repo = Some(source);
        record.env_overrides = request.env_overrides;
        self.apply_overrides(&mut record, project, overrides);

        self.run_locked(record, project, None).await
    }

    fn apply_overrides(&self, record: &mut ServerRecord, project: &str, overrides: &DeployOverrides) {
        record.deployment.project = Some(project.to_string());
        record.deployment.region = self.settings.deploy.region.clone();
        if let Some(port) = overrides.container_port {
            record.deployment.container_port = port;
        }
        if let Some(path) = &overrides.startup_probe_path {
            record.deployment.startup_probe_path = path.clone();
        }
    }

    async fn run_locked(
        &self,
        mut record: ServerRecord,
        project: &str,
        generated: Option<GeneratedService>,
    ) -> Result<DeployOutcome, PipelineError> {
        let input = match &generated {
            Some(generated) => DriveInput::Generated(generated),
            None => DriveInput::Git(record.git_repo.clone().ok_or_else(|| {
                PipelineError::NoTools {
                    name: record.name.clone(),
                }
            })?),
        };

        let _lock = self.store.acquire_deploy_lock(
            &record.name,
            Duration::from_secs(self.settings.limits.lock_stale_secs),
        )?;
        let attempt_id = Uuid::new_v4();
        let span = AttemptSpan::start(attempt_id, &record.name);
        let image = image_reference(
            &record.deployment.region,
            project,
            &self.settings.registry.repository,
            &record.name,
        );

        let mut completed: Option<Stage> = None;
        match self
            .drive(&mut record, input, &image, project, &mut completed)
            .await
        {
            Ok(()) => {
                span.finish("succeeded", None);
                Ok(DeployOutcome {
                    name: record.name.clone(),
                    attempt_id,
                    image,
                    url: record.url.clone(),
                    state: record.state.clone(),
                    source_digest: record.source_digest.clone(),
                })
            }
            Err(err) => {
                let failed_stage = err
                    .stage()
                    .or(completed)
                    .unwrap_or(Stage::PrepareContext);
                record.state = DeploymentState::Error {
                    reason: err.to_string(),
                    failed_stage,
                    completed_stage: completed,
                };
                if let Err(save_err) = self.persist(&mut record) {
                    warn!(
                        target: "mcp_forge::pipeline",
                        server = %record.name,
                        reason = %save_err,
                        "Failed to persist error state after attempt failure"
                    );
                }
                span.finish("failed", Some(failed_stage.as_str()));
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        record: &mut ServerRecord,
        input: DriveInput<'_>,
        image: &str,
        project: &str,
        completed: &mut Option<Stage>,
    ) -> Result<(), PipelineError> {
        let context = match input {
            DriveInput::Generated(generated) => {
                let context = self.stage_generated_context(&record.name, generated)?;
                record.source_digest = Some(generated.digest.clone());
                *completed = Some(Stage::PrepareContext);
                context
            }
            DriveInput::Git(source) => {
                let context = self.clone_repository(&record.name, &source).await?;
                *completed = Some(Stage::CloneRepository);
                context
            }
        };
        record.state = DeploymentState::Building;
        self.persist(record)?;

        let builder = ImageBuilder::new(self.runner.clone());
        builder
            .ensure_repository(
                project,
                &record.deployment.region,
                &self.settings.registry.repository,
            )
            .await?;
        *completed = Some(Stage::EnsureRepository);

        builder.authenticate(&record.deployment.region).await?;
        *completed = Some(Stage::Authenticate);

        builder.build(&context, image).await?;
        *completed = Some(Stage::BuildImage);
        record.state = DeploymentState::Publishing;
        record.image = Some(image.to_string());
        self.persist(record)?;

        builder.push(image).await?;
        *completed = Some(Stage::PushImage);
        record.state = DeploymentState::Deploying;
        self.persist(record)?;

        let driver = DeploymentDriver::new(
            self.runner.clone(),
            project.to_string(),
            record.deployment.region.clone(),
        );
        let spec = ServiceSpec {
            image: image.to_string(),
            container_port: record.deployment.container_port,
            cpu: record.deployment.cpu.clone(),
            memory: record.deployment.memory.clone(),
            startup_probe_path: record.deployment.startup_probe_path.clone(),
            env: record.env_overrides.clone(),
        };
        driver.submit(&record.name, &spec).await?;
        *completed = Some(Stage::Submit);

        let remote = driver
            .describe(&record.name)
            .await
            .map_err(|err| retag(err, Stage::AwaitUrl))?;
        *completed = Some(Stage::AwaitUrl);

        // A submitted service whose URL has not surfaced yet is still
        // provisioning, not failed; the record stays in Deploying and the
        // next deploy or reconcile picks the endpoint up.
        match remote.and_then(|remote| remote.url) {
            Some(url) => {
                record.url = Some(url);
                record.state = DeploymentState::Running;
                self.persist(record)?;
            }
            None => {
                warn!(
                    target: "mcp_forge::pipeline",
                    server = %record.name,
                    "Service submitted but the platform reports no URL yet"
                );
                self.persist(record)?;
            }
        }
        Ok(())
    }

    /// Write the generated service into a fresh per-server staging directory.
    fn stage_generated_context(
        &self,
        name: &str,
        generated: &GeneratedService,
    ) -> Result<BuildContext, PipelineError> {
        let dir = self.store.build_dir().join(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(staging_error(&dir))?;
        }
        fs::create_dir_all(&dir).map_err(staging_error(&dir))?;

        let source_path = dir.join("server.py");
        fs::write(&source_path, &generated.source).map_err(staging_error(&source_path))?;
        let requirements_path = dir.join("requirements.txt");
        fs::write(&requirements_path, &generated.requirements)
            .map_err(staging_error(&requirements_path))?;
        let dockerfile = dir.join("Dockerfile");
        fs::write(&dockerfile, &generated.dockerfile).map_err(staging_error(&dockerfile))?;

        Ok(BuildContext { dir, dockerfile })
    }

    /// Shallow-clone the repository into the staging directory and locate
    /// its dockerfile.
    async fn clone_repository(
        &self,
        name: &str,
        source: &GitRepoSource,
    ) -> Result<BuildContext, PipelineError> {
        let dir = self.store.build_dir().join(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(staging_error(&dir))?;
        }

        let invocation = ToolInvocation::new(
            "git",
            [
                "clone",
                "--depth",
                "1",
                &source.url,
                &dir.to_string_lossy(),
            ],
        );
        expect_success(
            Stage::CloneRepository,
            "git",
            run_tool(self.runner.as_ref(), Stage::CloneRepository, invocation).await?,
        )?;

        let dockerfile = dir.join(&source.dockerfile_path);
        if !dockerfile.exists() {
            return Err(PipelineError::Staging {
                path: dockerfile,
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    "dockerfile not present in cloned repository",
                ),
            });
        }
        Ok(BuildContext { dir, dockerfile })
    }

    fn persist(&self, record: &mut ServerRecord) -> Result<(), StoreError> {
        record.updated_at = chrono::Utc::now();
        self.store.save(record)
    }
}
