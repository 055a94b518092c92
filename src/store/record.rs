//! Persisted server record shapes and the deployment state machine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage identifiers, used for error reports and persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generate,
    PrepareContext,
    CloneRepository,
    EnsureRepository,
    Authenticate,
    BuildImage,
    PushImage,
    Submit,
    AwaitUrl,
    DescribeService,
    ListServices,
    DeleteService,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Generate => "source generation",
            Stage::PrepareContext => "build context staging",
            Stage::CloneRepository => "repository clone",
            Stage::EnsureRepository => "registry repository provisioning",
            Stage::Authenticate => "registry authentication",
            Stage::BuildImage => "image build",
            Stage::PushImage => "image push",
            Stage::Submit => "service submit",
            Stage::AwaitUrl => "endpoint lookup",
            Stage::DescribeService => "service describe",
            Stage::ListServices => "service list",
            Stage::DeleteService => "service delete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finite deployment state of one server.
///
/// Within one deploy attempt transitions are monotonic:
/// `Draft → Building → Publishing → Deploying → Running`. Any stage may fall
/// into `Error`, which records what failed and the last stage that finished so
/// a retry can resume from intact artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DeploymentState {
    Draft,
    Building,
    Publishing,
    Deploying,
    Running,
    Error {
        reason: String,
        failed_stage: Stage,
        completed_stage: Option<Stage>,
    },
    Deleting,
    Deleted,
}

impl DeploymentState {
    pub fn phase_name(&self) -> &'static str {
        match self {
            DeploymentState::Draft => "draft",
            DeploymentState::Building => "building",
            DeploymentState::Publishing => "publishing",
            DeploymentState::Deploying => "deploying",
            DeploymentState::Running => "running",
            DeploymentState::Error { .. } => "error",
            DeploymentState::Deleting => "deleting",
            DeploymentState::Deleted => "deleted",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, DeploymentState::Running)
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phase_name())
    }
}

/// Where the deployable content of a server comes from.
///
/// Absent for catalog-backed servers; present when the server wraps an
/// externally supplied, already-containerized repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRepoSource {
    pub url: String,
    pub dockerfile_path: String,
}

/// Managed-compute submission parameters for one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    pub container_port: u16,
    pub cpu: String,
    pub memory: String,
    /// Health path the platform polls before marking the service ready.
    pub startup_probe_path: String,
    pub region: String,
    pub project: Option<String>,
}

/// One locally persisted server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub name: String,
    /// Ordered set of catalog tool ids; empty only for git-repo servers.
    pub tools: Vec<String>,
    #[serde(default)]
    pub env_overrides: BTreeMap<String, String>,
    pub deployment: DeploymentDescriptor,
    pub state: DeploymentState,
    /// Image reference of the last build that reached the registry.
    #[serde(default)]
    pub image: Option<String>,
    /// SHA-256 of the generated source, for diffing across redeploys.
    #[serde(default)]
    pub source_digest: Option<String>,
    /// Last endpoint reported by the platform.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub git_repo: Option<GitRepoSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_reconciled_at: Option<DateTime<Utc>>,
}

impl ServerRecord {
    /// Fresh draft record for a catalog-backed server.
    pub fn draft(name: String, tools: Vec<String>, deployment: DeploymentDescriptor) -> Self {
        let now = Utc::now();
        Self {
            name,
            tools,
            env_overrides: BTreeMap::new(),
            deployment,
            state: DeploymentState::Draft,
            image: None,
            source_digest: None,
            url: None,
            git_repo: None,
            created_at: now,
            updated_at: now,
            last_reconciled_at: None,
        }
    }

    /// Fresh draft record wrapping an external git repository.
    pub fn git_draft(
        name: String,
        source: GitRepoSource,
        env_overrides: BTreeMap<String, String>,
        deployment: DeploymentDescriptor,
    ) -> Self {
        let mut record = Self::draft(name, Vec::new(), deployment);
        record.git_repo = Some(source);
        record.env_overrides = env_overrides;
        record
    }
}
