//! Load and validate forge settings, and resolve the deployment target.
//!
//! Settings come from an optional `mcp-forge.toml` (path overridable through
//! `MCP_FORGE_CONFIG_PATH`). The target project follows a strict precedence:
//! explicit flag, then `GCP_PROJECT_ID`, then the settings file, then the
//! `gcloud` default configuration. First non-empty value wins.

use std::{env, path::PathBuf};

use serde::Deserialize;
use tracing::{error, info};

use crate::lib::{
    errors::ConfigError,
    ident,
    paths,
    process::{ToolInvocation, ToolRunner},
};

const CONFIG_ENV_KEY: &str = "MCP_FORGE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "mcp-forge.toml";
const PROJECT_ENV_KEY: &str = "GCP_PROJECT_ID";
const REGION_ENV_KEY: &str = "GCP_REGION";

pub const DEFAULT_REPOSITORY: &str = "mcp-server-images";
pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_CONTAINER_PORT: u16 = 8080;
pub const DEFAULT_CPU: &str = "1";
pub const DEFAULT_MEMORY: &str = "512Mi";
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_LOCK_STALE_SECS: u64 = 3_600;

/// Top-level settings container.
#[derive(Debug, Clone)]
pub struct Settings {
    pub registry: RegistrySettings,
    pub deploy: DeploySettings,
    pub limits: LimitSettings,
    /// Directory holding server records, deploy locks, and build staging.
    pub state_root: PathBuf,
    /// Settings file the values came from, when one was read.
    pub source_path: Option<PathBuf>,
}

/// Artifact registry destination for published images.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub repository: String,
}

/// Defaults applied to new deployment descriptors.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub region: String,
    pub project: Option<String>,
    pub container_port: u16,
    pub cpu: String,
    pub memory: String,
}

/// Operational bounds for external tools and deploy locks.
#[derive(Debug, Clone)]
pub struct LimitSettings {
    pub tool_timeout_secs: u64,
    pub lock_stale_secs: u64,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    registry: Option<RawRegistrySection>,
    deploy: Option<RawDeploySection>,
    limits: Option<RawLimitsSection>,
    state_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawRegistrySection {
    repository: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDeploySection {
    region: Option<String>,
    project: Option<String>,
    container_port: Option<u16>,
    cpu: Option<String>,
    memory: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLimitsSection {
    tool_timeout_secs: Option<u64>,
    lock_stale_secs: Option<u64>,
}

impl Settings {
    /// Prefer `MCP_FORGE_CONFIG_PATH` if set; otherwise read `mcp-forge.toml`
    /// when present and fall back to defaults when it is not.
    pub fn load_from_env_or_default() -> Result<Self, ConfigError> {
        let path = match env::var(CONFIG_ENV_KEY) {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => PathBuf::from(DEFAULT_CONFIG_PATH),
        };

        if !path.exists() {
            let raw = RawSettings {
                registry: None,
                deploy: None,
                limits: None,
                state_root: None,
            };
            return Self::from_raw(raw, None);
        }
        Self::load_from_path(path)
    }

    /// Load settings from a specific file.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        info!(
            target: "mcp_forge::config",
            path = %path.display(),
            "Loading settings"
        );

        let builder = config::Config::builder().add_source(config::File::from(path.clone()));
        let document = builder.build().map_err(|err| {
            let error = ConfigError::from_read_error(path.clone(), err);
            error!(
                target: "mcp_forge::config",
                path = %path.display(),
                reason = %error,
                "Failed to read settings file"
            );
            error
        })?;

        let raw: RawSettings = document.try_deserialize().map_err(|err| {
            let error = ConfigError::from_parse_error(path.clone(), err);
            error!(
                target: "mcp_forge::config",
                path = %path.display(),
                reason = %error,
                "Failed to parse settings file"
            );
            error
        })?;

        Self::from_raw(raw, Some(path))
    }

    fn from_raw(raw: RawSettings, path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let marker = path.clone().unwrap_or_else(|| PathBuf::from("<defaults>"));

        let repository = raw
            .registry
            .and_then(|section| section.repository)
            .unwrap_or_else(|| DEFAULT_REPOSITORY.to_string());
        if !ident::is_safe_server_name(&repository) {
            return Err(ConfigError::InvalidField {
                path: marker,
                field: "registry.repository",
                message: format!("`{repository}` is not a valid repository name"),
            });
        }

        let deploy_raw = raw.deploy.unwrap_or(RawDeploySection {
            region: None,
            project: None,
            container_port: None,
            cpu: None,
            memory: None,
        });
        let region = resolve_region(env::var(REGION_ENV_KEY).ok(), deploy_raw.region);
        if region.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                path: marker,
                field: "deploy.region",
                message: "region must not be empty".to_string(),
            });
        }
        let container_port = deploy_raw.container_port.unwrap_or(DEFAULT_CONTAINER_PORT);
        if container_port == 0 {
            return Err(ConfigError::InvalidField {
                path: marker,
                field: "deploy.container_port",
                message: "port 0 is not routable".to_string(),
            });
        }

        let limits_raw = raw.limits.unwrap_or(RawLimitsSection {
            tool_timeout_secs: None,
            lock_stale_secs: None,
        });

        let state_root = match raw.state_root {
            Some(root) => root,
            None => paths::resolve_state_root()
                .map_err(|message| ConfigError::StateRootUnavailable { message })?,
        };

        Ok(Self {
            registry: RegistrySettings { repository },
            deploy: DeploySettings {
                region,
                project: deploy_raw.project.filter(|p| !p.trim().is_empty()),
                container_port,
                cpu: deploy_raw.cpu.unwrap_or_else(|| DEFAULT_CPU.to_string()),
                memory: deploy_raw
                    .memory
                    .unwrap_or_else(|| DEFAULT_MEMORY.to_string()),
            },
            limits: LimitSettings {
                tool_timeout_secs: limits_raw
                    .tool_timeout_secs
                    .unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS),
                lock_stale_secs: limits_raw.lock_stale_secs.unwrap_or(DEFAULT_LOCK_STALE_SECS),
            },
            state_root,
            source_path: path,
        })
    }
}

/// Region precedence: `GCP_REGION` beats the settings file beats the default.
fn resolve_region(env_region: Option<String>, file_region: Option<String>) -> String {
    for candidate in [env_region, file_region] {
        if let Some(region) = candidate {
            if !region.trim().is_empty() {
                return region;
            }
        }
    }
    DEFAULT_REGION.to_string()
}

/// Resolve the target project: flag, then `GCP_PROJECT_ID`, then the settings
/// file, then the platform tool's own default configuration.
pub async fn resolve_project(
    flag: Option<String>,
    settings: &Settings,
    runner: &dyn ToolRunner,
) -> Result<String, ConfigError> {
    resolve_project_from(flag, env::var(PROJECT_ENV_KEY).ok(), settings, runner).await
}

async fn resolve_project_from(
    flag: Option<String>,
    env_project: Option<String>,
    settings: &Settings,
    runner: &dyn ToolRunner,
) -> Result<String, ConfigError> {
    for candidate in [flag, env_project, settings.deploy.project.clone()] {
        if let Some(project) = candidate {
            if !project.trim().is_empty() {
                return Ok(project);
            }
        }
    }

    let invocation = ToolInvocation::new("gcloud", ["config", "get-value", "project"]);
    match runner.run(invocation).await {
        Ok(output) if output.success() => {
            let project = output.stdout.trim().to_string();
            if project.is_empty() || project == "(unset)" {
                Err(ConfigError::MissingProject)
            } else {
                Ok(project)
            }
        }
        _ => Err(ConfigError::MissingProject),
    }
}
