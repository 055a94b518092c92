//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};

/// Command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mcp-forge",
    author,
    version,
    about = "Declarative MCP servers on managed compute",
    long_about = None
)]
pub struct ForgeCli {
    /// Target project (overrides GCP_PROJECT_ID and the settings file).
    #[arg(long, global = true)]
    pub project: Option<String>,
    #[command(subcommand)]
    pub command: ForgeCommand,
}

/// Top-level subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum ForgeCommand {
    /// Print the catalog of deployable tools.
    ListTools,
    /// Create a server record from catalog tools.
    CreateServer(CreateServerArgs),
    /// Build, publish, and deploy an existing server.
    DeployServer(DeployServerArgs),
    /// Deploy an external git repository as a server.
    DeployGitRepo(DeployGitRepoArgs),
    /// Print the endpoint of a deployed server.
    GetServerUrl(GetServerUrlArgs),
    /// Ask a deployed server which tools it advertises.
    GetServerCapabilities(TargetArgs),
    /// List server records reconciled against the platform.
    ListServers,
    /// Delete a server remotely, then locally.
    DeleteServer(NameArgs),
    /// Call one tool on a deployed server.
    CallTool(CallToolArgs),
}

/// Arguments for `create-server`.
#[derive(Debug, Clone, Args)]
pub struct CreateServerArgs {
    /// Server name ([a-z][a-z0-9-]*, max 63 chars).
    #[arg(long)]
    pub name: String,
    /// Catalog tool ids, comma-separated or repeated.
    #[arg(long = "tools", value_name = "TOOL_IDS", value_delimiter = ',', required = true)]
    pub tools: Vec<String>,
    /// Environment override passed to the service, as KEY=VALUE.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,
}

/// Arguments for `deploy-server`.
#[derive(Debug, Clone, Args)]
pub struct DeployServerArgs {
    /// Server name.
    #[arg(long)]
    pub name: String,
    /// Container port override for this and later deploys.
    #[arg(long)]
    pub container_port: Option<u16>,
    /// Startup probe path override.
    #[arg(long, value_name = "PATH")]
    pub startup_probe_path: Option<String>,
}

/// Arguments for `deploy-git-repo`.
#[derive(Debug, Clone, Args)]
pub struct DeployGitRepoArgs {
    /// Server name.
    #[arg(long)]
    pub name: String,
    /// Git URL of the repository to deploy.
    #[arg(long)]
    pub git_repo_url: String,
    /// Dockerfile path inside the repository.
    #[arg(long, default_value = "Dockerfile")]
    pub dockerfile_path: String,
    /// Environment override passed to the service, as KEY=VALUE.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,
    /// Container port override.
    #[arg(long)]
    pub container_port: Option<u16>,
    /// Startup probe path override.
    #[arg(long, value_name = "PATH")]
    pub startup_probe_path: Option<String>,
}

/// Single positional server name.
#[derive(Debug, Clone, Args)]
pub struct NameArgs {
    /// Server name.
    #[arg(long)]
    pub name: String,
}

/// Arguments for `get-server-url`.
#[derive(Debug, Clone, Args)]
pub struct GetServerUrlArgs {
    /// Server name.
    #[arg(long)]
    pub name: String,
    /// Print the bare URL instead of a JSON payload.
    #[arg(long)]
    pub raw: bool,
}

/// Remote service addressed by record name or by explicit URL.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Server name to look up in the local store.
    #[arg(long)]
    pub name: Option<String>,
    /// Service base URL, bypassing the local store.
    #[arg(long, conflicts_with = "name")]
    pub url: Option<String>,
    /// Event-stream endpoint suffix under the base URL.
    #[arg(long, default_value = "sse", value_name = "SUFFIX")]
    pub endpoint_suffix: String,
}

/// Arguments for `call-tool`.
#[derive(Debug, Clone, Args)]
pub struct CallToolArgs {
    /// Tool to invoke on the remote service.
    pub tool: String,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Tool argument as KEY=VALUE; the value is parsed as JSON when it is
    /// valid JSON, otherwise passed as a string.
    #[arg(long = "tool-arg", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub tool_args: Vec<(String, String)>,
}

/// Parse a `KEY=VALUE` pair; the key must be non-empty and the `=` present.
pub fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("`{raw}` is not a KEY=VALUE pair")),
    }
}
