//! CLI command execution.
//!
//! Every command resolves to a user-facing payload printed on stdout;
//! anything diagnostic goes to stderr through `tracing`.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use serde_json::json;

use crate::{
    catalog::ToolCatalog,
    client::{tool_args_from_pairs, ServiceClient},
    config::{resolve_project, Settings},
    deploy::{
        pipeline::descriptor_from, Deleter, DeployOverrides, DeploymentDriver, GitDeployRequest,
        Pipeline, Reconciler,
    },
    lib::process::{SystemToolRunner, ToolRunner},
    store::{ServerRecord, ServerStore},
};

pub mod args;

pub use args::{
    CallToolArgs, CreateServerArgs, DeployGitRepoArgs, DeployServerArgs, ForgeCli, ForgeCommand,
    NameArgs, TargetArgs,
};

/// Execute a parsed command against the host environment.
pub async fn execute(cli: ForgeCli) -> Result<String> {
    let settings = Settings::load_from_env_or_default()?;
    let runner: Arc<dyn ToolRunner> = Arc::new(SystemToolRunner::new(Duration::from_secs(
        settings.limits.tool_timeout_secs,
    )));
    execute_with(cli, settings, runner).await
}

/// Execute with explicit settings and runner.
pub async fn execute_with(
    cli: ForgeCli,
    settings: Settings,
    runner: Arc<dyn ToolRunner>,
) -> Result<String> {
    let catalog = ToolCatalog::builtin();
    let store = ServerStore::open(settings.state_root.clone())?;

    match cli.command {
        ForgeCommand::ListTools => {
            let tools: Vec<_> = catalog.list().collect();
            let payload = json!({ "tools": tools });
            Ok(serde_json::to_string_pretty(&payload)?)
        }
        ForgeCommand::CreateServer(args) => {
            catalog.resolve(&args.tools)?;
            let mut record =
                ServerRecord::draft(args.name.clone(), args.tools, descriptor_from(&settings));
            record.env_overrides = args.env.into_iter().collect::<BTreeMap<_, _>>();
            store.create(record.clone())?;
            let payload = json!({
                "status": "created",
                "name": record.name,
                "state": record.state.phase_name(),
                "tools": record.tools,
            });
            Ok(serde_json::to_string_pretty(&payload)?)
        }
        ForgeCommand::DeployServer(args) => {
            let project = resolve_project(cli.project, &settings, runner.as_ref()).await?;
            let pipeline = Pipeline::new(store, catalog, settings, runner);
            let overrides = DeployOverrides {
                container_port: args.container_port,
                startup_probe_path: args.startup_probe_path,
            };
            let outcome = pipeline
                .deploy_server(&args.name, &project, &overrides)
                .await?;
            Ok(serde_json::to_string_pretty(&outcome)?)
        }
        ForgeCommand::DeployGitRepo(args) => {
            let project = resolve_project(cli.project, &settings, runner.as_ref()).await?;
            let pipeline = Pipeline::new(store, catalog, settings, runner);
            let request = GitDeployRequest {
                name: args.name,
                url: args.git_repo_url,
                dockerfile_path: args.dockerfile_path,
                env_overrides: args.env.into_iter().collect(),
            };
            let overrides = DeployOverrides {
                container_port: args.container_port,
                startup_probe_path: args.startup_probe_path,
            };
            let outcome = pipeline
                .deploy_git_repo(request, &project, &overrides)
                .await?;
            Ok(serde_json::to_string_pretty(&outcome)?)
        }
        ForgeCommand::GetServerUrl(args) => {
            let record = store.get(&args.name)?;
            let url = require_url(&record)?;
            if args.raw {
                return Ok(url);
            }
            let payload = json!({ "name": record.name, "url": url });
            Ok(serde_json::to_string_pretty(&payload)?)
        }
        ForgeCommand::GetServerCapabilities(target) => {
            let url = resolve_target_url(&store, &target)?;
            let client = ServiceClient::new(&url).with_endpoint_suffix(&target.endpoint_suffix);
            let capabilities = client.capabilities().await?;
            let payload = json!({
                "url": url,
                "tools": capabilities.tools,
                "resources": capabilities.resources,
                "prompts": capabilities.prompts,
            });
            Ok(serde_json::to_string_pretty(&payload)?)
        }
        ForgeCommand::ListServers => {
            let project = resolve_project(cli.project, &settings, runner.as_ref()).await?;
            let driver =
                DeploymentDriver::new(runner, project, settings.deploy.region.clone());
            let entries = Reconciler::new(store, driver).reconcile().await?;
            let payload = json!({ "servers": entries });
            Ok(serde_json::to_string_pretty(&payload)?)
        }
        ForgeCommand::DeleteServer(args) => {
            let project = resolve_project(cli.project, &settings, runner.as_ref()).await?;
            let driver =
                DeploymentDriver::new(runner, project, settings.deploy.region.clone());
            let report = Deleter::new(store, driver).delete(&args.name).await?;
            Ok(serde_json::to_string_pretty(&report)?)
        }
        ForgeCommand::CallTool(args) => {
            let url = resolve_target_url(&store, &args.target)?;
            let arguments = tool_args_from_pairs(&args.tool_args);
            let arguments = if arguments.is_empty() {
                None
            } else {
                Some(arguments)
            };
            let client =
                ServiceClient::new(&url).with_endpoint_suffix(&args.target.endpoint_suffix);
            let result = client.call_tool(&args.tool, arguments).await?;
            Ok(serde_json::to_string_pretty(&result)?)
        }
    }
}

/// Pick the service URL from `--url`, or from the named record's endpoint.
fn resolve_target_url(store: &ServerStore, target: &TargetArgs) -> Result<String> {
    match (&target.url, &target.name) {
        (Some(url), _) => Ok(url.trim_end_matches('/').to_string()),
        (None, Some(name)) => {
            let record = store.get(name)?;
            require_url(&record)
        }
        (None, None) => Err(anyhow!("pass either --name or --url to pick a server")),
    }
}

fn require_url(record: &ServerRecord) -> Result<String> {
    record.url.clone().ok_or_else(|| {
        anyhow!(
            "server `{name}` has no endpoint yet (state: {state}); run `mcp-forge deploy-server --name {name}` first",
            name = record.name,
            state = record.state,
        )
    })
}
