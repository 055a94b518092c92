use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tempfile::TempDir;

use mcp_forge::{
    config::{
        DeploySettings, LimitSettings, RegistrySettings, Settings, DEFAULT_CONTAINER_PORT,
        DEFAULT_CPU, DEFAULT_MEMORY, DEFAULT_REGION, DEFAULT_REPOSITORY,
    },
    lib::errors::ProcessError,
    lib::process::{ToolInvocation, ToolOutput, ToolRunner},
};

#[allow(dead_code)]
pub const BINARY_PATH: &str = env!("CARGO_BIN_EXE_mcp-forge");

/// Runner that replays scripted outputs in order and records every
/// invocation. A `git clone` also materializes the target directory with a
/// Dockerfile, standing in for the clone side effect.
pub struct FakeRunner {
    outputs: Mutex<Vec<ToolOutput>>,
    calls: Mutex<Vec<ToolInvocation>>,
}

impl FakeRunner {
    pub fn new(outputs: Vec<ToolOutput>) -> Arc<Self> {
        let mut reversed = outputs;
        reversed.reverse();
        Arc::new(Self {
            outputs: Mutex::new(reversed),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().expect("calls lock").clone()
    }

    #[allow(dead_code)]
    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| call.program.clone())
            .collect()
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput, ProcessError> {
        if invocation.program == "git" {
            if let Some(target) = invocation.args.last() {
                fs::create_dir_all(target).expect("simulated clone dir");
                fs::write(Path::new(target).join("Dockerfile"), "FROM scratch\n")
                    .expect("simulated dockerfile");
            }
        }
        self.calls.lock().expect("calls lock").push(invocation);
        Ok(self
            .outputs
            .lock()
            .expect("outputs lock")
            .pop()
            .unwrap_or_else(|| ok("")))
    }
}

pub fn ok(stdout: &str) -> ToolOutput {
    ToolOutput {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed(stderr: &str) -> ToolOutput {
    ToolOutput {
        exit_code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

pub fn describe_body(name: &str, url: &str) -> String {
    format!(
        r#"{{"metadata": {{"name": "{name}"}}, "status": {{"url": "{url}", "conditions": [{{"type": "Ready", "status": "True"}}]}}}}"#
    )
}

/// The seven tool outputs a fully successful catalog deploy consumes.
pub fn happy_deploy_outputs(name: &str, url: &str) -> Vec<ToolOutput> {
    vec![
        ok("repo exists"),            // artifact repository describe
        ok("ya29.test-token\n"),      // access token
        ok("Login Succeeded"),        // docker login
        ok("built"),                  // docker build
        ok("pushed"),                 // docker push
        ok("deployed"),               // run deploy
        ok(&describe_body(name, url)), // run services describe
    ]
}

pub fn settings(root: &TempDir) -> Settings {
    Settings {
        registry: RegistrySettings {
            repository: DEFAULT_REPOSITORY.to_string(),
        },
        deploy: DeploySettings {
            region: DEFAULT_REGION.to_string(),
            project: None,
            container_port: DEFAULT_CONTAINER_PORT,
            cpu: DEFAULT_CPU.to_string(),
            memory: DEFAULT_MEMORY.to_string(),
        },
        limits: LimitSettings {
            tool_timeout_secs: 600,
            lock_stale_secs: 3_600,
        },
        state_root: root.path().to_path_buf(),
        source_path: None,
    }
}
