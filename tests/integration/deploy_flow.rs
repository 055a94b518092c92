use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tempfile::{tempdir, TempDir};

use mcp_forge::{
    cli::{execute_with, ForgeCli},
    store::{DeploymentState, ServerStore, Stage},
};

use crate::common::{self, FakeRunner};

fn parse(argv: &[&str]) -> ForgeCli {
    ForgeCli::try_parse_from(argv).expect("argv parses")
}

async fn exec(root: &TempDir, runner: Arc<FakeRunner>, argv: &[&str]) -> Result<String> {
    execute_with(parse(argv), common::settings(root), runner).await
}

async fn create_calc(root: &TempDir) {
    exec(
        root,
        FakeRunner::new(Vec::new()),
        &[
            "mcp-forge",
            "create-server",
            "--name",
            "calc",
            "--tools",
            "basic_math,web_search",
        ],
    )
    .await
    .expect("create-server succeeds");
}

#[tokio::test]
async fn create_then_deploy_reaches_running_with_url() {
    let root = tempdir().expect("temp dir");
    create_calc(&root).await;

    let runner = FakeRunner::new(common::happy_deploy_outputs(
        "calc",
        "https://calc-abc-uc.a.run.app",
    ));
    let payload = exec(
        &root,
        runner.clone(),
        &["mcp-forge", "deploy-server", "--name", "calc", "--project", "acme"],
    )
    .await
    .expect("deploy succeeds");

    assert!(payload.contains("https://calc-abc-uc.a.run.app"), "{payload}");
    assert!(payload.contains("\"running\""), "{payload}");

    let store = ServerStore::open(root.path().to_path_buf()).expect("open store");
    let record = store.get("calc").expect("record persisted");
    assert!(record.state.is_running());
    assert_eq!(
        record.image.as_deref(),
        Some("us-central1-docker.pkg.dev/acme/mcp-server-images/calc")
    );
    assert!(record.source_digest.is_some());

    assert_eq!(
        runner.programs(),
        vec!["gcloud", "gcloud", "docker", "docker", "docker", "gcloud", "gcloud"]
    );

    let staged = store.build_dir().join("calc");
    assert!(staged.join("server.py").exists());
    assert!(staged.join("Dockerfile").exists());
    assert!(staged.join("requirements.txt").exists());
}

#[tokio::test]
async fn failed_push_persists_error_and_releases_the_lock() {
    let root = tempdir().expect("temp dir");
    create_calc(&root).await;

    let runner = FakeRunner::new(vec![
        common::ok("repo exists"),
        common::ok("ya29.test-token\n"),
        common::ok("Login Succeeded"),
        common::ok("built"),
        common::failed("denied: registry rejected the push"),
    ]);
    let err = exec(
        &root,
        runner.clone(),
        &["mcp-forge", "deploy-server", "--name", "calc", "--project", "acme"],
    )
    .await
    .expect_err("push failure must surface");
    assert!(err.to_string().contains("image push"), "{err}");

    let store = ServerStore::open(root.path().to_path_buf()).expect("open store");
    let record = store.get("calc").expect("record persisted");
    match record.state {
        DeploymentState::Error {
            ref reason,
            failed_stage,
            completed_stage,
        } => {
            assert!(reason.contains("registry rejected"), "{reason}");
            assert_eq!(failed_stage, Stage::PushImage);
            assert_eq!(completed_stage, Some(Stage::BuildImage));
        }
        ref other => panic!("expected error state, got {other}"),
    }
    // The failed attempt stops at the push; nothing was submitted.
    assert_eq!(runner.calls().len(), 5);

    // A fresh attempt is allowed immediately; the lock was released.
    let retry = FakeRunner::new(common::happy_deploy_outputs(
        "calc",
        "https://calc-abc-uc.a.run.app",
    ));
    exec(
        &root,
        retry,
        &["mcp-forge", "deploy-server", "--name", "calc", "--project", "acme"],
    )
    .await
    .expect("retry succeeds");
    assert!(store.get("calc").expect("get").state.is_running());
}

#[tokio::test]
async fn redeploying_unchanged_tools_yields_the_same_digest() {
    let root = tempdir().expect("temp dir");
    create_calc(&root).await;
    let store = ServerStore::open(root.path().to_path_buf()).expect("open store");

    exec(
        &root,
        FakeRunner::new(common::happy_deploy_outputs("calc", "https://calc")),
        &["mcp-forge", "deploy-server", "--name", "calc", "--project", "acme"],
    )
    .await
    .expect("first deploy");
    let first_digest = store.get("calc").expect("get").source_digest;

    exec(
        &root,
        FakeRunner::new(common::happy_deploy_outputs("calc", "https://calc")),
        &["mcp-forge", "deploy-server", "--name", "calc", "--project", "acme"],
    )
    .await
    .expect("second deploy");
    let second_digest = store.get("calc").expect("get").source_digest;

    assert!(first_digest.is_some());
    assert_eq!(first_digest, second_digest);
}

#[tokio::test]
async fn git_repo_deploy_creates_and_runs_the_server() {
    let root = tempdir().expect("temp dir");

    let mut outputs = vec![common::ok("cloned")];
    outputs.extend(common::happy_deploy_outputs(
        "wrapped",
        "https://wrapped-xyz-uc.a.run.app",
    ));
    let runner = FakeRunner::new(outputs);

    let payload = exec(
        &root,
        runner.clone(),
        &[
            "mcp-forge",
            "deploy-git-repo",
            "--name",
            "wrapped",
            "--git-repo-url",
            "https://github.com/acme/wrapped-server.git",
            "--env",
            "API_KEY=k",
            "--project",
            "acme",
        ],
    )
    .await
    .expect("git deploy succeeds");
    assert!(payload.contains("\"running\""), "{payload}");

    let store = ServerStore::open(root.path().to_path_buf()).expect("open store");
    let record = store.get("wrapped").expect("record created");
    assert!(record.state.is_running());
    assert_eq!(
        record.git_repo.as_ref().map(|g| g.url.as_str()),
        Some("https://github.com/acme/wrapped-server.git")
    );
    assert!(record.source_digest.is_none(), "no generated source for git repos");

    let first = &runner.calls()[0];
    assert_eq!(first.program, "git");
    assert_eq!(first.args[0], "clone");
}
