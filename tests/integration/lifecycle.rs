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

/// Seed a record that looks like a previously deployed server.
fn seed_running(root: &TempDir, name: &str, url: &str) -> ServerStore {
    let store = ServerStore::open(root.path().to_path_buf()).expect("open store");
    let mut record = mcp_forge::store::ServerRecord::draft(
        name.into(),
        vec!["basic_math".into()],
        mcp_forge::deploy::pipeline::descriptor_from(&common::settings(root)),
    );
    record.state = DeploymentState::Running;
    record.url = Some(url.into());
    store.create(record).expect("seed record");
    store
}

#[tokio::test]
async fn delete_server_removes_remote_then_local() {
    let root = tempdir().expect("temp dir");
    let store = seed_running(&root, "calc", "https://calc");

    let runner = FakeRunner::new(vec![common::ok("Deleted service [calc].")]);
    let payload = exec(
        &root,
        runner.clone(),
        &["mcp-forge", "delete-server", "--name", "calc", "--project", "acme"],
    )
    .await
    .expect("delete succeeds");
    assert!(payload.contains("\"deleted\""), "{payload}");

    assert!(store.get("calc").is_err(), "local record must be gone");
    let call = &runner.calls()[0];
    assert_eq!(call.program, "gcloud");
    assert!(call.command_line().contains("run services delete calc"));
}

#[tokio::test]
async fn delete_keeps_the_record_when_the_remote_delete_fails() {
    let root = tempdir().expect("temp dir");
    let store = seed_running(&root, "calc", "https://calc");

    let runner = FakeRunner::new(vec![common::failed(
        "ERROR: PERMISSION_DENIED: caller lacks run.services.delete",
    )]);
    let err = exec(
        &root,
        runner,
        &["mcp-forge", "delete-server", "--name", "calc", "--project", "acme"],
    )
    .await
    .expect_err("remote failure must propagate");
    assert!(err.to_string().contains("service delete"), "{err}");

    let record = store.get("calc").expect("record kept");
    assert!(matches!(
        record.state,
        DeploymentState::Error {
            failed_stage: Stage::DeleteService,
            ..
        }
    ));
}

#[tokio::test]
async fn deleting_an_already_absent_remote_service_still_cleans_up() {
    let root = tempdir().expect("temp dir");
    let store = seed_running(&root, "calc", "https://calc");

    let runner = FakeRunner::new(vec![common::failed(
        "ERROR: Service [calc] could not be found.",
    )]);
    let payload = exec(
        &root,
        runner,
        &["mcp-forge", "delete-server", "--name", "calc", "--project", "acme"],
    )
    .await
    .expect("idempotent delete");
    assert!(payload.contains("\"already_absent\""), "{payload}");
    assert!(store.get("calc").is_err());
}

#[tokio::test]
async fn list_servers_flags_both_kinds_of_orphan() {
    let root = tempdir().expect("temp dir");
    seed_running(&root, "calc", "https://calc");

    // The platform knows nothing about `calc` but runs a `mystery` service.
    let list_body = r#"[{"metadata": {"name": "mystery"}, "status": {"url": "https://m", "conditions": [{"type": "Ready", "status": "True"}]}}]"#;
    let runner = FakeRunner::new(vec![common::ok(list_body)]);
    let payload = exec(
        &root,
        runner,
        &["mcp-forge", "list-servers", "--project", "acme"],
    )
    .await
    .expect("list-servers succeeds");

    assert!(payload.contains("\"orphaned_local\""), "{payload}");
    assert!(payload.contains("\"orphaned_remote\""), "{payload}");
    assert!(payload.contains("\"mystery\""), "{payload}");
}

#[tokio::test]
async fn list_servers_confirms_and_refreshes_running_services() {
    let root = tempdir().expect("temp dir");
    let store = seed_running(&root, "calc", "https://stale");

    let list_body = r#"[{"metadata": {"name": "calc"}, "status": {"url": "https://fresh", "conditions": [{"type": "Ready", "status": "True"}]}}]"#;
    let runner = FakeRunner::new(vec![common::ok(list_body)]);
    let payload = exec(
        &root,
        runner,
        &["mcp-forge", "list-servers", "--project", "acme"],
    )
    .await
    .expect("list-servers succeeds");

    assert!(payload.contains("\"confirmed\""), "{payload}");
    let record = store.get("calc").expect("get");
    assert_eq!(record.url.as_deref(), Some("https://fresh"));
    assert!(record.last_reconciled_at.is_some());
}
