//! Server teardown: remote service first, local record second.
//!
//! The local record is only removed after the platform confirms the service
//! is gone (or was never there), so a failed remote delete never strands a
//! running service with no record pointing at it.

use serde::Serialize;
use tracing::info;

use crate::store::{DeploymentState, ServerStore, Stage};

use super::{
    driver::{DeleteOutcome, DeploymentDriver},
    PipelineError,
};

/// What a completed delete did.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub name: String,
    pub remote: DeleteOutcome,
    pub record_removed: bool,
}

/// Deletes servers remotely and locally, in that order.
pub struct Deleter {
    store: ServerStore,
    driver: DeploymentDriver,
}

impl Deleter {
    pub fn new(store: ServerStore, driver: DeploymentDriver) -> Self {
        Self { store, driver }
    }

    /// Delete the named server. Unknown names fail with `NotFound` before
    /// any remote call.
    pub async fn delete(&self, name: &str) -> Result<DeleteReport, PipelineError> {
        let mut record = self.store.get(name)?;

        record.state = DeploymentState::Deleting;
        record.updated_at = chrono::Utc::now();
        self.store.save(&record)?;

        let remote = match self.driver.delete(name).await {
            Ok(outcome) => outcome,
            Err(err) => {
                record.state = DeploymentState::Error {
                    reason: err.to_string(),
                    failed_stage: Stage::DeleteService,
                    completed_stage: None,
                };
                record.updated_at = chrono::Utc::now();
                self.store.save(&record)?;
                return Err(err);
            }
        };

        self.store.remove(name)?;
        info!(
            target: "mcp_forge::deploy",
            server = name,
            remote = ?remote,
            "Deleted server"
        );
        Ok(DeleteReport {
            name: name.to_string(),
            remote,
            record_removed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::tempdir;

    use crate::lib::errors::{ProcessError, StoreError};
    use crate::lib::process::{ToolInvocation, ToolOutput, ToolRunner};
    use crate::store::{DeploymentDescriptor, ServerRecord};

    use super::*;

    struct ScriptedRunner {
        outputs: Mutex<Vec<ToolOutput>>,
        calls: Mutex<Vec<ToolInvocation>>,
    }

    impl ScriptedRunner {
        fn new(outputs: Vec<ToolOutput>) -> Self {
            let mut reversed = outputs;
            reversed.reverse();
            Self {
                outputs: Mutex::new(reversed),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().expect("calls lock").len()
        }
    }

    #[async_trait]
    impl ToolRunner for ScriptedRunner {
        async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput, ProcessError> {
            self.calls.lock().expect("calls lock").push(invocation);
            Ok(self
                .outputs
                .lock()
                .expect("outputs lock")
                .pop()
                .unwrap_or(ToolOutput {
                    exit_code: Some(0),
                    stdout: String::new(),
                    stderr: String::new(),
                }))
        }
    }

    fn running_record(name: &str) -> ServerRecord {
        let mut record = ServerRecord::draft(
            name.into(),
            vec!["basic_math".into()],
            DeploymentDescriptor {
                container_port: 8080,
                cpu: "1".into(),
                memory: "512Mi".into(),
                startup_probe_path: "/".into(),
                region: "us-central1".into(),
                project: Some("proj".into()),
            },
        );
        record.state = DeploymentState::Running;
        record
    }

    fn deleter(store: ServerStore, runner: Arc<ScriptedRunner>) -> Deleter {
        let driver = DeploymentDriver::new(runner, "proj".into(), "us-central1".into());
        Deleter::new(store, driver)
    }

    #[tokio::test]
    async fn delete_removes_remote_then_local() {
        let temp = tempdir().expect("temp dir");
        let store = ServerStore::open(temp.path().to_path_buf()).expect("open");
        store.create(running_record("calc")).expect("create");

        let runner = Arc::new(ScriptedRunner::new(vec![ToolOutput {
            exit_code: Some(0),
            stdout: "Deleted service [calc].".into(),
            stderr: String::new(),
        }]));
        let report = deleter(store.clone(), runner)
            .delete("calc")
            .await
            .expect("delete succeeds");

        assert_eq!(report.remote, DeleteOutcome::Deleted);
        assert!(report.record_removed);
        assert!(matches!(
            store.get("calc").expect_err("record gone"),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn absent_remote_service_still_removes_the_record() {
        let temp = tempdir().expect("temp dir");
        let store = ServerStore::open(temp.path().to_path_buf()).expect("open");
        store.create(running_record("calc")).expect("create");

        let runner = Arc::new(ScriptedRunner::new(vec![ToolOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "ERROR: Service [calc] could not be found.".into(),
        }]));
        let report = deleter(store.clone(), runner)
            .delete("calc")
            .await
            .expect("idempotent delete");

        assert_eq!(report.remote, DeleteOutcome::AlreadyAbsent);
        assert!(store.get("calc").is_err());
    }

    #[tokio::test]
    async fn failed_remote_delete_keeps_the_record() {
        let temp = tempdir().expect("temp dir");
        let store = ServerStore::open(temp.path().to_path_buf()).expect("open");
        store.create(running_record("calc")).expect("create");

        let runner = Arc::new(ScriptedRunner::new(vec![ToolOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "ERROR: PERMISSION_DENIED".into(),
        }]));
        let err = deleter(store.clone(), runner)
            .delete("calc")
            .await
            .expect_err("remote failure must propagate");
        assert!(matches!(
            err,
            PipelineError::ToolFailed {
                stage: Stage::DeleteService,
                ..
            }
        ));

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
    async fn unknown_server_fails_before_any_remote_call() {
        let temp = tempdir().expect("temp dir");
        let store = ServerStore::open(temp.path().to_path_buf()).expect("open");
        let runner = Arc::new(ScriptedRunner::new(Vec::new()));

        let err = deleter(store, runner.clone())
            .delete("ghost")
            .await
            .expect_err("unknown name must fail");
        assert!(matches!(
            err,
            PipelineError::Store(StoreError::NotFound { .. })
        ));
        assert_eq!(runner.call_count(), 0);
    }
}
