//! Reconciliation between local server records and the platform's view.
//!
//! Reconciliation is read-mostly: it refreshes the stored endpoint for
//! confirmed services and reports every discrepancy, but never deletes or
//! redeploys anything on its own.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::store::ServerStore;

use super::{driver::DeploymentDriver, PipelineError, RemoteServiceRecord};

/// Agreement between one local record and the remote platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// Local record says running, and the platform agrees.
    Confirmed,
    /// Local record says running, but the platform has no such service.
    OrphanedLocal,
    /// The platform runs a service no local record knows about.
    OrphanedRemote,
    /// Local record is in a non-running phase; nothing to check remotely.
    ReportedAsIs,
}

/// One line of the reconciliation report.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileEntry {
    pub name: String,
    pub status: ReconcileStatus,
    pub local_phase: Option<String>,
    pub remote_url: Option<String>,
    pub remote_ready: Option<bool>,
}

/// Compares the local store against the platform and refreshes endpoints.
pub struct Reconciler {
    store: ServerStore,
    driver: DeploymentDriver,
}

impl Reconciler {
    pub fn new(store: ServerStore, driver: DeploymentDriver) -> Self {
        Self { store, driver }
    }

    /// Produce the full report, refreshing `url` and the reconcile timestamp
    /// on every confirmed record. Discrepancies are reported, never repaired.
    pub async fn reconcile(&self) -> Result<Vec<ReconcileEntry>, PipelineError> {
        let locals = self.store.list()?;
        let remotes = self.driver.list().await?;
        let remote_by_name: BTreeMap<&str, &RemoteServiceRecord> = remotes
            .iter()
            .map(|remote| (remote.name.as_str(), remote))
            .collect();

        let mut entries = Vec::with_capacity(locals.len());
        for mut record in locals {
            let remote = remote_by_name.get(record.name.as_str()).copied();
            let entry = match (record.state.is_running(), remote) {
                (true, Some(remote)) => {
                    record.url = remote.url.clone();
                    record.last_reconciled_at = Some(chrono::Utc::now());
                    self.store.save(&record)?;
                    ReconcileEntry {
                        name: record.name.clone(),
                        status: ReconcileStatus::Confirmed,
                        local_phase: Some(record.state.phase_name().to_string()),
                        remote_url: remote.url.clone(),
                        remote_ready: Some(remote.ready),
                    }
                }
                (true, None) => {
                    warn!(
                        target: "mcp_forge::reconcile",
                        server = %record.name,
                        "Record says running but the platform has no such service"
                    );
                    ReconcileEntry {
                        name: record.name.clone(),
                        status: ReconcileStatus::OrphanedLocal,
                        local_phase: Some(record.state.phase_name().to_string()),
                        remote_url: None,
                        remote_ready: None,
                    }
                }
                (false, remote) => ReconcileEntry {
                    name: record.name.clone(),
                    status: ReconcileStatus::ReportedAsIs,
                    local_phase: Some(record.state.phase_name().to_string()),
                    remote_url: remote.and_then(|r| r.url.clone()),
                    remote_ready: remote.map(|r| r.ready),
                },
            };
            entries.push(entry);
        }

        let known: BTreeMap<&str, ()> = entries
            .iter()
            .map(|entry| (entry.name.as_str(), ()))
            .collect();
        let mut orphans: Vec<ReconcileEntry> = remotes
            .iter()
            .filter(|remote| !known.contains_key(remote.name.as_str()))
            .map(|remote| ReconcileEntry {
                name: remote.name.clone(),
                status: ReconcileStatus::OrphanedRemote,
                local_phase: None,
                remote_url: remote.url.clone(),
                remote_ready: Some(remote.ready),
            })
            .collect();
        orphans.sort_by(|a, b| a.name.cmp(&b.name));
        entries.extend(orphans);
        Ok(entries)
    }
}
