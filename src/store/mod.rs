//! Persisted collection of server records.
//!
//! One JSON file per server name under `<state root>/servers/`, enumerable by
//! directory listing. Every write goes to a temporary file in the same
//! directory followed by an atomic rename, so an interrupted write never
//! leaves a torn record behind.

use std::{fs, io::Write, path::PathBuf, time::Duration};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::lib::{errors::StoreError, ident};

pub mod lock;
pub mod record;

pub use lock::DeployLock;
pub use record::{
    DeploymentDescriptor, DeploymentState, GitRepoSource, ServerRecord, Stage,
};

const SERVERS_DIR: &str = "servers";
const LOCKS_DIR: &str = "locks";
const BUILD_DIR: &str = "build";

/// Store rooted at the forge state directory.
#[derive(Debug, Clone)]
pub struct ServerStore {
    root: PathBuf,
}

impl ServerStore {
    /// Open (creating if needed) the store under `root`.
    pub fn open(root: PathBuf) -> Result<Self, StoreError> {
        let store = Self { root };
        for dir in [store.servers_dir(), store.locks_dir(), store.build_dir()] {
            fs::create_dir_all(&dir).map_err(|source| StoreError::Io { path: dir, source })?;
        }
        Ok(store)
    }

    pub fn servers_dir(&self) -> PathBuf {
        self.root.join(SERVERS_DIR)
    }

    fn locks_dir(&self) -> PathBuf {
        self.root.join(LOCKS_DIR)
    }

    /// Scratch directory where build contexts are staged per server.
    pub fn build_dir(&self) -> PathBuf {
        self.root.join(BUILD_DIR)
    }

    /// Path for `name`, after checking it is a safe identifier. Every read
    /// and write goes through this so a path-shaped name never reaches the
    /// filesystem.
    fn record_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !ident::is_safe_server_name(name) {
            return Err(StoreError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.servers_dir().join(format!("{name}.json")))
    }

    /// Insert a new record; the name must be a safe identifier and unused.
    pub fn create(&self, record: ServerRecord) -> Result<(), StoreError> {
        if self.record_path(&record.name)?.exists() {
            return Err(StoreError::DuplicateName {
                name: record.name.clone(),
            });
        }
        self.save(&record)
    }

    /// Load one record.
    pub fn get(&self, name: &str) -> Result<ServerRecord, StoreError> {
        let path = self.record_path(name)?;
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&body).map_err(|source| StoreError::Corrupt { path, source })
    }

    /// All records, sorted by name. Unrelated files in the directory are
    /// skipped so a leftover temp file never breaks enumeration.
    pub fn list(&self) -> Result<Vec<ServerRecord>, StoreError> {
        let dir = self.servers_dir();
        let mut records = Vec::new();
        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if !ident::is_safe_server_name(name) {
                continue;
            }
            records.push(self.get(name)?);
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Persist a record atomically: full serialized body to a temp file in
    /// the record directory, then rename over the previous record.
    pub fn save(&self, record: &ServerRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.name)?;
        let body = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        let dir = self.servers_dir();
        let mut temp = NamedTempFile::new_in(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        temp.write_all(&body).map_err(|source| StoreError::Io {
            path: temp.path().to_path_buf(),
            source,
        })?;
        temp.persist(&path).map_err(|err| StoreError::Io {
            path: path.clone(),
            source: err.error,
        })?;

        debug!(
            target: "mcp_forge::store",
            server = %record.name,
            state = %record.state,
            "Persisted server record"
        );
        Ok(())
    }

    /// Remove a record.
    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.record_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                name: name.to_string(),
            }),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Claim the deploy lock for `name`.
    pub fn acquire_deploy_lock(
        &self,
        name: &str,
        stale_after: Duration,
    ) -> Result<DeployLock, StoreError> {
        DeployLock::acquire(&self.locks_dir(), name, stale_after)
    }
}
