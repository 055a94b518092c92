//! Per-server deploy locks.
//!
//! A deploy must hold the lock for its server name from before `Building`
//! until a terminal state. A second concurrent attempt on the same name fails
//! fast with `Busy` instead of corrupting shared state. Lock files left by a
//! crashed process are reclaimed once they exceed the stale threshold.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::lib::errors::StoreError;

#[derive(Debug, Serialize, Deserialize)]
struct LockClaim {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Held deploy lock; the file is removed on drop (terminal state).
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
    name: String,
}

impl DeployLock {
    /// Claim the lock file for `name`, failing with `Busy` when another
    /// deploy holds it and its claim is not stale.
    pub fn acquire(
        locks_dir: &Path,
        name: &str,
        stale_after: Duration,
    ) -> Result<Self, StoreError> {
        let path = locks_dir.join(format!("{name}.lock"));
        match Self::try_claim(&path, name) {
            Ok(lock) => Ok(lock),
            Err(StoreError::Busy { .. }) if Self::is_stale(&path, stale_after) => {
                warn!(
                    target: "mcp_forge::store",
                    server = name,
                    lock = %path.display(),
                    "Reclaiming stale deploy lock"
                );
                fs::remove_file(&path).map_err(|source| StoreError::Io {
                    path: path.clone(),
                    source,
                })?;
                Self::try_claim(&path, name)
            }
            Err(err) => Err(err),
        }
    }

    fn try_claim(path: &Path, name: &str) -> Result<Self, StoreError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::Busy {
                    name: name.to_string(),
                });
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let claim = LockClaim {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let body = serde_json::to_vec(&claim).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        file.write_all(&body).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            name: name.to_string(),
        })
    }

    fn is_stale(path: &Path, stale_after: Duration) -> bool {
        let Ok(body) = fs::read(path) else {
            return false;
        };
        let Ok(claim) = serde_json::from_slice::<LockClaim>(&body) else {
            // Unreadable claim: treat as stale, a valid holder rewrites it.
            return true;
        };
        let age = Utc::now() - claim.acquired_at;
        age.to_std()
            .map(|age| age > stale_after)
            .unwrap_or(false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                warn!(
                    target: "mcp_forge::store",
                    server = %self.name,
                    lock = %self.path.display(),
                    error = %err,
                    "Failed to release deploy lock"
                );
            }
        }
    }
}
