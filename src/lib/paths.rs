//! Resolution of the local state directory holding server records and locks.

use std::{env, ffi::OsString, path::PathBuf};

/// Environment variable overriding the state root.
const FORGE_HOME_ENV: &str = "MCP_FORGE_HOME";
/// Environment variable name for user home directory.
const HOME_ENV: &str = "HOME";

/// Resolve the state root directory.
///
/// Resolution order:
/// 1. `$MCP_FORGE_HOME` when set.
/// 2. `$HOME/.mcp-forge` otherwise.
pub fn resolve_state_root() -> Result<PathBuf, &'static str> {
    resolve_state_root_from(env::var_os(FORGE_HOME_ENV), env::var_os(HOME_ENV))
}

/// Resolve the state root from explicit environment values (testable helper).
fn resolve_state_root_from(
    forge_home: Option<OsString>,
    home: Option<OsString>,
) -> Result<PathBuf, &'static str> {
    if let Some(forge_home) = forge_home {
        if !forge_home.is_empty() {
            return Ok(PathBuf::from(forge_home));
        }
    }

    if let Some(home) = home {
        return Ok(PathBuf::from(home).join(".mcp-forge"));
    }

    Err("MCP_FORGE_HOME and HOME are both unset")
}
