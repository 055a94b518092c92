use std::{io, path::PathBuf, time::Duration};

use config::ConfigError as ConfigLoaderError;
use thiserror::Error;

/// Errors that can occur while loading or validating the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to build (read) the settings file.
    #[error("Failed to read settings file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: ConfigLoaderError,
    },
    /// Failed to deserialize TOML into a struct.
    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ConfigLoaderError,
    },
    /// Field failed validation.
    #[error("Settings file {path} has invalid `{field}`: {message}")]
    InvalidField {
        path: PathBuf,
        field: &'static str,
        message: String,
    },
    /// No usable state directory could be resolved.
    #[error("Cannot resolve the state directory: {message}")]
    StateRootUnavailable { message: &'static str },
    /// No target project could be resolved from flag, environment, or tooling.
    #[error("No target project: pass --project, set GCP_PROJECT_ID, or run `gcloud config set project`")]
    MissingProject,
}

impl ConfigError {
    /// Helper to wrap `config::ConfigError` as a read failure.
    pub fn from_read_error(path: PathBuf, source: ConfigLoaderError) -> Self {
        Self::FileRead { path, source }
    }

    /// Helper to wrap `config::ConfigError` as a parse failure.
    pub fn from_parse_error(path: PathBuf, source: ConfigLoaderError) -> Self {
        Self::Parse { path, source }
    }
}

/// Failures raised by the tool catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unknown tool id `{id}`; run `mcp-forge list-tools` for the catalog")]
    UnknownTool { id: String },
}

/// Failures raised while generating service source.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// An identifier would be interpolated into generated code but does not
    /// match the safe pattern for its role.
    #[error("`{ident}` is not a safe {role} and cannot be embedded in generated source")]
    UnsafeIdentifier { ident: String, role: &'static str },
    #[error(transparent)]
    UnknownTool(#[from] CatalogError),
    #[error("Template rendering failed: {source}")]
    Render {
        #[source]
        source: minijinja::Error,
    },
}

/// Failures raised by the local server record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Server `{name}` already exists")]
    DuplicateName { name: String },
    #[error("Server `{name}` not found")]
    NotFound { name: String },
    #[error("Server `{name}` has a deploy in progress; retry once it finishes")]
    Busy { name: String },
    #[error("`{name}` is not a valid server name (expected [a-z][a-z0-9-]*, max 63 chars)")]
    InvalidName { name: String },
    #[error("Record {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures while talking MCP to a deployed service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to open SSE connection to `{url}`: {message}")]
    Connect { url: String, message: String },
    #[error("MCP handshake with `{url}` failed: {message}")]
    Handshake { url: String, message: String },
    #[error("Tool call `{tool}` failed: {source}")]
    Call {
        tool: String,
        #[source]
        source: rmcp::service::ServiceError,
    },
}

/// Transport-level failures while invoking an external command-line tool.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` produced no result within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("Failed to exchange I/O with `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}
