//! Deterministic generation of deployable service source.
//!
//! Generation is a pure function over a server record and its resolved tool
//! definitions: identical inputs always produce byte-identical output, so a
//! digest comparison across redeploys tells whether anything changed. No
//! files are written and no network is touched here.

use minijinja::{context, Environment};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    catalog::{ToolCatalog, ToolDefinition},
    lib::{errors::GenerateError, ident},
    store::ServerRecord,
};

const SERVER_TEMPLATE: &str = include_str!("../../templates/server.py.j2");
const DOCKERFILE_TEMPLATE: &str = include_str!("../../templates/Dockerfile.j2");
const REQUIREMENTS: &str = include_str!("../../templates/requirements.txt");

/// Complete generated build input for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedService {
    pub source: String,
    pub dockerfile: String,
    pub requirements: String,
    /// SHA-256 hex digest of `source`.
    pub digest: String,
}

#[derive(Debug, Serialize)]
struct ToolContext<'a> {
    module: &'a str,
    entrypoint: &'a str,
}

/// Generate the service source, build descriptor, and requirements manifest.
///
/// Fails with `UnknownTool` before any build step when a referenced id is not
/// in the catalog, and rejects any identifier that could smuggle code into
/// the generated text.
pub fn generate(
    record: &ServerRecord,
    catalog: &ToolCatalog,
) -> Result<GeneratedService, GenerateError> {
    if !ident::is_safe_server_name(&record.name) {
        return Err(GenerateError::UnsafeIdentifier {
            ident: record.name.clone(),
            role: "server name",
        });
    }

    let definitions = catalog.resolve(&record.tools)?;
    for definition in &definitions {
        validate_definition(definition)?;
    }

    let tools: Vec<ToolContext<'_>> = definitions
        .iter()
        .map(|def| ToolContext {
            module: def.module,
            entrypoint: def.entrypoint,
        })
        .collect();

    let env = Environment::new();
    let source = env
        .render_str(
            SERVER_TEMPLATE,
            context! {
                server_name => record.name,
                container_port => record.deployment.container_port,
                tools => tools,
            },
        )
        .map_err(|source| GenerateError::Render { source })?;
    let dockerfile = env
        .render_str(
            DOCKERFILE_TEMPLATE,
            context! { container_port => record.deployment.container_port },
        )
        .map_err(|source| GenerateError::Render { source })?;

    let digest = format!("{:x}", Sha256::digest(source.as_bytes()));

    Ok(GeneratedService {
        source,
        dockerfile,
        requirements: REQUIREMENTS.to_string(),
        digest,
    })
}

fn validate_definition(definition: &ToolDefinition) -> Result<(), GenerateError> {
    if !ident::is_safe_tool_ident(definition.id) {
        return Err(GenerateError::UnsafeIdentifier {
            ident: definition.id.to_string(),
            role: "tool identifier",
        });
    }
    if !ident::is_safe_module_path(definition.module) {
        return Err(GenerateError::UnsafeIdentifier {
            ident: definition.module.to_string(),
            role: "module path",
        });
    }
    if !ident::is_safe_tool_ident(definition.entrypoint) {
        return Err(GenerateError::UnsafeIdentifier {
            ident: definition.entrypoint.to_string(),
            role: "entrypoint",
        });
    }
    Ok(())
}
