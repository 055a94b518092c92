//! Static registry mapping tool identifiers to their registration metadata.
//!
//! The catalog is rebuilt from the builtin table on every run; there is no
//! runtime mutation and nothing is persisted.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::lib::errors::CatalogError;

pub mod builtin;

/// Authentication a tool needs once deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthRequirement {
    pub provider: &'static str,
    pub scopes: &'static [&'static str],
}

/// Registration metadata for one callable tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolDefinition {
    /// Unique, stable identifier.
    pub id: &'static str,
    pub description: &'static str,
    /// Implementing module inside the service runtime package.
    pub module: &'static str,
    /// Function exported by `module`.
    pub entrypoint: &'static str,
    /// Environment variables the tool needs at runtime.
    pub required_env: &'static [&'static str],
    pub auth: Option<AuthRequirement>,
}

/// Immutable tool registry with stable iteration order.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: BTreeMap<&'static str, ToolDefinition>,
}

impl ToolCatalog {
    /// Build the registry from the builtin registration table.
    pub fn builtin() -> Self {
        Self::from_definitions(builtin::BUILTIN_TOOLS)
    }

    /// Build a registry from explicit definitions (useful for tests).
    pub fn from_definitions(definitions: &[ToolDefinition]) -> Self {
        let tools = definitions.iter().map(|def| (def.id, *def)).collect();
        Self { tools }
    }

    /// Definitions in stable order by identifier. The iterator is restartable;
    /// call `list()` again for a fresh pass.
    pub fn list(&self) -> impl Iterator<Item = &ToolDefinition> + '_ {
        self.tools.values()
    }

    /// Look up one definition.
    pub fn get(&self, id: &str) -> Result<&ToolDefinition, CatalogError> {
        self.tools.get(id).ok_or_else(|| CatalogError::UnknownTool {
            id: id.to_string(),
        })
    }

    /// Resolve an ordered list of tool ids, failing on the first unknown id.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<&ToolDefinition>, CatalogError> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_lists_in_stable_id_order() {
        let catalog = ToolCatalog::builtin();
        let ids: Vec<&str> = catalog.list().map(|def| def.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted, "list() must be ordered by id");
        assert!(ids.contains(&"basic_math"));
        assert!(ids.contains(&"get_forecast"));

        // Restartable: a second pass yields the same sequence.
        let again: Vec<&str> = catalog.list().map(|def| def.id).collect();
        assert_eq!(ids, again);
    }

    #[test]
    fn get_unknown_tool_fails() {
        let catalog = ToolCatalog::builtin();
        let err = catalog.get("definitely_missing").expect_err("must fail");
        assert_eq!(
            err,
            CatalogError::UnknownTool {
                id: "definitely_missing".into()
            }
        );
    }

    #[test]
    fn resolve_keeps_request_order_and_fails_fast() {
        let catalog = ToolCatalog::builtin();
        let resolved = catalog
            .resolve(&["web_search".into(), "basic_math".into()])
            .expect("both ids exist");
        assert_eq!(resolved[0].id, "web_search");
        assert_eq!(resolved[1].id, "basic_math");

        let err = catalog
            .resolve(&["basic_math".into(), "nope".into()])
            .expect_err("unknown id must fail");
        assert_eq!(err, CatalogError::UnknownTool { id: "nope".into() });
    }

    #[test]
    fn builtin_ids_are_unique() {
        assert_eq!(
            ToolCatalog::builtin().len(),
            builtin::BUILTIN_TOOLS.len(),
            "duplicate tool id in the builtin table"
        );
    }
}
