//! Identifier validation for values that end up in generated source or
//! platform resource names.

/// Check a server name against the safe pattern `[a-z][a-z0-9-]*`, at most
/// 63 characters. Cloud Run service names share the same constraints.
pub fn is_safe_server_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_lowercase())
        .unwrap_or(false);
    first_ok
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.ends_with('-')
}

/// Check a tool identifier or entrypoint against `[a-z_][a-z0-9_]*`.
pub fn is_safe_tool_ident(ident: &str) -> bool {
    if ident.is_empty() || ident.len() > 128 {
        return false;
    }
    let mut chars = ident.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    first_ok
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Check a dotted module path where every segment is a safe tool identifier.
pub fn is_safe_module_path(path: &str) -> bool {
    !path.is_empty() && path.split('.').all(is_safe_tool_ident)
}
