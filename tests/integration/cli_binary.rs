use std::process::Command;

use tempfile::tempdir;

use crate::common::BINARY_PATH;

#[test]
fn help_lists_every_subcommand() {
    let output = Command::new(BINARY_PATH)
        .arg("--help")
        .output()
        .expect("binary runs");
    assert!(output.status.success());

    let help = String::from_utf8_lossy(&output.stdout);
    for subcommand in [
        "list-tools",
        "create-server",
        "deploy-server",
        "deploy-git-repo",
        "get-server-url",
        "get-server-capabilities",
        "list-servers",
        "delete-server",
        "call-tool",
    ] {
        assert!(help.contains(subcommand), "--help must mention {subcommand}");
    }
}

#[test]
fn list_tools_prints_the_catalog_as_json() {
    let state_root = tempdir().expect("temp dir");
    let output = Command::new(BINARY_PATH)
        .arg("list-tools")
        .env("MCP_FORGE_HOME", state_root.path())
        .env("MCP_FORGE_CONFIG_PATH", "/nonexistent/mcp-forge.toml")
        .output()
        .expect("binary runs");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("stdout is JSON");
    let tools = payload["tools"].as_array().expect("tools array");
    assert!(tools.iter().any(|t| t["id"] == "basic_math"));
    assert!(tools.iter().any(|t| t["id"] == "get_forecast"));
}

#[test]
fn unknown_server_fails_with_a_clear_message() {
    let state_root = tempdir().expect("temp dir");
    let output = Command::new(BINARY_PATH)
        .args(["get-server-url", "--name", "ghost"])
        .env("MCP_FORGE_HOME", state_root.path())
        .env("MCP_FORGE_CONFIG_PATH", "/nonexistent/mcp-forge.toml")
        .output()
        .expect("binary runs");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ghost"), "stderr: {stderr}");
}
