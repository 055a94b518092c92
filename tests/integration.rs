#[path = "integration/common.rs"]
mod common;

#[path = "integration/deploy_flow.rs"]
mod deploy_flow;

#[path = "integration/lifecycle.rs"]
mod lifecycle;

#[path = "integration/cli_binary.rs"]
mod cli_binary;
