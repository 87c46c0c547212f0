// crates/mcpcp-config/tests/common/mod.rs
// ============================================================================
// Module: Config Test Support
// Description: Shared fixtures for configuration tests.
// Purpose: Build representative TOML documents and load them from disk.
// Dependencies: mcpcp-config, tempfile
// ============================================================================

//! ## Overview
//! Helpers for writing TOML fixtures to temporary files and loading them
//! through the real resolution path.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::io::Write;

use mcpcp_config::ConfigError;
use mcpcp_config::McpcpConfig;
use tempfile::NamedTempFile;

/// A TOML document exercising every configuration section.
pub const SAMPLE_CONFIG: &str = r#"
[server]
bind = "127.0.0.1:9003"
max_body_bytes = 1048576

[server.auth]
public_key_path = "keys/mcpcp.pub"
issuer = "https://mcpcp"
audience = "mcpcp-server"

[[backends]]
name = "mcp1"
url = "http://127.0.0.1:9004/rpc"
allow_insecure_http = true

[backends.timeouts]
connect_timeout_ms = 500
request_timeout_ms = 2000

[[backends]]
name = "mcp2"
url = "http://127.0.0.1:9005/rpc"
allow_insecure_http = true

[[backends]]
name = "mcp3"
url = "http://127.0.0.1:9006/rpc"
allow_insecure_http = true

[[policy.agents]]
agent = "agent_name1"

[[policy.agents.grants]]
backend = "mcp1"

[[policy.agents.grants]]
backend = "mcp3"

[[policy.agents]]
agent = "agent_name2"

[[policy.agents.grants]]
backend = "mcp2"

[[policy.agents.grants]]
backend = "mcp3"
tools = ["run_python_code"]
"#;

/// Writes the document to a temporary file and loads it.
pub fn load_toml(document: &str) -> Result<McpcpConfig, ConfigError> {
    let mut file = NamedTempFile::new().expect("temp config file");
    file.write_all(document.as_bytes()).expect("write config");
    McpcpConfig::load(Some(file.path()))
}
