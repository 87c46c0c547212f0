// crates/mcpcp-config/tests/config_validation.rs
// ============================================================================
// Module: Config Validation Tests
// Description: Loading, defaults, and fail-closed validation of MCPCP config.
// Purpose: Prove invalid configuration aborts startup instead of degrading.
// ============================================================================

//! ## Overview
//! Exercises the full load path: TOML parsing, defaults, limit enforcement,
//! backend table rules, and policy cross-references.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

mod common;

use mcpcp_config::ConfigError;
use mcpcp_core::AgentId;
use mcpcp_core::BackendName;

use crate::common::SAMPLE_CONFIG;
use crate::common::load_toml;

// ============================================================================
// SECTION: Loading and Defaults
// ============================================================================

#[test]
fn sample_config_loads() {
    let config = load_toml(SAMPLE_CONFIG).expect("sample config loads");
    assert_eq!(config.server.bind, "127.0.0.1:9003");
    assert_eq!(config.backends.len(), 3);
    let order: Vec<String> =
        config.backend_order().iter().map(|name| name.as_str().to_string()).collect();
    assert_eq!(order, vec!["mcp1", "mcp2", "mcp3"]);
}

#[test]
fn defaults_fill_optional_fields() {
    let config = load_toml(
        r#"
[server.auth]
public_key_path = "keys/mcpcp.pub"
"#,
    )
    .expect("minimal config loads");
    assert_eq!(config.server.bind, "127.0.0.1:9003");
    assert_eq!(config.server.max_body_bytes, 1024 * 1024);
    let auth = config.server.auth.expect("auth section");
    assert_eq!(auth.issuer, "https://mcpcp");
    assert_eq!(auth.audience, "mcpcp-server");
}

#[test]
fn missing_auth_section_is_rejected() {
    let result = load_toml("[server]\nbind = \"127.0.0.1:9003\"\n");
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn unparseable_toml_is_a_parse_error() {
    let result = load_toml("not valid toml [");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

// ============================================================================
// SECTION: Backend Table Rules
// ============================================================================

#[test]
fn duplicate_backend_names_are_rejected() {
    let result = load_toml(
        r#"
[server.auth]
public_key_path = "keys/mcpcp.pub"

[[backends]]
name = "mcp1"
url = "http://127.0.0.1:9004/rpc"
allow_insecure_http = true

[[backends]]
name = "mcp1"
url = "http://127.0.0.1:9005/rpc"
allow_insecure_http = true
"#,
    );
    assert!(matches!(result, Err(ConfigError::Invalid(message)) if message.contains("duplicate")));
}

#[test]
fn cleartext_url_requires_explicit_opt_in() {
    let result = load_toml(
        r#"
[server.auth]
public_key_path = "keys/mcpcp.pub"

[[backends]]
name = "mcp1"
url = "http://127.0.0.1:9004/rpc"
"#,
    );
    assert!(
        matches!(result, Err(ConfigError::Invalid(message)) if message.contains("allow_insecure_http"))
    );
}

#[test]
fn non_http_scheme_is_rejected() {
    let result = load_toml(
        r#"
[server.auth]
public_key_path = "keys/mcpcp.pub"

[[backends]]
name = "mcp1"
url = "ftp://127.0.0.1/rpc"
"#,
    );
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn timeout_limits_are_enforced() {
    let result = load_toml(
        r#"
[server.auth]
public_key_path = "keys/mcpcp.pub"

[[backends]]
name = "mcp1"
url = "http://127.0.0.1:9004/rpc"
allow_insecure_http = true

[backends.timeouts]
connect_timeout_ms = 1
request_timeout_ms = 2000
"#,
    );
    assert!(
        matches!(result, Err(ConfigError::Invalid(message)) if message.contains("connect_timeout_ms"))
    );
}

// ============================================================================
// SECTION: Policy Cross-References
// ============================================================================

#[test]
fn grant_for_unknown_backend_is_rejected() {
    let result = load_toml(
        r#"
[server.auth]
public_key_path = "keys/mcpcp.pub"

[[backends]]
name = "mcp1"
url = "http://127.0.0.1:9004/rpc"
allow_insecure_http = true

[[policy.agents]]
agent = "agent_name1"

[[policy.agents.grants]]
backend = "mcp9"
"#,
    );
    assert!(
        matches!(result, Err(ConfigError::Invalid(message)) if message.contains("unknown backend"))
    );
}

#[test]
fn duplicate_agent_entries_are_rejected() {
    let result = load_toml(
        r#"
[server.auth]
public_key_path = "keys/mcpcp.pub"

[[policy.agents]]
agent = "agent_name1"

[[policy.agents]]
agent = "agent_name1"
"#,
    );
    assert!(matches!(result, Err(ConfigError::Invalid(message)) if message.contains("duplicate")));
}

// ============================================================================
// SECTION: Policy Store Construction
// ============================================================================

#[test]
fn policy_store_reflects_grants() {
    let config = load_toml(SAMPLE_CONFIG).expect("sample config loads");
    let store = config.policy_store();

    let allowed = store.allowed_backends(&AgentId::new("agent_name1"));
    let names: Vec<&str> = allowed.iter().map(BackendName::as_str).collect();
    assert_eq!(names, vec!["mcp1", "mcp3"]);

    // Empty tools list means every tool on the backend.
    assert!(store.tool_allowed(&AgentId::new("agent_name1"), &BackendName::new("mcp1"), "echo"));
    // Explicit tools list restricts the grant.
    assert!(store.tool_allowed(
        &AgentId::new("agent_name2"),
        &BackendName::new("mcp3"),
        "run_python_code"
    ));
    assert!(!store.tool_allowed(&AgentId::new("agent_name2"), &BackendName::new("mcp3"), "echo"));
}

#[test]
fn policy_store_is_default_deny() {
    let config = load_toml(SAMPLE_CONFIG).expect("sample config loads");
    let store = config.policy_store();
    assert!(store.allowed_backends(&AgentId::new("agent_name9")).is_empty());
}
