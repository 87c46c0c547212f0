// crates/mcpcp-core/src/identifiers.rs
// ============================================================================
// Module: MCPCP Identifiers
// Description: Opaque identifiers and tool descriptors shared across MCPCP.
// Purpose: Provide strongly typed, serializable names with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the string-based identifiers used throughout MCPCP:
//! calling-agent identities, backend names, and the MCP tool descriptor wire
//! shape. It also owns the namespaced tool-name rules: catalog entries are
//! exposed as `{backend}_{tool}`, and inbound names are resolved against an
//! ordered set of backend names rather than split on the first separator,
//! since backend names may themselves contain the separator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between the backend prefix and the backend-local tool name.
pub const NAMESPACE_SEPARATOR: char = '_';

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Verified identity of a calling agent.
///
/// Extracted from a token's subject claim and never normalized or rewritten.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates a new agent identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Name of one configured downstream tool server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendName(String);

impl BackendName {
    /// Creates a new backend name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the backend name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BackendName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BackendName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Tool Descriptors
// ============================================================================

/// One callable tool as advertised by a backend.
///
/// Matches the MCP wire shape. Inside the proxy the name is backend-local;
/// the router re-keys it with the backend prefix before exposure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// JSON schema for the tool's arguments.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: serde_json::Value,
}

// ============================================================================
// SECTION: Namespacing
// ============================================================================

/// Builds the namespaced catalog name for a backend-local tool.
#[must_use]
pub fn namespaced_tool_name(backend: &BackendName, local: &str) -> String {
    format!("{}{}{}", backend.as_str(), NAMESPACE_SEPARATOR, local)
}

/// Resolves a namespaced tool name against an ordered set of backend names.
///
/// Returns the first backend whose `{name}_` prefixes the requested tool,
/// together with the backend-local remainder. Scanning a caller-scoped,
/// ordered backend list keeps names with embedded separators unambiguous;
/// a blind split on the first separator would misroute them.
#[must_use]
pub fn resolve_namespaced<'a, I>(name: &'a str, backends: I) -> Option<(&'a BackendName, &'a str)>
where
    I: IntoIterator<Item = &'a BackendName>,
{
    for backend in backends {
        if let Some(local) = name.strip_prefix(backend.as_str()) {
            if let Some(local) = local.strip_prefix(NAMESPACE_SEPARATOR) {
                if !local.is_empty() {
                    return Some((backend, local));
                }
            }
        }
    }
    None
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::BackendName;
    use super::namespaced_tool_name;
    use super::resolve_namespaced;

    #[test]
    fn namespaced_name_joins_with_separator() {
        let backend = BackendName::new("mcp1");
        assert_eq!(namespaced_tool_name(&backend, "echo"), "mcp1_echo");
    }

    #[test]
    fn resolve_matches_declaration_order() {
        let backends = vec![BackendName::new("mcp1"), BackendName::new("mcp2")];
        let resolved = resolve_namespaced("mcp2_run_docker", backends.iter());
        let (backend, local) = resolved.expect("resolves");
        assert_eq!(backend.as_str(), "mcp2");
        assert_eq!(local, "run_docker");
    }

    #[test]
    fn resolve_handles_separator_in_backend_name() {
        let backends = vec![BackendName::new("battle_arena"), BackendName::new("battle")];
        let resolved = resolve_namespaced("battle_arena_echo", backends.iter());
        let (backend, local) = resolved.expect("resolves");
        assert_eq!(backend.as_str(), "battle_arena");
        assert_eq!(local, "echo");
    }

    #[test]
    fn resolve_prefers_earlier_backend_on_ambiguity() {
        // With "battle" declared first, "battle_arena_echo" routes to it with
        // local name "arena_echo".
        let backends = vec![BackendName::new("battle"), BackendName::new("battle_arena")];
        let resolved = resolve_namespaced("battle_arena_echo", backends.iter());
        let (backend, local) = resolved.expect("resolves");
        assert_eq!(backend.as_str(), "battle");
        assert_eq!(local, "arena_echo");
    }

    #[test]
    fn resolve_rejects_unprefixed_and_empty_local_names() {
        let backends = vec![BackendName::new("mcp1")];
        assert!(resolve_namespaced("echo", backends.iter()).is_none());
        assert!(resolve_namespaced("mcp1_", backends.iter()).is_none());
        assert!(resolve_namespaced("mcp1", backends.iter()).is_none());
    }
}
