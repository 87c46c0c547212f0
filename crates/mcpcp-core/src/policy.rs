// crates/mcpcp-core/src/policy.rs
// ============================================================================
// Module: MCPCP Access Policy
// Description: Default-deny mapping from agent identity to backend grants.
// Purpose: Decide which backends and tools an authenticated caller may see.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The policy store is a read-only table built once at startup: each agent
//! identity maps to a set of backend grants, and a grant optionally restricts
//! the tool set visible on that backend. Lookup is a total function: an
//! identity with no entry gets the empty set, indistinguishable from a known
//! identity with no grants, so responses never confirm which identities
//! exist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::identifiers::AgentId;
use crate::identifiers::BackendName;
use crate::identifiers::ToolDescriptor;
use crate::identifiers::namespaced_tool_name;

// ============================================================================
// SECTION: Grants
// ============================================================================

/// Tool visibility rule inside one backend grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolGrant {
    /// Every tool the backend advertises.
    All,
    /// Only the named backend-local tools.
    Only(BTreeSet<String>),
}

impl ToolGrant {
    /// Returns true when the backend-local tool name is covered.
    #[must_use]
    pub fn allows(&self, local_tool: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(tools) => tools.contains(local_tool),
        }
    }
}

// ============================================================================
// SECTION: Policy Store
// ============================================================================

/// Read-only identity → backend-grant table with default-deny lookup.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    /// Grants per agent identity.
    grants: BTreeMap<AgentId, BTreeMap<BackendName, ToolGrant>>,
}

impl PolicyStore {
    /// Creates an empty policy store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a grant for one agent on one backend.
    ///
    /// A later grant for the same agent and backend replaces the earlier one.
    pub fn grant(&mut self, agent: AgentId, backend: BackendName, tools: ToolGrant) {
        self.grants.entry(agent).or_default().insert(backend, tools);
    }

    /// Returns the backends the identity may use. Empty for unknown
    /// identities; this is a valid outcome, not an error.
    #[must_use]
    pub fn allowed_backends(&self, agent: &AgentId) -> BTreeSet<BackendName> {
        self.grants
            .get(agent)
            .map(|backends| backends.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns true when the identity may use the named tool on the backend.
    #[must_use]
    pub fn tool_allowed(&self, agent: &AgentId, backend: &BackendName, local_tool: &str) -> bool {
        self.grants
            .get(agent)
            .and_then(|backends| backends.get(backend))
            .is_some_and(|grant| grant.allows(local_tool))
    }

    /// Filters one backend's advertised tools by the identity's grants and
    /// re-keys the survivors with the backend prefix.
    ///
    /// An ungranted backend yields an empty view regardless of what it
    /// advertises, so a caller's catalog can never name a backend outside
    /// the identity's allowed set.
    #[must_use]
    pub fn catalog_view(
        &self,
        agent: &AgentId,
        backend: &BackendName,
        tools: Vec<ToolDescriptor>,
    ) -> Vec<ToolDescriptor> {
        tools
            .into_iter()
            .filter(|tool| self.tool_allowed(agent, backend, &tool.name))
            .map(|tool| ToolDescriptor {
                name: namespaced_tool_name(backend, &tool.name),
                description: tool.description,
                input_schema: tool.input_schema,
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
