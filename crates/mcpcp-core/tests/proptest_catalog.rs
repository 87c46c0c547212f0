// crates/mcpcp-core/tests/proptest_catalog.rs
// ============================================================================
// Module: Catalog Property-Based Tests
// Description: Property tests for policy-filtered catalog construction.
// Purpose: Hold the no-leak invariant across randomized policies and backends.
// ============================================================================

//! Property-based tests for the catalog view invariants: a caller's catalog
//! never names a backend outside their allowed set, never includes a tool
//! excluded by a grant, and never hides a tool a grant covers.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;

use mcpcp_core::AgentId;
use mcpcp_core::BackendName;
use mcpcp_core::PolicyStore;
use mcpcp_core::ToolDescriptor;
use mcpcp_core::ToolGrant;
use mcpcp_core::namespaced_tool_name;
use proptest::prelude::*;

/// Grant shape randomly chosen per backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrantMode {
    /// The backend is absent from the caller's grants.
    None,
    /// Every advertised tool is covered.
    All,
    /// Only a masked subset of the advertised tools is covered.
    Subset,
}

/// One randomized backend: its name, advertised tools, grant mode, and the
/// subset mask consumed when the mode is [`GrantMode::Subset`].
fn backend_strategy() -> impl Strategy<Value = (String, Vec<String>, GrantMode, Vec<bool>)> {
    (
        "[a-z]{1,4}(?:_[a-z]{1,4})?",
        prop::collection::vec("[a-z]{1,6}(?:_[a-z]{1,6})?", 0 .. 5),
        prop_oneof![Just(GrantMode::None), Just(GrantMode::All), Just(GrantMode::Subset)],
        prop::collection::vec(any::<bool>(), 5),
    )
}

/// Builds the policy store and deduplicated backend table for one case.
fn build_case(
    agent: &AgentId,
    backends: Vec<(String, Vec<String>, GrantMode, Vec<bool>)>,
) -> (PolicyStore, Vec<(BackendName, Vec<String>)>) {
    let mut policy = PolicyStore::new();
    let mut table = Vec::new();
    let mut seen = BTreeSet::new();
    for (name, tools, mode, mask) in backends {
        if !seen.insert(name.clone()) {
            continue;
        }
        let backend = BackendName::new(name);
        match mode {
            GrantMode::None => {}
            GrantMode::All => policy.grant(agent.clone(), backend.clone(), ToolGrant::All),
            GrantMode::Subset => {
                let subset: BTreeSet<String> = tools
                    .iter()
                    .zip(&mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(tool, _)| tool.clone())
                    .collect();
                policy.grant(agent.clone(), backend.clone(), ToolGrant::Only(subset));
            }
        }
        table.push((backend, tools));
    }
    (policy, table)
}

/// Wraps local tool names as advertised descriptors.
fn descriptors(tools: &[String]) -> Vec<ToolDescriptor> {
    tools
        .iter()
        .map(|name| ToolDescriptor {
            name: name.clone(),
            description: String::new(),
            input_schema: serde_json::Value::Null,
        })
        .collect()
}

proptest! {
    #[test]
    fn catalog_never_leaks_outside_the_allowed_set(
        backends in prop::collection::vec(backend_strategy(), 1 .. 6)
    ) {
        let agent = AgentId::new("agent_under_test");
        let (policy, table) = build_case(&agent, backends);
        let allowed = policy.allowed_backends(&agent);
        for (backend, tools) in &table {
            let view = policy.catalog_view(&agent, backend, descriptors(tools));
            for tool in &view {
                // Anything visible implies the backend itself is granted.
                prop_assert!(allowed.contains(backend));
                let local = tool
                    .name
                    .strip_prefix(backend.as_str())
                    .and_then(|rest| rest.strip_prefix('_'));
                let local = local.expect("catalog names carry the backend prefix");
                prop_assert!(policy.tool_allowed(&agent, backend, local));
            }
        }
    }

    #[test]
    fn catalog_covers_exactly_the_granted_tools_in_order(
        backends in prop::collection::vec(backend_strategy(), 1 .. 6)
    ) {
        let agent = AgentId::new("agent_under_test");
        let (policy, table) = build_case(&agent, backends);
        for (backend, tools) in &table {
            let view = policy.catalog_view(&agent, backend, descriptors(tools));
            let got: Vec<String> = view.into_iter().map(|tool| tool.name).collect();
            let expected: Vec<String> = tools
                .iter()
                .filter(|tool| policy.tool_allowed(&agent, backend, tool))
                .map(|tool| namespaced_tool_name(backend, tool))
                .collect();
            prop_assert_eq!(got, expected);
        }
    }

    #[test]
    fn other_identities_see_nothing_from_this_policy(
        backends in prop::collection::vec(backend_strategy(), 1 .. 6)
    ) {
        let agent = AgentId::new("agent_under_test");
        let (policy, table) = build_case(&agent, backends);
        let stranger = AgentId::new("some_other_agent");
        prop_assert!(policy.allowed_backends(&stranger).is_empty());
        for (backend, tools) in &table {
            let view = policy.catalog_view(&stranger, backend, descriptors(tools));
            prop_assert!(view.is_empty());
        }
    }
}
