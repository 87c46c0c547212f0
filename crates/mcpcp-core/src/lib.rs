// crates/mcpcp-core/src/lib.rs
// ============================================================================
// Module: MCPCP Core
// Description: Identity, token verification, and access policy for MCPCP.
// Purpose: Provide the dependency-light trust kernel shared by the proxy.
// Dependencies: ed25519-dalek, serde, sha2
// ============================================================================

//! ## Overview
//! This crate holds the parts of MCPCP that make trust decisions: opaque
//! identifiers, Ed25519 bearer-token verification, and the default-deny
//! identity-to-backend policy. It performs no network I/O and owns no async
//! state, so the proxy crate can hold it behind immutable `Arc`s.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identifiers;
pub mod policy;
pub mod token;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::AgentId;
pub use identifiers::BackendName;
pub use identifiers::ToolDescriptor;
pub use identifiers::namespaced_tool_name;
pub use identifiers::resolve_namespaced;
pub use policy::PolicyStore;
pub use policy::ToolGrant;
pub use token::AuthError;
pub use token::KeyError;
pub use token::TokenClaims;
pub use token::TokenVerifier;
pub use token::load_verifying_key;
pub use token::token_fingerprint;
