// crates/mcpcp-proxy/src/lib.rs
// ============================================================================
// Module: MCPCP Proxy
// Description: Authenticating, policy-filtering MCP proxy over HTTP.
// Purpose: Route tool listings and calls from agents to backend MCP servers.
// Dependencies: mcpcp-core, mcpcp-config, axum, reqwest, tokio
// ============================================================================

//! ## Overview
//! The proxy crate wires the trust kernel to the network: it authenticates
//! inbound JSON-RPC requests against bearer tokens, resolves the caller's
//! allowed backends, aggregates a namespaced tool catalog with per-backend
//! failure isolation, and dispatches `tools/call` traffic to the right
//! backend. All inputs are untrusted and every denial is audited.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod client;
pub mod registry;
pub mod router;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::NoopAuditSink;
pub use audit::ProxyAuditEvent;
pub use audit::ProxyAuditSink;
pub use audit::StderrAuditSink;
pub use auth::AuthContext;
pub use auth::Authenticator;
pub use auth::RequestContext;
pub use client::BackendClient;
pub use client::BackendError;
pub use registry::BackendCatalog;
pub use registry::BackendRegistry;
pub use router::ProxyError;
pub use router::ProxyRouter;
pub use server::ProxyServer;
pub use server::ProxyServerError;
