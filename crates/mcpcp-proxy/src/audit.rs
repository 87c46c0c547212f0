// crates/mcpcp-proxy/src/audit.rs
// ============================================================================
// Module: Proxy Audit
// Description: Structured audit events for auth, catalog, and dispatch paths.
// Purpose: Emit fail-closed decision records as JSON lines.
// Dependencies: mcpcp-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every authorization decision, backend fetch failure, and dispatch outcome
//! emits one audit event through a pluggable sink. The default sink writes
//! JSON lines to stderr; tests use the no-op sink. Events carry token
//! fingerprints rather than tokens and never include request payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use mcpcp_core::BackendName;
use serde::Serialize;

use crate::auth::AuthContext;
use crate::auth::RequestContext;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Audit event payload.
#[derive(Debug, Serialize)]
pub struct ProxyAuditEvent {
    /// Event identifier.
    event: &'static str,
    /// Decision or outcome label.
    decision: &'static str,
    /// Requested action (`tools/list` or a tool name).
    action: String,
    /// Verified caller identity, when authentication succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<String>,
    /// Backend involved, when one was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<String>,
    /// Caller IP address, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    peer_ip: Option<String>,
    /// Token fingerprint (SHA-256), when authentication succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    token_fingerprint: Option<String>,
    /// Failure reason for deny and failure events.
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    /// Request identifier, when provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

impl ProxyAuditEvent {
    /// Builds an authentication/authorization allow event.
    #[must_use]
    pub fn authz_allowed(ctx: &RequestContext, action: &str, auth: &AuthContext) -> Self {
        Self {
            event: "proxy_authz",
            decision: "allow",
            action: action.to_string(),
            agent: Some(auth.identity.to_string()),
            backend: None,
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            token_fingerprint: Some(auth.token_fingerprint.clone()),
            reason: None,
            request_id: ctx.request_id.clone(),
        }
    }

    /// Builds an authentication/authorization deny event.
    #[must_use]
    pub fn authz_denied(ctx: &RequestContext, action: &str, reason: &str) -> Self {
        Self {
            event: "proxy_authz",
            decision: "deny",
            action: action.to_string(),
            agent: None,
            backend: None,
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            token_fingerprint: None,
            reason: Some(reason.to_string()),
            request_id: ctx.request_id.clone(),
        }
    }

    /// Builds a catalog fetch failure event for one backend.
    #[must_use]
    pub fn fetch_failed(ctx: &RequestContext, backend: &BackendName, reason: &str) -> Self {
        Self {
            event: "backend_fetch",
            decision: "failed",
            action: "tools/list".to_string(),
            agent: None,
            backend: Some(backend.to_string()),
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            token_fingerprint: None,
            reason: Some(reason.to_string()),
            request_id: ctx.request_id.clone(),
        }
    }

    /// Builds a dispatch outcome event for one tool call.
    #[must_use]
    pub fn dispatched(
        ctx: &RequestContext,
        auth: &AuthContext,
        backend: &BackendName,
        tool: &str,
        outcome: &'static str,
    ) -> Self {
        Self {
            event: "tool_dispatch",
            decision: outcome,
            action: tool.to_string(),
            agent: Some(auth.identity.to_string()),
            backend: Some(backend.to_string()),
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            token_fingerprint: Some(auth.token_fingerprint.clone()),
            reason: None,
            request_id: ctx.request_id.clone(),
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for proxy decisions.
pub trait ProxyAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &ProxyAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl ProxyAuditSink for StderrAuditSink {
    #[allow(clippy::print_stderr, reason = "Stderr is the audit channel for this sink.")]
    fn record(&self, event: &ProxyAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            eprintln!("{payload}");
        }
    }
}

/// No-op audit sink for tests.
pub struct NoopAuditSink;

impl ProxyAuditSink for NoopAuditSink {
    fn record(&self, _event: &ProxyAuditEvent) {}
}
