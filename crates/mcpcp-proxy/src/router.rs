// crates/mcpcp-proxy/src/router.rs
// ============================================================================
// Module: Proxy Router
// Description: Authenticated, policy-filtered tool listing and dispatch.
// Purpose: Enforce the visibility and dispatch rules for every request.
// Dependencies: mcpcp-core, tokio
// ============================================================================

//! ## Overview
//! The router is the enforcement point: every request is authenticated
//! first, then evaluated against the caller's grants. `tools/list` returns
//! only tools the caller may invoke, namespaced with their backend prefix,
//! with unreachable backends silently omitted. `tools/call` resolves the
//! namespaced name against the caller's allowed backends in declaration
//! order and refuses everything else with the same error a nonexistent tool
//! gets, so a denied caller cannot probe which tools exist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use mcpcp_core::AuthError;
use mcpcp_core::BackendName;
use mcpcp_core::PolicyStore;
use mcpcp_core::ToolDescriptor;
use mcpcp_core::resolve_namespaced;
use serde_json::Value;
use thiserror::Error;

use crate::audit::ProxyAuditEvent;
use crate::audit::ProxyAuditSink;
use crate::auth::AuthContext;
use crate::auth::Authenticator;
use crate::auth::RequestContext;
use crate::client::BackendError;
use crate::registry::BackendRegistry;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Request-level proxy failures, mapped to protocol errors by the server.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Authentication failed.
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] AuthError),
    /// The requested tool does not exist for this caller.
    ///
    /// Deliberately covers both nonexistent and denied tools: the two cases
    /// must be indistinguishable to the caller.
    #[error("unknown tool: {0}")]
    ToolNotFound(String),
    /// The resolved backend could not be reached or answered garbage.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The backend reported an application error for the call.
    #[error("{0}")]
    Backend(String),
    /// Request parameters were missing or malformed.
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// A response payload could not be serialized.
    #[error("serialization failure")]
    Serialization,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Authenticating, policy-enforcing request router.
pub struct ProxyRouter {
    /// Token authenticator for inbound requests.
    authenticator: Authenticator,
    /// Immutable access policy.
    policy: Arc<PolicyStore>,
    /// Backend table and tool caches.
    registry: Arc<BackendRegistry>,
    /// Audit sink for decisions and outcomes.
    audit: Arc<dyn ProxyAuditSink>,
}

impl ProxyRouter {
    /// Builds a router over the given policy, registry, and audit sink.
    #[must_use]
    pub fn new(
        authenticator: Authenticator,
        policy: Arc<PolicyStore>,
        registry: Arc<BackendRegistry>,
        audit: Arc<dyn ProxyAuditSink>,
    ) -> Self {
        Self {
            authenticator,
            policy,
            registry,
            audit,
        }
    }

    /// Lists the tools visible to the authenticated caller.
    ///
    /// Tools come back namespaced as `{backend}_{tool}`, restricted to the
    /// caller's grants, in backend declaration order. Backends that fail to
    /// answer are omitted; an identity with no grants gets an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Unauthenticated`] when the token is rejected.
    pub async fn list_tools(&self, ctx: &RequestContext) -> Result<Vec<ToolDescriptor>, ProxyError> {
        let auth = self.authenticate(ctx, "tools/list")?;
        let allowed = self.policy.allowed_backends(&auth.identity);
        if allowed.is_empty() {
            return Ok(Vec::new());
        }
        let mut catalog = Vec::new();
        for entry in self.registry.list_tools(&allowed).await {
            match entry.result {
                Ok(tools) => {
                    catalog.extend(self.policy.catalog_view(&auth.identity, &entry.backend, tools));
                }
                Err(err) => {
                    self.audit.record(&ProxyAuditEvent::fetch_failed(
                        ctx,
                        &entry.backend,
                        &err.to_string(),
                    ));
                }
            }
        }
        Ok(catalog)
    }

    /// Dispatches a namespaced tool call for the authenticated caller.
    ///
    /// The name is resolved against the caller's allowed backends in
    /// declaration order. Unknown, unprefixed, and denied names all fail
    /// identically, before any backend traffic.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError`] on authentication failure, unresolvable or
    /// denied names, or backend failures.
    pub async fn call_tool(
        &self,
        ctx: &RequestContext,
        name: &str,
        arguments: Value,
    ) -> Result<Value, ProxyError> {
        let auth = self.authenticate(ctx, name)?;
        let allowed = self.policy.allowed_backends(&auth.identity);
        let ordered: Vec<BackendName> = self
            .registry
            .backend_order()
            .into_iter()
            .filter(|backend| allowed.contains(backend))
            .collect();
        let Some((backend, local_name)) = resolve_namespaced(name, ordered.iter()) else {
            return Err(self.deny_tool(ctx, name, "unresolvable tool name"));
        };
        if !self.policy.tool_allowed(&auth.identity, backend, local_name) {
            return Err(self.deny_tool(ctx, name, "tool not granted"));
        }
        let backend = backend.clone();
        let local_name = local_name.to_string();
        match self.registry.invoke(&backend, &local_name, arguments).await {
            Ok(result) => {
                self.audit.record(&ProxyAuditEvent::dispatched(
                    ctx,
                    &auth,
                    &backend,
                    name,
                    "ok",
                ));
                Ok(result)
            }
            Err(err) => {
                self.audit.record(&ProxyAuditEvent::dispatched(
                    ctx,
                    &auth,
                    &backend,
                    name,
                    "error",
                ));
                Err(map_backend_error(err))
            }
        }
    }

    /// Authenticates the request, auditing the outcome.
    fn authenticate(&self, ctx: &RequestContext, action: &str) -> Result<AuthContext, ProxyError> {
        match self.authenticator.authenticate(ctx) {
            Ok(auth) => {
                self.audit.record(&ProxyAuditEvent::authz_allowed(ctx, action, &auth));
                Ok(auth)
            }
            Err(err) => {
                self.audit.record(&ProxyAuditEvent::authz_denied(ctx, action, &err.to_string()));
                Err(ProxyError::Unauthenticated(err))
            }
        }
    }

    /// Audits a tool denial and returns the uniform not-found error.
    fn deny_tool(&self, ctx: &RequestContext, name: &str, reason: &str) -> ProxyError {
        self.audit.record(&ProxyAuditEvent::authz_denied(ctx, name, reason));
        ProxyError::ToolNotFound(name.to_string())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps backend failures onto request-level errors.
///
/// Application errors pass through with their message; transport and
/// protocol failures collapse into an unavailability error.
fn map_backend_error(error: BackendError) -> ProxyError {
    match error {
        BackendError::Unavailable(message) | BackendError::Protocol(message) => {
            ProxyError::BackendUnavailable(message)
        }
        BackendError::Application(message) => ProxyError::Backend(message),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
