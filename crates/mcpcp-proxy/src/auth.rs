// crates/mcpcp-proxy/src/auth.rs
// ============================================================================
// Module: Proxy Authentication
// Description: Request contexts and bearer-token authentication.
// Purpose: Bridge transport-level headers to the core token verifier.
// Dependencies: mcpcp-core
// ============================================================================

//! ## Overview
//! Every inbound request carries its transport facts in a [`RequestContext`].
//! The [`Authenticator`] parses the `Authorization` header, verifies the
//! token against the trusted key, and produces an [`AuthContext`] holding
//! the caller's identity and a token fingerprint for audit logging. Failures
//! are all-or-nothing and happen before any downstream call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;

use mcpcp_core::AgentId;
use mcpcp_core::AuthError;
use mcpcp_core::TokenVerifier;
use mcpcp_core::token_fingerprint;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted `Authorization` header size in bytes.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request transport facts used for auth decisions and auditing.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Peer IP address when available.
    pub peer_ip: Option<IpAddr>,
    /// Authorization header value as presented.
    pub auth_header: Option<String>,
    /// Optional request identifier for auditing.
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Builds an HTTP request context.
    #[must_use]
    pub fn http(peer_ip: Option<IpAddr>, auth_header: Option<String>) -> Self {
        Self {
            peer_ip,
            auth_header,
            request_id: None,
        }
    }

    /// Returns a copy with the request identifier set.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Authenticated caller context.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Verified caller identity.
    pub identity: AgentId,
    /// SHA-256 fingerprint of the presented token, for audit only.
    pub token_fingerprint: String,
}

// ============================================================================
// SECTION: Authenticator
// ============================================================================

/// Authenticates inbound requests against the trusted token verifier.
#[derive(Debug, Clone)]
pub struct Authenticator {
    /// Core token verifier, immutable for the process lifetime.
    verifier: TokenVerifier,
}

impl Authenticator {
    /// Builds an authenticator around a configured verifier.
    #[must_use]
    pub const fn new(verifier: TokenVerifier) -> Self {
        Self {
            verifier,
        }
    }

    /// Authenticates one request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the header is missing or malformed, or the
    /// token fails verification.
    pub fn authenticate(&self, ctx: &RequestContext) -> Result<AuthContext, AuthError> {
        let token = parse_bearer_token(ctx.auth_header.as_deref())?;
        let identity = self.verifier.verify(&token)?;
        Ok(AuthContext {
            identity,
            token_fingerprint: token_fingerprint(&token),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the bearer token from an `Authorization` header value.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<String, AuthError> {
    let header = auth_header.ok_or(AuthError::Malformed)?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Malformed);
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Malformed);
    }
    Ok(token.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
