// crates/mcpcp-core/src/token.rs
// ============================================================================
// Module: MCPCP Token Verification
// Description: Ed25519 bearer-token verification and identity extraction.
// Purpose: Provide all-or-nothing, fail-closed token checks for the proxy.
// Dependencies: ed25519-dalek, base64, serde_json, sha2
// ============================================================================

//! ## Overview
//! MCPCP bearer tokens are two base64url segments separated by a dot: a JSON
//! claims document and a detached Ed25519 signature over the encoded claims
//! segment. The verifier holds one public key loaded at startup, validates
//! signature, issuer, audience, and validity window, and returns the subject
//! claim verbatim. Verification has no side effects and no partial success.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as Base64Url;
use ed25519_dalek::Signature;
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::identifiers::AgentId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted token length in bytes.
const MAX_TOKEN_BYTES: usize = 8 * 1024;
/// Clock skew allowance for validity-window checks, in seconds.
const CLOCK_SKEW_SECS: u64 = 30;

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Claims embedded in an MCPCP bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the calling agent's identity.
    pub sub: String,
    /// Issuer expected by the verifier.
    pub iss: String,
    /// Audience expected by the verifier.
    pub aud: String,
    /// Issued-at time, seconds since the Unix epoch.
    pub iat: u64,
    /// Expiry time, seconds since the Unix epoch.
    pub exp: u64,
    /// Optional not-before time, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Token verification failures.
///
/// Messages stay generic: nothing here may aid credential forgery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Token could not be parsed or its claims were rejected.
    #[error("malformed token")]
    Malformed,
    /// Signature did not verify against the trusted key.
    #[error("invalid token signature")]
    Signature,
    /// Present time falls outside the token's validity window.
    #[error("token expired")]
    Expired,
}

/// Trust-material loading failures. Fatal at startup.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Key file could not be read.
    #[error("unable to read public key: {0}")]
    Io(String),
    /// Key bytes were not a valid Ed25519 public key.
    #[error("invalid public key: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verifies bearer tokens against one trusted Ed25519 public key.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    /// Trusted public key, loaded once at startup.
    key: VerifyingKey,
    /// Issuer every accepted token must carry.
    issuer: String,
    /// Audience every accepted token must carry.
    audience: String,
}

impl TokenVerifier {
    /// Builds a verifier from a loaded key and the expected claim values.
    #[must_use]
    pub fn new(key: VerifyingKey, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            key,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    /// Verifies a token and extracts the caller identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the token is malformed, carries a bad
    /// signature, or is outside its validity window.
    pub fn verify(&self, token: &str) -> Result<AgentId, AuthError> {
        self.verify_at(token, unix_now())
    }

    /// Verifies a token against an explicit present time in Unix seconds.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] as for [`Self::verify`].
    pub fn verify_at(&self, token: &str, now: u64) -> Result<AgentId, AuthError> {
        if token.is_empty() || token.len() > MAX_TOKEN_BYTES {
            return Err(AuthError::Malformed);
        }
        let (claims_segment, signature_segment) =
            token.split_once('.').ok_or(AuthError::Malformed)?;
        let signature_bytes =
            Base64Url.decode(signature_segment).map_err(|_| AuthError::Malformed)?;
        let signature =
            Signature::try_from(signature_bytes.as_slice()).map_err(|_| AuthError::Malformed)?;
        // The signature covers the encoded claims segment, so it is checked
        // before the claims are parsed.
        self.key
            .verify_strict(claims_segment.as_bytes(), &signature)
            .map_err(|_| AuthError::Signature)?;
        let claims_bytes = Base64Url.decode(claims_segment).map_err(|_| AuthError::Malformed)?;
        let claims: TokenClaims =
            serde_json::from_slice(&claims_bytes).map_err(|_| AuthError::Malformed)?;
        if claims.iss != self.issuer || claims.aud != self.audience {
            return Err(AuthError::Malformed);
        }
        if now > claims.exp.saturating_add(CLOCK_SKEW_SECS) {
            return Err(AuthError::Expired);
        }
        let not_before = claims.nbf.unwrap_or(claims.iat);
        if now.saturating_add(CLOCK_SKEW_SECS) < not_before {
            return Err(AuthError::Expired);
        }
        Ok(AgentId::new(claims.sub))
    }
}

// ============================================================================
// SECTION: Key Loading
// ============================================================================

/// Loads an Ed25519 public key from disk.
///
/// Accepts either raw 32-byte key material or a base64-encoded text file.
///
/// # Errors
///
/// Returns [`KeyError`] when the file is unreadable or not a valid key.
pub fn load_verifying_key(path: &Path) -> Result<VerifyingKey, KeyError> {
    let bytes = fs::read(path).map_err(|err| KeyError::Io(err.to_string()))?;
    let key_bytes = if bytes.len() == 32 {
        bytes
    } else {
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| KeyError::Invalid("public key must be utf-8".to_string()))?;
        Base64
            .decode(text.trim())
            .map_err(|_| KeyError::Invalid("invalid base64 public key".to_string()))?
    };
    let key_bytes: [u8; 32] = key_bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::Invalid("ed25519 public keys are 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| KeyError::Invalid("invalid ed25519 public key".to_string()))
}

// ============================================================================
// SECTION: Fingerprints
// ============================================================================

/// Returns the SHA-256 hex fingerprint of a raw token.
///
/// Used only for audit logging; never part of an authorization decision.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex_encode(&digest)
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Returns the present time in seconds since the Unix epoch.
fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
