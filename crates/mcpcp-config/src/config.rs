// crates/mcpcp-config/src/config.rs
// ============================================================================
// Module: MCPCP Configuration
// Description: Configuration model, resolution, and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: mcpcp-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits and
//! validated for internal consistency before the proxy starts. Policy grants
//! must reference configured backends, cleartext backend URLs require an
//! explicit opt-in, and every limit violation is a startup error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use mcpcp_core::AgentId;
use mcpcp_core::BackendName;
use mcpcp_core::PolicyStore;
use mcpcp_core::ToolGrant;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "mcpcp.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "MCPCP_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum number of configured backends.
const MAX_BACKENDS: usize = 64;
/// Maximum length of a backend name.
const MAX_BACKEND_NAME_LENGTH: usize = 128;
/// Maximum number of agents in the policy table.
const MAX_POLICY_AGENTS: usize = 256;
/// Maximum length of an agent identity string.
const MAX_AGENT_ID_LENGTH: usize = 256;
/// Maximum number of tool entries in a single grant.
const MAX_GRANT_TOOLS: usize = 128;
/// Minimum backend connect timeout in milliseconds.
const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum backend connect timeout in milliseconds.
const MAX_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Minimum backend request timeout in milliseconds.
const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum backend request timeout in milliseconds.
const MAX_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Minimum inbound request body limit in bytes.
const MIN_BODY_BYTES: usize = 1024;
/// Maximum inbound request body limit in bytes.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Default bind address for the proxy server.
const DEFAULT_BIND: &str = "127.0.0.1:9003";
/// Default inbound request body limit in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Default token issuer accepted by the verifier.
const DEFAULT_ISSUER: &str = "https://mcpcp";
/// Default token audience accepted by the verifier.
const DEFAULT_AUDIENCE: &str = "mcpcp-server";
/// Default backend connect timeout in milliseconds.
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 500;
/// Default backend request timeout in milliseconds.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// MCPCP proxy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct McpcpConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Backend address table, in declaration order.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Identity → backend policy table.
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Proxy server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the proxy listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum allowed inbound request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Token verification configuration.
    pub auth: Option<AuthConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            auth: None,
        }
    }
}

/// Token verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Path to the trusted Ed25519 public key.
    pub public_key_path: PathBuf,
    /// Issuer accepted tokens must carry.
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Audience accepted tokens must carry.
    #[serde(default = "default_audience")]
    pub audience: String,
}

/// One downstream backend entry.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Unique backend name used as the namespace prefix.
    pub name: String,
    /// JSON-RPC endpoint URL of the backend.
    pub url: String,
    /// Allow cleartext `http://` connections to this backend.
    #[serde(default)]
    pub allow_insecure_http: bool,
    /// Per-backend timeout configuration.
    #[serde(default)]
    pub timeouts: BackendTimeouts,
}

/// Timeouts applied to every call against one backend.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendTimeouts {
    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Identity → backend policy table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfig {
    /// Per-agent policy entries.
    #[serde(default)]
    pub agents: Vec<AgentPolicyConfig>,
}

/// Backend grants for one agent identity.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentPolicyConfig {
    /// Agent identity the grants apply to.
    pub agent: String,
    /// Backend grants, in declaration order.
    #[serde(default)]
    pub grants: Vec<GrantConfig>,
}

/// One backend grant inside an agent policy entry.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantConfig {
    /// Backend the grant applies to.
    pub backend: String,
    /// Backend-local tools the agent may use. Empty means every tool.
    #[serde(default)]
    pub tools: Vec<String>,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl McpcpConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit path, the `MCPCP_CONFIG` environment
    /// variable, then `./mcpcp.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path);
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        validate_backends(&self.backends)?;
        let known: BTreeSet<&str> =
            self.backends.iter().map(|backend| backend.name.as_str()).collect();
        self.policy.validate(&known)?;
        Ok(())
    }

    /// Builds the immutable policy store from the policy table.
    #[must_use]
    pub fn policy_store(&self) -> PolicyStore {
        let mut store = PolicyStore::new();
        for entry in &self.policy.agents {
            for grant in &entry.grants {
                let tools = if grant.tools.is_empty() {
                    ToolGrant::All
                } else {
                    ToolGrant::Only(grant.tools.iter().cloned().collect())
                };
                store.grant(
                    AgentId::new(entry.agent.clone()),
                    BackendName::new(grant.backend.clone()),
                    tools,
                );
            }
        }
        store
    }

    /// Returns backend names in declaration order.
    #[must_use]
    pub fn backend_order(&self) -> Vec<BackendName> {
        self.backends.iter().map(|backend| BackendName::new(backend.name.clone())).collect()
    }
}

impl ServerConfig {
    /// Validates server settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("invalid server bind address".to_string()))?;
        if self.max_body_bytes < MIN_BODY_BYTES || self.max_body_bytes > MAX_BODY_BYTES {
            return Err(ConfigError::Invalid("max_body_bytes out of range".to_string()));
        }
        let auth = self
            .auth
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("server.auth is required".to_string()))?;
        if auth.public_key_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("public_key_path must not be empty".to_string()));
        }
        if auth.issuer.is_empty() || auth.audience.is_empty() {
            return Err(ConfigError::Invalid("issuer and audience must not be empty".to_string()));
        }
        Ok(())
    }
}

impl PolicyConfig {
    /// Validates the policy table against the configured backend set.
    fn validate(&self, known_backends: &BTreeSet<&str>) -> Result<(), ConfigError> {
        if self.agents.len() > MAX_POLICY_AGENTS {
            return Err(ConfigError::Invalid("too many policy agents".to_string()));
        }
        let mut seen_agents = BTreeSet::new();
        for entry in &self.agents {
            if entry.agent.is_empty() || entry.agent.len() > MAX_AGENT_ID_LENGTH {
                return Err(ConfigError::Invalid("invalid agent identity".to_string()));
            }
            if !seen_agents.insert(entry.agent.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate policy entry for agent: {}",
                    entry.agent
                )));
            }
            for grant in &entry.grants {
                if !known_backends.contains(grant.backend.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "policy grant references unknown backend: {}",
                        grant.backend
                    )));
                }
                if grant.tools.len() > MAX_GRANT_TOOLS {
                    return Err(ConfigError::Invalid("too many tools in grant".to_string()));
                }
                if grant.tools.iter().any(String::is_empty) {
                    return Err(ConfigError::Invalid("grant tool names must not be empty".to_string()));
                }
            }
        }
        Ok(())
    }
}

/// Validates the backend table.
fn validate_backends(backends: &[BackendConfig]) -> Result<(), ConfigError> {
    if backends.len() > MAX_BACKENDS {
        return Err(ConfigError::Invalid("too many backends".to_string()));
    }
    let mut seen = BTreeSet::new();
    for backend in backends {
        if backend.name.is_empty() || backend.name.len() > MAX_BACKEND_NAME_LENGTH {
            return Err(ConfigError::Invalid("invalid backend name".to_string()));
        }
        if !backend.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(ConfigError::Invalid(format!(
                "backend name has unsupported characters: {}",
                backend.name
            )));
        }
        if !seen.insert(backend.name.as_str()) {
            return Err(ConfigError::Invalid(format!("duplicate backend name: {}", backend.name)));
        }
        if backend.url.starts_with("http://") {
            if !backend.allow_insecure_http {
                return Err(ConfigError::Invalid(format!(
                    "backend {} uses cleartext http without allow_insecure_http",
                    backend.name
                )));
            }
        } else if !backend.url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "backend {} url must be http(s)",
                backend.name
            )));
        }
        let timeouts = &backend.timeouts;
        if timeouts.connect_timeout_ms < MIN_CONNECT_TIMEOUT_MS
            || timeouts.connect_timeout_ms > MAX_CONNECT_TIMEOUT_MS
        {
            return Err(ConfigError::Invalid("connect_timeout_ms out of range".to_string()));
        }
        if timeouts.request_timeout_ms < MIN_REQUEST_TIMEOUT_MS
            || timeouts.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS
        {
            return Err(ConfigError::Invalid("request_timeout_ms out of range".to_string()));
        }
    }
    Ok(())
}

/// Resolves the configuration path from the explicit argument, the
/// environment, or the default filename.
fn resolve_path(path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    if let Ok(value) = env::var(CONFIG_ENV_VAR) {
        if !value.is_empty() {
            return PathBuf::from(value);
        }
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default inbound body size limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default token issuer.
fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}

/// Default token audience.
fn default_audience() -> String {
    DEFAULT_AUDIENCE.to_string()
}

/// Default backend connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default backend request timeout.
const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file could not be parsed as TOML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config contents violate a validation rule.
    #[error("invalid config: {0}")]
    Invalid(String),
}
