// crates/mcpcp-config/src/lib.rs
// ============================================================================
// Module: MCPCP Config
// Description: Configuration loading and validation for the MCPCP proxy.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: mcpcp-core, serde, toml
// ============================================================================

//! ## Overview
//! One TOML file configures the whole proxy: the listening server and its
//! trust material, the backend address table, and the identity → backend
//! policy. Everything is loaded and validated once at process start;
//! invalid configuration aborts startup rather than running degraded.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AgentPolicyConfig;
pub use config::AuthConfig;
pub use config::BackendConfig;
pub use config::BackendTimeouts;
pub use config::ConfigError;
pub use config::GrantConfig;
pub use config::McpcpConfig;
pub use config::PolicyConfig;
pub use config::ServerConfig;
