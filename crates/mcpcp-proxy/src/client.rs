// crates/mcpcp-proxy/src/client.rs
// ============================================================================
// Module: Backend Client
// Description: JSON-RPC client for one downstream MCP backend.
// Purpose: Speak tools/list and tools/call to a single backend address.
// Dependencies: mcpcp-core, mcpcp-config, reqwest, serde_json
// ============================================================================

//! ## Overview
//! One client per configured backend, each with its own bounded connect and
//! request timeouts. The client forwards tool arguments opaquely and
//! classifies failures into three kinds: the backend was unreachable, the
//! backend answered garbage, or the backend reported an application error.
//! Responses are size-capped; backends are untrusted peers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use mcpcp_config::BackendConfig;
use mcpcp_core::BackendName;
use mcpcp_core::ToolDescriptor;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of backend responses in bytes.
const MAX_BACKEND_RESPONSE_BYTES: usize = 1024 * 1024;
/// JSON-RPC request id counter for backend calls.
static JSON_RPC_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Backend call failures, classified at the proxy boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network-level failure: connect, timeout, or HTTP failure status.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The backend answered with an undecodable payload.
    #[error("backend protocol error: {0}")]
    Protocol(String),
    /// The backend reported an application-level error for the call.
    #[error("{0}")]
    Application(String),
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// JSON-RPC client bound to one backend address.
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// Backend this client talks to.
    name: BackendName,
    /// JSON-RPC endpoint URL.
    url: String,
    /// HTTP client with per-backend timeouts.
    http: Client,
}

impl BackendClient {
    /// Builds a client from one backend's configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the HTTP client cannot be constructed.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let timeouts = &config.timeouts;
        let http = Client::builder()
            .connect_timeout(Duration::from_millis(timeouts.connect_timeout_ms))
            .timeout(Duration::from_millis(timeouts.request_timeout_ms))
            .build()
            .map_err(|_| BackendError::Unavailable("http client build failed".to_string()))?;
        Ok(Self {
            name: BackendName::new(config.name.clone()),
            url: config.url.clone(),
            http,
        })
    }

    /// Returns the backend name this client serves.
    #[must_use]
    pub const fn name(&self) -> &BackendName {
        &self.name
    }

    /// Fetches the backend's advertised tool list.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend is unreachable or answers
    /// with an invalid or error response.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BackendError> {
        let request = JsonRpcRequest::new("tools/list", Value::Null);
        let response = self.call(&request).await?;
        let result = decode_result(response)?;
        let listing: ToolListResult = serde_json::from_value(result)
            .map_err(|_| BackendError::Protocol("invalid tool listing".to_string()))?;
        Ok(listing.tools)
    }

    /// Invokes one backend-local tool, forwarding arguments opaquely.
    ///
    /// The backend's result payload is returned verbatim; a JSON-RPC error
    /// object becomes [`BackendError::Application`] with its message intact.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend is unreachable, answers with
    /// an invalid response, or reports a tool failure.
    pub async fn call_tool(&self, local_name: &str, arguments: Value) -> Result<Value, BackendError> {
        let params = serde_json::json!({
            "name": local_name,
            "arguments": arguments,
        });
        let request = JsonRpcRequest::new("tools/call", params);
        let response = self.call(&request).await?;
        decode_result(response)
    }

    /// Executes one JSON-RPC exchange against the backend.
    async fn call(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, BackendError> {
        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|err| map_send_error(&err))?;
        if !response.status().is_success() {
            return Err(BackendError::Unavailable(format!(
                "http request failed with status {}",
                response.status()
            )));
        }
        let max_bytes = u64::try_from(MAX_BACKEND_RESPONSE_BYTES).unwrap_or(u64::MAX);
        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(BackendError::Protocol("response too large".to_string()));
            }
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| map_send_error(&err))?;
        if bytes.len() > MAX_BACKEND_RESPONSE_BYTES {
            return Err(BackendError::Protocol("response too large".to_string()));
        }
        serde_json::from_slice(&bytes)
            .map_err(|_| BackendError::Protocol("invalid json-rpc response".to_string()))
    }
}

// ============================================================================
// SECTION: JSON-RPC Envelope
// ============================================================================

/// JSON-RPC request envelope for backend calls.
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: u64,
    /// Remote method name.
    method: &'static str,
    /// Request parameters payload.
    #[serde(skip_serializing_if = "Value::is_null")]
    params: Value,
}

impl JsonRpcRequest {
    /// Builds a request with a fresh identifier.
    fn new(method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: JSON_RPC_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        }
    }
}

/// JSON-RPC response envelope from backend calls.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    /// Successful result payload.
    result: Option<Value>,
    /// Error payload when the call fails.
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    /// Human-readable error message.
    message: String,
}

/// Tool listing payload inside a `tools/list` result.
#[derive(Debug, Deserialize)]
struct ToolListResult {
    /// Advertised tool descriptors.
    tools: Vec<ToolDescriptor>,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the result payload or surfaces the backend's error.
fn decode_result(response: JsonRpcResponse) -> Result<Value, BackendError> {
    if let Some(error) = response.error {
        return Err(BackendError::Application(error.message));
    }
    response.result.ok_or_else(|| BackendError::Protocol("missing result".to_string()))
}

/// Maps reqwest errors to stable backend error kinds.
fn map_send_error(error: &reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Unavailable("request timed out".to_string())
    } else if error.is_connect() {
        BackendError::Unavailable("connection failed".to_string())
    } else {
        BackendError::Unavailable("http request failed".to_string())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
