// crates/mcpcp-proxy/src/server.rs
// ============================================================================
// Module: Proxy Server
// Description: HTTP JSON-RPC transport for the proxy router.
// Purpose: Expose tools/list and tools/call over a single POST endpoint.
// Dependencies: axum, tokio, mcpcp-config, mcpcp-core
// ============================================================================

//! ## Overview
//! The server binds one listener and serves JSON-RPC 2.0 over `POST /rpc`.
//! It owns the startup wiring: key loading, verifier construction, policy
//! compilation, and backend registry setup, all from the validated
//! configuration. Request bodies are size-capped, every router error maps to
//! a stable JSON-RPC error code, and backend application errors pass through
//! with a 200 status like any other call result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::routing::post;
use mcpcp_config::McpcpConfig;
use mcpcp_core::TokenVerifier;
use mcpcp_core::load_verifying_key;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::audit::StderrAuditSink;
use crate::auth::Authenticator;
use crate::auth::RequestContext;
use crate::registry::BackendRegistry;
use crate::router::ProxyError;
use crate::router::ProxyRouter;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// JSON-RPC parse error.
const CODE_PARSE: i64 = -32700;
/// JSON-RPC invalid request envelope.
const CODE_INVALID_REQUEST: i64 = -32600;
/// JSON-RPC method not found; also covers unknown and denied tools.
const CODE_METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC invalid params.
const CODE_INVALID_PARAMS: i64 = -32602;
/// Authentication failure.
const CODE_UNAUTHENTICATED: i64 = -32001;
/// Backend unreachable or answered garbage.
const CODE_BACKEND_UNAVAILABLE: i64 = -32011;
/// Backend application error, passed through.
const CODE_BACKEND_ERROR: i64 = -32021;
/// Response serialization failure.
const CODE_SERIALIZATION: i64 = -32060;
/// Request body exceeded the configured limit.
const CODE_BODY_TOO_LARGE: i64 = -32070;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server startup and transport failures. Fatal.
#[derive(Debug, Error)]
pub enum ProxyServerError {
    /// Configuration was missing or unusable at startup.
    #[error("server config error: {0}")]
    Config(String),
    /// A component could not be constructed.
    #[error("server init error: {0}")]
    Init(String),
    /// The listener could not be bound or serving failed.
    #[error("server transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP JSON-RPC server wrapping a [`ProxyRouter`].
pub struct ProxyServer {
    /// Socket address to listen on.
    bind: SocketAddr,
    /// Shared per-request state.
    state: Arc<ServerState>,
}

/// Shared request-handling state.
struct ServerState {
    /// Request router.
    router: ProxyRouter,
    /// Maximum accepted request body size in bytes.
    max_body_bytes: usize,
}

impl ProxyServer {
    /// Builds the full proxy stack from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyServerError`] when trust material cannot be loaded or
    /// a component cannot be constructed.
    pub fn from_config(config: &McpcpConfig) -> Result<Self, ProxyServerError> {
        let bind: SocketAddr = config
            .server
            .bind
            .parse()
            .map_err(|_| ProxyServerError::Config("invalid bind address".to_string()))?;
        let auth = config
            .server
            .auth
            .as_ref()
            .ok_or_else(|| ProxyServerError::Config("server.auth is required".to_string()))?;
        let key = load_verifying_key(&auth.public_key_path)
            .map_err(|err| ProxyServerError::Config(err.to_string()))?;
        let verifier = TokenVerifier::new(key, auth.issuer.clone(), auth.audience.clone());
        let registry = BackendRegistry::from_configs(&config.backends)
            .map_err(|err| ProxyServerError::Init(err.to_string()))?;
        let router = ProxyRouter::new(
            Authenticator::new(verifier),
            Arc::new(config.policy_store()),
            Arc::new(registry),
            Arc::new(StderrAuditSink),
        );
        Ok(Self {
            bind,
            state: Arc::new(ServerState {
                router,
                max_body_bytes: config.server.max_body_bytes,
            }),
        })
    }

    /// Returns the configured bind address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Binds the listener and serves requests until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ProxyServerError> {
        // One byte of headroom lets the handler answer oversize bodies with
        // a protocol error instead of a bare transport rejection.
        let body_limit = self.state.max_body_bytes.saturating_add(1);
        let app = Router::new()
            .route("/rpc", post(handle_rpc))
            .layer(DefaultBodyLimit::max(body_limit))
            .with_state(Arc::clone(&self.state));
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|err| ProxyServerError::Transport(err.to_string()))?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| ProxyServerError::Transport(err.to_string()))
    }
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Inbound JSON-RPC request envelope.
#[derive(Debug, Deserialize)]
struct RpcRequest {
    /// JSON-RPC protocol version. Must be "2.0".
    jsonrpc: String,
    /// Request identifier, echoed in the response.
    #[serde(default)]
    id: Value,
    /// Method name.
    method: String,
    /// Method parameters.
    #[serde(default)]
    params: Value,
}

/// Parameters for a `tools/call` request.
#[derive(Debug, Deserialize)]
struct CallParams {
    /// Namespaced tool name.
    name: String,
    /// Tool arguments, forwarded opaquely.
    #[serde(default)]
    arguments: Value,
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Axum handler for `POST /rpc`.
async fn handle_rpc(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let ctx = RequestContext::http(Some(peer.ip()), auth_header);
    let (status, payload) = handle_request(&state, ctx, &body).await;
    (status, Json(payload))
}

/// Parses and dispatches one JSON-RPC request.
async fn handle_request(
    state: &ServerState,
    ctx: RequestContext,
    body: &[u8],
) -> (StatusCode, Value) {
    if body.len() > state.max_body_bytes {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            error_response(Value::Null, CODE_BODY_TOO_LARGE, "request body too large"),
        );
    }
    let Ok(request) = serde_json::from_slice::<RpcRequest>(body) else {
        return (
            StatusCode::BAD_REQUEST,
            error_response(Value::Null, CODE_PARSE, "parse error"),
        );
    };
    if request.jsonrpc != "2.0" {
        return (
            StatusCode::BAD_REQUEST,
            error_response(request.id, CODE_INVALID_REQUEST, "invalid request"),
        );
    }
    let ctx = match &request.id {
        Value::Null => ctx,
        id => ctx.with_request_id(id.to_string()),
    };
    let id = request.id;
    match request.method.as_str() {
        "tools/list" => match state.router.list_tools(&ctx).await {
            Ok(tools) => match serde_json::to_value(&tools) {
                Ok(tools) => (StatusCode::OK, result_response(id, json!({ "tools": tools }))),
                Err(_) => proxy_error_response(id, &ProxyError::Serialization),
            },
            Err(err) => proxy_error_response(id, &err),
        },
        "tools/call" => {
            let Ok(params) = serde_json::from_value::<CallParams>(request.params) else {
                let err = ProxyError::InvalidParams("tools/call requires a tool name".to_string());
                return proxy_error_response(id, &err);
            };
            match state.router.call_tool(&ctx, &params.name, params.arguments).await {
                Ok(result) => (StatusCode::OK, result_response(id, result)),
                Err(err) => proxy_error_response(id, &err),
            }
        }
        _ => (
            StatusCode::BAD_REQUEST,
            error_response(id, CODE_METHOD_NOT_FOUND, "method not found"),
        ),
    }
}

// ============================================================================
// SECTION: Response Builders
// ============================================================================

/// Builds a JSON-RPC success response.
fn result_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Builds a JSON-RPC error response.
fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message,
        },
    })
}

/// Maps a router error onto an HTTP status and JSON-RPC error payload.
fn proxy_error_response(id: Value, error: &ProxyError) -> (StatusCode, Value) {
    let (status, code) = match error {
        ProxyError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, CODE_UNAUTHENTICATED),
        ProxyError::ToolNotFound(_) => (StatusCode::BAD_REQUEST, CODE_METHOD_NOT_FOUND),
        ProxyError::BackendUnavailable(_) => (StatusCode::BAD_GATEWAY, CODE_BACKEND_UNAVAILABLE),
        // Backend application errors are call results, not transport faults.
        ProxyError::Backend(_) => (StatusCode::OK, CODE_BACKEND_ERROR),
        ProxyError::InvalidParams(_) => (StatusCode::BAD_REQUEST, CODE_INVALID_PARAMS),
        ProxyError::Serialization => (StatusCode::INTERNAL_SERVER_ERROR, CODE_SERIALIZATION),
    };
    (status, error_response(id, code, &error.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
