// crates/mcpcp-proxy/tests/common/mod.rs
// ============================================================================
// Module: Proxy Test Support
// Description: Fake JSON-RPC backends and token helpers for proxy tests.
// Purpose: Stand up real HTTP backends with hit counters for routing tests.
// Dependencies: tiny_http, ed25519-dalek, base64
// ============================================================================

//! ## Overview
//! Test scaffolding shared by the proxy integration tests: a thread-backed
//! fake MCP backend speaking `tools/list` and `tools/call` over HTTP, token
//! minting with a fixed test key, and a router builder wired to a no-op
//! audit sink.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only helpers; not every test binary uses every helper."
)]

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as Base64Url;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use mcpcp_config::BackendConfig;
use mcpcp_config::BackendTimeouts;
use mcpcp_core::PolicyStore;
use mcpcp_core::TokenClaims;
use mcpcp_core::TokenVerifier;
use mcpcp_proxy::Authenticator;
use mcpcp_proxy::BackendRegistry;
use mcpcp_proxy::NoopAuditSink;
use mcpcp_proxy::ProxyRouter;
use mcpcp_proxy::RequestContext;
use serde_json::Value;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// Issuer used by all test tokens.
pub const ISSUER: &str = "https://mcpcp";
/// Audience used by all test tokens.
pub const AUDIENCE: &str = "mcpcp-server";

/// One fake MCP backend served from a background thread.
pub struct FakeBackend {
    /// JSON-RPC endpoint URL of the fake backend.
    pub url: String,
    /// Number of `tools/list` requests served.
    list_hits: Arc<AtomicUsize>,
    /// Number of `tools/call` requests served.
    call_hits: Arc<AtomicUsize>,
}

impl FakeBackend {
    /// Spawns a backend advertising the given tools.
    ///
    /// `tools/call` answers with a result echoing the tool name and
    /// arguments, except for `failing_tool`, which answers with a JSON-RPC
    /// error carrying the given message.
    pub fn spawn(tools: &[&str], failing_tool: Option<(&str, &str)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind fake backend");
        let addr = server.server_addr().to_ip().expect("ip listener");
        let url = format!("http://{addr}/");
        let list_hits = Arc::new(AtomicUsize::new(0));
        let call_hits = Arc::new(AtomicUsize::new(0));
        let tool_names: Vec<String> = tools.iter().map(|name| (*name).to_string()).collect();
        let failing = failing_tool.map(|(name, message)| (name.to_string(), message.to_string()));
        let thread_list_hits = Arc::clone(&list_hits);
        let thread_call_hits = Arc::clone(&call_hits);
        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let envelope: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
                let id = envelope["id"].clone();
                let payload = match envelope["method"].as_str() {
                    Some("tools/list") => {
                        thread_list_hits.fetch_add(1, Ordering::SeqCst);
                        list_response(&id, &tool_names)
                    }
                    Some("tools/call") => {
                        thread_call_hits.fetch_add(1, Ordering::SeqCst);
                        call_response(&id, &envelope["params"], failing.as_ref())
                    }
                    _ => json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": -32601, "message": "method not found"},
                    }),
                };
                let header =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response = Response::from_string(payload.to_string()).with_header(header);
                let _ = request.respond(response);
            }
        });
        Self {
            url,
            list_hits,
            call_hits,
        }
    }

    /// Returns the number of `tools/list` requests served so far.
    pub fn list_hits(&self) -> usize {
        self.list_hits.load(Ordering::SeqCst)
    }

    /// Returns the number of `tools/call` requests served so far.
    pub fn call_hits(&self) -> usize {
        self.call_hits.load(Ordering::SeqCst)
    }

    /// Builds the backend's proxy-side configuration under the given name.
    pub fn config(&self, name: &str) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            url: self.url.clone(),
            allow_insecure_http: true,
            timeouts: BackendTimeouts::default(),
        }
    }
}

/// Builds a `tools/list` result payload.
fn list_response(id: &Value, tool_names: &[String]) -> Value {
    let tools: Vec<Value> = tool_names
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "description": format!("Fake tool {name}"),
                "inputSchema": {"type": "object"},
            })
        })
        .collect();
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {"tools": tools},
    })
}

/// Builds a `tools/call` response, echoing or failing per configuration.
fn call_response(id: &Value, params: &Value, failing: Option<&(String, String)>) -> Value {
    let tool = params["name"].as_str().unwrap_or_default();
    if let Some((failing_tool, message)) = failing {
        if tool == failing_tool {
            return json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32000, "message": message},
            });
        }
    }
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "tool": tool,
            "arguments": params["arguments"],
        },
    })
}

/// Returns a backend config pointing at a closed local port.
pub fn unreachable_config(name: &str) -> BackendConfig {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("reserve port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    BackendConfig {
        name: name.to_string(),
        url: format!("http://127.0.0.1:{port}/"),
        allow_insecure_http: true,
        timeouts: BackendTimeouts::default(),
    }
}

/// Signing key every test token is minted with.
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

/// Mints a valid bearer token for the given subject.
pub fn mint_token(subject: &str) -> String {
    mint_token_with_key(&signing_key(), subject)
}

/// Mints a bearer token for the subject with an arbitrary signing key.
pub fn mint_token_with_key(key: &SigningKey, subject: &str) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_secs();
    let claims = TokenClaims {
        sub: subject.to_string(),
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
        iat: now,
        exp: now + 3_600,
        nbf: None,
    };
    let payload = Base64Url.encode(serde_json::to_vec(&claims).expect("serialize claims"));
    let signature = key.sign(payload.as_bytes());
    format!("{payload}.{}", Base64Url.encode(signature.to_bytes()))
}

/// Builds a router over real backend configs with a no-op audit sink.
pub fn build_router(backends: &[BackendConfig], policy: PolicyStore) -> ProxyRouter {
    let verifier = TokenVerifier::new(signing_key().verifying_key(), ISSUER, AUDIENCE);
    let registry = BackendRegistry::from_configs(backends).expect("registry");
    ProxyRouter::new(
        Authenticator::new(verifier),
        Arc::new(policy),
        Arc::new(registry),
        Arc::new(NoopAuditSink),
    )
}

/// Builds an authenticated request context for the subject.
pub fn ctx_for(subject: &str) -> RequestContext {
    RequestContext::http(None, Some(format!("Bearer {}", mint_token(subject))))
}
