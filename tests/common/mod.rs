//! Shared utilities for integration testing.
//!
//! `MockUpstream` is a small streamable-HTTP MCP server that refuses calls
//! without an initialized session, the way the servers this proxy fronts do.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, Response, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use mcp_compat_proxy::config::CompatConfig;
use mcp_compat_proxy::{HttpServer, SessionRegistry, Shutdown};

pub const SESSION: &str = "mcp-session-id";

/// Knobs for the mock upstream.
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Every protocol call fails with an HTML 500 page.
    pub html_error: bool,
    /// `initialize` fails.
    pub reject_initialize: bool,
    /// `notifications/initialized` fails.
    pub reject_initialized: bool,
    /// Reply to calls carrying no session id.
    pub no_session: (StatusCode, &'static str),
    /// Reply to calls carrying an unknown session id.
    pub unknown_session: (StatusCode, &'static str),
    /// Delay before answering `initialize`.
    pub initialize_delay: Duration,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            html_error: false,
            reject_initialize: false,
            reject_initialized: false,
            no_session: (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Unprocessable Entity: Expect initialize request",
            ),
            unknown_session: (StatusCode::UNAUTHORIZED, "Unauthorized: Session not found"),
            initialize_delay: Duration::ZERO,
        }
    }
}

/// One request as the upstream saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn session(&self) -> Option<&str> {
        self.headers.get(SESSION).and_then(|v| v.to_str().ok())
    }

    pub fn rpc_method(&self) -> Option<String> {
        serde_json::from_slice::<Value>(&self.body)
            .ok()?
            .get("method")?
            .as_str()
            .map(str::to_owned)
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

struct MockState {
    behavior: Behavior,
    minted: AtomicUsize,
    sessions: Mutex<HashSet<String>>,
    requests: Mutex<Vec<Recorded>>,
}

#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub async fn start(behavior: Behavior) -> Self {
        let state = Arc::new(MockState {
            behavior,
            minted: AtomicUsize::new(0),
            sessions: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(mock_handler).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Recorded requests whose JSON-RPC method is `method`.
    pub fn calls(&self, method: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.rpc_method().as_deref() == Some(method))
            .collect()
    }

    pub fn has_session(&self, id: &str) -> bool {
        self.state.sessions.lock().unwrap().contains(id)
    }

    /// Register a session as if a handshake had completed.
    pub fn add_session(&self, id: &str) {
        self.state.sessions.lock().unwrap().insert(id.to_string());
    }
}

fn reply(status: StatusCode, content_type: Option<&str>, session: Option<&str>, body: impl Into<Body>) -> Response<Body> {
    let mut builder = Response::builder().status(status);
    if let Some(ct) = content_type {
        builder = builder.header("content-type", ct);
    }
    if let Some(sid) = session {
        builder = builder.header(SESSION, sid);
    }
    builder.body(body.into()).unwrap()
}

async fn mock_handler(State(state): State<Arc<MockState>>, request: Request<Body>) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let recorded = Recorded {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        headers: parts.headers.clone(),
        body,
    };
    state.requests.lock().unwrap().push(recorded.clone());

    let behavior = &state.behavior;
    let session = recorded.session().map(str::to_owned);
    let known = session
        .as_deref()
        .is_some_and(|s| state.sessions.lock().unwrap().contains(s));

    match parts.method {
        Method::GET => {
            return reply(StatusCode::OK, None, session.as_deref(), "data: {\"ready\":true}\n\n");
        }
        Method::DELETE => {
            if let Some(s) = session.as_deref() {
                state.sessions.lock().unwrap().remove(s);
            }
            return reply(StatusCode::OK, None, None, Body::empty());
        }
        _ => {}
    }

    if behavior.html_error {
        return reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            Some("text/html"),
            None,
            "<html>error</html>",
        );
    }

    let message = recorded.json();
    match recorded.rpc_method().as_deref() {
        Some("initialize") => {
            tokio::time::sleep(behavior.initialize_delay).await;
            if behavior.reject_initialize {
                let error = json!({"jsonrpc": "2.0", "id": message["id"], "error": {"code": -32603, "message": "no"}});
                return reply(StatusCode::OK, Some("application/json"), None, error.to_string());
            }
            let n = state.minted.fetch_add(1, Ordering::SeqCst) + 1;
            let sid = format!("upstream-{n}");
            state.sessions.lock().unwrap().insert(sid.clone());
            let result = json!({
                "jsonrpc": "2.0",
                "id": message["id"],
                "result": {
                    "protocolVersion": message["params"]["protocolVersion"],
                    "capabilities": {},
                    "serverInfo": {"name": "mock", "version": "0"}
                }
            });
            reply(StatusCode::OK, Some("application/json"), Some(&sid), result.to_string())
        }
        Some("notifications/initialized") => {
            if behavior.reject_initialized || !known {
                return reply(StatusCode::BAD_REQUEST, Some("text/plain"), None, "rejected");
            }
            reply(StatusCode::ACCEPTED, None, None, Body::empty())
        }
        _ => {
            let (status, text) = match (session.as_deref(), known) {
                (None, _) => behavior.no_session,
                (Some(_), false) => behavior.unknown_session,
                (Some(sid), true) => {
                    let result = json!({"jsonrpc": "2.0", "id": message["id"], "result": {"session": sid}});
                    return reply(StatusCode::OK, Some("application/json"), Some(sid), result.to_string());
                }
            };
            reply(status, Some("text/plain"), None, text)
        }
    }
}

/// Proxy configuration pointing at `upstream`.
pub fn proxy_config(upstream: SocketAddr) -> CompatConfig {
    let mut config = CompatConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.host = upstream.ip().to_string();
    config.upstream.port = upstream.port();
    config
}

/// A running proxy and handles into it.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub registry: SessionRegistry,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
}

impl TestProxy {
    pub async fn start(config: CompatConfig) -> Self {
        let server = HttpServer::new(config).unwrap();
        let registry = server.registry().clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, receiver).await;
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        Self {
            addr,
            registry,
            shutdown,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// `POST /mcp` with a JSON-RPC body and an optional session id.
    pub async fn rpc(&self, session: Option<&str>, body: Value) -> reqwest::Response {
        let mut request = self
            .client
            .post(self.url("/mcp"))
            .header("content-type", "application/json")
            .body(body.to_string());
        if let Some(sid) = session {
            request = request.header(SESSION, sid);
        }
        request.send().await.expect("proxy unreachable")
    }
}

pub fn tools_list() -> Value {
    json!({"jsonrpc": "2.0", "method": "tools/list", "id": 1})
}

/// Address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
