//! JSON-RPC payloads and header vocabulary of the session protocol.

use axum::body::Bytes;
use axum::http::HeaderName;
use serde::Serialize;
use serde_json::{json, Value};

/// Session identifier header carried in both directions.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

pub const JSON_MIME_TYPE: &str = "application/json";
pub const EVENT_STREAM_MIME_TYPE: &str = "text/event-stream";
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// `Accept` value advertising both response modes.
pub const DUAL_ACCEPT: &str = "application/json, text/event-stream";

pub const JSONRPC_VERSION: &str = "2.0";
pub const INITIALIZE: &str = "initialize";
pub const INITIALIZED_NOTIFICATION: &str = "notifications/initialized";

/// Request id used for the proxy's own `initialize` call.
pub const BOOTSTRAP_REQUEST_ID: &str = "compat-bootstrap-init";

/// Request id placed in rewritten error envelopes.
pub const ERROR_ENVELOPE_ID: &str = "mcp-compat";

/// JSON-RPC "Invalid Request".
pub const INVALID_REQUEST: i64 = -32600;

pub const FALLBACK_ERROR_MESSAGE: &str = "Upstream MCP error";

pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

pub fn session_header() -> HeaderName {
    HeaderName::from_static(SESSION_ID_HEADER)
}

/// Parse a body as JSON. Empty or malformed bodies yield `None`.
pub fn parse_json(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice(body).ok()
}

/// Parse the first `data:` line of an SSE body as JSON.
pub fn parse_event_stream_json(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(body);
    let data = text
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("data:"))?;
    serde_json::from_str(data["data:".len()..].trim()).ok()
}

/// Extract the JSON-RPC payload of a response, whichever mode upstream chose.
pub fn response_payload(body: &[u8]) -> Option<Value> {
    parse_json(body).or_else(|| parse_event_stream_json(body))
}

pub fn rpc_method(payload: &Value) -> Option<&str> {
    payload.get("method").and_then(Value::as_str)
}

/// `params.protocolVersion` of a client request, if present.
pub fn requested_protocol_version(payload: &Value) -> Option<&str> {
    payload
        .pointer("/params/protocolVersion")
        .and_then(Value::as_str)
}

pub fn has_error(payload: &Value) -> bool {
    payload.get("error").is_some_and(|error| !error.is_null())
}

/// Body of the proxy's `initialize` request.
pub fn initialize_request(protocol_version: &str, client_name: &str, client_version: &str) -> Bytes {
    let request = json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": BOOTSTRAP_REQUEST_ID,
        "method": INITIALIZE,
        "params": {
            "protocolVersion": protocol_version,
            "capabilities": {},
            "clientInfo": {
                "name": client_name,
                "version": client_version,
            },
        },
    });
    Bytes::from(request.to_string())
}

/// Body of the `notifications/initialized` notification.
pub fn initialized_notification() -> Bytes {
    let notification = json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": INITIALIZED_NOTIFICATION,
    });
    Bytes::from(notification.to_string())
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope<'a> {
    pub jsonrpc: &'static str,
    pub id: &'static str,
    pub error: ErrorObject<'a>,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject<'a> {
    pub code: i64,
    pub message: &'a str,
}

/// Wrap a foreign error body into a JSON-RPC error envelope.
///
/// The body is trimmed; an empty body is replaced by a fixed message.
pub fn error_envelope(body: &[u8]) -> serde_json::Result<Bytes> {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    let message = if trimmed.is_empty() {
        FALLBACK_ERROR_MESSAGE
    } else {
        trimmed
    };

    let envelope = ErrorEnvelope {
        jsonrpc: JSONRPC_VERSION,
        id: ERROR_ENVELOPE_ID,
        error: ErrorObject {
            code: INVALID_REQUEST,
            message,
        },
    };
    serde_json::to_vec(&envelope).map(Bytes::from)
}
