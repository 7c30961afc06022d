//! Response handling and transformation.
//!
//! # Responsibilities
//! - Infer a content type when upstream omits it
//! - Wrap foreign (non-JSON, non-SSE) error bodies into JSON-RPC envelopes
//! - Rewrite the session header back to the client's id and record the mapping
//! - Recompute `Content-Length` for every buffered reply
//!
//! # Design Decisions
//! - Inference looks at no more than the first 256 bytes
//! - Error rewrite judges the declared content type, falling back to the
//!   inferred one, so JSON bodies without a header are not double-wrapped.
//!   Blank bodies without a header are always foreign
//! - Status codes are never changed

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;

use crate::http::headers;
use crate::protocol::jsonrpc::{self, EVENT_STREAM_MIME_TYPE, JSON_MIME_TYPE, TEXT_PLAIN_UTF8};
use crate::session::SessionRegistry;
use crate::upstream::UpstreamResponse;

const PREVIEW_BYTES: usize = 256;

/// Shape of the inbound request, as far as content-type inference cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Streaming read (`GET`); replies are event streams.
    Stream,
    /// Protocol `POST`.
    ProtocolWrite,
    Other,
}

/// Per-request inputs of [`translate`].
#[derive(Debug, Clone, Copy)]
pub struct TranslateContext<'a> {
    pub kind: RequestKind,
    /// Request addressed the protocol endpoint.
    pub protocol_request: bool,
    /// Session id the client presented.
    pub client_session: Option<&'a str>,
    /// Session minted by bootstrap while handling this request.
    pub recovered_session: Option<&'a str>,
    pub rewrite_errors: bool,
}

/// Guess a media type for a response that came without one.
pub fn infer_content_type(kind: RequestKind, status: StatusCode, body: &[u8]) -> &'static str {
    match kind {
        RequestKind::Stream => return EVENT_STREAM_MIME_TYPE,
        RequestKind::ProtocolWrite if status == StatusCode::ACCEPTED => return JSON_MIME_TYPE,
        _ => {}
    }

    if body.is_empty() {
        return JSON_MIME_TYPE;
    }

    let preview = String::from_utf8_lossy(&body[..body.len().min(PREVIEW_BYTES)]);
    let preview = preview.trim_start();
    if preview.starts_with('{') || preview.starts_with('[') {
        JSON_MIME_TYPE
    } else if preview.starts_with("data:") {
        EVENT_STREAM_MIME_TYPE
    } else {
        TEXT_PLAIN_UTF8
    }
}

/// Whether a content type is one the protocol client can parse.
pub fn is_protocol_media_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.contains(JSON_MIME_TYPE) || lowered.contains(EVENT_STREAM_MIME_TYPE)
}

/// JSON-RPC envelope replacing a foreign error body, if one is warranted.
pub fn rewrite_error_body(status: StatusCode, content_type: &str, body: &[u8]) -> Option<Bytes> {
    if status.as_u16() < 400 || is_protocol_media_type(content_type) {
        return None;
    }

    match jsonrpc::error_envelope(body) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode error envelope");
            None
        }
    }
}

/// Point the response session header at the client's id and record the mapping.
///
/// Returns the session id the client will see.
pub fn rewrite_session(
    headers: &mut HeaderMap,
    upstream_session: Option<&str>,
    client_session: Option<&str>,
    registry: &SessionRegistry,
) -> Option<String> {
    let upstream = upstream_session?;
    registry.associate(client_session, upstream);

    let visible = client_session.unwrap_or(upstream).to_string();
    headers::set_session(headers, Some(&visible));
    Some(visible)
}

/// Shape a buffered upstream response into the client reply.
pub fn translate(upstream: UpstreamResponse, ctx: &TranslateContext<'_>, registry: &SessionRegistry) -> Response {
    let upstream_session = upstream.session_id().map(str::to_owned);
    let declared = upstream.content_type().map(str::to_owned);
    let UpstreamResponse {
        status,
        mut headers,
        mut body,
    } = upstream;

    let content_type = declared
        .clone()
        .unwrap_or_else(|| infer_content_type(ctx.kind, status, &body).to_string());

    // a headerless blank error body has nothing a protocol client could parse
    let judged = match declared.as_deref() {
        Some(declared) => declared,
        None if body.iter().all(u8::is_ascii_whitespace) => TEXT_PLAIN_UTF8,
        None => content_type.as_str(),
    };

    let rewritten = if ctx.rewrite_errors && ctx.protocol_request {
        rewrite_error_body(status, judged, &body)
    } else {
        None
    };

    let was_rewritten = rewritten.is_some();
    if let Some(envelope) = rewritten {
        body = envelope;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME_TYPE));
    } else if declared.is_none() {
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
    }

    let upstream_session = upstream_session.as_deref().or(ctx.recovered_session);
    let visible = rewrite_session(&mut headers, upstream_session, ctx.client_session, registry);

    headers.remove(TRANSFER_ENCODING);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

    tracing::info!(
        status = status.as_u16(),
        upstream_sid = upstream_session.unwrap_or("-"),
        response_sid = visible.as_deref().unwrap_or("-"),
        rewritten = was_rewritten,
        "Upstream response translated"
    );

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Fix up the head of a streamed upstream response.
pub fn translate_stream_head(headers: &mut HeaderMap, client_session: Option<&str>, registry: &SessionRegistry) {
    let missing = headers
        .get(CONTENT_TYPE)
        .map_or(true, |v| v.as_bytes().iter().all(u8::is_ascii_whitespace));
    if missing {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(infer_content_type(RequestKind::Stream, StatusCode::OK, &[])),
        );
    }

    let upstream_session = headers::session_id(headers).map(str::to_owned);
    rewrite_session(headers, upstream_session.as_deref(), client_session, registry);
}
