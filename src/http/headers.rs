//! Outbound header normalization.
//!
//! # Responsibilities
//! - Guarantee `Accept` advertises both JSON and SSE response modes
//! - Default `Content-Type` of protocol payloads to JSON
//! - Rewrite `Host` to the upstream and recompute `Content-Length`
//! - Apply or strip the session identifier header
//!
//! # Design Decisions
//! - Pure functions: the inbound `HeaderMap` is borrowed, never mutated
//! - An `Accept` that already satisfies upstream is passed through verbatim

use axum::http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderValue};

use crate::protocol::jsonrpc::{
    session_header, DUAL_ACCEPT, EVENT_STREAM_MIME_TYPE, JSON_MIME_TYPE, SESSION_ID_HEADER,
};

/// How the outbound body will be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// Fully buffered body of known length.
    Buffered(usize),
    /// Body piped through unchanged; framing headers are kept.
    Streaming,
}

/// Inputs to [`normalize_request_headers`] beyond the inbound headers.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions<'a> {
    /// Value for the outbound `Host` header.
    pub host: &'a HeaderValue,
    /// Request addresses the protocol endpoint.
    pub protocol_request: bool,
    pub framing: BodyFraming,
}

/// Produce the headers sent upstream for an inbound request.
///
/// The session header is copied as-is; use [`with_session`] to pick the
/// upstream id.
pub fn normalize_request_headers(inbound: &HeaderMap, options: &NormalizeOptions<'_>) -> HeaderMap {
    let mut headers = inbound.clone();

    headers.insert(HOST, options.host.clone());
    headers.insert(ACCEPT, ensure_accept(inbound));

    if let BodyFraming::Buffered(len) = options.framing {
        if options.protocol_request && len > 0 && is_blank(inbound.get(CONTENT_TYPE)) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME_TYPE));
        }
        headers.remove(TRANSFER_ENCODING);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }

    headers
}

/// Resolve the `Accept` value upstream should see.
///
/// Multiple inbound values are flattened with `", "` before the check.
pub fn ensure_accept(inbound: &HeaderMap) -> HeaderValue {
    let values: Vec<&HeaderValue> = inbound.get_all(ACCEPT).iter().collect();

    match values.as_slice() {
        [] => {}
        [single] => {
            if accepts_both(single.as_bytes()) {
                return (*single).clone();
            }
        }
        many => {
            let joined = many
                .iter()
                .map(|v| v.as_bytes())
                .collect::<Vec<_>>()
                .join(&b", "[..]);
            if accepts_both(&joined) {
                if let Ok(value) = HeaderValue::from_bytes(&joined) {
                    return value;
                }
            }
        }
    }

    HeaderValue::from_static(DUAL_ACCEPT)
}

fn accepts_both(raw: &[u8]) -> bool {
    let lowered = String::from_utf8_lossy(raw).to_ascii_lowercase();
    lowered.contains(JSON_MIME_TYPE) && lowered.contains(EVENT_STREAM_MIME_TYPE)
}

fn is_blank(value: Option<&HeaderValue>) -> bool {
    value.map_or(true, |v| v.as_bytes().iter().all(u8::is_ascii_whitespace))
}

/// Non-empty session id presented in `headers`.
pub fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty())
}

/// Copy of `headers` carrying `session` as the session id, or none at all.
///
/// A session id that is not a valid header value is dropped.
pub fn with_session(headers: &HeaderMap, session: Option<&str>) -> HeaderMap {
    let mut headers = headers.clone();
    set_session(&mut headers, session);
    headers
}

pub fn set_session(headers: &mut HeaderMap, session: Option<&str>) {
    match session.and_then(|id| HeaderValue::from_str(id).ok()) {
        Some(value) => {
            headers.insert(session_header(), value);
        }
        None => {
            headers.remove(SESSION_ID_HEADER);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HeaderValue {
        HeaderValue::from_static("upstream:8080")
    }

    fn buffered(len: usize) -> BodyFraming {
        BodyFraming::Buffered(len)
    }

    #[test]
    fn accept_with_both_types_is_untouched() {
        for raw in [
            "application/json, text/event-stream",
            "TEXT/EVENT-STREAM;q=0.9, Application/JSON",
            "text/event-stream,application/json",
        ] {
            let mut inbound = HeaderMap::new();
            inbound.insert(ACCEPT, HeaderValue::from_static(raw));
            assert_eq!(ensure_accept(&inbound).as_bytes(), raw.as_bytes());
        }
    }

    #[test]
    fn partial_or_missing_accept_is_replaced() {
        let mut inbound = HeaderMap::new();
        assert_eq!(ensure_accept(&inbound), DUAL_ACCEPT);

        inbound.insert(ACCEPT, HeaderValue::from_static("application/json"));
        assert_eq!(ensure_accept(&inbound), DUAL_ACCEPT);

        inbound.insert(ACCEPT, HeaderValue::from_static("*/*"));
        assert_eq!(ensure_accept(&inbound), DUAL_ACCEPT);
    }

    #[test]
    fn split_accept_values_are_flattened() {
        let mut inbound = HeaderMap::new();
        inbound.append(ACCEPT, HeaderValue::from_static("application/json"));
        inbound.append(ACCEPT, HeaderValue::from_static("text/event-stream"));
        assert_eq!(ensure_accept(&inbound), "application/json, text/event-stream");
    }

    #[test]
    fn blank_content_type_defaults_to_json_on_protocol_requests() {
        let host = host();
        let mut inbound = HeaderMap::new();
        inbound.insert(CONTENT_TYPE, HeaderValue::from_static("  "));

        let options = NormalizeOptions { host: &host, protocol_request: true, framing: buffered(12) };
        let headers = normalize_request_headers(&inbound, &options);
        assert_eq!(headers[CONTENT_TYPE], JSON_MIME_TYPE);

        let options = NormalizeOptions { host: &host, protocol_request: false, framing: buffered(12) };
        let headers = normalize_request_headers(&inbound, &options);
        assert_eq!(headers[CONTENT_TYPE], "  ");
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let host = host();
        let mut inbound = HeaderMap::new();
        inbound.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));

        let options = NormalizeOptions { host: &host, protocol_request: true, framing: buffered(2) };
        let headers = normalize_request_headers(&inbound, &options);
        assert_eq!(headers[CONTENT_TYPE], "application/json; charset=utf-8");
    }

    #[test]
    fn host_and_length_are_rewritten() {
        let host = host();
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, HeaderValue::from_static("proxy.local"));
        inbound.insert(CONTENT_LENGTH, HeaderValue::from_static("999"));
        inbound.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let options = NormalizeOptions { host: &host, protocol_request: true, framing: buffered(42) };
        let headers = normalize_request_headers(&inbound, &options);
        assert_eq!(headers[HOST], "upstream:8080");
        assert_eq!(headers[CONTENT_LENGTH], "42");
        assert!(headers.get(TRANSFER_ENCODING).is_none());

        // inbound untouched
        assert_eq!(inbound[HOST], "proxy.local");
    }

    #[test]
    fn streaming_keeps_framing_headers() {
        let host = host();
        let mut inbound = HeaderMap::new();
        inbound.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let options = NormalizeOptions { host: &host, protocol_request: true, framing: BodyFraming::Streaming };
        let headers = normalize_request_headers(&inbound, &options);
        assert_eq!(headers[TRANSFER_ENCODING], "chunked");
        assert!(headers.get(CONTENT_LENGTH).is_none());
        assert_eq!(headers[ACCEPT], DUAL_ACCEPT);
    }

    #[test]
    fn session_header_is_set_or_removed() {
        let mut inbound = HeaderMap::new();
        inbound.insert("mcp-session-id", HeaderValue::from_static("client"));
        assert_eq!(session_id(&inbound), Some("client"));

        let headers = with_session(&inbound, Some("upstream"));
        assert_eq!(session_id(&headers), Some("upstream"));

        let headers = with_session(&inbound, None);
        assert_eq!(session_id(&headers), None);

        inbound.insert("mcp-session-id", HeaderValue::from_static(""));
        assert_eq!(session_id(&inbound), None);
    }
}
