//! Protocol vocabulary shared by every stage of the proxy.
//!
//! # Responsibilities
//! - Name the headers and media types the session protocol depends on
//! - Parse JSON-RPC payloads out of plain JSON or SSE bodies
//! - Encode the JSON-RPC error envelope used for foreign upstream errors
//!
//! # Design Decisions
//! - Parsing never fails loudly: malformed bodies yield `None`
//! - Envelope field order is fixed by struct definition, not map ordering

pub mod jsonrpc;

pub use jsonrpc::{
    EVENT_STREAM_MIME_TYPE, JSON_MIME_TYPE, SESSION_ID_HEADER, TEXT_PLAIN_UTF8,
};
