//! Upstream client subsystem.
//!
//! # Responsibilities
//! - Build absolute URIs against the single configured upstream
//! - Buffered request/response exchange for the session pipeline
//! - Unbuffered passthrough for streaming reads
//!
//! # Design Decisions
//! - One pooled hyper-util client shared by all requests
//! - No timeouts and no automatic retry at this layer

pub mod forwarder;

pub use forwarder::{Forwarder, OutboundRequest, UpstreamResponse};
