//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! First upstream response of a protocol write:
//!     → retries.rs (does it signal a missing or stale session?)
//!     → yes: bootstrap once, retry once
//!     → no: translate and reply
//! ```
//!
//! # Design Decisions
//! - No timeouts: a stalled upstream stalls only its own request
//! - No backoff: the single retry follows a fresh handshake immediately
//! - Transport errors are never retried

pub mod retries;

pub use retries::{is_session_failure, needs_bootstrap, RetryContext};
