//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → discovery.rs (well-known paths answered locally)
//!     → pipeline.rs (session mapping, bootstrap, retry)
//!         → headers.rs (outbound normalization)
//!         → response.rs (content type, error envelope, session rewrite)
//!     → Send to client
//! ```

pub mod discovery;
pub mod headers;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
