//! MCP session compatibility proxy.
//!
//! Sits between MCP clients and a streamable-HTTP MCP server that insists on
//! an `initialize` handshake before anything else. Clients that skip the
//! handshake, or hold a session id the server has forgotten, get a session
//! bootstrapped on their behalf and their request retried once.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ http::pipeline ──▶ upstream::Forwarder ──▶ MCP server
//!                     │                 │    ▲
//!                     │                 ▼    │
//!                     │          session::registry
//!                     │          session::bootstrap
//!                     │          resilience::retries
//!                     ▼
//!              http::discovery (answered locally)
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod protocol;
pub mod session;
pub mod upstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::CompatConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use session::SessionRegistry;
