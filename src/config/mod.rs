//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides)
//!     → validation.rs (semantic checks)
//!     → CompatConfig (validated, immutable)
//!     → shared via Arc to the request pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow running with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CompatConfig;
pub use schema::DiscoveryConfig;
pub use schema::FailureDetection;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::SessionPolicyConfig;
pub use schema::UpstreamConfig;
