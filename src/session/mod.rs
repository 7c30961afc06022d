//! Session compatibility subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request with client session id (or none)
//!     → registry.rs (client id → upstream id)
//!     → first upstream response signals a missing/stale session
//!     → bootstrap.rs (initialize + notifications/initialized)
//!     → registry.rs (associate client id with the minted id)
//!     → single retry of the original request
//! ```
//!
//! # Design Decisions
//! - The registry is owned by server state, not a process-wide singleton
//! - At most one bootstrap per inbound request
//! - Bootstrap failures are diagnostics; the original response still wins

pub mod bootstrap;
pub mod registry;

pub use bootstrap::{BootstrapFailure, BootstrapOutcome, BootstrapStage};
pub use registry::{BootstrapPermit, SessionRegistry};
