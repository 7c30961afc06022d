//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and ports
//! - Validate protocol and discovery paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CompatConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::CompatConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("listener.max_body_bytes must be greater than zero")]
    BodyLimit,

    #[error("upstream.host must not be empty")]
    EmptyUpstreamHost,

    #[error("upstream.port must not be zero")]
    UpstreamPort,

    #[error("upstream {0:?} is not a valid authority")]
    UpstreamAuthority(String),

    #[error("{field} {path:?} must start with '/'")]
    Path { field: &'static str, path: String },

    #[error("session.protocol_version must not be empty")]
    ProtocolVersion,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &CompatConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::BodyLimit);
    }

    if config.upstream.host.trim().is_empty() {
        errors.push(ValidationError::EmptyUpstreamHost);
    } else if Authority::from_str(&config.upstream.authority()).is_err() {
        errors.push(ValidationError::UpstreamAuthority(config.upstream.authority()));
    }
    if config.upstream.port == 0 {
        errors.push(ValidationError::UpstreamPort);
    }
    if !config.upstream.protocol_path.starts_with('/') {
        errors.push(ValidationError::Path {
            field: "upstream.protocol_path",
            path: config.upstream.protocol_path.clone(),
        });
    }

    for path in &config.discovery.paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::Path {
                field: "discovery.paths",
                path: path.clone(),
            });
        }
    }

    if config.session.protocol_version.trim().is_empty() {
        errors.push(ValidationError::ProtocolVersion);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
