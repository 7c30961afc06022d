//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::protocol::jsonrpc::DEFAULT_PROTOCOL_VERSION;

/// Root configuration for the compatibility proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CompatConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// The single upstream protocol server.
    pub upstream: UpstreamConfig,

    /// Session recovery policy.
    pub session: SessionPolicyConfig,

    /// Response translation settings.
    pub translate: TranslateConfig,

    /// Statically served discovery documents.
    pub discovery: DiscoveryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum buffered inbound body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Upstream server address.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream host name or IP.
    pub host: String,

    /// Upstream port.
    pub port: u16,

    /// Path prefix of the protocol endpoint (e.g., "/mcp").
    pub protocol_path: String,
}

impl UpstreamConfig {
    /// `host:port` form used for the URI authority and `Host` header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether a request path addresses the protocol endpoint.
    pub fn is_protocol_path(&self, path: &str) -> bool {
        path.starts_with(&self.protocol_path)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            protocol_path: "/mcp".to_string(),
        }
    }
}

/// Which upstream failures trigger bootstrap-and-retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureDetection {
    /// Only explicit "no session" / "session not found" responses.
    #[default]
    Strict,
    /// Strict signals, plus any status >= 400 for clients without a session id.
    Liberal,
}

impl std::fmt::Display for FailureDetection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureDetection::Strict => write!(f, "strict"),
            FailureDetection::Liberal => write!(f, "liberal"),
        }
    }
}

/// Session recovery policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionPolicyConfig {
    /// Failure detection strictness.
    pub detection: FailureDetection,

    /// Bootstrap before the first send when the client has no session id.
    pub eager_bootstrap: bool,

    /// Keep the minted session id when `notifications/initialized` fails.
    pub surface_session_on_initialized_failure: bool,

    /// Serialize bootstraps per client session id.
    pub single_flight: bool,

    /// Protocol version used when the client request does not name one.
    pub protocol_version: String,

    /// `clientInfo.name` sent in the bootstrap `initialize`.
    pub client_name: String,

    /// `clientInfo.version` sent in the bootstrap `initialize`.
    pub client_version: String,
}

impl Default for SessionPolicyConfig {
    fn default() -> Self {
        Self {
            detection: FailureDetection::Strict,
            eager_bootstrap: true,
            surface_session_on_initialized_failure: false,
            single_flight: false,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Response translation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Wrap non-JSON upstream error bodies into JSON-RPC error envelopes.
    pub rewrite_errors: bool,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            rewrite_errors: true,
        }
    }
}

/// OAuth authorization server metadata served without contacting upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Exact paths answered with the metadata document.
    pub paths: Vec<String>,

    pub issuer: String,

    pub token_endpoint: String,

    pub jwks_uri: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            paths: vec![
                "/.well-known/oauth-authorization-server".to_string(),
                "/.well-known/oauth-authorization-server/mcp".to_string(),
                "/mcp/.well-known/oauth-authorization-server".to_string(),
            ],
            issuer: "https://auth.surrealdb.com".to_string(),
            token_endpoint: "https://auth.surrealdb.com/oauth/token".to_string(),
            jwks_uri: "https://auth.surrealdb.com/.well-known/jwks.json".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
