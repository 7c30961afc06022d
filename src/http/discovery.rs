//! Locally answered discovery documents.

use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::config::DiscoveryConfig;

/// Authorization server metadata served on the well-known paths.
#[derive(Debug, Serialize)]
pub struct DiscoveryDocument<'a> {
    pub issuer: &'a str,
    pub token_endpoint: &'a str,
    pub jwks_uri: &'a str,
}

impl<'a> From<&'a DiscoveryConfig> for DiscoveryDocument<'a> {
    fn from(config: &'a DiscoveryConfig) -> Self {
        Self {
            issuer: &config.issuer,
            token_endpoint: &config.token_endpoint,
            jwks_uri: &config.jwks_uri,
        }
    }
}

pub fn is_discovery_path(config: &DiscoveryConfig, path: &str) -> bool {
    config.paths.iter().any(|p| p == path)
}

pub fn discovery_response(config: &DiscoveryConfig) -> Response {
    let mut response = (StatusCode::OK, Json(DiscoveryDocument::from(config))).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;

    #[test]
    fn matches_configured_paths_exactly() {
        let config = DiscoveryConfig::default();
        assert!(is_discovery_path(&config, "/.well-known/oauth-authorization-server"));
        assert!(is_discovery_path(&config, "/mcp/.well-known/oauth-authorization-server"));
        assert!(!is_discovery_path(&config, "/.well-known/oauth-authorization-server/"));
        assert!(!is_discovery_path(&config, "/mcp"));
    }

    #[tokio::test]
    async fn document_is_not_cached() {
        let config = DiscoveryConfig::default();
        let response = discovery_response(&config);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(doc["issuer"], config.issuer.as_str());
        assert_eq!(doc["jwks_uri"], config.jwks_uri.as_str());
    }
}
