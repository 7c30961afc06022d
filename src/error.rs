//! Edge-facing error type.
//!
//! Every failure that prevents a forwarded response from reaching the client
//! is rendered as a small JSON document `{error, message}` so that clients
//! never see an empty reply.

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while proxying a single request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Could not connect to upstream or the exchange broke mid-flight.
    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    /// Upstream response body could not be read to the end.
    #[error("failed to read upstream body: {0}")]
    UpstreamBody(#[source] axum::Error),

    /// Inbound body could not be read (client went away, limit exceeded).
    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),

    /// The outbound request could not be assembled.
    #[error("invalid upstream request: {0}")]
    InvalidRequest(#[from] axum::http::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Transport(_) | ProxyError::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
            ProxyError::RequestBody(_) | ProxyError::InvalidRequest(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable tag placed in the `error` field.
    pub fn tag(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_GATEWAY => "bad_gateway",
            _ => "internal_error",
        }
    }
}

/// JSON body of synthesized edge failures.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.tag(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Turn a handler panic into an `internal_error` response.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };

    tracing::error!(message = %message, "Request handler panicked");
    let body = ErrorBody {
        error: "internal_error",
        message,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_errors_map_to_status() {
        let err = ProxyError::UpstreamBody(axum::Error::new("reset"));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.tag(), "bad_gateway");

        let err = ProxyError::RequestBody(axum::Error::new("length limit exceeded"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.tag(), "internal_error");
    }

    #[tokio::test]
    async fn panic_payload_becomes_json_message() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "internal_error");
        assert_eq!(value["message"], "boom");
    }
}
