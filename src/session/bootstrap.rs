//! Session bootstrap handshake.
//!
//! # Responsibilities
//! - Send `initialize` without a session id to mint a fresh upstream session
//! - Send `notifications/initialized` bound to that session
//! - Report the minted id, or which step failed
//!
//! # Design Decisions
//! - Runs at most once per inbound request; the caller enforces this
//! - Transport errors count as a failed step, never as an edge error:
//!   the client still receives the original upstream response

use axum::body::Bytes;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};

use crate::config::SessionPolicyConfig;
use crate::http::headers;
use crate::observability::metrics;
use crate::protocol::jsonrpc::{self, JSON_MIME_TYPE};
use crate::upstream::{Forwarder, OutboundRequest, UpstreamResponse};

/// Handshake step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    Initialize,
    Initialized,
}

impl BootstrapStage {
    /// Reason tag used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            BootstrapStage::Initialize => "initialize_failed",
            BootstrapStage::Initialized => "notifications_initialized_failed",
        }
    }
}

/// Diagnostics of a failed handshake.
#[derive(Debug, Clone)]
pub struct BootstrapFailure {
    pub stage: BootstrapStage,
    /// Status of the offending response; `None` on transport failure.
    pub status: Option<StatusCode>,
    /// Body preview or transport error text.
    pub detail: String,
}

impl BootstrapFailure {
    fn from_response(stage: BootstrapStage, response: &UpstreamResponse) -> Self {
        let preview_len = response.body.len().min(240);
        Self {
            stage,
            status: Some(response.status),
            detail: String::from_utf8_lossy(&response.body[..preview_len]).into_owned(),
        }
    }

    fn from_error(stage: BootstrapStage, error: impl std::fmt::Display) -> Self {
        Self {
            stage,
            status: None,
            detail: error.to_string(),
        }
    }

    pub fn reason(&self) -> &'static str {
        self.stage.reason()
    }
}

/// Result of a bootstrap attempt.
#[derive(Debug, Clone)]
pub enum BootstrapOutcome {
    Established { session_id: String },
    Failed(BootstrapFailure),
}

impl BootstrapOutcome {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            BootstrapOutcome::Established { session_id } => Some(session_id),
            BootstrapOutcome::Failed(_) => None,
        }
    }
}

/// The request on whose behalf a session is bootstrapped.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapTarget<'a> {
    /// Path and query of the original request; the handshake uses the same endpoint.
    pub path_and_query: &'a str,
    /// Normalized outbound headers of the original request.
    pub headers: &'a HeaderMap,
    /// Original request body, consulted for `params.protocolVersion`.
    pub original_body: &'a [u8],
}

/// Run the `initialize` + `notifications/initialized` handshake.
pub async fn bootstrap(
    forwarder: &Forwarder,
    policy: &SessionPolicyConfig,
    target: BootstrapTarget<'_>,
) -> BootstrapOutcome {
    let outcome = handshake(forwarder, policy, target).await;

    match &outcome {
        BootstrapOutcome::Established { session_id } => {
            tracing::info!(path = %target.path_and_query, upstream_sid = %session_id, "Session bootstrapped");
            metrics::record_bootstrap("established");
        }
        BootstrapOutcome::Failed(failure) => {
            tracing::warn!(
                path = %target.path_and_query,
                reason = failure.reason(),
                status = ?failure.status,
                detail = %failure.detail,
                "Session bootstrap failed"
            );
            metrics::record_bootstrap(failure.reason());
        }
    }

    outcome
}

async fn handshake(
    forwarder: &Forwarder,
    policy: &SessionPolicyConfig,
    target: BootstrapTarget<'_>,
) -> BootstrapOutcome {
    let original = jsonrpc::parse_json(target.original_body);
    let protocol_version = original
        .as_ref()
        .and_then(jsonrpc::requested_protocol_version)
        .unwrap_or(policy.protocol_version.as_str());

    let body = jsonrpc::initialize_request(protocol_version, &policy.client_name, &policy.client_version);
    let request = handshake_request(target, None, body);

    let response = match forwarder.send(request).await {
        Ok(response) => response,
        Err(e) => return BootstrapOutcome::Failed(BootstrapFailure::from_error(BootstrapStage::Initialize, e)),
    };

    let rpc_error = jsonrpc::response_payload(&response.body)
        .as_ref()
        .is_some_and(jsonrpc::has_error);
    let session_id = match response.session_id() {
        Some(id) if response.status.as_u16() < 400 && !rpc_error => id.to_string(),
        _ => {
            return BootstrapOutcome::Failed(BootstrapFailure::from_response(
                BootstrapStage::Initialize,
                &response,
            ))
        }
    };

    let request = handshake_request(target, Some(&session_id), jsonrpc::initialized_notification());
    let failure = match forwarder.send(request).await {
        Ok(response) if response.status.as_u16() < 400 => None,
        Ok(response) => Some(BootstrapFailure::from_response(BootstrapStage::Initialized, &response)),
        Err(e) => Some(BootstrapFailure::from_error(BootstrapStage::Initialized, e)),
    };

    match failure {
        None => BootstrapOutcome::Established { session_id },
        Some(failure) if policy.surface_session_on_initialized_failure => {
            tracing::warn!(
                upstream_sid = %session_id,
                status = ?failure.status,
                "notifications/initialized failed; keeping minted session"
            );
            BootstrapOutcome::Established { session_id }
        }
        Some(failure) => BootstrapOutcome::Failed(failure),
    }
}

fn handshake_request(target: BootstrapTarget<'_>, session: Option<&str>, body: Bytes) -> OutboundRequest {
    let mut headers = headers::with_session(target.headers, session);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME_TYPE));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

    OutboundRequest {
        method: Method::POST,
        path_and_query: target.path_and_query.to_string(),
        headers,
        body,
    }
}
