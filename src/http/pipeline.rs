//! Per-request session compatibility pipeline.
//!
//! # Data Flow
//! ```text
//! Buffered:  read body → map session → normalize headers → [eager bootstrap]
//!            → send → [bootstrap + single retry] → translate → [forget on DELETE]
//! Streaming: map session → normalize headers → pipe → fix response head
//! ```

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Request};
use axum::response::Response;

use crate::error::ProxyError;
use crate::http::headers::{self, BodyFraming, NormalizeOptions};
use crate::http::request::request_id;
use crate::http::response::{self, RequestKind, TranslateContext};
use crate::http::server::AppState;
use crate::protocol::jsonrpc::{self, INITIALIZE};
use crate::resilience::{needs_bootstrap, RetryContext};
use crate::session::bootstrap::{self, BootstrapOutcome, BootstrapTarget};
use crate::upstream::{OutboundRequest, UpstreamResponse};

/// Pipe a streaming read through to upstream.
pub async fn stream(state: &AppState, request: Request<Body>) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let client_session = headers::session_id(&parts.headers).map(str::to_owned);
    let mapped = client_session.as_deref().and_then(|c| state.registry.lookup(c));

    let protocol_request = state.config.upstream.is_protocol_path(parts.uri.path());
    let mut outbound = headers::normalize_request_headers(
        &parts.headers,
        &NormalizeOptions {
            host: state.forwarder.host(),
            protocol_request,
            framing: BodyFraming::Streaming,
        },
    );
    headers::set_session(&mut outbound, mapped.as_deref().or(client_session.as_deref()));

    tracing::debug!(
        request_id = %request_id(&parts.headers),
        client_sid = client_session.as_deref().unwrap_or("-"),
        mapped_sid = mapped.as_deref().unwrap_or("-"),
        "Opening upstream stream"
    );

    let mut response = state
        .forwarder
        .stream(parts.method.clone(), path_and_query(&parts), outbound, body)
        .await?;
    response::translate_stream_head(response.headers_mut(), client_session.as_deref(), &state.registry);
    Ok(response)
}

/// Buffer, forward and translate one request, bootstrapping a session when needed.
pub async fn buffered(state: &AppState, request: Request<Body>) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, state.config.listener.max_body_bytes)
        .await
        .map_err(ProxyError::RequestBody)?;

    let exchange = Exchange::new(state, &parts, body);
    let (upstream, recovered) = exchange.run().await?;

    let ctx = TranslateContext {
        kind: exchange.kind(),
        protocol_request: exchange.protocol_request,
        client_session: exchange.client_session.as_deref(),
        recovered_session: recovered.as_deref(),
        rewrite_errors: state.config.translate.rewrite_errors,
    };
    let reply = response::translate(upstream, &ctx, &state.registry);

    if parts.method == Method::DELETE {
        if let Some(client) = exchange.client_session.as_deref() {
            state.registry.remove(client);
        }
    }

    Ok(reply)
}

fn path_and_query(parts: &Parts) -> &str {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
}

/// One buffered inbound request and what is known about it.
struct Exchange<'a> {
    state: &'a AppState,
    method: Method,
    path_and_query: &'a str,
    request_id: &'a str,
    headers: HeaderMap,
    body: Bytes,
    protocol_request: bool,
    rpc_method: Option<String>,
    client_session: Option<String>,
    mapped_session: Option<String>,
}

impl<'a> Exchange<'a> {
    fn new(state: &'a AppState, parts: &'a Parts, body: Bytes) -> Self {
        let protocol_request = state.config.upstream.is_protocol_path(parts.uri.path());
        let client_session = headers::session_id(&parts.headers).map(str::to_owned);
        let mapped_session = client_session.as_deref().and_then(|c| state.registry.lookup(c));
        let rpc_method = jsonrpc::parse_json(&body)
            .as_ref()
            .and_then(jsonrpc::rpc_method)
            .map(str::to_owned);

        let headers = headers::normalize_request_headers(
            &parts.headers,
            &NormalizeOptions {
                host: state.forwarder.host(),
                protocol_request,
                framing: BodyFraming::Buffered(body.len()),
            },
        );

        Self {
            state,
            method: parts.method.clone(),
            path_and_query: path_and_query(parts),
            request_id: request_id(&parts.headers),
            headers,
            body,
            protocol_request,
            rpc_method,
            client_session,
            mapped_session,
        }
    }

    fn kind(&self) -> RequestKind {
        if self.protocol_request && self.method == Method::POST {
            RequestKind::ProtocolWrite
        } else {
            RequestKind::Other
        }
    }

    fn initialize_call(&self) -> bool {
        self.rpc_method.as_deref() == Some(INITIALIZE)
    }

    fn wants_eager_bootstrap(&self) -> bool {
        self.state.config.session.eager_bootstrap
            && self.kind() == RequestKind::ProtocolWrite
            && self.client_session.is_none()
            && self.rpc_method.is_some()
            && !self.initialize_call()
    }

    /// Session id sent upstream on the first attempt.
    fn outbound_session(&self) -> Option<&str> {
        self.mapped_session
            .as_deref()
            .or(self.client_session.as_deref())
    }

    fn outbound(&self, session: Option<&str>) -> OutboundRequest {
        OutboundRequest {
            method: self.method.clone(),
            path_and_query: self.path_and_query.to_string(),
            headers: headers::with_session(&self.headers, session),
            body: self.body.clone(),
        }
    }

    async fn bootstrap(&self) -> Option<String> {
        let target = BootstrapTarget {
            path_and_query: self.path_and_query,
            headers: &self.headers,
            original_body: &self.body,
        };
        match bootstrap::bootstrap(&self.state.forwarder, &self.state.config.session, target).await {
            BootstrapOutcome::Established { session_id } => Some(session_id),
            BootstrapOutcome::Failed(_) => None,
        }
    }

    /// Forward the request, returning the final upstream response and the
    /// session minted on its behalf, if any.
    async fn run(&self) -> Result<(UpstreamResponse, Option<String>), ProxyError> {
        let policy = &self.state.config.session;
        let mut bootstrapped = false;
        let mut recovered = None;
        let mut session = self.outbound_session().map(str::to_owned);

        if self.wants_eager_bootstrap() {
            bootstrapped = true;
            recovered = self.bootstrap().await;
            if recovered.is_some() {
                session = recovered.clone();
            }
        }

        tracing::info!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path_and_query,
            rpc_method = self.rpc_method.as_deref().unwrap_or("-"),
            client_sid = self.client_session.as_deref().unwrap_or("-"),
            mapped_sid = self.mapped_session.as_deref().unwrap_or("-"),
            upstream_sid = session.as_deref().unwrap_or("-"),
            "Forwarding request"
        );

        let first = self.state.forwarder.send(self.outbound(session.as_deref())).await?;

        let ctx = RetryContext {
            protocol_write: self.kind() == RequestKind::ProtocolWrite,
            initialize_call: self.initialize_call(),
            client_session: self.client_session.is_some(),
            bootstrapped,
        };
        if !needs_bootstrap(policy.detection, &ctx, first.status, &first.body) {
            return Ok((first, recovered));
        }

        tracing::info!(
            request_id = %self.request_id,
            status = first.status.as_u16(),
            detection = %policy.detection,
            client_sid = self.client_session.as_deref().unwrap_or("-"),
            "Upstream reported missing session; bootstrapping"
        );

        let retry_session = match (policy.single_flight, self.client_session.as_deref()) {
            (true, Some(client)) => {
                let _permit = self.state.registry.acquire(client).await;
                match self.state.registry.lookup(client) {
                    Some(current) if Some(current.as_str()) != self.mapped_session.as_deref() => {
                        tracing::debug!(
                            request_id = %self.request_id,
                            client_sid = %client,
                            upstream_sid = %current,
                            "Session recovered by a concurrent request"
                        );
                        Some(current)
                    }
                    _ => self.recover(Some(client)).await,
                }
            }
            (_, client) => self.recover(client).await,
        };

        let Some(retry_session) = retry_session else {
            return Ok((first, None));
        };

        let retried = self.state.forwarder.send(self.outbound(Some(&retry_session))).await?;
        tracing::info!(
            request_id = %self.request_id,
            status = retried.status.as_u16(),
            upstream_sid = %retry_session,
            "Retried request with recovered session"
        );
        Ok((retried, Some(retry_session)))
    }

    async fn recover(&self, client: Option<&str>) -> Option<String> {
        let session_id = self.bootstrap().await?;
        self.state.registry.associate(client, &session_id);
        Some(session_id)
    }
}
