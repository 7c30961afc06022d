//! Single-upstream HTTP client.

use std::str::FromStr;

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::uri::{Authority, Scheme};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::http::headers;

/// A fully described request for upstream.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Session id announced by upstream, if any.
    pub fn session_id(&self) -> Option<&str> {
        headers::session_id(&self.headers)
    }

    /// Declared content type; blank values count as absent.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
    }
}

/// Relays requests to the fixed upstream address.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    authority: Authority,
    host: HeaderValue,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ProxyError> {
        let authority_str = config.authority();
        let authority = Authority::from_str(&authority_str).map_err(axum::http::Error::from)?;
        let host = HeaderValue::from_str(&authority_str).map_err(axum::http::Error::from)?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            authority,
            host,
        })
    }

    /// Value rewritten into the outbound `Host` header.
    pub fn host(&self) -> &HeaderValue {
        &self.host
    }

    fn uri(&self, path_and_query: &str) -> Result<Uri, ProxyError> {
        Ok(Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?)
    }

    /// One request/response exchange with the response body buffered.
    pub async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, ProxyError> {
        let mut upstream = Request::builder()
            .method(request.method)
            .uri(self.uri(&request.path_and_query)?)
            .body(Body::from(request.body))?;
        *upstream.headers_mut() = request.headers;

        let response = self.client.request(upstream).await?;
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), usize::MAX)
            .await
            .map_err(ProxyError::UpstreamBody)?;

        Ok(UpstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Pipe a request through without buffering either body.
    pub async fn stream(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Body,
    ) -> Result<Response<Body>, ProxyError> {
        let mut upstream = Request::builder()
            .method(method)
            .uri(self.uri(path_and_query)?)
            .body(body)?;
        *upstream.headers_mut() = headers;

        let response = self.client.request(upstream).await?;
        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
