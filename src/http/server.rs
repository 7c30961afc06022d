//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the edge handler
//! - Wire up middleware (request ID, tracing, panic recovery)
//! - Bind server to listener and serve until shutdown
//! - Dispatch requests to discovery, streaming or buffered handling

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::CompatConfig;
use crate::error::{panic_response, ProxyError};
use crate::http::discovery;
use crate::http::pipeline;
use crate::http::request::{request_id, request_id_header, UuidRequestId};
use crate::observability::metrics;
use crate::session::SessionRegistry;
use crate::upstream::Forwarder;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Forwarder,
    pub registry: SessionRegistry,
    pub config: Arc<CompatConfig>,
}

/// HTTP server for the compatibility proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: CompatConfig) -> Result<Self, ProxyError> {
        let forwarder = Forwarder::new(&config.upstream)?;
        let state = AppState {
            forwarder,
            registry: SessionRegistry::new(),
            config: Arc::new(config),
        };

        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let header = request_id_header();

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(header.clone(), UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(header))
                    .layer(CatchPanicLayer::custom(panic_response)),
            )
    }

    /// The router, for driving the proxy without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Session mappings held by this server.
    pub fn registry(&self) -> &SessionRegistry {
        &self.state.registry
    }

    pub fn config(&self) -> &CompatConfig {
        &self.state.config
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.state.config.upstream.authority(),
            detection = %self.state.config.session.detection,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Edge handler: discovery, streaming passthrough or the buffered pipeline.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(request.headers()).to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Proxying request"
    );

    let result = if discovery::is_discovery_path(&state.config.discovery, &path) {
        Ok(discovery::discovery_response(&state.config.discovery))
    } else if method == Method::GET {
        pipeline::stream(&state, request).await
    } else {
        pipeline::buffered(&state, request).await
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, path = %path, error = %e, "Request failed");
            e.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
    response
}
