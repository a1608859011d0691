//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router accepting GET/POST/PUT/DELETE on every path
//! - Wire up middleware (request ID, tracing, body limit)
//! - Bind server to listener with graceful shutdown
//! - Forward each request through the retry executor

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, Uri},
    response::Response,
    routing::{on, MethodFilter},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::http::request::{log_inbound, normalize_headers, request_id, UuidRequestId};
use crate::http::response::reconstruct;
use crate::observability::metrics;
use crate::resilience::RetryExecutor;
use crate::upstream::{HttpUpstream, Upstream, UpstreamRequest, UpstreamTarget};

/// Application state injected into handlers. Read-only and shared.
#[derive(Clone)]
pub struct AppState {
    pub target: Arc<UpstreamTarget>,
    pub executor: RetryExecutor,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a server talking to the configured upstream over HTTP.
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let credential = config
            .credential()
            .cloned()
            .ok_or(ProxyError::MissingCredential)?;
        let upstream = HttpUpstream::new(&config.upstream, &config.timeouts, credential)?;
        Self::with_upstream(config, Arc::new(upstream))
    }

    /// Create a server with a custom upstream implementation.
    pub fn with_upstream(config: ProxyConfig, upstream: Arc<dyn Upstream>) -> Result<Self> {
        let target =
            UpstreamTarget::from_config(&config.upstream).ok_or(ProxyError::MissingCredential)?;

        let state = AppState {
            target: Arc::new(target),
            executor: RetryExecutor::new(upstream, config.retries.clone()),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config: Arc::new(config),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let methods = MethodFilter::GET
            .or(MethodFilter::POST)
            .or(MethodFilter::PUT)
            .or(MethodFilter::DELETE);

        Router::new()
            .route("/", on(methods, proxy_handler))
            .route("/{*path}", on(methods, proxy_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.limits.max_body_bytes))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let addr = listener.local_addr().map_err(ProxyError::Serve)?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await
            .map_err(ProxyError::Serve)?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler.
/// Normalizes the request, runs the retry loop, rebuilds the response.
async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = tracing::info_span!(
        "proxy",
        request_id = %request_id(&headers),
        method = %method,
        path = %uri.path(),
    );
    forward(state, method, uri, headers, body)
        .instrument(span)
        .await
}

async fn forward(
    state: AppState,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start_time = Instant::now();
    let path = uri.path();
    let query = uri.query();

    log_inbound(&method, path, &headers);

    let request = UpstreamRequest {
        method: method.clone(),
        url: state.target.url_for(path, query),
        headers: normalize_headers(&headers),
        body,
    };
    tracing::info!(
        target_url = %state.target.display_for(path, query),
        "Proxying request"
    );

    let report = state.executor.execute(&request).await;
    let response = reconstruct(report.terminal, state.target.credential());

    tracing::info!(
        status = response.status().as_u16(),
        attempts = report.attempts,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Request completed"
    );
    metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
    response
}
