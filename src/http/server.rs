//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (body limit, timeout, request ID, tracing, CORS)
//! - Record per-route request metrics
//! - Serve until the shutdown signal fires

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{HeaderName, HeaderValue, Method, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{BridgeConfig, CorsConfig};
use crate::error::BridgeError;
use crate::http::handlers;
use crate::lifecycle::shutdown::wait_for_shutdown;
use crate::observability::metrics;
use crate::pipeline::WorkerPool;
use crate::upstream::UpstreamClient;
use crate::workspace::WorkspaceRoot;

const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub client: UpstreamClient,
    pub workspaces: WorkspaceRoot,
    pub pool: WorkerPool,
}

impl AppState {
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        let client = UpstreamClient::new(&config.upstream)?;
        let workspaces = WorkspaceRoot::new(&config.storage.tmp_root);
        let pool = WorkerPool::new(config.pipeline.max_concurrent_jobs);
        Ok(Self {
            config: Arc::new(config),
            client,
            workspaces,
            pool,
        })
    }
}

/// HTTP server for the bridge.
pub struct HttpServer {
    router: Router,
    config: Arc<BridgeConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        let state = AppState::new(config)?;
        let config = state.config.clone();
        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &BridgeConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/fetch-model", post(handlers::fetch_model))
            .route("/api/model", post(handlers::model))
            .route("/api/getattributes", get(handlers::get_attributes))
            .route("/api/updateattributes", post(handlers::update_attributes))
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.uploads.max_upload_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(cors_layer(&config.cors))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// Router with state and layers, for serving or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            tmp_root = %self.config.storage.tmp_root,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;
    metrics::record_request(&route, response.status().as_u16(), start);
    response
}
