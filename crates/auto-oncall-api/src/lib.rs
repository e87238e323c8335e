//! # Auto-Oncall API
//!
//! HTTP surface of the webhook service:
//!
//! - `POST {webhook.path}` verifies a GitHub delivery, answers immediately,
//!   and hands the verified envelope to a background task
//! - `GET /` identifies the service
//! - `GET /health` reports liveness
//! - `GET /metrics` exposes Prometheus metrics
//!
//! The webhook response never depends on the outcome of routing; callers
//! only learn whether the delivery was authentic and well-formed.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use auto_oncall_core::{WebhookHeaders, WebhookPipeline, WebhookRequest};
use bytes::Bytes;
use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn, Instrument};

pub mod config;
pub mod errors;
pub mod janitor;
pub mod metrics;
pub mod responses;
pub mod tasks;
pub mod wiring;

pub use config::{ServerConfig, ServiceConfig};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use janitor::{run_janitor, sweep_once};
pub use metrics::ServiceMetrics;
pub use responses::{HealthResponse, ServiceStatusResponse, WebhookResponse};
pub use tasks::{BackgroundTasks, ShutdownReport};
pub use wiring::{build_components, build_http_client, Components};

/// Name reported by `GET /`
pub const SERVICE_STATUS: &str = "webhook handler";

/// Header carrying the per-request correlation id
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub pipeline: Arc<WebhookPipeline>,
    pub tasks: BackgroundTasks,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        pipeline: Arc<WebhookPipeline>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
            tasks: BackgroundTasks::new(metrics.background_tasks_in_flight.clone()),
            metrics,
        }
    }
}

// ============================================================================
// Router and Server
// ============================================================================

/// Create the HTTP router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route(
        &state.config.webhook.path,
        post(handle_webhook).fallback(reject_method),
    );

    let service_routes = Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(webhook_routes)
        .merge(service_routes)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Serve until SIGINT/SIGTERM, then drain background work.
pub async fn start_server(
    config: ServiceConfig,
    pipeline: Arc<WebhookPipeline>,
    metrics: Arc<ServiceMetrics>,
) -> Result<(), ServiceError> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::new(config, pipeline, metrics);
    let tasks = state.tasks.clone();
    let app = create_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server stopped; draining background tasks");
    let report = tasks.shutdown(grace).await;
    info!(
        completed = report.completed,
        abandoned = report.abandoned,
        "Shutdown complete"
    );

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Verify a delivery and schedule its processing.
///
/// Responds before any remote call is made.
#[instrument(skip_all)]
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    state.metrics.webhook_requests_total.inc();

    let envelope = match accept_delivery(&state, &headers, body) {
        Ok(envelope) => envelope,
        Err(e) => {
            state.metrics.webhook_rejections_total.inc();
            return Err(e);
        }
    };

    if let Some(envelope) = envelope {
        let pipeline = state.pipeline.clone();
        let metrics = state.metrics.clone();
        state.tasks.spawn(
            async move {
                let started = Instant::now();
                let outcome = pipeline.process(envelope).await;
                metrics
                    .pipeline_duration_seconds
                    .observe(started.elapsed().as_secs_f64());
                metrics.record_outcome(&outcome);
            }
            .in_current_span(),
        );
    }

    Ok(Json(WebhookResponse::accepted()))
}

fn accept_delivery(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Option<auto_oncall_core::WebhookEnvelope>, WebhookHandlerError> {
    let header_map: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_lowercase(),
                v.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    let webhook_headers = WebhookHeaders::from_http_headers(&header_map)?;
    let request = WebhookRequest::new(webhook_headers, body);

    Ok(state.pipeline.accept(request)?)
}

async fn reject_method(method: Method) -> WebhookHandlerError {
    WebhookHandlerError::MethodNotAllowed {
        method: method.to_string(),
    }
}

async fn handle_root() -> Json<ServiceStatusResponse> {
    Json(ServiceStatusResponse {
        status: SERVICE_STATUS.to_string(),
    })
}

async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        in_flight: state.tasks.len(),
    })
}

async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to render metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Attach a correlation id to every request and log its completion
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(correlation_id.clone());

    let span = tracing::info_span!("request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
