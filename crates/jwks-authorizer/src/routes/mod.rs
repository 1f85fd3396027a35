//! HTTP routes for the authorizer.
//!
//! Defines the Axum router and application state.

use crate::authorizer::Authorizer;
use crate::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Decider shared by every request.
    pub authorizer: Arc<Authorizer>,

    /// Cancelled when a fatal key fetch requires the process to exit.
    pub fatal: CancellationToken,
}

/// Build the application routes.
///
/// - `POST /authorize` - Authorization decision
/// - `GET /health` - Liveness
/// - `GET /ready` - Readiness (a key set is cached)
/// - `GET /metrics` - Prometheus metrics
///
/// TraceLayer logs every request; requests time out after 30 seconds.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let app_routes = Router::new()
        .route("/authorize", post(handlers::authorize))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    app_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
