//! Liveness and readiness handlers.

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

/// Liveness probe handler.
///
/// Returns "OK" while the process is serving.
#[tracing::instrument(skip_all, name = "authorizer.health.liveness")]
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Ready once a key set is cached. A stale set is reported but still counts
/// as ready; the next authorization request refreshes it.
#[tracing::instrument(skip_all, name = "authorizer.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let key_cache = state.authorizer.key_cache();
    match key_cache.snapshot().await {
        Some(snapshot) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready".to_string(),
                key_count: Some(snapshot.key_count),
                fetched_at: Some(snapshot.fetched_at.to_rfc3339()),
                age_seconds: Some(snapshot.age.as_secs()),
                stale: Some(snapshot.age >= key_cache.ttl()),
            }),
        ),
        None => {
            tracing::warn!(target: "authorizer.health", "Readiness check failed: no key set cached");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready".to_string(),
                    key_count: None,
                    fetched_at: None,
                    age_seconds: None,
                    stale: None,
                }),
            )
        }
    }
}
