//! Authorization endpoint.

use crate::errors::FatalError;
use crate::models::{AuthorizerRequest, PolicyResponse};
use crate::routes::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;

/// Handler for POST /authorize
///
/// Replies 200 with the policy document for both Allow and Deny. A fatal key
/// fetch replies 500 and cancels the shutdown token so the process exits.
#[tracing::instrument(skip_all, name = "authorizer.http.authorize")]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AuthorizerRequest>,
) -> Result<Json<PolicyResponse>, FatalError> {
    let policy = state.authorizer.handle(&request).await.map_err(|e| {
        state.fatal.cancel();
        e
    })?;

    Ok(Json(policy))
}
