//! Health endpoint.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /api/health`: version and store reachability.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_up = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "health check: store unreachable");
            false
        }
    };

    Json(HealthResponse {
        status: if store_up { "ok" } else { "degraded" }.into(),
        version: mentora_core::version().into(),
        store: if store_up { "up" } else { "down" }.into(),
    })
}
