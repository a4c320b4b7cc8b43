//! Admin maintenance handlers.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::models::SweepResponse;

/// `DELETE /admin/sessions/expired`: purge expired session rows.
pub async fn sweep_sessions_handler(State(state): State<AppState>) -> AppResult<Json<SweepResponse>> {
    let removed = state.auth.sessions().sweep_expired().await?;
    Ok(Json(SweepResponse { removed }))
}
