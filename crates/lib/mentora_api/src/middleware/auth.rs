//! Authentication middleware: runs every protected request through the
//! `AuthorizationGate` and injects the caller into request extensions.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use mentora_core::models::auth::{IdentityClaims, Role};

use crate::AppState;
use crate::error::AppError;

/// Key used to store the caller's claims in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub IdentityClaims);

/// Axum middleware: any authenticated caller.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate(&state, request, next, &[]).await
}

/// Axum middleware: caller must currently hold the `admin` role.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate(&state, request, next, &[Role::Admin]).await
}

async fn gate(
    state: &AppState,
    mut request: Request,
    next: Next,
    required: &[Role],
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let claims = state.gate.authorize(header.as_deref(), required).await?;
    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}
