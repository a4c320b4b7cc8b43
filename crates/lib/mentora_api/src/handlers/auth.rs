//! Authentication request handlers.

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{Extension, Form, Json};
use mentora_core::auth::AuthSession;
use mentora_core::auth::gate::bearer_token;
use mentora_core::models::auth::IdentityClaims;
use tracing::warn;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{LoginForm, MessageResponse, RegisterForm, TokenResponse};

fn token_response(session: AuthSession) -> TokenResponse {
    TokenResponse {
        access_token: session.token,
        token_type: "bearer".into(),
        expires_in: session.expires_in,
        user: session.identity.into(),
    }
}

/// `POST /auth/register`: create an account and start its first session.
pub async fn register_handler(
    State(state): State<AppState>,
    form: Result<Form<RegisterForm>, FormRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Form(body) = form?;
    let session = state
        .auth
        .register(&body.email, &body.password, &body.name)
        .await?;
    Ok(Json(token_response(session)))
}

/// `POST /auth/login`: authenticate with email (or `username`) + password.
pub async fn login_handler(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Form(body) = form?;
    let session = state
        .auth
        .authenticate(body.login_email(), &body.password)
        .await?;
    Ok(Json(token_response(session)))
}

/// `POST /auth/logout`: end the bearer's session. Always succeeds.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<MessageResponse> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);
    if let Some(token) = token
        && let Err(e) = state.auth.logout_token(token).await
    {
        warn!(error = %e, "logout could not invalidate session");
    }
    Json(MessageResponse::new("Successfully logged out"))
}

/// `GET /auth/me`: the caller's token claims.
pub async fn me_handler(
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> Json<IdentityClaims> {
    Json(claims)
}
