//! Application error types.

use axum::{
    Json,
    extract::rejection::{FormRejection, JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mentora_core::auth::AuthError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("User already exists")]
    UserExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked")]
    AccountLocked,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Session expired")]
    SessionExpired,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database unavailable: {0}")]
    DbUnavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::UserExists => "USER_EXISTS",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::AccountLocked => "ACCOUNT_LOCKED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::SessionExpired => "SESSION_EXPIRED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DbUnavailable(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::UserExists => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::AccountLocked
            | AppError::InvalidToken
            | AppError::SessionExpired => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DbUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::InvalidRequest(m) | AppError::NotFound(m) => m.clone(),
            AppError::UserExists => "User already exists".into(),
            AppError::InvalidCredentials => "Invalid credentials".into(),
            AppError::AccountLocked => {
                "Account temporarily locked due to too many failed login attempts".into()
            }
            AppError::InvalidToken => "Invalid authentication credentials".into(),
            AppError::SessionExpired => "Session expired".into(),
            AppError::Forbidden => "Insufficient permissions".into(),
            AppError::DbUnavailable(detail) => {
                error!(error = %detail, "database unavailable");
                "Service temporarily unavailable, try again later".into()
            }
            AppError::Internal(detail) => {
                error!(error = %detail, "internal error");
                "Internal server error".into()
            }
        };
        let body = Json(ErrorResponse {
            error_code: self.error_code().to_string(),
            message,
        });
        (self.status(), body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::AccountLocked => AppError::AccountLocked,
            AuthError::UserExists => AppError::UserExists,
            AuthError::SessionExpired => AppError::SessionExpired,
            AuthError::InvalidToken => AppError::InvalidToken,
            AuthError::Forbidden => AppError::Forbidden,
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::Validation(msg) => AppError::InvalidRequest(msg),
            AuthError::Database(e) => AppError::DbUnavailable(e.to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<FormRejection> for AppError {
    fn from(e: FormRejection) -> Self {
        AppError::InvalidRequest(e.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::InvalidRequest(e.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        AppError::InvalidRequest(e.body_text())
    }
}
