//! Authentication and authorization logic.
//!
//! Provides password hashing, bearer tokens, sessions, lockout tracking, the
//! orchestrating `AuthService`, and the `AuthorizationGate` every protected
//! route goes through.

pub mod gate;
pub mod jwt;
pub mod lockout;
pub mod password;
pub mod service;
pub mod session;

use thiserror::Error;

use crate::store::StoreError;

pub use gate::AuthorizationGate;
pub use service::{AuthService, AuthSession};

/// Authentication errors.
///
/// `InvalidCredentials` covers both an unknown email and a wrong password so
/// callers cannot tell them apart.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account temporarily locked after repeated failed attempts")]
    AccountLocked,

    #[error("User already exists")]
    UserExists,

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[source] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Db(_) => AuthError::Database(e),
            StoreError::Duplicate(msg) | StoreError::Corrupt(msg) => AuthError::Internal(msg),
        }
    }
}
