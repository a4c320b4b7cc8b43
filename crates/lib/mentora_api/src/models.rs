//! Request and response bodies.

use mentora_core::models::auth::{Identity, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error body returned by every failing route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
}

/// `POST /auth/register` form.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

/// `POST /auth/login` form. OAuth2 password-flow clients send `username`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    pub fn login_email(&self) -> &str {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or_default()
    }
}

/// Public view of an identity.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub roles: Vec<Role>,
}

impl From<Identity> for UserResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email,
            name: identity.name,
            roles: identity.roles,
        }
    }
}

/// Successful register/login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResponse {
    pub removed: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_prefers_email_over_username() {
        let form = LoginForm {
            username: Some("u@example.com".into()),
            email: Some("e@example.com".into()),
            password: "pw".into(),
        };
        assert_eq!(form.login_email(), "e@example.com");

        let form = LoginForm {
            username: Some("u@example.com".into()),
            email: None,
            password: "pw".into(),
        };
        assert_eq!(form.login_email(), "u@example.com");

        let form = LoginForm {
            username: None,
            email: None,
            password: "pw".into(),
        };
        assert_eq!(form.login_email(), "");
    }
}
