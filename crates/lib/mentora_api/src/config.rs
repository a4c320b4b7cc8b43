//! API server configuration.

use mentora_core::auth::jwt::resolve_jwt_secret;
use mentora_core::config::AuthConfig;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Token, session and lockout settings.
    pub auth: AuthConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                         | Default                              |
    /// |----------------------------------|--------------------------------------|
    /// | `BIND_ADDR`                      | `127.0.0.1:3100`                     |
    /// | `DATABASE_URL`                   | `postgres://localhost:5432/mentora`  |
    /// | `JWT_SECRET_KEY` / `JWT_SECRET`  | generated & persisted to file        |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/mentora".into()),
            auth: AuthConfig::new(resolve_jwt_secret()),
        }
    }
}
