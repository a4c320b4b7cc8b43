//! Auth core configuration.

use std::fmt;

use chrono::Duration;

use crate::auth::AuthError;
use crate::auth::password::MIN_PRODUCTION_COST;

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Default number of consecutive failures before lockout.
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

/// Default lockout duration: 15 minutes.
pub const DEFAULT_LOCKOUT_SECS: i64 = 15 * 60;

/// Longest accepted session lifetime: 30 days.
pub const MAX_SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Longest accepted lockout duration: 1 day.
pub const MAX_LOCKOUT_SECS: i64 = 24 * 60 * 60;

/// Tunables for the authentication core.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens.
    pub jwt_secret: String,
    /// Session (and token) lifetime.
    pub session_ttl: Duration,
    /// Consecutive failures within `lockout_duration` that lock an account.
    pub max_failed_attempts: u32,
    /// How long a lockout lasts, and the window failures are counted in.
    pub lockout_duration: Duration,
    /// bcrypt work factor.
    pub bcrypt_cost: u32,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("max_failed_attempts", &self.max_failed_attempts)
            .field("lockout_duration", &self.lockout_duration)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl AuthConfig {
    /// Production defaults with the given signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_duration: Duration::seconds(DEFAULT_LOCKOUT_SECS),
            bcrypt_cost: MIN_PRODUCTION_COST,
        }
    }

    /// Reject settings that would weaken the deployment.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.len() < 32 {
            return Err(AuthError::Validation(
                "JWT secret must be at least 32 bytes".into(),
            ));
        }
        if self.session_ttl <= Duration::zero() {
            return Err(AuthError::Validation("session TTL must be positive".into()));
        }
        if self.session_ttl > Duration::seconds(MAX_SESSION_TTL_SECS) {
            return Err(AuthError::Validation(format!(
                "session TTL must not exceed {MAX_SESSION_TTL_SECS} seconds"
            )));
        }
        if self.max_failed_attempts == 0 {
            return Err(AuthError::Validation(
                "max failed attempts must be at least 1".into(),
            ));
        }
        if self.lockout_duration <= Duration::zero() {
            return Err(AuthError::Validation(
                "lockout duration must be positive".into(),
            ));
        }
        if self.lockout_duration > Duration::seconds(MAX_LOCKOUT_SECS) {
            return Err(AuthError::Validation(format!(
                "lockout duration must not exceed {MAX_LOCKOUT_SECS} seconds"
            )));
        }
        if self.bcrypt_cost < MIN_PRODUCTION_COST {
            return Err(AuthError::Validation(format!(
                "bcrypt cost must be at least {MIN_PRODUCTION_COST}"
            )));
        }
        Ok(())
    }
}
