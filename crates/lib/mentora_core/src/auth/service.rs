//! Authentication service: registration, login, current-user resolution, logout.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::AuthError;
use super::jwt::TokenCodec;
use super::lockout::{AccountGuard, LockoutPolicy};
use super::password::{MAX_PASSWORD_BYTES, PasswordHasher};
use super::session::SessionStore;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::ids::new_identity_id;
use crate::models::auth::{Identity, IdentityClaims, IdentityRecord, NewIdentity, Role};
use crate::store::{AuthStore, StoreError};

/// Result of a successful registration or login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub identity: Identity,
    pub session_id: Uuid,
    /// Seconds until the session and token expire.
    pub expires_in: i64,
}

/// Orchestrates hashing, lockout, sessions and tokens over an injected store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    hasher: PasswordHasher,
    codec: TokenCodec,
    sessions: SessionStore,
    guard: AccountGuard,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
}

impl AuthService {
    /// Build the service. Computes one bcrypt hash up front (the dummy hash used
    /// for unknown emails), so call it once at startup.
    pub fn new(
        store: Arc<dyn AuthStore>,
        clock: Arc<dyn Clock>,
        config: &AuthConfig,
    ) -> Result<Self, AuthError> {
        let hasher = PasswordHasher::new(config.bcrypt_cost)?;
        let codec = TokenCodec::new(config.jwt_secret.as_bytes(), clock.clone());
        let sessions = SessionStore::new(store.clone(), clock.clone());
        let guard = AccountGuard::new(
            store.clone(),
            clock.clone(),
            LockoutPolicy {
                max_failed_attempts: config.max_failed_attempts,
                lockout_duration: config.lockout_duration,
            },
        );
        Ok(Self {
            store,
            hasher,
            codec,
            sessions,
            guard,
            clock,
            session_ttl: config.session_ttl,
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Create an identity with the `user` role and start its first session.
    ///
    /// Identity insert and session creation are independent steps: if the
    /// session cannot be created the identity still exists and can log in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthSession, AuthError> {
        validate_email(email)?;
        validate_password(password)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("Name is required".into()));
        }

        if self.store.email_exists(email).await? {
            return Err(AuthError::UserExists);
        }

        // Hash between store round trips, never during one.
        let password_hash = self.hasher.hash_async(password).await?;

        let record = self
            .store
            .insert_identity(NewIdentity {
                id: new_identity_id(),
                email: email.to_string(),
                name: name.to_string(),
                password_hash,
                roles: vec![Role::User],
                created_at: self.clock.now(),
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent registration.
                StoreError::Duplicate(_) => AuthError::UserExists,
                other => AuthError::from(other),
            })?;
        info!(identity_id = %record.id, "identity registered");

        self.start_session(&record).await
    }

    /// Check credentials and start a new session.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        if self.guard.is_locked(email).await? {
            warn!(email, "login rejected: account locked");
            return Err(AuthError::AccountLocked);
        }

        let record = self.store.find_identity_by_email(email).await?;

        // Unknown emails and over-long passwords still pay for one bcrypt
        // verification so every rejection looks the same from outside.
        let stored_hash = record
            .as_ref()
            .filter(|_| password.len() <= MAX_PASSWORD_BYTES)
            .map(|r| r.password_hash.as_str());
        let matched = self.hasher.verify_async(password, stored_hash).await?;

        let record = match record {
            Some(r) if matched => r,
            _ => {
                self.guard.record_failure(email).await?;
                warn!(email, "login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.guard.reset(email).await?;
        info!(identity_id = %record.id, "identity authenticated");
        self.start_session(&record).await
    }

    /// Decode the bearer token and confirm its session still exists.
    pub async fn resolve_current_user(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let verified = self.codec.decode(token)?;
        if !self.sessions.verify(verified.claims.session_id).await? {
            return Err(AuthError::SessionExpired);
        }
        Ok(verified.claims)
    }

    /// Current identity row for already-resolved claims, for decisions that
    /// must not trust roles snapshotted into the token.
    pub async fn resolve_live_identity(&self, claims: &IdentityClaims) -> Result<Identity, AuthError> {
        self.store
            .find_identity_by_id(claims.id)
            .await?
            .map(|r| r.to_identity())
            .ok_or(AuthError::SessionExpired)
    }

    /// End a session. Always succeeds for unknown ids.
    pub async fn logout(&self, session_id: Uuid) -> Result<(), AuthError> {
        self.sessions.invalidate(session_id).await
    }

    /// End the session named by a bearer token. Unreadable tokens are ignored.
    pub async fn logout_token(&self, token: &str) -> Result<(), AuthError> {
        match self.codec.decode(token) {
            Ok(verified) => self.logout(verified.claims.session_id).await,
            Err(_) => Ok(()),
        }
    }

    async fn start_session(&self, record: &IdentityRecord) -> Result<AuthSession, AuthError> {
        let session = self.sessions.create(record.id, self.session_ttl).await?;
        let claims = IdentityClaims {
            id: record.id,
            email: record.email.clone(),
            name: record.name.clone(),
            roles: record.roles.clone(),
            session_id: session.id,
        };
        let token = self.codec.encode_until(&claims, session.expires_at)?;
        Ok(AuthSession {
            token,
            identity: record.to_identity(),
            session_id: session.id,
            expires_in: (session.expires_at - session.created_at).num_seconds(),
        })
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::Validation("Email is required".into()));
    }
    if email.trim() != email {
        return Err(AuthError::Validation("Email is not valid".into()));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::Validation("Email is not valid".into())),
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::Validation("Password is required".into()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}
