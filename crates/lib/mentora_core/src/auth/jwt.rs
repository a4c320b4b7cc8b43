//! Bearer token encoding and verification (HS256 JWT).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use crate::clock::Clock;
use crate::models::auth::{IdentityClaims, Role};

/// Wire payload. Standard `sub`/`iat`/`exp` plus the identity snapshot and session id.
#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    sub: Uuid,
    email: String,
    name: String,
    roles: Vec<Role>,
    sid: Uuid,
    iat: i64,
    exp: i64,
}

/// A token whose signature and expiry have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub claims: IdentityClaims,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Signs and verifies bearer tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            clock,
        }
    }

    /// Sign `claims` with an expiry of now + `ttl`.
    pub fn encode(&self, claims: &IdentityClaims, ttl: Duration) -> Result<String, AuthError> {
        let expires_at = self.clock.now() + ttl;
        self.encode_until(claims, expires_at)
    }

    /// Sign `claims` with an explicit expiry, e.g. the owning session's `expires_at`.
    pub fn encode_until(
        &self,
        claims: &IdentityClaims,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let payload = TokenPayload {
            sub: claims.id,
            email: claims.email.clone(),
            name: claims.name.clone(),
            roles: claims.roles.clone(),
            sid: claims.session_id,
            iat: self.clock.now().timestamp(),
            exp: expires_at.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature, then expiry. Every failure is `InvalidToken`.
    pub fn decode(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        // jsonwebtoken checks the signature before deserialising the payload.
        // Expiry is checked here against the injected clock instead.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<TokenPayload>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "bearer token rejected");
            AuthError::InvalidToken
        })?;
        let payload = data.claims;

        if self.clock.now().timestamp() > payload.exp {
            debug!(sid = %payload.sid, "bearer token expired");
            return Err(AuthError::InvalidToken);
        }

        Ok(VerifiedToken {
            claims: IdentityClaims {
                id: payload.sub,
                email: payload.email,
                name: payload.name,
                roles: payload.roles,
                session_id: payload.sid,
            },
            issued_at: payload.iat,
            expires_at: payload.exp,
        })
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET_KEY` → `JWT_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    for var in ["JWT_SECRET_KEY", "JWT_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(error = %e, "could not create JWT secret directory");
    }
    match write_secret(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new JWT secret"),
        Err(e) => warn!(error = %e, "JWT secret not persisted; tokens will not survive restart"),
    }
    secret
}

/// Write the secret readable by the owner only.
fn write_secret(path: &Path, secret: &str) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(secret.as_bytes())
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mentora")
        .join("jwt-secret")
}
