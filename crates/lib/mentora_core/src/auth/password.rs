//! Password hashing via bcrypt.
//!
//! The hash string is self-describing (`$2b$<cost>$<salt><digest>`), so
//! verification needs nothing but the stored value. Hashing is CPU-bound and
//! deliberately slow; the async entry points run it on the blocking pool so no
//! store connection is held while it computes.

use tracing::warn;

use super::AuthError;

/// Lowest cost accepted by `AuthConfig::validate`.
pub const MIN_PRODUCTION_COST: u32 = 12;

/// bcrypt ignores input past 72 bytes; longer passwords are rejected instead.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hashes and verifies passwords at a fixed work factor.
#[derive(Clone, Debug)]
pub struct PasswordHasher {
    cost: u32,
    /// Hash of a throwaway password, verified against when an email is
    /// unknown so that path costs the same as a wrong password.
    dummy_hash: String,
}

impl PasswordHasher {
    /// Build a hasher. `cost` must be in bcrypt's accepted range (4..=31);
    /// production configs are held to `MIN_PRODUCTION_COST` by `AuthConfig`.
    pub fn new(cost: u32) -> Result<Self, AuthError> {
        let dummy_hash = hash_with_cost("mentora-dummy-password", cost)?;
        Ok(Self { cost, dummy_hash })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password (blocking).
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        hash_with_cost(password, self.cost)
    }

    /// Verify a password against a stored hash (blocking).
    ///
    /// Never fails: a malformed stored hash is logged and treated as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match bcrypt::verify(password, hash) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "stored password hash is malformed");
                false
            }
        }
    }

    /// Burn the same work as a real verification and return `false`.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let _ = bcrypt::verify(password, &self.dummy_hash);
        false
    }

    /// `hash` on the blocking pool.
    pub async fn hash_async(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hash task: {e}")))?
    }

    /// `verify` on the blocking pool. `None` for `hash` runs the dummy verification.
    pub async fn verify_async(&self, password: &str, hash: Option<&str>) -> Result<bool, AuthError> {
        let hasher = self.clone();
        let password = password.to_owned();
        let hash = hash.map(str::to_owned);
        tokio::task::spawn_blocking(move || match hash {
            Some(h) => hasher.verify(&password, &h),
            None => hasher.verify_dummy(&password),
        })
        .await
        .map_err(|e| AuthError::Internal(format!("verify task: {e}")))
    }
}

fn hash_with_cost(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let h = hasher();
        let hash = h.hash("pw123").unwrap();
        assert!(h.verify("pw123", &hash));
        assert!(!h.verify("pw124", &hash));
        assert!(!h.verify("", &hash));
    }

    #[test]
    fn hash_is_salted_and_versioned() {
        let h = hasher();
        let a = h.hash("same").unwrap();
        let b = h.hash("same").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$2b$04$"));
    }

    #[test]
    fn production_cost_is_encoded() {
        let h = PasswordHasher::new(MIN_PRODUCTION_COST).unwrap();
        assert!(h.hash("pw").unwrap().starts_with("$2b$12$"));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        let h = hasher();
        assert!(!h.verify("pw", "not-a-bcrypt-hash"));
        assert!(!h.verify("pw", ""));
    }

    #[test]
    fn out_of_range_cost_is_an_error() {
        assert!(PasswordHasher::new(2).is_err());
    }

    #[tokio::test]
    async fn async_paths_agree_with_blocking() {
        let h = hasher();
        let hash = h.hash_async("pw123").await.unwrap();
        assert!(h.verify_async("pw123", Some(&hash)).await.unwrap());
        assert!(!h.verify_async("nope", Some(&hash)).await.unwrap());
        assert!(!h.verify_async("pw123", None).await.unwrap());
    }
}
