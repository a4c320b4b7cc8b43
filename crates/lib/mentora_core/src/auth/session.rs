//! Server-side session records.
//!
//! A session is valid exactly while its row exists and `expires_at > now`.
//! There is no revoked flag: invalidation deletes the row.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::AuthError;
use crate::clock::Clock;
use crate::ids::new_session_id;
use crate::models::auth::SessionRecord;
use crate::store::AuthStore;

#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Insert a fresh session for `identity_id` lasting `ttl`.
    pub async fn create(&self, identity_id: Uuid, ttl: Duration) -> Result<SessionRecord, AuthError> {
        if ttl <= Duration::zero() {
            return Err(AuthError::Validation("session TTL must be positive".into()));
        }
        let now = self.clock.now();
        let session = SessionRecord {
            id: new_session_id(),
            identity_id,
            created_at: now,
            expires_at: now + ttl,
        };
        self.store.insert_session(&session).await?;
        debug!(session_id = %session.id, %identity_id, "session created");
        Ok(session)
    }

    /// Single point query: row exists and has not expired.
    pub async fn verify(&self, session_id: Uuid) -> Result<bool, AuthError> {
        Ok(self
            .store
            .session_is_live(session_id, self.clock.now())
            .await?)
    }

    /// Delete the session. Deleting an unknown session is not an error.
    pub async fn invalidate(&self, session_id: Uuid) -> Result<(), AuthError> {
        let removed = self.store.delete_session(session_id).await?;
        debug!(%session_id, removed, "session invalidated");
        Ok(())
    }

    /// Remove expired rows. `verify` already ignores them; this only reclaims space.
    pub async fn sweep_expired(&self) -> Result<u64, AuthError> {
        let removed = self.store.delete_expired_sessions(self.clock.now()).await?;
        if removed > 0 {
            info!(removed, "expired sessions swept");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::models::auth::{NewIdentity, Role};
    use crate::store::{IdentityStore, MemoryStore};

    async fn setup() -> (SessionStore, Uuid, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let identity = store
            .insert_identity(NewIdentity {
                id: Uuid::now_v7(),
                email: "alice@example.com".into(),
                name: "Alice".into(),
                password_hash: "x".into(),
                roles: vec![Role::User],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        (
            SessionStore::new(store.clone(), clock.clone()),
            identity.id,
            store,
            clock,
        )
    }

    #[tokio::test]
    async fn valid_until_expiry_then_invalid() {
        let (sessions, identity_id, _, clock) = setup().await;
        let s = sessions.create(identity_id, Duration::hours(24)).await.unwrap();
        assert!(s.expires_at > s.created_at);
        assert!(sessions.verify(s.id).await.unwrap());

        clock.advance(Duration::hours(24) - Duration::seconds(1));
        assert!(sessions.verify(s.id).await.unwrap());

        // expires_at itself is no longer valid: validity is expires_at > now
        clock.advance(Duration::seconds(1));
        assert!(!sessions.verify(s.id).await.unwrap());
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let (sessions, identity_id, _, _) = setup().await;
        let s = sessions.create(identity_id, Duration::hours(1)).await.unwrap();
        sessions.invalidate(s.id).await.unwrap();
        assert!(!sessions.verify(s.id).await.unwrap());
        sessions.invalidate(s.id).await.unwrap();
        sessions.invalidate(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn sessions_get_distinct_ids() {
        let (sessions, identity_id, _, _) = setup().await;
        let a = sessions.create(identity_id, Duration::hours(1)).await.unwrap();
        let b = sessions.create(identity_id, Duration::hours(1)).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let (sessions, identity_id, store, clock) = setup().await;
        let short = sessions.create(identity_id, Duration::minutes(5)).await.unwrap();
        let long = sessions.create(identity_id, Duration::hours(5)).await.unwrap();
        clock.advance(Duration::minutes(10));

        assert_eq!(sessions.sweep_expired().await.unwrap(), 1);
        assert_eq!(store.session_count(), 1);
        assert!(!sessions.verify(short.id).await.unwrap());
        assert!(sessions.verify(long.id).await.unwrap());
    }

    #[tokio::test]
    async fn non_positive_ttl_is_rejected() {
        let (sessions, identity_id, _, _) = setup().await;
        let err = sessions.create(identity_id, Duration::zero()).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
