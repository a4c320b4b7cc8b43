//! In-memory store with the same semantics as `PgStore`.
//!
//! Used by tests and by the server's `--memory-store` development mode. Nothing
//! survives a restart.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::{IdentityStore, SessionRepository, StoreError, StoreResult};
use crate::models::auth::{
    FailedAttempts, IdentityRecord, IdentityUpdate, NewIdentity, SessionRecord,
};

/// DashMap-backed store. Cloning shares the underlying maps.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    identities: Arc<DashMap<Uuid, IdentityRecord>>,
    by_email: Arc<DashMap<String, Uuid>>,
    sessions: Arc<DashMap<Uuid, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored session rows, live or not.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Run `f` against the identity registered under `email`, if any.
    fn with_identity_mut<R>(
        &self,
        email: &str,
        f: impl FnOnce(&mut IdentityRecord) -> R,
    ) -> Option<R> {
        let id = *self.by_email.get(email)?.value();
        self.identities.get_mut(&id).map(|mut rec| f(rec.value_mut()))
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        Ok(self.by_email.contains_key(email))
    }

    async fn insert_identity(&self, identity: NewIdentity) -> StoreResult<IdentityRecord> {
        // The email index entry is the uniqueness constraint.
        match self.by_email.entry(identity.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!(
                "identity email {}",
                identity.email
            ))),
            Entry::Vacant(slot) => {
                let record = IdentityRecord {
                    id: identity.id,
                    email: identity.email,
                    name: identity.name,
                    password_hash: identity.password_hash,
                    roles: identity.roles,
                    failed_attempts: 0,
                    last_failed_attempt: None,
                    created_at: identity.created_at,
                    updated_at: identity.created_at,
                };
                self.identities.insert(record.id, record.clone());
                slot.insert(record.id);
                Ok(record)
            }
        }
    }

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
        Ok(self
            .by_email
            .get(email)
            .and_then(|id| self.identities.get(id.value()).map(|r| r.value().clone())))
    }

    async fn find_identity_by_id(&self, id: Uuid) -> StoreResult<Option<IdentityRecord>> {
        Ok(self.identities.get(&id).map(|r| r.value().clone()))
    }

    async fn list_identities(&self) -> StoreResult<Vec<IdentityRecord>> {
        let mut all: Vec<IdentityRecord> =
            self.identities.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn update_identity(
        &self,
        id: Uuid,
        update: &IdentityUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<IdentityRecord>> {
        Ok(self.identities.get_mut(&id).map(|mut entry| {
            let rec = entry.value_mut();
            if let Some(name) = &update.name {
                rec.name = name.clone();
            }
            if let Some(roles) = &update.roles {
                rec.roles = roles.clone();
            }
            rec.updated_at = now;
            rec.clone()
        }))
    }

    async fn delete_identity(&self, id: Uuid) -> StoreResult<bool> {
        let Some((_, rec)) = self.identities.remove(&id) else {
            return Ok(false);
        };
        self.by_email.remove(&rec.email);
        self.sessions.retain(|_, s| s.identity_id != id);
        Ok(true)
    }

    async fn failed_attempts(&self, email: &str) -> StoreResult<Option<FailedAttempts>> {
        Ok(self.with_identity_mut(email, |rec| FailedAttempts {
            count: rec.failed_attempts,
            last_failed_at: rec.last_failed_attempt,
        }))
    }

    async fn record_failed_attempt(
        &self,
        email: &str,
        at: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.with_identity_mut(email, |rec| {
            rec.failed_attempts = match rec.last_failed_attempt {
                Some(last) if last > window_start => rec.failed_attempts.saturating_add(1),
                _ => 1,
            };
            rec.last_failed_attempt = Some(at);
        });
        Ok(())
    }

    async fn reset_failed_attempts(&self, email: &str) -> StoreResult<()> {
        self.with_identity_mut(email, |rec| {
            rec.failed_attempts = 0;
            rec.last_failed_attempt = None;
        });
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_session(&self, session: &SessionRecord) -> StoreResult<()> {
        if !self.identities.contains_key(&session.identity_id) {
            return Err(StoreError::Corrupt(format!(
                "session {} references unknown identity {}",
                session.id, session.identity_id
            )));
        }
        match self.sessions.entry(session.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!("session {}", session.id))),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn session_is_live(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .sessions
            .get(&id)
            .is_some_and(|s| s.value().expires_at > now))
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.sessions.remove(&id).is_some())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
