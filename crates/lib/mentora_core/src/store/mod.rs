//! Storage seam for identities and sessions.
//!
//! Components receive an `Arc<dyn AuthStore>` at construction. `PgStore` is the
//! production implementation; `MemoryStore` backs tests and local development.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{
    FailedAttempts, IdentityRecord, IdentityUpdate, NewIdentity, SessionRecord,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// A row could not be mapped to a domain record.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Identity persistence.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Exact, case-sensitive email match.
    async fn email_exists(&self, email: &str) -> StoreResult<bool>;

    /// Insert a new identity. Fails with `StoreError::Duplicate` if the email is taken.
    async fn insert_identity(&self, identity: NewIdentity) -> StoreResult<IdentityRecord>;

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>>;

    async fn find_identity_by_id(&self, id: Uuid) -> StoreResult<Option<IdentityRecord>>;

    /// All identities, oldest first.
    async fn list_identities(&self) -> StoreResult<Vec<IdentityRecord>>;

    /// Apply a partial update, returning the updated row if it exists.
    async fn update_identity(
        &self,
        id: Uuid,
        update: &IdentityUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<IdentityRecord>>;

    /// Delete an identity and its sessions. Returns whether a row was removed.
    async fn delete_identity(&self, id: Uuid) -> StoreResult<bool>;

    /// Failed-attempt state for an email, `None` if no such identity.
    async fn failed_attempts(&self, email: &str) -> StoreResult<Option<FailedAttempts>>;

    /// Count a failed attempt at `at`. A previous failure at or before
    /// `window_start` no longer counts, so the counter restarts at 1.
    async fn record_failed_attempt(
        &self,
        email: &str,
        at: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn reset_failed_attempts(&self, email: &str) -> StoreResult<()>;
}

/// Session persistence.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: &SessionRecord) -> StoreResult<()>;

    /// True if the session row exists and `expires_at > now`.
    async fn session_is_live(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Delete a session. Returns whether a row was removed.
    async fn delete_session(&self, id: Uuid) -> StoreResult<bool>;

    /// Delete every session with `expires_at <= now`.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Cheap reachability probe.
    async fn ping(&self) -> StoreResult<()>;
}

/// The full store handle injected into auth components.
pub trait AuthStore: IdentityStore + SessionRepository {}

impl<T: IdentityStore + SessionRepository> AuthStore for T {}
