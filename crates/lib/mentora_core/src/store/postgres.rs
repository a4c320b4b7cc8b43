//! PostgreSQL store.
//!
//! Each method is a single statement, so every mutation is atomic on its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use super::{IdentityStore, SessionRepository, StoreError, StoreResult};
use crate::models::auth::{
    FailedAttempts, IdentityRecord, IdentityUpdate, NewIdentity, Role, SessionRecord,
};

const IDENTITY_COLUMNS: &str = "id, email, name, password_hash, roles, failed_attempts, \
     last_failed_attempt, created_at, updated_at";

/// PostgreSQL error code for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Store backed by a `PgPool`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    roles: Vec<String>,
    failed_attempts: i32,
    last_failed_attempt: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for IdentityRecord {
    type Error = StoreError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let roles = row
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Corrupt(format!("identity {}: {e}", row.id)))?;
        Ok(IdentityRecord {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            roles,
            failed_attempts: u32::try_from(row.failed_attempts).unwrap_or(0),
            last_failed_attempt: row.last_failed_attempt,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn role_names(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM identities WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert_identity(&self, identity: NewIdentity) -> StoreResult<IdentityRecord> {
        let sql = format!(
            "INSERT INTO identities (id, email, name, password_hash, roles, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {IDENTITY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.name)
            .bind(&identity.password_hash)
            .bind(role_names(&identity.roles))
            .bind(identity.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate(format!("identity email {}", identity.email))
                } else {
                    StoreError::Db(e)
                }
            })?;
        row.try_into()
    }

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1");
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(IdentityRecord::try_from).transpose()
    }

    async fn find_identity_by_id(&self, id: Uuid) -> StoreResult<Option<IdentityRecord>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1");
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(IdentityRecord::try_from).transpose()
    }

    async fn list_identities(&self) -> StoreResult<Vec<IdentityRecord>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, IdentityRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(IdentityRecord::try_from).collect()
    }

    async fn update_identity(
        &self,
        id: Uuid,
        update: &IdentityUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<IdentityRecord>> {
        let sql = format!(
            "UPDATE identities \
             SET name = COALESCE($2, name), roles = COALESCE($3, roles), updated_at = $4 \
             WHERE id = $1 RETURNING {IDENTITY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.roles.as_deref().map(role_names))
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.map(IdentityRecord::try_from).transpose()
    }

    async fn delete_identity(&self, id: Uuid) -> StoreResult<bool> {
        // sessions.identity_id cascades
        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn failed_attempts(&self, email: &str) -> StoreResult<Option<FailedAttempts>> {
        let row = sqlx::query_as::<_, (i32, Option<DateTime<Utc>>)>(
            "SELECT failed_attempts, last_failed_attempt FROM identities WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(count, last_failed_at)| FailedAttempts {
            count: u32::try_from(count).unwrap_or(0),
            last_failed_at,
        }))
    }

    async fn record_failed_attempt(
        &self,
        email: &str,
        at: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE identities \
             SET failed_attempts = CASE \
                   WHEN last_failed_attempt IS NULL OR last_failed_attempt <= $3 THEN 1 \
                   ELSE failed_attempts + 1 \
                 END, \
                 last_failed_attempt = $2 \
             WHERE email = $1",
        )
        .bind(email)
        .bind(at)
        .bind(window_start)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset_failed_attempts(&self, email: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE identities SET failed_attempts = 0, last_failed_attempt = NULL \
             WHERE email = $1 AND (failed_attempts <> 0 OR last_failed_attempt IS NOT NULL)",
        )
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert_session(&self, session: &SessionRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sessions (id, identity_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(session.id)
        .bind(session.identity_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn session_is_live(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        let live = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = $1 AND expires_at > $2)",
        )
        .bind(id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(live)
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            warn!("store ping failed: {e}");
            StoreError::Db(e)
        })?;
        Ok(())
    }
}
