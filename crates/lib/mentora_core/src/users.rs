//! Administrative identity management.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::clock::Clock;
use crate::models::auth::{Identity, IdentityUpdate, Role};
use crate::store::AuthStore;

/// Administrative identity operations.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list(&self) -> Result<Vec<Identity>, AuthError> {
        let records = self.store.list_identities().await?;
        Ok(records.iter().map(|r| r.to_identity()).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Identity, AuthError> {
        self.store
            .find_identity_by_id(id)
            .await?
            .map(|r| r.to_identity())
            .ok_or_else(|| AuthError::NotFound("User not found".into()))
    }

    /// Apply a partial update. A role list, when given, must be non-empty.
    pub async fn update(&self, id: Uuid, update: IdentityUpdate) -> Result<Identity, AuthError> {
        let update = normalize(update)?;
        let record = self
            .store
            .update_identity(id, &update, self.clock.now())
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        info!(identity_id = %id, roles = ?record.roles, "identity updated");
        Ok(record.to_identity())
    }

    /// Remove an identity together with all of its sessions.
    pub async fn delete(&self, id: Uuid) -> Result<(), AuthError> {
        if !self.store.delete_identity(id).await? {
            return Err(AuthError::NotFound("User not found".into()));
        }
        info!(identity_id = %id, "identity deleted");
        Ok(())
    }

    /// Add `role` to the identity registered under `email`. No-op if already held.
    pub async fn grant_role(&self, email: &str, role: Role) -> Result<Identity, AuthError> {
        let record = self
            .store
            .find_identity_by_email(email)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("No user with email {email}")))?;
        if record.roles.contains(&role) {
            return Ok(record.to_identity());
        }
        let mut roles = record.roles.clone();
        roles.push(role);
        self.update(
            record.id,
            IdentityUpdate {
                name: None,
                roles: Some(roles),
            },
        )
        .await
    }
}

fn normalize(mut update: IdentityUpdate) -> Result<IdentityUpdate, AuthError> {
    if let Some(name) = update.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() {
            return Err(AuthError::Validation("Name must not be empty".into()));
        }
    }
    if let Some(roles) = update.roles.as_mut() {
        let mut seen = Vec::with_capacity(roles.len());
        roles.retain(|r| {
            let fresh = !seen.contains(r);
            seen.push(*r);
            fresh
        });
        if roles.is_empty() {
            return Err(AuthError::Validation("At least one role is required".into()));
        }
    }
    Ok(update)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::models::auth::NewIdentity;
    use crate::store::{IdentityStore, MemoryStore, SessionRepository};

    async fn setup() -> (UserDirectory, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let rec = store
            .insert_identity(NewIdentity {
                id: Uuid::now_v7(),
                email: "carol@example.com".into(),
                name: "Carol".into(),
                password_hash: "x".into(),
                roles: vec![Role::User],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        (UserDirectory::new(store.clone(), clock), store, rec.id)
    }

    #[tokio::test]
    async fn list_and_get() {
        let (users, _, id) = setup().await;
        let all = users.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(users.get(id).await.unwrap().email, "carol@example.com");
        assert!(matches!(
            users.get(Uuid::new_v4()).await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_rejects_empty_roles() {
        let (users, _, id) = setup().await;
        let err = users
            .update(
                id,
                IdentityUpdate {
                    name: None,
                    roles: Some(vec![]),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn update_changes_name_and_dedups_roles() {
        let (users, _, id) = setup().await;
        let updated = users
            .update(
                id,
                IdentityUpdate {
                    name: Some(" Caroline ".into()),
                    roles: Some(vec![Role::Admin, Role::User, Role::Admin]),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Caroline");
        assert_eq!(updated.roles, vec![Role::Admin, Role::User]);
    }

    #[tokio::test]
    async fn delete_removes_identity_and_sessions() {
        let (users, store, id) = setup().await;
        let now = Utc::now();
        store
            .insert_session(&crate::models::auth::SessionRecord {
                id: Uuid::new_v4(),
                identity_id: id,
                created_at: now,
                expires_at: now + chrono::Duration::hours(1),
            })
            .await
            .unwrap();
        users.delete(id).await.unwrap();
        assert_eq!(store.session_count(), 0);
        assert!(matches!(users.delete(id).await, Err(AuthError::NotFound(_))));
    }

    #[tokio::test]
    async fn grant_role_is_idempotent() {
        let (users, _, _) = setup().await;
        let a = users.grant_role("carol@example.com", Role::Admin).await.unwrap();
        let b = users.grant_role("carol@example.com", Role::Admin).await.unwrap();
        assert_eq!(a.roles, vec![Role::User, Role::Admin]);
        assert_eq!(a.roles, b.roles);
        assert!(matches!(
            users.grant_role("nobody@example.com", Role::Admin).await,
            Err(AuthError::NotFound(_))
        ));
    }
}
