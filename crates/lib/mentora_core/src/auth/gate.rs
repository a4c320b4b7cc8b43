//! Per-request authorization.

use std::sync::Arc;

use super::AuthError;
use super::service::AuthService;
use crate::models::auth::{IdentityClaims, Role};

/// Extract the token from an `Authorization` header value (`Bearer <token>`).
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolves the caller and checks route roles.
#[derive(Clone)]
pub struct AuthorizationGate {
    auth: Arc<AuthService>,
}

impl AuthorizationGate {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }

    /// Authorize a request carrying `authorization` (the raw header value).
    ///
    /// An empty `required` set admits any authenticated caller. Otherwise the
    /// identity's current roles are re-read, so a demotion takes effect before
    /// the token expires.
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        required: &[Role],
    ) -> Result<IdentityClaims, AuthError> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or(AuthError::InvalidToken)?;
        let mut claims = self.auth.resolve_current_user(token).await?;

        if required.is_empty() {
            return Ok(claims);
        }

        let live = self.auth.resolve_live_identity(&claims).await?;
        claims.roles = live.roles;
        if claims.has_any_role(required) {
            Ok(claims)
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AuthConfig;
    use crate::models::auth::IdentityUpdate;
    use crate::store::{IdentityStore, MemoryStore};

    async fn setup() -> (AuthorizationGate, Arc<MemoryStore>, String, uuid::Uuid) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let mut config = AuthConfig::new("0123456789abcdef0123456789abcdef");
        config.bcrypt_cost = 4;
        let auth = Arc::new(AuthService::new(store.clone(), clock, &config).unwrap());
        let s = auth.register("bob@example.com", "pw", "Bob").await.unwrap();
        (AuthorizationGate::new(auth), store, s.token, s.identity.id)
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[tokio::test]
    async fn missing_header_is_invalid_token() {
        let (gate, _, _, _) = setup().await;
        assert!(matches!(
            gate.authorize(None, &[]).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn any_authenticated_user_passes_empty_role_set() {
        let (gate, _, token, id) = setup().await;
        let header = format!("Bearer {token}");
        let claims = gate.authorize(Some(&header), &[]).await.unwrap();
        assert_eq!(claims.id, id);
    }

    #[tokio::test]
    async fn user_is_forbidden_from_admin_routes() {
        let (gate, _, token, _) = setup().await;
        let header = format!("Bearer {token}");
        assert!(matches!(
            gate.authorize(Some(&header), &[Role::Admin]).await,
            Err(AuthError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn role_changes_apply_to_existing_tokens() {
        let (gate, store, token, id) = setup().await;
        let header = format!("Bearer {token}");
        store
            .update_identity(
                id,
                &IdentityUpdate {
                    name: None,
                    roles: Some(vec![Role::User, Role::Admin]),
                },
                chrono::Utc::now(),
            )
            .await
            .unwrap();
        let claims = gate.authorize(Some(&header), &[Role::Admin]).await.unwrap();
        assert!(claims.has_role(Role::Admin));
    }
}
