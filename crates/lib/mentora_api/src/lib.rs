//! # mentora_api
//!
//! HTTP API library for Mentora.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use mentora_core::auth::{AuthError, AuthService, AuthorizationGate};
use mentora_core::clock::Clock;
use mentora_core::store::AuthStore;
use mentora_core::users::UserDirectory;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, health, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub gate: AuthorizationGate,
    pub users: UserDirectory,
    /// Store handle, for health checks.
    pub store: Arc<dyn AuthStore>,
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the auth components over one store and clock.
    pub fn new(
        store: Arc<dyn AuthStore>,
        clock: Arc<dyn Clock>,
        config: ApiConfig,
    ) -> Result<Self, AuthError> {
        let auth = Arc::new(AuthService::new(store.clone(), clock.clone(), &config.auth)?);
        Ok(Self {
            gate: AuthorizationGate::new(auth.clone()),
            users: UserDirectory::new(store.clone(), clock),
            auth,
            store,
            config,
        })
    }
}

/// Run embedded database migrations.
///
/// Delegates to `mentora_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    mentora_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Any authenticated caller
    let authenticated = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/users/{id}", get(users::get_user_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Admin only
    let admin = Router::new()
        .route("/users", get(users::list_users_handler))
        .route(
            "/users/{id}",
            put(users::update_user_handler).delete(users::delete_user_handler),
        )
        .route("/admin/sessions/expired", delete(admin::sweep_sessions_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        .layer(cors)
        .with_state(state)
}
