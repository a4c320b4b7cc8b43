//! User management handlers.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::{Extension, Json};
use mentora_core::models::auth::IdentityUpdate;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{MessageResponse, UserResponse};

/// `GET /users`: all identities (admin).
pub async fn list_users_handler(State(state): State<AppState>) -> AppResult<Json<Vec<UserResponse>>> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// `GET /users/{id}`: the caller's own record, or any record for admins.
pub async fn get_user_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(mut caller)): Extension<AuthenticatedUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<UserResponse>> {
    let Path(id) = id?;
    if caller.id != id {
        // Reading someone else's record hinges on the admin role; use the live one.
        caller.roles = state.auth.resolve_live_identity(&caller).await?.roles;
    }
    if !caller.can_access(id) {
        return Err(AppError::Forbidden);
    }
    let user = state.users.get(id).await?;
    Ok(Json(user.into()))
}

/// `PUT /users/{id}`: change name and/or roles (admin).
pub async fn update_user_handler(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<IdentityUpdate>, JsonRejection>,
) -> AppResult<Json<UserResponse>> {
    let Path(id) = id?;
    let Json(update) = body?;
    let user = state.users.update(id, update).await?;
    Ok(Json(user.into()))
}

/// `DELETE /users/{id}`: remove an identity and its sessions (admin).
pub async fn delete_user_handler(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Path(id) = id?;
    state.users.delete(id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
