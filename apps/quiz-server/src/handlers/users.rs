//! Account management. Admins see every account, users only their own.

use actix_web::{HttpResponse, web};

use quiz_core::domain::{Role, User};
use quiz_core::ports::{BaseRepository, PasswordService, UserRepository};
use quiz_shared::dto::{UpdateUserRequest, UserResponse};

use super::auth::{check_password, user_response};
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/v1/users
pub async fn list_users(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    identity.require_admin()?;

    let users: Vec<UserResponse> = state
        .users
        .find_all()
        .await?
        .iter()
        .map(user_response)
        .collect();
    Ok(HttpResponse::Ok().json(users))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    identity.require_owner_or_admin(user_id)?;

    let user = find_user(&state, user_id).await?;
    Ok(HttpResponse::Ok().json(user_response(&user)))
}

/// PUT /api/v1/users/{id}
pub async fn update_user(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<i64>,
    body: web::Json<UpdateUserRequest>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    identity.require_owner_or_admin(user_id)?;
    let req = body.into_inner();

    let mut user = find_user(&state, user_id).await?;

    if let Some(role) = req.role {
        identity.require_admin()?;
        user.role = role.parse::<Role>().map_err(AppError::BadRequest)?;
    }
    if let Some(password) = req.password {
        check_password(&password)?;
        user.password_hash = state.passwords.hash(&password)?;
    }

    let user = state.users.save(user).await?;
    tracing::info!(user_id, updated_by = identity.user_id, "User updated");

    Ok(HttpResponse::Ok().json(user_response(&user)))
}

/// DELETE /api/v1/users/{id}
pub async fn delete_user(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    identity.require_owner_or_admin(user_id)?;

    state.users.delete(user_id).await?;
    tracing::info!(user_id, deleted_by = identity.user_id, "User deleted");

    Ok(HttpResponse::NoContent().finish())
}

async fn find_user(state: &AppState, user_id: i64) -> AppResult<User> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {user_id} not found")))
}
