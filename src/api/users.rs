use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        password::{hash_password, validate_password_strength},
        AuthenticatedUser,
    },
    error::{AppError, Result},
    events::ChangeEvent,
    models::{validate_affiliation, CreateUserRequest, UpdateUserRequest, User, UserStatus},
    permissions::Permission,
    AppState,
};

/// Check strength, then hash off the async workers
async fn hash_new_password(state: &AppState, password: String) -> Result<String> {
    validate_password_strength(&password, state.config.auth.min_password_length)
        .map_err(AppError::Validation)?;

    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {e}")))
}

pub async fn list_users(State(state): State<AppState>, auth: AuthenticatedUser) -> Result<Json<Vec<User>>> {
    auth.require(Permission::ManageUsers)?;
    Ok(Json(state.db.list_users().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    auth.require(Permission::ManageUsers)?;
    Ok(Json(state.db.get_user(id).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    auth.require(Permission::ManageUsers)?;
    req.validate()?;
    validate_affiliation(req.role, req.mill.as_deref(), req.service_partner.as_deref())
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let hash = hash_new_password(&state, req.password.clone()).await?;
    let user = state.db.create_user(&req, &hash).await?;
    tracing::info!(email = %user.email, role = user.role.as_str(), by = %auth.email, "User created");

    state.live.put_user(user.clone()).await;
    state.events.publish(ChangeEvent::UserUpserted(user.clone()));
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    auth.require(Permission::ManageUsers)?;
    req.validate()?;

    if id == auth.id && req.status == Some(UserStatus::Inactive) {
        return Err(AppError::Conflict("You cannot deactivate your own account".to_string()));
    }

    // Affiliation rules apply to the merged account
    let current = state.db.get_user(id).await?;
    let role = req.role.unwrap_or(current.role);
    let mill = req.mill.as_deref().or(current.mill.as_deref());
    let partner = req.service_partner.as_deref().or(current.service_partner.as_deref());
    validate_affiliation(role, mill, partner).map_err(|e| AppError::Validation(e.to_string()))?;

    let hash = match req.password.clone() {
        Some(password) => Some(hash_new_password(&state, password).await?),
        None => None,
    };

    let user = state.db.update_user(id, &req, hash.as_deref()).await?;

    // Deactivation or a password reset ends existing sessions
    if !user.is_active() || hash.is_some() {
        let revoked = state.db.delete_user_sessions(id).await?;
        tracing::info!(email = %user.email, revoked, "Revoked sessions");
    }

    state.live.put_user(user.clone()).await;
    state.events.publish(ChangeEvent::UserUpserted(user.clone()));
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require(Permission::ManageUsers)?;
    if id == auth.id {
        return Err(AppError::Conflict("You cannot delete your own account".to_string()));
    }

    state.db.delete_user(id).await?;
    tracing::info!(%id, by = %auth.email, "User deleted");

    state.live.remove_user(id).await;
    state.events.publish(ChangeEvent::UserDeleted { id });
    Ok(StatusCode::NO_CONTENT)
}
