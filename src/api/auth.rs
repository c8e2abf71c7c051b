use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};

use crate::{
    auth::{generate_token, hash_token, password::verify_password, AuthenticatedUser},
    error::{AppError, Result},
    models::{LoginRequest, LoginResponse, User, UserStatus},
    AppState,
};

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Sign in with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let row = state
        .db
        .find_login(&req.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized(BAD_CREDENTIALS.to_string()))?;

    // Argon2 is CPU-bound
    let hash = row.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&req.password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Stored password hash unreadable: {e}")))?;

    if !verified {
        tracing::info!(email = %row.email, "Rejected sign-in");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }
    if row.status != UserStatus::Active.as_str() {
        return Err(AppError::Unauthorized("Account is inactive".to_string()));
    }

    let token = generate_token();
    let expires_at = Utc::now() + Duration::hours(state.config.auth.session_ttl_hours);
    state
        .db
        .create_session(row.id, &hash_token(&token), expires_at)
        .await?;
    let user = state.db.record_login(row.id).await?;

    tracing::info!(email = %user.email, role = user.role.as_str(), "Signed in");
    Ok(Json(LoginResponse {
        token,
        expires_at,
        user,
    }))
}

/// Revoke the presented session
pub async fn logout(State(state): State<AppState>, auth: AuthenticatedUser) -> Result<StatusCode> {
    state.db.delete_session(&auth.token_hash).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(auth: AuthenticatedUser) -> Json<User> {
    Json(auth.user)
}
