pub mod password;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use sha2::{Digest, Sha256};

use crate::{
    db::Database,
    error::AppError,
    models::User,
    permissions::{self, Permission},
    AppState,
};

/// Prefix carried by every session token
pub const TOKEN_PREFIX: &str = "mb_";

/// Signed-in user extracted from the bearer session token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    /// SHA-256 of the presented token, used to revoke it on logout
    pub token_hash: String,
}

impl AuthenticatedUser {
    /// Require a permission or return Forbidden
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        permissions::require(&self.user, permission)
    }
}

impl std::ops::Deref for AuthenticatedUser {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let db = Database::from_ref(state);

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header format".to_string()))?;

        if !token.starts_with(TOKEN_PREFIX) {
            return Err(AppError::Unauthorized("Invalid session token format".to_string()));
        }

        let token_hash = hash_token(token);
        let user = db.session_user(&token_hash).await?;

        Ok(AuthenticatedUser { user, token_hash })
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

/// Hash a session token for storage/lookup
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new random session token
pub fn generate_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    format!("{TOKEN_PREFIX}{}", hex::encode(bytes))
}
