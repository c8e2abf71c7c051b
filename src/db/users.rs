use sqlx::PgConnection;
use uuid::Uuid;

use super::on_unique;
use crate::error::{AppError, Result};
use crate::models::{CreateUserRequest, UpdateUserRequest, User, UserRow};

const EMAIL_CONSTRAINT: &str = "users_email_key";

fn to_users(rows: Vec<UserRow>) -> Result<Vec<User>> {
    rows.into_iter()
        .map(|row| User::try_from(row).map_err(|e| AppError::Internal(e.into())))
        .collect()
}

fn to_user(row: UserRow) -> Result<User> {
    User::try_from(row).map_err(|e| AppError::Internal(e.into()))
}

pub(super) async fn fetch_all(conn: &mut PgConnection) -> Result<Vec<User>> {
    let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY email")
        .fetch_all(&mut *conn)
        .await?;
    to_users(rows)
}

impl super::Database {
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let mut conn = self.pool.acquire().await?;
        fetch_all(&mut conn).await
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        to_user(row)
    }

    /// Stored row including the password hash, for sign-in only
    pub async fn find_login(&self, email: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn create_user(&self, req: &CreateUserRequest, password_hash: &str) -> Result<User> {
        let email = req.email.trim().to_lowercase();
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, name, role, status, mill, service_partner,
                               password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&req.name)
        .bind(req.role.as_str())
        .bind(req.status.as_str())
        .bind(&req.mill)
        .bind(&req.service_partner)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_unique(e, EMAIL_CONSTRAINT, || format!("User '{}' already exists", email)))?;

        to_user(row)
    }

    pub async fn update_user(
        &self,
        id: Uuid,
        req: &UpdateUserRequest,
        password_hash: Option<&str>,
    ) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                role = COALESCE($3, role),
                status = COALESCE($4, status),
                mill = COALESCE($5, mill),
                service_partner = COALESCE($6, service_partner),
                password_hash = COALESCE($7, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(req.role.map(|r| r.as_str()))
        .bind(req.status.map(|s| s.as_str()))
        .bind(&req.mill)
        .bind(&req.service_partner)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        to_user(row)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    pub async fn count_users(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn record_login(&self, id: Uuid) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET last_login = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        to_user(row)
    }
}
