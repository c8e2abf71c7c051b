use sqlx::PgConnection;
use uuid::Uuid;

use super::on_unique;
use crate::error::{AppError, Result};
use crate::models::{CreateMillRequest, Mill, UpdateMillRequest};

pub(super) async fn fetch_all(conn: &mut PgConnection) -> Result<Vec<Mill>> {
    let mills = sqlx::query_as::<_, Mill>("SELECT * FROM mills ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;
    Ok(mills)
}

impl super::Database {
    pub async fn list_mills(&self) -> Result<Vec<Mill>> {
        let mut conn = self.pool.acquire().await?;
        fetch_all(&mut conn).await
    }

    pub async fn get_mill(&self, id: Uuid) -> Result<Mill> {
        sqlx::query_as::<_, Mill>("SELECT * FROM mills WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Mill not found".to_string()))
    }

    pub async fn create_mill(&self, req: &CreateMillRequest) -> Result<Mill> {
        sqlx::query_as::<_, Mill>(
            r#"
            INSERT INTO mills (id, name, location, contact_person, phone, email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name.trim())
        .bind(&req.location)
        .bind(&req.contact_person)
        .bind(&req.phone)
        .bind(&req.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            on_unique(e, "mills_name_key", || {
                format!("Mill '{}' already exists", req.name.trim())
            })
        })
    }

    pub async fn update_mill(&self, id: Uuid, req: &UpdateMillRequest) -> Result<Mill> {
        sqlx::query_as::<_, Mill>(
            r#"
            UPDATE mills
            SET location = COALESCE($2, location),
                contact_person = COALESCE($3, contact_person),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.location)
        .bind(&req.contact_person)
        .bind(&req.phone)
        .bind(&req.email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Mill not found".to_string()))
    }

    /// Refused while boards are still assigned to the mill
    pub async fn delete_mill(&self, id: Uuid) -> Result<()> {
        let mill = self.get_mill(id).await?;

        let (assigned,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM boards WHERE mill_assigned = $1")
                .bind(&mill.name)
                .fetch_one(&self.pool)
                .await?;
        if assigned > 0 {
            return Err(AppError::Conflict(format!(
                "Mill '{}' still has {} board(s) assigned",
                mill.name, assigned
            )));
        }

        sqlx::query("DELETE FROM mills WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// True when no mills exist yet
    pub async fn mills_empty(&self) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mills")
            .fetch_one(&self.pool)
            .await?;
        Ok(count == 0)
    }
}
