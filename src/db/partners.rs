use sqlx::{types::Json, PgConnection};
use uuid::Uuid;

use super::on_unique;
use crate::error::{AppError, Result};
use crate::models::{CreatePartnerRequest, ServicePartner, UpdatePartnerRequest};

pub(super) async fn fetch_all(conn: &mut PgConnection) -> Result<Vec<ServicePartner>> {
    let partners = sqlx::query_as::<_, ServicePartner>("SELECT * FROM service_partners ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;
    Ok(partners)
}

impl super::Database {
    pub async fn list_partners(&self) -> Result<Vec<ServicePartner>> {
        let mut conn = self.pool.acquire().await?;
        fetch_all(&mut conn).await
    }

    pub async fn get_partner(&self, id: Uuid) -> Result<ServicePartner> {
        sqlx::query_as::<_, ServicePartner>("SELECT * FROM service_partners WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Service partner not found".to_string()))
    }

    pub async fn create_partner(&self, req: &CreatePartnerRequest) -> Result<ServicePartner> {
        sqlx::query_as::<_, ServicePartner>(
            r#"
            INSERT INTO service_partners (id, name, contact_person, phone, email, address,
                                          rating, avg_repair_time, specializations,
                                          created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name.trim())
        .bind(&req.contact_person)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.address)
        .bind(req.rating)
        .bind(req.avg_repair_time)
        .bind(Json(&req.specializations))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            on_unique(e, "service_partners_name_key", || {
                format!("Service partner '{}' already exists", req.name.trim())
            })
        })
    }

    pub async fn update_partner(&self, id: Uuid, req: &UpdatePartnerRequest) -> Result<ServicePartner> {
        sqlx::query_as::<_, ServicePartner>(
            r#"
            UPDATE service_partners
            SET contact_person = COALESCE($2, contact_person),
                phone = COALESCE($3, phone),
                email = COALESCE($4, email),
                address = COALESCE($5, address),
                rating = COALESCE($6, rating),
                avg_repair_time = COALESCE($7, avg_repair_time),
                specializations = COALESCE($8, specializations),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.contact_person)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.address)
        .bind(req.rating)
        .bind(req.avg_repair_time)
        .bind(req.specializations.as_ref().map(Json))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Service partner not found".to_string()))
    }

    /// Refused while boards are located at the partner
    pub async fn delete_partner(&self, id: Uuid) -> Result<()> {
        let partner = self.get_partner(id).await?;

        let (held,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM boards WHERE current_location = $1")
                .bind(&partner.name)
                .fetch_one(&self.pool)
                .await?;
        if held > 0 {
            return Err(AppError::Conflict(format!(
                "Service partner '{}' still holds {} board(s)",
                partner.name, held
            )));
        }

        sqlx::query("DELETE FROM service_partners WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn partners_empty(&self) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM service_partners")
            .fetch_one(&self.pool)
            .await?;
        Ok(count == 0)
    }
}
