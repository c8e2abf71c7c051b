use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A production facility that owns boards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Mill {
    pub id: Uuid,
    /// Unique display name, referenced by boards' `millAssigned`
    pub name: String,
    pub location: String,
    pub contact_person: String,
    pub phone: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMillRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "location is required"))]
    pub location: String,
    #[validate(length(min = 1, message = "contactPerson is required"))]
    pub contact_person: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
}

/// Attribute update; the name is the mill's identity and cannot change
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMillRequest {
    pub location: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}
