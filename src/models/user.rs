use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    #[serde(rename = "Mill Supervisor")]
    MillSupervisor,
    #[serde(rename = "Service Partner")]
    ServicePartner,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::MillSupervisor => "Mill Supervisor",
            Role::ServicePartner => "Service Partner",
            Role::Viewer => "Viewer",
        }
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Mill Supervisor" => Ok(Role::MillSupervisor),
            "Service Partner" => Ok(Role::ServicePartner),
            "Viewer" => Ok(Role::Viewer),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "Active",
            UserStatus::Inactive => "Inactive",
        }
    }
}

impl FromStr for UserStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(UserStatus::Active),
            "Inactive" => Ok(UserStatus::Inactive),
            other => Err(ParseEnumError::new("user status", other)),
        }
    }
}

/// A user row as stored
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub mill: Option<String>,
    pub service_partner: Option<String>,
    pub password_hash: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An account; the password hash never leaves the store layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// Login identity, unique
    pub email: String,
    pub name: String,
    pub role: Role,
    pub status: UserStatus,
    /// Mill affiliation (mill supervisors)
    pub mill: Option<String>,
    /// Partner affiliation (service partner accounts)
    pub service_partner: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl TryFrom<UserRow> for User {
    type Error = ParseEnumError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            role: row.role.parse()?,
            status: row.status.parse()?,
            email: row.email,
            name: row.name,
            mill: row.mill,
            service_partner: row.service_partner,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub role: Role,
    #[serde(default = "default_user_status")]
    pub status: UserStatus,
    pub mill: Option<String>,
    pub service_partner: Option<String>,
    pub password: String,
}

fn default_user_status() -> UserStatus {
    UserStatus::Active
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub mill: Option<String>,
    pub service_partner: Option<String>,
    pub password: Option<String>,
}

/// Affiliation a role needs before the account is usable
pub fn validate_affiliation(
    role: Role,
    mill: Option<&str>,
    service_partner: Option<&str>,
) -> Result<(), &'static str> {
    let blank = |v: Option<&str>| v.map(str::trim).map_or(true, str::is_empty);
    match role {
        Role::MillSupervisor if blank(mill) => Err("Mill supervisors must be assigned a mill"),
        Role::ServicePartner if blank(service_partner) => {
            Err("Service partner accounts must be assigned a service partner")
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Bearer token, only returned once
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}
