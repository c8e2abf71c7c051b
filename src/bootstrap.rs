//! First-run setup: initial admin account and standard master data

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::auth::password::{hash_password, validate_password_strength};
use crate::config::Config;
use crate::db::Database;
use crate::models::{CreateMillRequest, CreatePartnerRequest, CreateUserRequest, Role, UserStatus};

pub async fn run(db: &Database, config: &Config) -> Result<()> {
    ensure_admin(db, config).await?;
    if config.seed.master_data {
        seed_master_data(db).await?;
    }
    Ok(())
}

/// Create the admin account when no users exist yet
async fn ensure_admin(db: &Database, config: &Config) -> Result<()> {
    if db.count_users().await? > 0 {
        return Ok(());
    }

    let Some(password) = config.auth.admin_password.as_deref() else {
        warn!("No users exist and auth.admin_password is unset; nobody can sign in");
        return Ok(());
    };
    validate_password_strength(password, config.auth.min_password_length)
        .map_err(anyhow::Error::msg)
        .context("auth.admin_password is too weak")?;

    let hash = hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
    let req = CreateUserRequest {
        email: config.auth.admin_email.clone(),
        name: "Administrator".to_string(),
        role: Role::Admin,
        status: UserStatus::Active,
        mill: None,
        service_partner: None,
        password: String::new(),
    };
    db.create_user(&req, &hash).await?;

    info!(email = %config.auth.admin_email, "Created initial admin account");
    Ok(())
}

fn mill(name: &str, location: &str, contact: &str, phone: &str) -> CreateMillRequest {
    CreateMillRequest {
        name: name.to_string(),
        location: location.to_string(),
        contact_person: contact.to_string(),
        phone: phone.to_string(),
        email: None,
    }
}

fn partner(
    name: &str,
    contact: &str,
    phone: &str,
    email: &str,
    address: &str,
    rating: f64,
    avg_repair_time: i32,
) -> CreatePartnerRequest {
    CreatePartnerRequest {
        name: name.to_string(),
        contact_person: contact.to_string(),
        phone: phone.to_string(),
        email: email.to_string(),
        address: address.to_string(),
        rating,
        avg_repair_time,
        specializations: vec![],
    }
}

pub fn standard_mills() -> Vec<CreateMillRequest> {
    vec![
        mill("Mill 1 - Production Unit A", "Industrial Area, Sector 1", "Rajesh Kumar", "+91-9876543210"),
        mill("Mill 2 - Production Unit B", "Industrial Area, Sector 2", "Suresh Patel", "+91-9876543211"),
        mill("Mill 3 - Production Unit C", "Industrial Area, Sector 3", "Amit Singh", "+91-9876543212"),
        mill("Mill 4 - Quality Control", "Industrial Area, Sector 4", "Priya Sharma", "+91-9876543213"),
    ]
}

pub fn standard_partners() -> Vec<CreatePartnerRequest> {
    vec![
        partner(
            "Super Electronics",
            "Vikram Mehta",
            "+91-9876543220",
            "service@superelectronics.com",
            "Electronics Hub, Phase 1, Gurgaon",
            4.5,
            5,
        ),
        partner(
            "Sheltronics",
            "Ravi Gupta",
            "+91-9876543221",
            "support@sheltronics.com",
            "Tech Park, Sector 18, Noida",
            4.2,
            6,
        ),
        partner(
            "TechFix Solutions",
            "Anita Verma",
            "+91-9876543222",
            "repairs@techfixsolutions.com",
            "Industrial Complex, Faridabad",
            4.0,
            7,
        ),
        partner(
            "ElectroServ India",
            "Manoj Agarwal",
            "+91-9876543223",
            "service@electroserv.in",
            "Electronic City, Bangalore",
            4.3,
            5,
        ),
    ]
}

/// Insert the standard mills and partners into empty tables
async fn seed_master_data(db: &Database) -> Result<()> {
    if db.mills_empty().await? {
        for req in standard_mills() {
            db.create_mill(&req).await?;
        }
        info!("Seeded standard mills");
    }

    if db.partners_empty().await? {
        for req in standard_partners() {
            db.create_partner(&req).await?;
        }
        info!("Seeded standard service partners");
    }

    Ok(())
}
