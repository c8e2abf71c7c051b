use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// An external repair vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServicePartner {
    pub id: Uuid,
    /// Unique name; boards at this partner carry it as `currentLocation`
    pub name: String,
    pub contact_person: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    /// 1.0 to 5.0
    pub rating: f64,
    /// Typical turnaround in days
    pub avg_repair_time: i32,
    #[sqlx(json)]
    pub specializations: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partner load bucket by boards currently held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Workload {
    Low,
    Medium,
    High,
}

impl Workload {
    pub fn from_load(load: usize) -> Self {
        match load {
            n if n > 3 => Workload::High,
            n if n > 1 => Workload::Medium,
            _ => Workload::Low,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartnerRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "contactPerson is required"))]
    pub contact_person: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(range(min = 1.0, max = 5.0))]
    pub rating: f64,
    #[validate(range(min = 0))]
    pub avg_repair_time: i32,
    #[serde(default)]
    pub specializations: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePartnerRequest {
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(range(min = 1.0, max = 5.0))]
    pub rating: Option<f64>,
    #[validate(range(min = 0))]
    pub avg_repair_time: Option<i32>,
    pub specializations: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_thresholds() {
        assert_eq!(Workload::from_load(0), Workload::Low);
        assert_eq!(Workload::from_load(1), Workload::Low);
        assert_eq!(Workload::from_load(2), Workload::Medium);
        assert_eq!(Workload::from_load(3), Workload::Medium);
        assert_eq!(Workload::from_load(4), Workload::High);
    }

    #[test]
    fn test_rating_range_is_validated() {
        let mut req = CreatePartnerRequest {
            name: "Sheltronics".into(),
            contact_person: "Ravi Gupta".into(),
            phone: "+91-9876543221".into(),
            email: "support@sheltronics.com".into(),
            address: "Tech Park, Sector 18, Noida".into(),
            rating: 4.2,
            avg_repair_time: 6,
            specializations: vec![],
        };
        assert!(req.validate().is_ok());

        req.rating = 5.5;
        assert!(req.validate().is_err());
    }
}
