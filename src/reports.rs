//! Date-ranged service reports and the service queue

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dashboard::{percent, Thresholds};
use crate::error::{AppError, Result};
use crate::live::Snapshot;
use crate::models::{Board, BoardStatus, Priority, ServicePartner};

/// Turnaround assumed for boards at an unknown partner
const DEFAULT_REPAIR_DAYS: i64 = 7;

/// Named report windows, all ending now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Preset {
    #[serde(rename = "last7days")]
    Last7Days,
    #[default]
    #[serde(rename = "last30days")]
    Last30Days,
    #[serde(rename = "last90days")]
    Last90Days,
    #[serde(rename = "last12months")]
    Last12Months,
}

impl Preset {
    fn days(self) -> i64 {
        match self {
            Preset::Last7Days => 7,
            Preset::Last30Days => 30,
            Preset::Last90Days => 90,
            Preset::Last12Months => 365,
        }
    }
}

/// `?range=last90days` or `?from=...&to=...`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub range: Option<Preset>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn resolve(query: &ReportQuery, now: DateTime<Utc>) -> Result<Self> {
        match (query.from, query.to) {
            (Some(start), Some(end)) if start > end => Err(AppError::Validation(
                "from must not be after to".to_string(),
            )),
            (Some(start), Some(end)) => Ok(Self { start, end }),
            (None, None) => {
                let preset = query.range.unwrap_or_default();
                Ok(Self {
                    start: now - Duration::days(preset.days()),
                    end: now,
                })
            }
            _ => Err(AppError::Validation(
                "from and to must be given together".to_string(),
            )),
        }
    }

    /// Strictly inside the range
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at > self.start && at < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_services: usize,
    /// Percent, one decimal
    pub completion_rate: f64,
    /// Days, one decimal
    pub avg_repair_time: f64,
    pub substitute_usage: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorPerformance {
    pub name: String,
    pub services: usize,
    pub avg_time: i32,
    pub rating: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarrantySummary {
    pub under_warranty: usize,
    pub expiring_soon: usize,
    pub expired: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MillPerformance {
    pub name: String,
    pub location: String,
    pub total_boards: usize,
    pub active_boards: usize,
    pub in_service: usize,
    /// Percent, one decimal
    pub service_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub range: DateRange,
    pub overview: Overview,
    pub vendors: Vec<VendorPerformance>,
    pub warranty: WarrantySummary,
    pub mills: Vec<MillPerformance>,
}

pub fn generate(
    snapshot: &Snapshot,
    range: DateRange,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Report {
    let boards = &snapshot.boards;

    let in_range: Vec<&Board> = boards.iter().filter(|b| range.contains(b.updated_at)).collect();
    let total_services = in_range
        .iter()
        .filter(|b| b.current_status.is_in_service())
        .count();
    let completed = in_range
        .iter()
        .filter(|b| b.current_status == BoardStatus::Repaired)
        .count();

    let avg_repair_time = if snapshot.partners.is_empty() {
        0.0
    } else {
        let total: i64 = snapshot.partners.iter().map(|p| p.avg_repair_time as i64).sum();
        total as f64 / snapshot.partners.len() as f64
    };

    let overview = Overview {
        total_services,
        completion_rate: round1(percent(completed, total_services)),
        avg_repair_time: round1(avg_repair_time),
        substitute_usage: boards.iter().filter(|b| b.has_substitute()).count(),
    };

    let vendors = snapshot
        .partners
        .iter()
        .map(|p| VendorPerformance {
            name: p.name.clone(),
            services: boards.iter().filter(|b| b.current_location == p.name).count(),
            avg_time: p.avg_repair_time,
            rating: p.rating,
        })
        .collect();

    let warranty = WarrantySummary {
        under_warranty: boards.iter().filter(|b| b.warranty_status.is_covered()).count(),
        expiring_soon: boards.iter().filter(|b| thresholds.is_expiring(b, now)).count(),
        expired: boards.iter().filter(|b| !b.warranty_status.is_covered()).count(),
    };

    let mills = snapshot
        .mills
        .iter()
        .map(|m| {
            let owned: Vec<&Board> = boards.iter().filter(|b| b.mill_assigned == m.name).collect();
            let in_service = owned.iter().filter(|b| b.current_status.is_away()).count();
            MillPerformance {
                name: m.name.clone(),
                location: m.location.clone(),
                total_boards: owned.len(),
                active_boards: owned
                    .iter()
                    .filter(|b| b.current_status == BoardStatus::InUse)
                    .count(),
                in_service,
                service_rate: round1(percent(in_service, owned.len())),
            }
        })
        .collect();

    Report {
        range,
        overview,
        vendors,
        warranty,
        mills,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl QueueStatus {
    fn of(status: BoardStatus) -> Option<Self> {
        match status {
            BoardStatus::SentForService => Some(QueueStatus::Pending),
            BoardStatus::InRepair => Some(QueueStatus::InProgress),
            BoardStatus::Repaired => Some(QueueStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
    pub partner: Option<String>,
}

/// One board currently at a service partner
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: Uuid,
    pub board_id: String,
    pub mill: String,
    pub service_partner: String,
    pub status: QueueStatus,
    pub substitute_board: Option<String>,
    pub issue_reported: Option<String>,
    pub priority: Option<Priority>,
    pub last_update: DateTime<Utc>,
    pub expected_completion: DateTime<Utc>,
}

pub fn service_queue(snapshot: &Snapshot, filter: &QueueFilter) -> Vec<ServiceRequest> {
    let mut queue: Vec<ServiceRequest> = snapshot
        .boards
        .iter()
        .filter_map(|b| {
            let status = QueueStatus::of(b.current_status)?;
            let partner = find_partner(&snapshot.partners, &b.current_location);
            let repair_days = partner.map_or(DEFAULT_REPAIR_DAYS, |p| p.avg_repair_time as i64);
            Some(ServiceRequest {
                id: b.id,
                board_id: b.board_id.clone(),
                mill: b.mill_assigned.clone(),
                service_partner: b.current_location.clone(),
                status,
                substitute_board: b.substitute_board.clone(),
                issue_reported: b.open_service.as_ref().map(|o| o.issue_reported.clone()),
                priority: b.open_service.as_ref().map(|o| o.priority),
                last_update: b.updated_at,
                expected_completion: b.updated_at + Duration::days(repair_days),
            })
        })
        .filter(|r| filter.status.map_or(true, |s| s == r.status))
        .filter(|r| {
            filter
                .partner
                .as_deref()
                .map_or(true, |p| p == r.service_partner)
        })
        .collect();

    queue.sort_by(|a, b| a.expected_completion.cmp(&b.expected_completion));
    queue
}

fn find_partner<'a>(partners: &'a [ServicePartner], name: &str) -> Option<&'a ServicePartner> {
    partners.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::board;
    use crate::models::WarrantyStatus;

    fn partner(name: &str, avg_repair_time: i32) -> ServicePartner {
        let now = Utc::now();
        ServicePartner {
            id: Uuid::new_v4(),
            name: name.to_string(),
            contact_person: "Vikram Mehta".to_string(),
            phone: "+91-9876543220".to_string(),
            email: "service@superelectronics.com".to_string(),
            address: "Gurgaon".to_string(),
            rating: 4.5,
            avg_repair_time,
            specializations: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn touched(mut b: Board, at: DateTime<Utc>) -> Board {
        b.updated_at = at;
        b
    }

    #[test]
    fn test_range_resolution() {
        let now = Utc::now();
        let range = DateRange::resolve(&ReportQuery::default(), now).unwrap();
        assert_eq!(range.end - range.start, Duration::days(30));

        let query = ReportQuery {
            range: Some(Preset::Last12Months),
            ..Default::default()
        };
        let range = DateRange::resolve(&query, now).unwrap();
        assert_eq!(range.end - range.start, Duration::days(365));

        let backwards = ReportQuery {
            from: Some(now),
            to: Some(now - Duration::days(1)),
            ..Default::default()
        };
        assert!(DateRange::resolve(&backwards, now).is_err());

        let half_open = ReportQuery {
            from: Some(now),
            ..Default::default()
        };
        assert!(DateRange::resolve(&half_open, now).is_err());
    }

    #[test]
    fn test_preset_names() {
        let query: ReportQuery = serde_json::from_str(r#"{"range": "last90days"}"#).unwrap();
        assert_eq!(query.range, Some(Preset::Last90Days));
    }

    #[test]
    fn test_overview() {
        let now = Utc::now();
        let recent = now - Duration::days(2);
        let mut with_sub = board("SMW-B-001", BoardStatus::SentForService, "Mill 1");
        with_sub.substitute_board = Some("SMW-S-001".to_string());
        let snapshot = Snapshot {
            boards: vec![
                touched(with_sub, recent),
                touched(board("SMW-B-002", BoardStatus::Repaired, "Mill 1"), recent),
                touched(board("SMW-B-003", BoardStatus::InRepair, "Mill 2"), recent),
                touched(board("SMW-B-004", BoardStatus::InUse, "Mill 2"), recent),
                // Outside the window
                board("SMW-B-005", BoardStatus::Repaired, "Mill 2"),
            ],
            partners: vec![partner("Super Electronics", 5), partner("Sheltronics", 6)],
            ..Default::default()
        };
        let range = DateRange::resolve(&ReportQuery::default(), now).unwrap();

        let report = generate(&snapshot, range, &Thresholds::default(), now);
        assert_eq!(report.overview.total_services, 3);
        assert_eq!(report.overview.completion_rate, 33.3);
        assert_eq!(report.overview.avg_repair_time, 5.5);
        assert_eq!(report.overview.substitute_usage, 1);
    }

    #[test]
    fn test_empty_snapshot_reports_zeroes() {
        let now = Utc::now();
        let range = DateRange::resolve(&ReportQuery::default(), now).unwrap();
        let report = generate(&Snapshot::default(), range, &Thresholds::default(), now);

        assert_eq!(report.overview.total_services, 0);
        assert_eq!(report.overview.completion_rate, 0.0);
        assert_eq!(report.overview.avg_repair_time, 0.0);
    }

    #[test]
    fn test_warranty_buckets() {
        let now = Utc::now();
        let mut expiring = board("SMW-B-001", BoardStatus::InUse, "Mill 1");
        expiring.warranty_expiry = now + Duration::days(10);
        let mut expired = board("SMW-B-002", BoardStatus::InUse, "Mill 1");
        expired.warranty_status = WarrantyStatus::OutOfWarranty;
        expired.warranty_expiry = now - Duration::days(10);
        let mut replaced = board("SMW-B-003", BoardStatus::Replaced, "Mill 1");
        replaced.warranty_status = WarrantyStatus::UnderReplacementWarranty;

        let snapshot = Snapshot {
            boards: vec![expiring, expired, replaced],
            ..Default::default()
        };
        let range = DateRange::resolve(&ReportQuery::default(), now).unwrap();
        let report = generate(&snapshot, range, &Thresholds::default(), now);

        assert_eq!(
            report.warranty,
            WarrantySummary {
                under_warranty: 2,
                expiring_soon: 1,
                expired: 1,
            }
        );
    }

    #[test]
    fn test_service_queue() {
        let now = Utc::now();
        let mut pending = board("SMW-B-001", BoardStatus::SentForService, "Mill 1");
        pending.current_location = "Sheltronics".to_string();
        pending.updated_at = now;
        let mut unknown = board("SMW-B-002", BoardStatus::InRepair, "Mill 1");
        unknown.current_location = "Local workshop".to_string();
        unknown.updated_at = now;

        let snapshot = Snapshot {
            boards: vec![
                pending,
                unknown,
                board("SMW-B-003", BoardStatus::InUse, "Mill 1"),
            ],
            partners: vec![partner("Sheltronics", 6)],
            ..Default::default()
        };

        let queue = service_queue(&snapshot, &QueueFilter::default());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].board_id, "SMW-B-001");
        assert_eq!(queue[0].status, QueueStatus::Pending);
        assert_eq!(queue[0].expected_completion, now + Duration::days(6));
        assert_eq!(queue[1].status, QueueStatus::InProgress);
        assert_eq!(queue[1].expected_completion, now + Duration::days(7));

        let only_pending = QueueFilter {
            status: Some(QueueStatus::Pending),
            ..Default::default()
        };
        assert_eq!(service_queue(&snapshot, &only_pending).len(), 1);
    }
}
