//! Dashboard aggregates, recomputed from a live snapshot on every read

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::PolicyConfig;
use crate::live::Snapshot;
use crate::models::{Board, BoardStatus, Workload};

/// Number of boards listed under recent activity
const RECENT_ACTIVITY_LIMIT: usize = 8;

/// Time windows shared by the dashboard and the reports
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub overdue_after: Duration,
    pub warranty_window: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            overdue_after: Duration::days(14),
            warranty_window: Duration::days(30),
        }
    }
}

impl From<&PolicyConfig> for Thresholds {
    fn from(policy: &PolicyConfig) -> Self {
        Self {
            overdue_after: Duration::days(policy.overdue_days),
            warranty_window: Duration::days(policy.warranty_window_days),
        }
    }
}

impl Thresholds {
    /// Away at a partner without an update for longer than `overdue_after`
    pub fn is_overdue(&self, board: &Board, now: DateTime<Utc>) -> bool {
        board.current_status.is_away() && board.updated_at < now - self.overdue_after
    }

    pub fn is_expiring(&self, board: &Board, now: DateTime<Utc>) -> bool {
        board.warranty_expires_within(now, self.warranty_window)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStats {
    pub total_boards: usize,
    pub active_boards: usize,
    pub in_service: usize,
    pub in_repair: usize,
    pub repaired: usize,
    pub substitute_active: usize,
    pub overdue_returns: usize,
    pub warranty_expiring: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MillStatus {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub total_boards: usize,
    pub active_boards: usize,
    /// Sent for service or in repair
    pub in_service: usize,
    pub substitutes: usize,
    /// Whole percent of the mill's boards in service
    pub service_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerStatus {
    pub id: Uuid,
    pub name: String,
    pub rating: f64,
    pub avg_repair_time: i32,
    pub current_load: usize,
    pub workload: Workload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub board_id: String,
    pub status: BoardStatus,
    pub location: String,
    pub mill: String,
    pub substitute: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub days_ago: i64,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: BoardStats,
    pub mills: Vec<MillStatus>,
    pub partners: Vec<PartnerStatus>,
    pub recent_activity: Vec<Activity>,
    pub generated_at: DateTime<Utc>,
}

pub fn board_stats(boards: &[Board], thresholds: &Thresholds, now: DateTime<Utc>) -> BoardStats {
    let count = |status: BoardStatus| boards.iter().filter(|b| b.current_status == status).count();

    BoardStats {
        total_boards: boards.len(),
        active_boards: count(BoardStatus::InUse),
        in_service: count(BoardStatus::SentForService),
        in_repair: count(BoardStatus::InRepair),
        repaired: count(BoardStatus::Repaired),
        substitute_active: boards.iter().filter(|b| b.has_substitute()).count(),
        overdue_returns: boards.iter().filter(|b| thresholds.is_overdue(b, now)).count(),
        warranty_expiring: boards.iter().filter(|b| thresholds.is_expiring(b, now)).count(),
    }
}

pub fn summarize(snapshot: &Snapshot, thresholds: &Thresholds, now: DateTime<Utc>) -> Dashboard {
    let boards = &snapshot.boards;

    let mills = snapshot
        .mills
        .iter()
        .map(|mill| {
            let owned: Vec<&Board> = boards.iter().filter(|b| b.mill_assigned == mill.name).collect();
            let in_service = owned.iter().filter(|b| b.current_status.is_away()).count();
            MillStatus {
                id: mill.id,
                name: mill.name.clone(),
                location: mill.location.clone(),
                total_boards: owned.len(),
                active_boards: owned
                    .iter()
                    .filter(|b| b.current_status == BoardStatus::InUse)
                    .count(),
                in_service,
                substitutes: owned.iter().filter(|b| b.has_substitute()).count(),
                service_rate: percent(in_service, owned.len()).round() as u32,
            }
        })
        .collect();

    let partners = snapshot
        .partners
        .iter()
        .map(|partner| {
            let load = boards
                .iter()
                .filter(|b| b.current_location == partner.name)
                .count();
            PartnerStatus {
                id: partner.id,
                name: partner.name.clone(),
                rating: partner.rating,
                avg_repair_time: partner.avg_repair_time,
                current_load: load,
                workload: Workload::from_load(load),
            }
        })
        .collect();

    Dashboard {
        stats: board_stats(boards, thresholds, now),
        mills,
        partners,
        recent_activity: recent_activity(boards, thresholds, now),
        generated_at: now,
    }
}

fn recent_activity(boards: &[Board], thresholds: &Thresholds, now: DateTime<Utc>) -> Vec<Activity> {
    let mut recent: Vec<&Board> = boards.iter().collect();
    recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    recent
        .into_iter()
        .take(RECENT_ACTIVITY_LIMIT)
        .map(|b| Activity {
            id: b.id,
            board_id: b.board_id.clone(),
            status: b.current_status,
            location: b.current_location.clone(),
            mill: b.mill_assigned.clone(),
            substitute: b.substitute_board.clone(),
            updated_at: b.updated_at,
            days_ago: (now - b.updated_at).num_days(),
            is_overdue: thresholds.is_overdue(b, now),
        })
        .collect()
}

/// `part / whole` as a percentage, 0 for an empty whole
pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
