//! Background tasks
//!
//! Handles:
//! - Warranty expiry sweep
//! - Expired session deletion
//! - Periodic live-store reload and staleness detection

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::events::ChangeEvent;
use crate::AppState;

/// Start the maintenance and resync loops
pub fn start_background_tasks(state: AppState) {
    let maintenance_every = Duration::from_secs(state.config.maintenance.interval_secs);
    let resync_every = Duration::from_secs(state.config.live.resync_interval_secs);

    let maintenance_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = interval(maintenance_every);
        loop {
            ticker.tick().await;
            let report = run_maintenance(&maintenance_state).await;
            if report.warranties_expired > 0 || report.sessions_deleted > 0 {
                info!(
                    warranties_expired = report.warranties_expired,
                    sessions_deleted = report.sessions_deleted,
                    "Maintenance pass finished"
                );
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker = interval(resync_every);
        // First tick fires immediately; startup already loaded
        ticker.tick().await;
        loop {
            ticker.tick().await;
            resync(&state).await;
        }
    });
}

/// Reload the live store and announce sync state changes
pub async fn resync(state: &AppState) {
    let before = state.live.sync_state().await;

    match state.live.refresh(&state.db).await {
        Ok(true) => {}
        Ok(false) => info!("Live reload superseded by a newer write, keeping current snapshot"),
        Err(e) => warn!("Live reload failed, serving last snapshot: {:#}", e),
    }

    let max_age = ChronoDuration::seconds(state.config.live.stale_after_secs);
    state.live.check_freshness(Utc::now(), max_age).await;

    let after = state.live.sync_state().await;
    if !before.same_kind(&after) {
        info!(state = ?after, "Live store sync state changed");
        state.events.publish(ChangeEvent::SyncStateChanged(after));
    }
}

#[derive(Debug, Default, serde::Serialize)]
pub struct MaintenanceReport {
    pub warranties_expired: usize,
    pub sessions_deleted: u64,
}

pub async fn run_maintenance(state: &AppState) -> MaintenanceReport {
    let (expired, sessions) = tokio::join!(
        state.db.expire_warranties(Utc::now()),
        state.db.delete_expired_sessions(),
    );

    let mut report = MaintenanceReport::default();

    match expired {
        Ok(boards) => {
            report.warranties_expired = boards.len();
            for board in boards {
                info!(board = %board.board_id, expiry = %board.warranty_expiry, "Warranty expired");
                state.live.put_board(board.clone()).await;
                state.events.publish(ChangeEvent::BoardUpserted(board));
            }
        }
        Err(e) => error!("Warranty sweep failed: {}", e),
    }

    match sessions {
        Ok(count) => report.sessions_deleted = count,
        Err(e) => warn!("Failed to delete expired sessions: {}", e),
    }

    report
}
