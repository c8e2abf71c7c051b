use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::{
    auth::AuthenticatedUser,
    dashboard::{self, Dashboard, Thresholds},
    error::Result,
    live::SyncState,
    permissions::Permission,
    reports::{self, QueueFilter, ServiceRequest},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub dashboard: Dashboard,
    /// Freshness of the data the figures were computed from
    pub sync: SyncState,
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<DashboardResponse>> {
    auth.require(Permission::ViewReports)?;

    let (snapshot, sync) = state.live.view().await;
    let thresholds = Thresholds::from(&state.config.policy);
    Ok(Json(DashboardResponse {
        dashboard: dashboard::summarize(&snapshot, &thresholds, Utc::now()),
        sync,
    }))
}

/// Boards currently with service partners
pub async fn service_queue(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(filter): Query<QueueFilter>,
) -> Result<Json<Vec<ServiceRequest>>> {
    auth.require(Permission::ViewBoards)?;

    let snapshot = state.live.snapshot().await;
    Ok(Json(reports::service_queue(&snapshot, &filter)))
}
