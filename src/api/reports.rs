use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::AuthenticatedUser,
    dashboard::Thresholds,
    error::{AppError, Result},
    export::{self, Backup, ReportExport, Sheet, SheetKind, XLSX_CONTENT_TYPE},
    permissions::Permission,
    reports::{self, DateRange, ReportQuery},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    /// Serve as an attachment instead of inline JSON
    #[serde(default)]
    pub download: bool,
}

fn attachment(content_type: &'static str, filename: String, body: impl IntoResponse) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

async fn render_xlsx(sheets: Vec<Sheet>) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || export::to_xlsx(&sheets))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(AppError::Internal)
}

pub async fn get_report(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(query): Query<ReportQuery>,
    Query(download): Query<DownloadQuery>,
) -> Result<Response> {
    auth.require(Permission::ViewReports)?;

    let now = Utc::now();
    let range = DateRange::resolve(&query, now)?;
    let snapshot = state.live.snapshot().await;
    let report = reports::generate(&snapshot, range, &Thresholds::from(&state.config.policy), now);

    if !download.download {
        return Ok(Json(report).into_response());
    }

    auth.require(Permission::ExportReports)?;
    let body = Json(ReportExport {
        generated_at: now,
        date_range: range,
        report: &report,
    })
    .into_response();
    Ok(attachment(
        "application/json",
        export::dated_filename("SMW-Report", "json", now),
        body,
    ))
}

/// Complete multi-sheet service report
pub async fn export_workbook(State(state): State<AppState>, auth: AuthenticatedUser) -> Result<Response> {
    auth.require(Permission::ExportReports)?;

    let now = Utc::now();
    let snapshot = state.live.snapshot().await;
    let sheets = export::service_report(&snapshot, &Thresholds::from(&state.config.policy), now);
    let bytes = render_xlsx(sheets).await?;

    tracing::info!(by = %auth.email, "Exported service report");
    Ok(attachment(
        XLSX_CONTENT_TYPE,
        export::dated_filename("SMW-Complete-Report", "xlsx", now),
        bytes,
    ))
}

/// Board register as a single-sheet workbook
pub async fn export_boards(State(state): State<AppState>, auth: AuthenticatedUser) -> Result<Response> {
    auth.require(Permission::ExportReports)?;

    let now = Utc::now();
    let snapshot = state.live.snapshot().await;
    let bytes = render_xlsx(vec![export::boards_sheet(&snapshot.boards)]).await?;

    Ok(attachment(
        XLSX_CONTENT_TYPE,
        export::dated_filename("SMW-Boards", "xlsx", now),
        bytes,
    ))
}

/// `/reports/sheets/warranty-report.csv`
pub async fn export_sheet(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(sheet): Path<String>,
) -> Result<Response> {
    auth.require(Permission::ExportReports)?;

    let slug = sheet.strip_suffix(".csv").unwrap_or(&sheet);
    let kind = SheetKind::from_slug(slug)
        .ok_or_else(|| AppError::NotFound(format!("Unknown sheet '{slug}'")))?;

    let now = Utc::now();
    let snapshot = state.live.snapshot().await;
    let csv = export::to_csv(&export::sheet(
        kind,
        &snapshot,
        &Thresholds::from(&state.config.policy),
        now,
    ));

    Ok(attachment(
        "text/csv; charset=utf-8",
        export::dated_filename(kind.slug(), "csv", now),
        csv,
    ))
}

/// Everything in the store, minus password hashes
pub async fn backup(State(state): State<AppState>, auth: AuthenticatedUser) -> Result<Response> {
    auth.require(Permission::Backup)?;

    let now = Utc::now();
    let snapshot = state.live.snapshot().await;
    tracing::info!(by = %auth.email, boards = snapshot.boards.len(), "Backup exported");

    let body = Json(Backup::of(&snapshot, now)).into_response();
    Ok(attachment(
        "application/json",
        export::dated_filename("SMW-Backup", "json", now),
        body,
    ))
}
