//! Tabular exports: XLSX workbooks, per-sheet CSV and the JSON backup dump

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use crate::dashboard::{percent, Thresholds};
use crate::live::Snapshot;
use crate::models::{Board, BoardStatus, Mill, ServicePartner, User};
use crate::reports::{DateRange, Report};

const MIN_COLUMN_WIDTH: usize = 10;
const MAX_COLUMN_WIDTH: usize = 50;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Number(n as f64)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n as f64)
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Number(n as f64)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// Sheets addressable on their own, by URL slug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Boards,
    BoardsSummary,
    ServiceStatus,
    MillsSummary,
    ServicePartners,
    WarrantyReport,
}

impl SheetKind {
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "boards" => Some(SheetKind::Boards),
            "boards-summary" => Some(SheetKind::BoardsSummary),
            "service-status" => Some(SheetKind::ServiceStatus),
            "mills-summary" => Some(SheetKind::MillsSummary),
            "service-partners" => Some(SheetKind::ServicePartners),
            "warranty-report" => Some(SheetKind::WarrantyReport),
            _ => None,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            SheetKind::Boards => "boards",
            SheetKind::BoardsSummary => "boards-summary",
            SheetKind::ServiceStatus => "service-status",
            SheetKind::MillsSummary => "mills-summary",
            SheetKind::ServicePartners => "service-partners",
            SheetKind::WarrantyReport => "warranty-report",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: &'static str,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn new(name: &'static str, headers: &[&'static str]) -> Self {
        Self {
            name,
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Widest value per column, clamped
    fn column_widths(&self) -> Vec<usize> {
        (0..self.headers.len())
            .map(|col| {
                let widest = self
                    .rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(|cell| cell.display().chars().count())
                    .chain(std::iter::once(self.headers[col].len()))
                    .max()
                    .unwrap_or(0);
                (widest.max(MIN_COLUMN_WIDTH) + 2).min(MAX_COLUMN_WIDTH)
            })
            .collect()
    }
}

fn day(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

fn minute(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn substitute_or_na(board: &Board) -> String {
    board
        .substitute_board
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Whole days from `from` to `to`, rounded down
fn floor_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().div_euclid(86_400)
}

pub fn boards_sheet(boards: &[Board]) -> Sheet {
    let mut sheet = Sheet::new(
        "Boards",
        &[
            "Board ID",
            "Status",
            "Current Location",
            "Mill Assigned",
            "Warranty Status",
            "Purchase Date",
            "Warranty Expiry",
            "Substitute Board",
            "Service History Count",
            "Created Date",
            "Last Updated",
        ],
    );
    for b in boards {
        sheet.push(vec![
            b.board_id.as_str().into(),
            b.current_status.as_str().into(),
            b.current_location.as_str().into(),
            b.mill_assigned.as_str().into(),
            b.warranty_status.as_str().into(),
            day(b.purchase_date).into(),
            day(b.warranty_expiry).into(),
            substitute_or_na(b).into(),
            b.service_history.len().into(),
            minute(b.created_at).into(),
            minute(b.updated_at).into(),
        ]);
    }
    sheet
}

fn boards_summary(boards: &[Board]) -> Sheet {
    let mut sheet = Sheet::new(
        "Boards Summary",
        &[
            "Board ID",
            "Status",
            "Current Location",
            "Mill Assigned",
            "Warranty Status",
            "Purchase Date",
            "Warranty Expiry",
            "Substitute Board",
            "Last Updated",
        ],
    );
    for b in boards {
        sheet.push(vec![
            b.board_id.as_str().into(),
            b.current_status.as_str().into(),
            b.current_location.as_str().into(),
            b.mill_assigned.as_str().into(),
            b.warranty_status.as_str().into(),
            day(b.purchase_date).into(),
            day(b.warranty_expiry).into(),
            substitute_or_na(b).into(),
            minute(b.updated_at).into(),
        ]);
    }
    sheet
}

fn service_status(boards: &[Board], now: DateTime<Utc>) -> Sheet {
    let mut sheet = Sheet::new(
        "Service Status",
        &[
            "Board ID",
            "Mill",
            "Service Partner",
            "Status",
            "Substitute Board",
            "Service Date",
            "Days in Service",
        ],
    );
    for b in boards.iter().filter(|b| b.current_status.is_in_service()) {
        sheet.push(vec![
            b.board_id.as_str().into(),
            b.mill_assigned.as_str().into(),
            b.current_location.as_str().into(),
            b.current_status.as_str().into(),
            substitute_or_na(b).into(),
            day(b.updated_at).into(),
            floor_days(b.updated_at, now).into(),
        ]);
    }
    sheet
}

fn mills_summary(mills: &[Mill], boards: &[Board]) -> Sheet {
    let mut sheet = Sheet::new(
        "Mills Summary",
        &[
            "Mill Name",
            "Location",
            "Contact Person",
            "Phone",
            "Total Boards",
            "Active Boards",
            "In Service",
            "Service Rate %",
        ],
    );
    for m in mills {
        let owned: Vec<&Board> = boards.iter().filter(|b| b.mill_assigned == m.name).collect();
        let active = owned
            .iter()
            .filter(|b| b.current_status == BoardStatus::InUse)
            .count();
        let in_service = owned.iter().filter(|b| b.current_status.is_away()).count();
        let rate = (percent(in_service, owned.len()) * 10.0).round() / 10.0;
        sheet.push(vec![
            m.name.as_str().into(),
            m.location.as_str().into(),
            m.contact_person.as_str().into(),
            m.phone.as_str().into(),
            owned.len().into(),
            active.into(),
            in_service.into(),
            rate.into(),
        ]);
    }
    sheet
}

fn service_partners(partners: &[ServicePartner], boards: &[Board]) -> Sheet {
    let mut sheet = Sheet::new(
        "Service Partners",
        &[
            "Partner Name",
            "Contact Person",
            "Phone",
            "Email",
            "Address",
            "Rating",
            "Avg Repair Time (days)",
            "Current Services",
        ],
    );
    for p in partners {
        let held = boards.iter().filter(|b| b.current_location == p.name).count();
        sheet.push(vec![
            p.name.as_str().into(),
            p.contact_person.as_str().into(),
            p.phone.as_str().into(),
            p.email.as_str().into(),
            p.address.as_str().into(),
            p.rating.into(),
            p.avg_repair_time.into(),
            held.into(),
        ]);
    }
    sheet
}

/// Expiry alert shown in the warranty sheet
pub fn warranty_alert(days_to_expiry: i64, window_days: i64) -> &'static str {
    if days_to_expiry < 0 {
        "Expired"
    } else if days_to_expiry <= window_days {
        "Expiring Soon"
    } else {
        "Active"
    }
}

fn warranty_report(boards: &[Board], thresholds: &Thresholds, now: DateTime<Utc>) -> Sheet {
    let mut sheet = Sheet::new(
        "Warranty Report",
        &[
            "Board ID",
            "Mill",
            "Warranty Status",
            "Purchase Date",
            "Warranty Expiry",
            "Days to Expiry",
            "Alert",
        ],
    );
    let window = thresholds.warranty_window.num_days();
    for b in boards {
        let days = floor_days(now, b.warranty_expiry);
        sheet.push(vec![
            b.board_id.as_str().into(),
            b.mill_assigned.as_str().into(),
            b.warranty_status.as_str().into(),
            day(b.purchase_date).into(),
            day(b.warranty_expiry).into(),
            days.into(),
            warranty_alert(days, window).into(),
        ]);
    }
    sheet
}

/// One sheet of the complete report
pub fn sheet(kind: SheetKind, snapshot: &Snapshot, thresholds: &Thresholds, now: DateTime<Utc>) -> Sheet {
    let boards = &snapshot.boards;
    match kind {
        SheetKind::Boards => boards_sheet(boards),
        SheetKind::BoardsSummary => boards_summary(boards),
        SheetKind::ServiceStatus => service_status(boards, now),
        SheetKind::MillsSummary => mills_summary(&snapshot.mills, boards),
        SheetKind::ServicePartners => service_partners(&snapshot.partners, boards),
        SheetKind::WarrantyReport => warranty_report(boards, thresholds, now),
    }
}

/// Every sheet of the complete report; "Service Status" only when non-empty
pub fn service_report(snapshot: &Snapshot, thresholds: &Thresholds, now: DateTime<Utc>) -> Vec<Sheet> {
    [
        SheetKind::BoardsSummary,
        SheetKind::ServiceStatus,
        SheetKind::MillsSummary,
        SheetKind::ServicePartners,
        SheetKind::WarrantyReport,
    ]
    .into_iter()
    .map(|kind| sheet(kind, snapshot, thresholds, now))
    .filter(|s| s.name != "Service Status" || !s.rows.is_empty())
    .collect()
}

/// Render sheets into an XLSX workbook with bold headers and fitted columns
pub fn to_xlsx(sheets: &[Sheet]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name)?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }
        for (i, row) in sheet.rows.iter().enumerate() {
            let r = (i + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(s) => worksheet.write_string(r, col as u16, s)?,
                    Cell::Number(n) => worksheet.write_number(r, col as u16, *n)?,
                };
            }
        }
        for (col, width) in sheet.column_widths().into_iter().enumerate() {
            worksheet.set_column_width(col as u16, width as f64)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_csv(sheet: &Sheet) -> String {
    let mut lines = Vec::with_capacity(sheet.rows.len() + 1);
    lines.push(
        sheet
            .headers
            .iter()
            .map(|h| csv_escape(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in &sheet.rows {
        lines.push(
            row.iter()
                .map(|cell| csv_escape(&cell.display()))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

/// Report summary as downloaded JSON
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExport<'a> {
    pub generated_at: DateTime<Utc>,
    pub date_range: DateRange,
    pub report: &'a Report,
}

/// Full data dump; users carry no password material
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup<'a> {
    pub boards: &'a [Board],
    pub mills: &'a [Mill],
    pub service_partners: &'a [ServicePartner],
    pub users: &'a [User],
    pub export_date: DateTime<Utc>,
}

impl<'a> Backup<'a> {
    pub fn of(snapshot: &'a Snapshot, now: DateTime<Utc>) -> Self {
        Self {
            boards: &snapshot.boards,
            mills: &snapshot.mills,
            service_partners: &snapshot.partners,
            users: &snapshot.users,
            export_date: now,
        }
    }
}

/// `SMW-Complete-Report-2024-05-01.xlsx`
pub fn dated_filename(stem: &str, ext: &str, now: DateTime<Utc>) -> String {
    format!("{stem}-{}.{ext}", day(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::board;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_csv_escaping() {
        assert_eq!(csv_escape("Mill 1"), "Mill 1");
        assert_eq!(csv_escape("Tech Park, Sector 18"), "\"Tech Park, Sector 18\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("line\r\nbreak"), "\"line\r\nbreak\"");
        assert_eq!(csv_escape("carriage\rreturn"), "\"carriage\rreturn\"");
    }

    #[test]
    fn test_service_status_sheet_omitted_when_empty() {
        let now = Utc::now();
        let snapshot = Snapshot {
            boards: vec![board("SMW-B-001", BoardStatus::InUse, "Mill 1")],
            ..Default::default()
        };
        let names: Vec<_> = service_report(&snapshot, &Thresholds::default(), now)
            .iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            vec!["Boards Summary", "Mills Summary", "Service Partners", "Warranty Report"]
        );

        let snapshot = Snapshot {
            boards: vec![board("SMW-B-001", BoardStatus::InRepair, "Mill 1")],
            ..Default::default()
        };
        let sheets = service_report(&snapshot, &Thresholds::default(), now);
        assert_eq!(sheets.len(), 5);
        assert_eq!(sheets[1].name, "Service Status");
    }

    #[test]
    fn test_warranty_alerts() {
        assert_eq!(warranty_alert(-1, 30), "Expired");
        assert_eq!(warranty_alert(0, 30), "Expiring Soon");
        assert_eq!(warranty_alert(30, 30), "Expiring Soon");
        assert_eq!(warranty_alert(31, 30), "Active");
    }

    #[test]
    fn test_days_round_down() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(floor_days(now, now + Duration::hours(36)), 1);
        assert_eq!(floor_days(now, now - Duration::hours(1)), -1);
    }

    #[test]
    fn test_boards_csv() {
        let mut b = board("SMW-B-002", BoardStatus::SentForService, "Mill 2");
        b.current_location = "Sheltronics".to_string();
        b.substitute_board = Some("SMW-S-004".to_string());
        let csv = to_csv(&boards_sheet(&[b]));
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Board ID,Status,Current Location"));
        assert!(lines[1].starts_with("SMW-B-002,Sent for Service,Sheltronics,Mill 2"));
        assert!(lines[1].contains("SMW-S-004"));
    }

    #[test]
    fn test_column_widths_are_clamped() {
        let mut sheet = Sheet::new("Boards", &["ID", "Notes"]);
        sheet.push(vec!["a".into(), "x".repeat(80).into()]);
        assert_eq!(sheet.column_widths(), vec![12, 50]);
    }

    #[test]
    fn test_xlsx_renders() {
        let snapshot = Snapshot {
            boards: vec![board("SMW-B-001", BoardStatus::InRepair, "Mill 1")],
            ..Default::default()
        };
        let sheets = service_report(&snapshot, &Thresholds::default(), Utc::now());
        let bytes = to_xlsx(&sheets).unwrap();
        // XLSX is a zip container
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_backup_has_no_password_material() {
        let snapshot = Snapshot::default();
        let json = serde_json::to_value(Backup::of(&snapshot, Utc::now())).unwrap();
        assert!(json.get("exportDate").is_some());
        assert!(json["users"].as_array().unwrap().is_empty());
        assert!(!json.to_string().contains("password"));
    }

    #[test]
    fn test_dated_filename() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(
            dated_filename("SMW-Complete-Report", "xlsx", now),
            "SMW-Complete-Report-2024-05-01.xlsx"
        );
    }
}
