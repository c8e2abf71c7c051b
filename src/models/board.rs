use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::{double_option, ParseEnumError};

/// Where a board is in its service lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoardStatus {
    #[serde(rename = "In Use")]
    InUse,
    #[serde(rename = "Sent for Service")]
    SentForService,
    #[serde(rename = "In Repair")]
    InRepair,
    #[serde(rename = "Repaired")]
    Repaired,
    #[serde(rename = "Replaced")]
    Replaced,
    #[serde(rename = "Returned")]
    Returned,
}

impl BoardStatus {
    pub const ALL: [BoardStatus; 6] = [
        BoardStatus::InUse,
        BoardStatus::SentForService,
        BoardStatus::InRepair,
        BoardStatus::Repaired,
        BoardStatus::Replaced,
        BoardStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoardStatus::InUse => "In Use",
            BoardStatus::SentForService => "Sent for Service",
            BoardStatus::InRepair => "In Repair",
            BoardStatus::Repaired => "Repaired",
            BoardStatus::Replaced => "Replaced",
            BoardStatus::Returned => "Returned",
        }
    }

    /// Away at a partner and not yet back (counts toward overdue)
    pub fn is_away(&self) -> bool {
        matches!(self, BoardStatus::SentForService | BoardStatus::InRepair)
    }

    /// Any state an inward entry can close
    pub fn is_in_service(&self) -> bool {
        matches!(
            self,
            BoardStatus::SentForService | BoardStatus::InRepair | BoardStatus::Repaired
        )
    }
}

impl FromStr for BoardStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BoardStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("board status", s))
    }
}

impl std::fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarrantyStatus {
    #[serde(rename = "Under Service Warranty")]
    UnderServiceWarranty,
    #[serde(rename = "Under Replacement Warranty")]
    UnderReplacementWarranty,
    #[serde(rename = "Out of Warranty")]
    OutOfWarranty,
}

impl WarrantyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarrantyStatus::UnderServiceWarranty => "Under Service Warranty",
            WarrantyStatus::UnderReplacementWarranty => "Under Replacement Warranty",
            WarrantyStatus::OutOfWarranty => "Out of Warranty",
        }
    }

    pub fn is_covered(&self) -> bool {
        !matches!(self, WarrantyStatus::OutOfWarranty)
    }
}

impl FromStr for WarrantyStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Under Service Warranty" => Ok(WarrantyStatus::UnderServiceWarranty),
            "Under Replacement Warranty" => Ok(WarrantyStatus::UnderReplacementWarranty),
            "Out of Warranty" => Ok(WarrantyStatus::OutOfWarranty),
            other => Err(ParseEnumError::new("warranty status", other)),
        }
    }
}

impl std::fmt::Display for WarrantyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded when a board comes back from a partner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceResult {
    Repaired,
    Replaced,
    #[serde(rename = "Not Repairable")]
    NotRepairable,
}

impl ServiceResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceResult::Repaired => "Repaired",
            ServiceResult::Replaced => "Replaced",
            ServiceResult::NotRepairable => "Not Repairable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// The visit currently in progress, set on dispatch and closed on inward entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenService {
    pub service_partner: String,
    pub issue_reported: String,
    pub priority: Priority,
    pub dispatched_at: DateTime<Utc>,
}

/// A completed visit in a board's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: Uuid,
    /// When the board was dispatched
    pub service_date: DateTime<Utc>,
    pub returned_at: DateTime<Utc>,
    pub issue_reported: String,
    pub service_partner: String,
    pub action_taken: String,
    /// Whole days between dispatch and return
    pub days_taken: i64,
    pub cost: Option<f64>,
    pub outcome: ServiceResult,
}

/// A board row as stored - enums as text, nested data as JSONB
#[derive(Debug, Clone, FromRow)]
pub struct BoardRow {
    pub id: Uuid,
    pub board_id: String,
    pub current_status: String,
    pub current_location: String,
    pub mill_assigned: String,
    pub warranty_status: String,
    pub warranty_expiry: DateTime<Utc>,
    pub purchase_date: DateTime<Utc>,
    pub substitute_board: Option<String>,
    /// Stored as JSONB, can be NULL
    pub open_service: Option<serde_json::Value>,
    /// Stored as JSONB array, defaults to '[]'
    pub service_history: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A physical circuit board unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    /// Store-assigned identifier
    pub id: Uuid,
    /// Human-readable identifier (e.g. "SMW-B-001")
    pub board_id: String,
    pub current_status: BoardStatus,
    /// Mill name or service partner name
    pub current_location: String,
    /// Mill that owns the board long-term
    pub mill_assigned: String,
    pub warranty_status: WarrantyStatus,
    pub warranty_expiry: DateTime<Utc>,
    pub purchase_date: DateTime<Utc>,
    /// Board id of the spare covering for this one
    pub substitute_board: Option<String>,
    pub open_service: Option<OpenService>,
    pub service_history: Vec<ServiceRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BoardRow> for Board {
    type Error = anyhow::Error;

    fn try_from(row: BoardRow) -> Result<Self, Self::Error> {
        let open_service = row
            .open_service
            .filter(|v| !v.is_null())
            .map(serde_json::from_value)
            .transpose()?;

        Ok(Board {
            id: row.id,
            current_status: row.current_status.parse()?,
            warranty_status: row.warranty_status.parse()?,
            service_history: serde_json::from_value(row.service_history)?,
            open_service,
            board_id: row.board_id,
            current_location: row.current_location,
            mill_assigned: row.mill_assigned,
            warranty_expiry: row.warranty_expiry,
            purchase_date: row.purchase_date,
            substitute_board: row.substitute_board,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl Board {
    pub fn has_substitute(&self) -> bool {
        self.substitute_board
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }

    /// Warranty still running and ending inside the window
    pub fn warranty_expires_within(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.warranty_expiry > now && self.warranty_expiry <= now + window
    }
}

/// Request to register a board
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoardRequest {
    #[validate(length(min = 1, max = 64, message = "boardId is required"))]
    pub board_id: String,
    #[serde(default = "default_board_status")]
    pub current_status: BoardStatus,
    /// Defaults to the assigned mill
    pub current_location: Option<String>,
    #[validate(length(min = 1, message = "millAssigned is required"))]
    pub mill_assigned: String,
    pub warranty_status: WarrantyStatus,
    pub warranty_expiry: DateTime<Utc>,
    pub purchase_date: DateTime<Utc>,
    pub substitute_board: Option<String>,
}

fn default_board_status() -> BoardStatus {
    BoardStatus::InUse
}

/// Fields a board edit may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BoardField {
    BoardId,
    CurrentStatus,
    CurrentLocation,
    MillAssigned,
    WarrantyStatus,
    WarrantyExpiry,
    PurchaseDate,
    SubstituteBoard,
}

/// Administrative override of board fields, no transition rules applied
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPatch {
    pub board_id: Option<String>,
    pub current_status: Option<BoardStatus>,
    pub current_location: Option<String>,
    pub mill_assigned: Option<String>,
    pub warranty_status: Option<WarrantyStatus>,
    pub warranty_expiry: Option<DateTime<Utc>>,
    pub purchase_date: Option<DateTime<Utc>>,
    /// `null` clears the substitute
    #[serde(default, deserialize_with = "double_option")]
    pub substitute_board: Option<Option<String>>,
}

impl BoardPatch {
    /// Fields present in this patch
    pub fn fields(&self) -> Vec<BoardField> {
        let mut fields = Vec::new();
        if self.board_id.is_some() {
            fields.push(BoardField::BoardId);
        }
        if self.current_status.is_some() {
            fields.push(BoardField::CurrentStatus);
        }
        if self.current_location.is_some() {
            fields.push(BoardField::CurrentLocation);
        }
        if self.mill_assigned.is_some() {
            fields.push(BoardField::MillAssigned);
        }
        if self.warranty_status.is_some() {
            fields.push(BoardField::WarrantyStatus);
        }
        if self.warranty_expiry.is_some() {
            fields.push(BoardField::WarrantyExpiry);
        }
        if self.purchase_date.is_some() {
            fields.push(BoardField::PurchaseDate);
        }
        if self.substitute_board.is_some() {
            fields.push(BoardField::SubstituteBoard);
        }
        fields
    }
}

/// Outward dispatch to a repair partner
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendForServiceRequest {
    #[validate(length(min = 1, message = "servicePartner is required"))]
    pub service_partner: String,
    /// Board id of the spare to deploy
    pub substitute_board: Option<String>,
    #[serde(default)]
    pub issue_reported: String,
    #[serde(default)]
    pub priority: Priority,
}

impl SendForServiceRequest {
    /// Substitute id with blank values treated as absent
    pub fn substitute(&self) -> Option<&str> {
        self.substitute_board
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Return from a repair partner
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InwardEntryRequest {
    pub service_result: ServiceResult,
    /// New warranty length when the board was replaced
    #[validate(range(min = 1, max = 120))]
    pub new_warranty_months: Option<u32>,
    #[serde(default)]
    pub return_substitute: bool,
    #[serde(default)]
    pub action_taken: String,
    #[validate(range(min = 0.0))]
    pub cost: Option<f64>,
    /// Overrides the issue recorded at dispatch
    pub issue_reported: Option<String>,
}

/// Query filters for board listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardFilter {
    pub status: Option<BoardStatus>,
    pub mill: Option<String>,
    /// Matches board id or location, case-insensitive
    pub q: Option<String>,
}

impl BoardFilter {
    pub fn matches(&self, board: &Board) -> bool {
        if self.status.is_some_and(|s| s != board.current_status) {
            return false;
        }
        if self.mill.as_deref().is_some_and(|m| m != board.mill_assigned) {
            return false;
        }
        match self.q.as_deref().map(str::to_lowercase) {
            Some(q) if !q.is_empty() => {
                board.board_id.to_lowercase().contains(&q)
                    || board.current_location.to_lowercase().contains(&q)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip() {
        for status in BoardStatus::ALL {
            assert_eq!(status.as_str().parse::<BoardStatus>(), Ok(status));
        }
        assert!("Lost".parse::<BoardStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_as_display_text() {
        let json = serde_json::to_string(&BoardStatus::SentForService).unwrap();
        assert_eq!(json, "\"Sent for Service\"");
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: BoardPatch = serde_json::from_str(r#"{"substituteBoard": null}"#).unwrap();
        assert_eq!(patch.substitute_board, Some(None));
        assert_eq!(patch.fields(), vec![BoardField::SubstituteBoard]);

        let patch: BoardPatch = serde_json::from_str(r#"{"currentLocation": "Mill 1"}"#).unwrap();
        assert_eq!(patch.substitute_board, None);
        assert_eq!(patch.fields(), vec![BoardField::CurrentLocation]);
    }

    #[test]
    fn test_blank_substitute_is_absent() {
        let req: SendForServiceRequest =
            serde_json::from_str(r#"{"servicePartner": "Sheltronics", "substituteBoard": "  "}"#)
                .unwrap();
        assert_eq!(req.substitute(), None);
        assert_eq!(req.priority, Priority::Medium);
    }

    #[test]
    fn test_row_conversion() {
        let now = Utc::now();
        let row = BoardRow {
            id: Uuid::new_v4(),
            board_id: "SMW-B-001".to_string(),
            current_status: "In Repair".to_string(),
            current_location: "Sheltronics".to_string(),
            mill_assigned: "Mill 1".to_string(),
            warranty_status: "Out of Warranty".to_string(),
            warranty_expiry: now,
            purchase_date: now,
            substitute_board: None,
            open_service: Some(serde_json::Value::Null),
            service_history: serde_json::json!([]),
            created_at: now,
            updated_at: now,
        };

        let board = Board::try_from(row).unwrap();
        assert_eq!(board.current_status, BoardStatus::InRepair);
        assert_eq!(board.warranty_status, WarrantyStatus::OutOfWarranty);
        assert!(board.open_service.is_none());
        assert!(board.service_history.is_empty());
    }

    #[test]
    fn test_filter() {
        let now = Utc::now();
        let board = Board {
            id: Uuid::new_v4(),
            board_id: "SMW-B-007".to_string(),
            current_status: BoardStatus::InUse,
            current_location: "Mill 3".to_string(),
            mill_assigned: "Mill 3".to_string(),
            warranty_status: WarrantyStatus::UnderServiceWarranty,
            warranty_expiry: now,
            purchase_date: now,
            substitute_board: None,
            open_service: None,
            service_history: vec![],
            created_at: now,
            updated_at: now,
        };

        assert!(BoardFilter::default().matches(&board));
        let by_query = BoardFilter { q: Some("b-007".into()), ..Default::default() };
        assert!(by_query.matches(&board));
        let by_status = BoardFilter {
            status: Some(BoardStatus::InRepair),
            ..Default::default()
        };
        assert!(!by_status.matches(&board));
    }
}
