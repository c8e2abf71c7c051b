//! Board lifecycle engine
//!
//! Pure transition rules. Each operation takes the current record(s) and
//! returns the complete next state of every record it touches; persisting
//! them atomically is the store's job (see `db::boards`).
//!
//! ```text
//! InUse --send--> SentForService --start--> InRepair --complete--> Repaired
//! {SentForService, InRepair, Repaired} --inward--> InUse | Replaced | Returned
//! ```

use chrono::{DateTime, Months, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::config::PolicyConfig;
use crate::error::AppError;
use crate::models::{
    Board, BoardPatch, BoardStatus, InwardEntryRequest, OpenService, SendForServiceRequest,
    ServiceRecord, ServiceResult, WarrantyStatus,
};

/// Next state of every record an action touches
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub board: Board,
    /// Spare deployed to cover the board
    pub substitute: Option<Board>,
    /// Spare sent back to its own mill
    pub released: Option<Board>,
}

impl Transition {
    /// Every record to persist, primary board first
    pub fn records(&self) -> impl Iterator<Item = &Board> {
        std::iter::once(&self.board)
            .chain(self.substitute.as_ref())
            .chain(self.released.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("Board {board_id} is '{status}', expected {expected}")]
    InvalidStatus {
        board_id: String,
        status: BoardStatus,
        expected: &'static str,
    },

    #[error("Board {0} cannot substitute for itself")]
    SelfSubstitute(String),

    #[error("Substitute {board_id} is '{status}', only boards in use can be deployed")]
    SubstituteUnavailable { board_id: String, status: BoardStatus },

    #[error("Substitute {substitute} already covers {covering}")]
    SubstituteTaken { substitute: String, covering: String },

    #[error("Warranty period must be at least one month")]
    InvalidWarrantyPeriod,

    #[error("Warranty period of {0} months is out of range")]
    WarrantyOverflow(u32),
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Rules that vary by deployment
#[derive(Debug, Clone, Copy)]
pub struct Rules {
    /// Reject a substitute that already backs another board
    pub exclusive_substitutes: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self { exclusive_substitutes: true }
    }
}

impl From<&PolicyConfig> for Rules {
    fn from(policy: &PolicyConfig) -> Self {
        Self {
            exclusive_substitutes: policy.exclusive_substitutes,
        }
    }
}

/// A resolved substitute board and the board it currently covers, if any
#[derive(Debug, Clone, Copy)]
pub struct SubstituteSlot<'a> {
    pub board: &'a Board,
    /// `boardId` of another board already listing this one as its substitute
    pub covering: Option<&'a str>,
}

/// Repair progress reported while a board is at the partner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStep {
    Start,
    Complete,
}

/// Dispatch an in-use board to a service partner.
///
/// `substitute` is the board named by the request, already looked up.
/// `previous` is the spare named in `board.substitute_board`, if it could be
/// found; it goes back to its own mill unless the request deploys it again.
pub fn send_for_service(
    board: &Board,
    req: &SendForServiceRequest,
    substitute: Option<SubstituteSlot<'_>>,
    previous: Option<&Board>,
    rules: Rules,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    if board.current_status != BoardStatus::InUse {
        return Err(TransitionError::InvalidStatus {
            board_id: board.board_id.clone(),
            status: board.current_status,
            expected: "'In Use'",
        });
    }

    let substitute = substitute
        .map(|slot| deploy_substitute(board, slot, rules, now))
        .transpose()?;

    let mut next = board.clone();
    next.current_status = BoardStatus::SentForService;
    next.current_location = req.service_partner.clone();
    next.substitute_board = substitute.as_ref().map(|s| s.board_id.clone());
    next.open_service = Some(OpenService {
        service_partner: req.service_partner.clone(),
        issue_reported: req.issue_reported.clone(),
        priority: req.priority,
        dispatched_at: now,
    });
    next.updated_at = now;

    let released = if next.substitute_board != board.substitute_board && board.has_substitute() {
        previous
            .filter(|p| board.substitute_board.as_deref() == Some(p.board_id.as_str()))
            .map(|p| send_home(p, now))
    } else {
        None
    };

    Ok(Transition {
        board: next,
        substitute,
        released,
    })
}

fn send_home(spare: &Board, now: DateTime<Utc>) -> Board {
    let mut next = spare.clone();
    next.current_location = next.mill_assigned.clone();
    next.updated_at = now;
    next
}

fn deploy_substitute(
    board: &Board,
    slot: SubstituteSlot<'_>,
    rules: Rules,
    now: DateTime<Utc>,
) -> Result<Board, TransitionError> {
    let spare = slot.board;
    if spare.id == board.id || spare.board_id == board.board_id {
        return Err(TransitionError::SelfSubstitute(board.board_id.clone()));
    }
    if spare.current_status != BoardStatus::InUse {
        return Err(TransitionError::SubstituteUnavailable {
            board_id: spare.board_id.clone(),
            status: spare.current_status,
        });
    }
    if rules.exclusive_substitutes {
        if let Some(covering) = slot.covering.filter(|c| *c != board.board_id) {
            return Err(TransitionError::SubstituteTaken {
                substitute: spare.board_id.clone(),
                covering: covering.to_string(),
            });
        }
    }

    // Status stays InUse; the spare only moves
    let mut next = spare.clone();
    next.current_location = board.mill_assigned.clone();
    next.updated_at = now;
    Ok(next)
}

/// Record repair progress at the partner
pub fn advance_repair(
    board: &Board,
    step: RepairStep,
    now: DateTime<Utc>,
) -> Result<Board, TransitionError> {
    let (from, to, expected) = match step {
        RepairStep::Start => (
            BoardStatus::SentForService,
            BoardStatus::InRepair,
            "'Sent for Service'",
        ),
        RepairStep::Complete => (BoardStatus::InRepair, BoardStatus::Repaired, "'In Repair'"),
    };

    if board.current_status != from {
        return Err(TransitionError::InvalidStatus {
            board_id: board.board_id.clone(),
            status: board.current_status,
            expected,
        });
    }

    let mut next = board.clone();
    next.current_status = to;
    next.updated_at = now;
    Ok(next)
}

/// Close a service visit when the board comes back.
///
/// `substitute` is the board named in `board.substitute_board`, if it could
/// be found. A missing substitute leaves only the reference cleared.
pub fn process_inward(
    board: &Board,
    req: &InwardEntryRequest,
    substitute: Option<&Board>,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    if !board.current_status.is_in_service() {
        return Err(TransitionError::InvalidStatus {
            board_id: board.board_id.clone(),
            status: board.current_status,
            expected: "a service state",
        });
    }

    let mut next = board.clone();
    next.current_status = match req.service_result {
        ServiceResult::Repaired => BoardStatus::InUse,
        ServiceResult::Replaced => BoardStatus::Replaced,
        ServiceResult::NotRepairable => BoardStatus::Returned,
    };
    next.current_location = board.mill_assigned.clone();

    if req.service_result == ServiceResult::Replaced {
        if let Some(months) = req.new_warranty_months {
            if months == 0 {
                return Err(TransitionError::InvalidWarrantyPeriod);
            }
            next.warranty_expiry = now
                .checked_add_months(Months::new(months))
                .ok_or(TransitionError::WarrantyOverflow(months))?;
            next.warranty_status = WarrantyStatus::UnderReplacementWarranty;
        }
    }

    next.service_history.push(close_visit(board, req, now));
    next.open_service = None;
    next.updated_at = now;

    let mut released = None;
    if req.return_substitute && board.has_substitute() {
        next.substitute_board = None;
        released = substitute
            .filter(|s| board.substitute_board.as_deref() == Some(s.board_id.as_str()))
            .map(|s| send_home(s, now));
    }

    Ok(Transition {
        board: next,
        substitute: None,
        released,
    })
}

fn close_visit(board: &Board, req: &InwardEntryRequest, now: DateTime<Utc>) -> ServiceRecord {
    // Boards moved into service by a direct edit have no open visit
    let (service_partner, issue, dispatched_at) = match &board.open_service {
        Some(open) => (
            open.service_partner.clone(),
            open.issue_reported.clone(),
            open.dispatched_at,
        ),
        None => (board.current_location.clone(), String::new(), board.updated_at),
    };

    let action_taken = if req.action_taken.trim().is_empty() {
        match req.service_result {
            ServiceResult::Repaired => "Repaired".to_string(),
            ServiceResult::Replaced => "Board replaced".to_string(),
            ServiceResult::NotRepairable => "Returned unrepaired".to_string(),
        }
    } else {
        req.action_taken.clone()
    };

    ServiceRecord {
        id: Uuid::new_v4(),
        service_date: dispatched_at,
        returned_at: now,
        issue_reported: req.issue_reported.clone().unwrap_or(issue),
        service_partner,
        action_taken,
        days_taken: (now - dispatched_at).num_days().max(0),
        cost: req.cost,
        outcome: req.service_result,
    }
}

/// Apply an administrative override. Any status is reachable from any status.
pub fn direct_edit(board: &Board, patch: &BoardPatch, now: DateTime<Utc>) -> Board {
    let mut next = board.clone();
    if let Some(board_id) = &patch.board_id {
        next.board_id = board_id.clone();
    }
    if let Some(status) = patch.current_status {
        next.current_status = status;
    }
    if let Some(location) = &patch.current_location {
        next.current_location = location.clone();
    }
    if let Some(mill) = &patch.mill_assigned {
        next.mill_assigned = mill.clone();
    }
    if let Some(warranty) = patch.warranty_status {
        next.warranty_status = warranty;
    }
    if let Some(expiry) = patch.warranty_expiry {
        next.warranty_expiry = expiry;
    }
    if let Some(purchased) = patch.purchase_date {
        next.purchase_date = purchased;
    }
    if let Some(substitute) = &patch.substitute_board {
        next.substitute_board = substitute
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }
    next.updated_at = now;
    next
}

/// In-use spare boards not already covering another board
pub fn available_substitutes<'a>(boards: &'a [Board], prefix: &str) -> Vec<&'a Board> {
    let covering: HashSet<&str> = boards
        .iter()
        .filter_map(|b| b.substitute_board.as_deref())
        .collect();

    boards
        .iter()
        .filter(|b| b.board_id.starts_with(prefix))
        .filter(|b| b.current_status == BoardStatus::InUse)
        .filter(|b| !covering.contains(b.board_id.as_str()))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::{Datelike, Duration};

    pub(crate) fn board(board_id: &str, status: BoardStatus, mill: &str) -> Board {
        let created = Utc::now() - Duration::days(200);
        Board {
            id: Uuid::new_v4(),
            board_id: board_id.to_string(),
            current_status: status,
            current_location: mill.to_string(),
            mill_assigned: mill.to_string(),
            warranty_status: WarrantyStatus::UnderServiceWarranty,
            warranty_expiry: created + Duration::days(365),
            purchase_date: created,
            substitute_board: None,
            open_service: None,
            service_history: vec![],
            created_at: created,
            updated_at: created,
        }
    }

    fn send_req(partner: &str, substitute: Option<&str>) -> SendForServiceRequest {
        SendForServiceRequest {
            service_partner: partner.to_string(),
            substitute_board: substitute.map(str::to_string),
            issue_reported: "Power supply failure".to_string(),
            priority: Priority::High,
        }
    }

    fn inward_req(result: ServiceResult) -> InwardEntryRequest {
        InwardEntryRequest {
            service_result: result,
            new_warranty_months: None,
            return_substitute: false,
            action_taken: String::new(),
            cost: None,
            issue_reported: None,
        }
    }

    #[test]
    fn test_send_without_substitute() {
        let b = board("SMW-B-001", BoardStatus::InUse, "Mill 1");
        let now = Utc::now();

        let t = send_for_service(&b, &send_req("Super Electronics", None), None, None, Rules::default(), now)
            .unwrap();

        assert_eq!(t.board.current_status, BoardStatus::SentForService);
        assert_eq!(t.board.current_location, "Super Electronics");
        assert_eq!(t.board.mill_assigned, "Mill 1");
        assert_eq!(t.board.updated_at, now);
        assert!(t.substitute.is_none());
        let open = t.board.open_service.unwrap();
        assert_eq!(open.dispatched_at, now);
        assert_eq!(open.priority, Priority::High);
    }

    #[test]
    fn test_send_with_substitute_relocates_spare() {
        let b = board("SMW-B-002", BoardStatus::InUse, "Mill 2");
        let spare = board("SMW-S-004", BoardStatus::InUse, "Mill 4");
        let slot = SubstituteSlot { board: &spare, covering: None };

        let t = send_for_service(
            &b,
            &send_req("Sheltronics", Some("SMW-S-004")),
            Some(slot),
            None,
            Rules::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(t.board.current_status, BoardStatus::SentForService);
        assert_eq!(t.board.current_location, "Sheltronics");
        assert_eq!(t.board.substitute_board.as_deref(), Some("SMW-S-004"));

        let sub = t.substitute.unwrap();
        assert_eq!(sub.current_location, "Mill 2");
        assert_eq!(sub.current_status, BoardStatus::InUse);
        assert_eq!(sub.mill_assigned, "Mill 4");
    }

    #[test]
    fn test_resend_without_substitute_sends_old_spare_home() {
        let mut b = board("SMW-B-002", BoardStatus::InUse, "Mill 2");
        b.substitute_board = Some("SMW-S-004".to_string());
        let mut old_spare = board("SMW-S-004", BoardStatus::InUse, "Mill 4");
        old_spare.current_location = "Mill 2".to_string();
        let now = Utc::now();

        let t = send_for_service(&b, &send_req("Sheltronics", None), None, Some(&old_spare), Rules::default(), now)
            .unwrap();

        assert_eq!(t.board.substitute_board, None);
        assert!(t.substitute.is_none());
        let home = t.released.unwrap();
        assert_eq!(home.board_id, "SMW-S-004");
        assert_eq!(home.current_location, "Mill 4");
        assert_eq!(home.updated_at, now);
    }

    #[test]
    fn test_resend_with_new_substitute_swaps_spares() {
        let mut b = board("SMW-B-002", BoardStatus::InUse, "Mill 2");
        b.substitute_board = Some("SMW-S-004".to_string());
        let mut old_spare = board("SMW-S-004", BoardStatus::InUse, "Mill 4");
        old_spare.current_location = "Mill 2".to_string();
        let new_spare = board("SMW-S-001", BoardStatus::InUse, "Mill 1");
        let slot = SubstituteSlot { board: &new_spare, covering: None };

        let t = send_for_service(
            &b,
            &send_req("Sheltronics", Some("SMW-S-001")),
            Some(slot),
            Some(&old_spare),
            Rules::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(t.board.substitute_board.as_deref(), Some("SMW-S-001"));
        assert_eq!(t.substitute.unwrap().current_location, "Mill 2");
        assert_eq!(t.released.unwrap().current_location, "Mill 4");
    }

    #[test]
    fn test_resend_with_same_substitute_keeps_it_deployed() {
        let mut b = board("SMW-B-002", BoardStatus::InUse, "Mill 2");
        b.substitute_board = Some("SMW-S-004".to_string());
        let mut spare = board("SMW-S-004", BoardStatus::InUse, "Mill 4");
        spare.current_location = "Mill 2".to_string();
        let slot = SubstituteSlot { board: &spare, covering: None };

        let t = send_for_service(
            &b,
            &send_req("Sheltronics", Some("SMW-S-004")),
            Some(slot),
            Some(&spare),
            Rules::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(t.board.substitute_board.as_deref(), Some("SMW-S-004"));
        assert_eq!(t.substitute.as_ref().unwrap().current_location, "Mill 2");
        assert!(t.released.is_none());
        assert_eq!(t.records().count(), 2);
    }

    #[test]
    fn test_send_requires_in_use() {
        for status in [
            BoardStatus::SentForService,
            BoardStatus::InRepair,
            BoardStatus::Repaired,
            BoardStatus::Replaced,
            BoardStatus::Returned,
        ] {
            let b = board("SMW-B-003", status, "Mill 3");
            let err = send_for_service(&b, &send_req("Sheltronics", None), None, None, Rules::default(), Utc::now())
                .unwrap_err();
            assert!(matches!(err, TransitionError::InvalidStatus { .. }));
        }
    }

    #[test]
    fn test_substitute_already_covering_elsewhere() {
        let b = board("SMW-B-002", BoardStatus::InUse, "Mill 2");
        let spare = board("SMW-S-001", BoardStatus::InUse, "Mill 1");
        let slot = SubstituteSlot { board: &spare, covering: Some("SMW-B-009") };

        let err = send_for_service(&b, &send_req("Sheltronics", Some("SMW-S-001")), Some(slot), None, Rules::default(), Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::SubstituteTaken {
                substitute: "SMW-S-001".into(),
                covering: "SMW-B-009".into(),
            }
        );

        // Allowed when exclusivity is switched off
        let lenient = Rules { exclusive_substitutes: false };
        assert!(send_for_service(&b, &send_req("Sheltronics", Some("SMW-S-001")), Some(slot), None, lenient, Utc::now()).is_ok());
    }

    #[test]
    fn test_substitute_must_be_other_board_in_use() {
        let b = board("SMW-B-002", BoardStatus::InUse, "Mill 2");
        let slot = SubstituteSlot { board: &b, covering: None };
        let err = send_for_service(&b, &send_req("Sheltronics", None), Some(slot), None, Rules::default(), Utc::now())
            .unwrap_err();
        assert_eq!(err, TransitionError::SelfSubstitute("SMW-B-002".into()));

        let broken = board("SMW-S-002", BoardStatus::InRepair, "Mill 2");
        let slot = SubstituteSlot { board: &broken, covering: None };
        let err = send_for_service(&b, &send_req("Sheltronics", None), Some(slot), None, Rules::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::SubstituteUnavailable { .. }));
    }

    #[test]
    fn test_repair_steps() {
        let now = Utc::now();
        let sent = board("SMW-B-001", BoardStatus::SentForService, "Mill 1");
        let in_repair = advance_repair(&sent, RepairStep::Start, now).unwrap();
        assert_eq!(in_repair.current_status, BoardStatus::InRepair);

        let repaired = advance_repair(&in_repair, RepairStep::Complete, now).unwrap();
        assert_eq!(repaired.current_status, BoardStatus::Repaired);

        assert!(advance_repair(&sent, RepairStep::Complete, now).is_err());
        assert!(advance_repair(&repaired, RepairStep::Start, now).is_err());
    }

    #[test]
    fn test_inward_repaired_returns_to_mill() {
        let mut b = board("SMW-B-004", BoardStatus::Repaired, "Mill 1");
        b.current_location = "TechFix Solutions".to_string();

        let t = process_inward(&b, &inward_req(ServiceResult::Repaired), None, Utc::now()).unwrap();

        assert_eq!(t.board.current_status, BoardStatus::InUse);
        assert_eq!(t.board.current_location, "Mill 1");
        assert_eq!(t.board.service_history.len(), 1);
        assert_eq!(t.board.service_history[0].service_partner, "TechFix Solutions");
        assert_eq!(t.board.service_history[0].action_taken, "Repaired");
    }

    #[test]
    fn test_inward_replaced_resets_warranty() {
        let b = board("SMW-B-003", BoardStatus::InRepair, "Mill 3");
        let now = Utc::now();
        let req = InwardEntryRequest {
            new_warranty_months: Some(12),
            ..inward_req(ServiceResult::Replaced)
        };

        let t = process_inward(&b, &req, None, now).unwrap();

        assert_eq!(t.board.current_status, BoardStatus::Replaced);
        assert_eq!(t.board.warranty_status, WarrantyStatus::UnderReplacementWarranty);
        let expiry = t.board.warranty_expiry.date_naive();
        let expected = now.date_naive().checked_add_months(Months::new(12)).unwrap();
        assert_eq!(expiry, expected);
        assert_eq!(expiry.year(), now.year() + 1);
    }

    #[test]
    fn test_inward_replaced_without_period_keeps_warranty() {
        let b = board("SMW-B-003", BoardStatus::InRepair, "Mill 3");
        let t = process_inward(&b, &inward_req(ServiceResult::Replaced), None, Utc::now()).unwrap();
        assert_eq!(t.board.warranty_status, WarrantyStatus::UnderServiceWarranty);
        assert_eq!(t.board.warranty_expiry, b.warranty_expiry);

        let zero = InwardEntryRequest {
            new_warranty_months: Some(0),
            ..inward_req(ServiceResult::Replaced)
        };
        assert_eq!(
            process_inward(&b, &zero, None, Utc::now()).unwrap_err(),
            TransitionError::InvalidWarrantyPeriod
        );
    }

    #[test]
    fn test_inward_not_repairable() {
        let b = board("SMW-B-005", BoardStatus::SentForService, "Mill 4");
        let t = process_inward(&b, &inward_req(ServiceResult::NotRepairable), None, Utc::now()).unwrap();
        assert_eq!(t.board.current_status, BoardStatus::Returned);
        assert_eq!(t.board.service_history[0].outcome, ServiceResult::NotRepairable);
    }

    #[test]
    fn test_inward_rejects_boards_not_in_service() {
        let b = board("SMW-B-001", BoardStatus::InUse, "Mill 1");
        assert!(process_inward(&b, &inward_req(ServiceResult::Repaired), None, Utc::now()).is_err());
    }

    #[test]
    fn test_inward_releases_substitute() {
        let mut b = board("SMW-B-002", BoardStatus::Repaired, "Mill 2");
        b.substitute_board = Some("SMW-S-001".to_string());
        let mut spare = board("SMW-S-001", BoardStatus::InUse, "Mill 1");
        spare.current_location = "Mill 2".to_string();

        let req = InwardEntryRequest {
            return_substitute: true,
            ..inward_req(ServiceResult::Repaired)
        };
        let t = process_inward(&b, &req, Some(&spare), Utc::now()).unwrap();

        assert_eq!(t.board.substitute_board, None);
        assert_eq!(t.released.unwrap().current_location, "Mill 1");
        assert!(t.substitute.is_none());
    }

    #[test]
    fn test_inward_missing_substitute_only_clears_reference() {
        let mut b = board("SMW-B-002", BoardStatus::Repaired, "Mill 2");
        b.substitute_board = Some("SMW-S-404".to_string());
        let req = InwardEntryRequest {
            return_substitute: true,
            ..inward_req(ServiceResult::Repaired)
        };

        let t = process_inward(&b, &req, None, Utc::now()).unwrap();
        assert_eq!(t.board.substitute_board, None);
        assert!(t.released.is_none());
    }

    #[test]
    fn test_inward_keeps_substitute_unless_asked() {
        let mut b = board("SMW-B-002", BoardStatus::Repaired, "Mill 2");
        b.substitute_board = Some("SMW-S-001".to_string());
        let spare = board("SMW-S-001", BoardStatus::InUse, "Mill 1");

        let t = process_inward(&b, &inward_req(ServiceResult::Repaired), Some(&spare), Utc::now()).unwrap();
        assert_eq!(t.board.substitute_board.as_deref(), Some("SMW-S-001"));
        assert!(t.released.is_none());
    }

    #[test]
    fn test_full_visit_records_history() {
        let b = board("SMW-B-006", BoardStatus::InUse, "Mill 1");
        let sent_at = Utc::now() - Duration::days(6);
        let sent = send_for_service(&b, &send_req("Sheltronics", None), None, None, Rules::default(), sent_at)
            .unwrap()
            .board;

        let req = InwardEntryRequest {
            action_taken: "Replaced capacitor bank".to_string(),
            cost: Some(1250.0),
            ..inward_req(ServiceResult::Repaired)
        };
        let back = process_inward(&sent, &req, None, Utc::now()).unwrap().board;

        assert!(back.open_service.is_none());
        let record = &back.service_history[0];
        assert_eq!(record.service_date, sent_at);
        assert_eq!(record.days_taken, 6);
        assert_eq!(record.issue_reported, "Power supply failure");
        assert_eq!(record.service_partner, "Sheltronics");
        assert_eq!(record.action_taken, "Replaced capacitor bank");
        assert_eq!(record.cost, Some(1250.0));
    }

    #[test]
    fn test_direct_edit_bypasses_rules() {
        let mut b = board("SMW-B-001", BoardStatus::Returned, "Mill 1");
        b.substitute_board = Some("SMW-S-001".to_string());
        let patch = BoardPatch {
            current_status: Some(BoardStatus::InRepair),
            current_location: Some("ElectroServ India".to_string()),
            substitute_board: Some(None),
            ..Default::default()
        };
        let now = Utc::now();

        let next = direct_edit(&b, &patch, now);
        assert_eq!(next.current_status, BoardStatus::InRepair);
        assert_eq!(next.current_location, "ElectroServ India");
        assert_eq!(next.substitute_board, None);
        assert_eq!(next.mill_assigned, "Mill 1");
        assert_eq!(next.updated_at, now);
    }

    #[test]
    fn test_available_substitutes() {
        let mut covered = board("SMW-B-001", BoardStatus::SentForService, "Mill 1");
        covered.substitute_board = Some("SMW-S-001".to_string());
        let boards = vec![
            covered,
            board("SMW-S-001", BoardStatus::InUse, "Mill 1"),
            board("SMW-S-002", BoardStatus::InUse, "Mill 2"),
            board("SMW-S-003", BoardStatus::InRepair, "Mill 2"),
            board("SMW-B-002", BoardStatus::InUse, "Mill 2"),
        ];

        let ids: Vec<&str> = available_substitutes(&boards, "SMW-S-")
            .iter()
            .map(|b| b.board_id.as_str())
            .collect();
        assert_eq!(ids, vec!["SMW-S-002"]);
    }
}
