//! Role to operation and role to editable-field maps

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Board, BoardField, BoardPatch, Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    ViewBoards,
    CreateBoard,
    EditBoard,
    DeleteBoard,
    SendForService,
    UpdateRepairProgress,
    RecordInward,
    ViewReports,
    ExportReports,
    ManageMasterData,
    ManageUsers,
    Backup,
}

impl Permission {
    pub const ALL: [Permission; 12] = [
        Permission::ViewBoards,
        Permission::CreateBoard,
        Permission::EditBoard,
        Permission::DeleteBoard,
        Permission::SendForService,
        Permission::UpdateRepairProgress,
        Permission::RecordInward,
        Permission::ViewReports,
        Permission::ExportReports,
        Permission::ManageMasterData,
        Permission::ManageUsers,
        Permission::Backup,
    ];
}

const BOARD_FIELDS: [BoardField; 8] = [
    BoardField::BoardId,
    BoardField::CurrentStatus,
    BoardField::CurrentLocation,
    BoardField::MillAssigned,
    BoardField::WarrantyStatus,
    BoardField::WarrantyExpiry,
    BoardField::PurchaseDate,
    BoardField::SubstituteBoard,
];

pub fn permissions(role: Role) -> &'static [Permission] {
    use Permission::*;
    match role {
        Role::Admin => &Permission::ALL,
        Role::MillSupervisor => &[
            ViewBoards,
            EditBoard,
            SendForService,
            RecordInward,
            ViewReports,
            ExportReports,
        ],
        Role::ServicePartner => &[ViewBoards, EditBoard, UpdateRepairProgress, ViewReports],
        Role::Viewer => &[ViewBoards, ViewReports],
    }
}

pub fn editable_fields(role: Role) -> &'static [BoardField] {
    match role {
        Role::Admin => &BOARD_FIELDS,
        Role::MillSupervisor => &[
            BoardField::CurrentLocation,
            BoardField::CurrentStatus,
            BoardField::SubstituteBoard,
        ],
        Role::ServicePartner => &[BoardField::CurrentStatus],
        Role::Viewer => &[],
    }
}

pub fn allows(role: Role, permission: Permission) -> bool {
    permissions(role).contains(&permission)
}

pub fn require(user: &User, permission: Permission) -> Result<()> {
    if allows(user.role, permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{} accounts may not perform this action",
            user.role.as_str()
        )))
    }
}

/// Reject a direct edit touching fields outside the role's set
pub fn check_patch(role: Role, patch: &BoardPatch) -> Result<()> {
    let allowed = editable_fields(role);
    let denied: Vec<BoardField> = patch
        .fields()
        .into_iter()
        .filter(|f| !allowed.contains(f))
        .collect();

    if denied.is_empty() {
        Ok(())
    } else {
        let names: Vec<String> = denied
            .iter()
            .filter_map(|f| serde_json::to_value(f).ok())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        Err(AppError::Forbidden(format!(
            "{} accounts may not edit: {}",
            role.as_str(),
            names.join(", ")
        )))
    }
}

/// Affiliated users act only on their own mill's boards, or boards at their partner
pub fn check_scope(user: &User, board: &Board) -> Result<()> {
    let in_scope = match user.role {
        Role::MillSupervisor => user
            .mill
            .as_deref()
            .map_or(true, |mill| mill == board.mill_assigned),
        Role::ServicePartner => user
            .service_partner
            .as_deref()
            .map_or(true, |partner| partner == board.current_location),
        Role::Admin | Role::Viewer => true,
    };

    if in_scope {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Board {} is outside your assignment",
            board.board_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::board;
    use crate::models::{BoardStatus, UserStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: Role, mill: Option<&str>, partner: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "someone@smw.com".to_string(),
            name: "Someone".to_string(),
            role,
            status: UserStatus::Active,
            mill: mill.map(str::to_string),
            service_partner: partner.map(str::to_string),
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_operations() {
        assert!(allows(Role::Admin, Permission::Backup));
        assert!(allows(Role::MillSupervisor, Permission::SendForService));
        assert!(allows(Role::MillSupervisor, Permission::ExportReports));
        assert!(!allows(Role::MillSupervisor, Permission::UpdateRepairProgress));
        assert!(allows(Role::ServicePartner, Permission::UpdateRepairProgress));
        assert!(!allows(Role::ServicePartner, Permission::RecordInward));
        assert!(allows(Role::Viewer, Permission::ViewReports));
        assert!(!allows(Role::Viewer, Permission::EditBoard));
        assert!(!allows(Role::Viewer, Permission::ExportReports));
    }

    #[test]
    fn test_editable_fields() {
        let patch = BoardPatch {
            current_status: Some(BoardStatus::InRepair),
            ..Default::default()
        };
        assert!(check_patch(Role::ServicePartner, &patch).is_ok());
        assert!(check_patch(Role::Viewer, &patch).is_err());

        let relocate = BoardPatch {
            current_location: Some("Mill 3".to_string()),
            substitute_board: Some(None),
            ..Default::default()
        };
        assert!(check_patch(Role::MillSupervisor, &relocate).is_ok());
        assert!(check_patch(Role::ServicePartner, &relocate).is_err());

        let reassign = BoardPatch {
            mill_assigned: Some("Mill 3".to_string()),
            ..Default::default()
        };
        assert!(check_patch(Role::MillSupervisor, &reassign).is_err());
        assert!(check_patch(Role::Admin, &reassign).is_ok());
    }

    #[test]
    fn test_denied_fields_are_named() {
        let patch = BoardPatch {
            warranty_expiry: Some(Utc::now()),
            ..Default::default()
        };
        match check_patch(Role::MillSupervisor, &patch) {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("warrantyExpiry")),
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[test]
    fn test_affiliation_scope() {
        let b = board("SMW-B-002", BoardStatus::InUse, "Mill 2");

        assert!(check_scope(&user(Role::MillSupervisor, Some("Mill 2"), None), &b).is_ok());
        assert!(check_scope(&user(Role::MillSupervisor, Some("Mill 1"), None), &b).is_err());
        assert!(check_scope(&user(Role::MillSupervisor, None, None), &b).is_ok());

        let mut away = b.clone();
        away.current_location = "Sheltronics".to_string();
        assert!(check_scope(&user(Role::ServicePartner, None, Some("Sheltronics")), &away).is_ok());
        assert!(check_scope(&user(Role::ServicePartner, None, Some("Sheltronics")), &b).is_err());
        assert!(check_scope(&user(Role::Viewer, None, None), &b).is_ok());
    }
}
