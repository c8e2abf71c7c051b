use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use super::publish_transition;
use crate::{
    auth::AuthenticatedUser,
    error::Result,
    events::ChangeEvent,
    lifecycle::{self, RepairStep, Rules, Transition},
    models::{Board, BoardFilter, BoardPatch, CreateBoardRequest, InwardEntryRequest, SendForServiceRequest},
    permissions::{check_patch, check_scope, Permission},
    AppState,
};

/// Result of a lifecycle action
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub board: Board,
    /// Substitute moved by the same action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substitute: Option<Board>,
    /// Spare sent back to its own mill
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<Board>,
}

impl From<Transition> for TransitionResponse {
    fn from(t: Transition) -> Self {
        Self {
            board: t.board,
            substitute: t.substitute,
            released: t.released,
        }
    }
}

pub async fn list_boards(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(filter): Query<BoardFilter>,
) -> Result<Json<Vec<Board>>> {
    auth.require(Permission::ViewBoards)?;

    let snapshot = state.live.snapshot().await;
    let boards = snapshot
        .boards
        .iter()
        .filter(|b| filter.matches(b))
        .cloned()
        .collect();
    Ok(Json(boards))
}

/// Spares that can be deployed right now
pub async fn list_substitutes(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<Vec<Board>>> {
    auth.require(Permission::ViewBoards)?;

    let snapshot = state.live.snapshot().await;
    let spares = lifecycle::available_substitutes(&snapshot.boards, &state.config.policy.substitute_prefix)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(spares))
}

pub async fn get_board(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Board>> {
    auth.require(Permission::ViewBoards)?;
    Ok(Json(state.db.get_board(id).await?))
}

pub async fn create_board(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(req): Json<CreateBoardRequest>,
) -> Result<(StatusCode, Json<Board>)> {
    auth.require(Permission::CreateBoard)?;
    req.validate()?;

    let board = state.db.create_board(&req).await?;
    tracing::info!(board = %board.board_id, mill = %board.mill_assigned, by = %auth.email, "Board registered");

    state.live.put_board(board.clone()).await;
    state.events.publish(ChangeEvent::BoardUpserted(board.clone()));
    Ok((StatusCode::CREATED, Json(board)))
}

/// Direct edit, limited to the fields the caller's role may touch
pub async fn update_board(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<BoardPatch>,
) -> Result<Json<Board>> {
    auth.require(Permission::EditBoard)?;
    check_patch(auth.role, &patch)?;

    let board = state
        .db
        .edit_board(id, &patch, |b| check_scope(&auth.user, b))
        .await?;

    state.live.put_board(board.clone()).await;
    state.events.publish(ChangeEvent::BoardUpserted(board.clone()));
    Ok(Json(board))
}

pub async fn delete_board(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require(Permission::DeleteBoard)?;

    state.db.delete_board(id).await?;
    tracing::info!(%id, by = %auth.email, "Board deleted");

    state.live.remove_board(id).await;
    state.events.publish(ChangeEvent::BoardDeleted { id });
    Ok(StatusCode::NO_CONTENT)
}

pub async fn send_for_service(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SendForServiceRequest>,
) -> Result<Json<TransitionResponse>> {
    auth.require(Permission::SendForService)?;
    req.validate()?;

    let rules = Rules::from(&state.config.policy);
    let transition = state
        .db
        .send_for_service(id, &req, rules, |b| check_scope(&auth.user, b))
        .await?;

    publish_transition(&state.live, &state.events, &transition).await;
    Ok(Json(transition.into()))
}

async fn advance(state: AppState, auth: AuthenticatedUser, id: Uuid, step: RepairStep) -> Result<Json<Board>> {
    auth.require(Permission::UpdateRepairProgress)?;

    let board = state
        .db
        .advance_repair(id, step, |b| check_scope(&auth.user, b))
        .await?;

    state.live.put_board(board.clone()).await;
    state.events.publish(ChangeEvent::BoardUpserted(board.clone()));
    Ok(Json(board))
}

pub async fn start_repair(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Board>> {
    advance(state, auth, id, RepairStep::Start).await
}

pub async fn complete_repair(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Board>> {
    advance(state, auth, id, RepairStep::Complete).await
}

pub async fn process_inward(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<InwardEntryRequest>,
) -> Result<Json<TransitionResponse>> {
    auth.require(Permission::RecordInward)?;
    req.validate()?;

    let transition = state
        .db
        .process_inward(id, &req, |b| check_scope(&auth.user, b))
        .await?;

    publish_transition(&state.live, &state.events, &transition).await;
    Ok(Json(transition.into()))
}
