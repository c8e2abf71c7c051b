use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    error::Result,
    events::ChangeEvent,
    models::{CreateMillRequest, Mill, UpdateMillRequest},
    permissions::Permission,
    AppState,
};

pub async fn list_mills(State(state): State<AppState>, auth: AuthenticatedUser) -> Result<Json<Vec<Mill>>> {
    auth.require(Permission::ViewBoards)?;
    Ok(Json(state.live.snapshot().await.mills.clone()))
}

pub async fn get_mill(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Mill>> {
    auth.require(Permission::ViewBoards)?;
    Ok(Json(state.db.get_mill(id).await?))
}

pub async fn create_mill(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(req): Json<CreateMillRequest>,
) -> Result<(StatusCode, Json<Mill>)> {
    auth.require(Permission::ManageMasterData)?;
    req.validate()?;

    let mill = state.db.create_mill(&req).await?;
    tracing::info!(mill = %mill.name, by = %auth.email, "Mill added");

    state.live.put_mill(mill.clone()).await;
    state.events.publish(ChangeEvent::MillUpserted(mill.clone()));
    Ok((StatusCode::CREATED, Json(mill)))
}

pub async fn update_mill(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMillRequest>,
) -> Result<Json<Mill>> {
    auth.require(Permission::ManageMasterData)?;
    req.validate()?;

    let mill = state.db.update_mill(id, &req).await?;
    state.live.put_mill(mill.clone()).await;
    state.events.publish(ChangeEvent::MillUpserted(mill.clone()));
    Ok(Json(mill))
}

/// Refused while boards are still assigned to the mill
pub async fn delete_mill(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require(Permission::ManageMasterData)?;

    state.db.delete_mill(id).await?;
    tracing::info!(%id, by = %auth.email, "Mill removed");

    state.live.remove_mill(id).await;
    state.events.publish(ChangeEvent::MillDeleted { id });
    Ok(StatusCode::NO_CONTENT)
}
