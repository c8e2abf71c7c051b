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
    models::{CreatePartnerRequest, ServicePartner, UpdatePartnerRequest},
    permissions::Permission,
    AppState,
};

pub async fn list_partners(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<Vec<ServicePartner>>> {
    auth.require(Permission::ViewBoards)?;
    Ok(Json(state.live.snapshot().await.partners.clone()))
}

pub async fn get_partner(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ServicePartner>> {
    auth.require(Permission::ViewBoards)?;
    Ok(Json(state.db.get_partner(id).await?))
}

pub async fn create_partner(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(req): Json<CreatePartnerRequest>,
) -> Result<(StatusCode, Json<ServicePartner>)> {
    auth.require(Permission::ManageMasterData)?;
    req.validate()?;

    let partner = state.db.create_partner(&req).await?;
    tracing::info!(partner = %partner.name, by = %auth.email, "Service partner added");

    state.live.put_partner(partner.clone()).await;
    state.events.publish(ChangeEvent::PartnerUpserted(partner.clone()));
    Ok((StatusCode::CREATED, Json(partner)))
}

pub async fn update_partner(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePartnerRequest>,
) -> Result<Json<ServicePartner>> {
    auth.require(Permission::ManageMasterData)?;
    req.validate()?;

    let partner = state.db.update_partner(id, &req).await?;
    state.live.put_partner(partner.clone()).await;
    state.events.publish(ChangeEvent::PartnerUpserted(partner.clone()));
    Ok(Json(partner))
}

pub async fn delete_partner(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require(Permission::ManageMasterData)?;

    state.db.delete_partner(id).await?;
    tracing::info!(%id, by = %auth.email, "Service partner removed");

    state.live.remove_partner(id).await;
    state.events.publish(ChangeEvent::PartnerDeleted { id });
    Ok(StatusCode::NO_CONTENT)
}
