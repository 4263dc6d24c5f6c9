use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use db::entities::Slot;
use db::slots::{CreateSlotInput, ListSlotsQuery, UpdateSlotInput};

use crate::error::{data, ApiError, Data};
use crate::identity::{Identity, LeagueId};
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    _identity: Identity,
    league: LeagueId,
    Query(query): Query<ListSlotsQuery>,
) -> Result<Json<Data<Vec<Slot>>>, ApiError> {
    let slots = state.client.list_slots(&league.0, &query).await?;
    Ok(data(slots))
}

pub async fn get_one(
    State(state): State<AppState>,
    _identity: Identity,
    league: LeagueId,
    Path(slot_id): Path<String>,
) -> Result<Json<Data<Slot>>, ApiError> {
    state
        .client
        .get_slot(&league.0, &slot_id)
        .await?
        .map(data)
        .ok_or_else(|| ApiError::not_found(format!("slot {slot_id} not found")))
}

pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Json(input): Json<CreateSlotInput>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let slot = state.client.create_slot(&ctx, input).await?;
    Ok((StatusCode::CREATED, data(slot)))
}

pub async fn update(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Path(slot_id): Path<String>,
    Json(input): Json<UpdateSlotInput>,
) -> Result<Json<Data<Slot>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let slot = state.client.update_slot(&ctx, &slot_id, input).await?;
    Ok(data(slot))
}

pub async fn cancel(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Path(slot_id): Path<String>,
) -> Result<Json<Data<Slot>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let slot = state.client.cancel_slot(&ctx, &slot_id).await?;
    Ok(data(slot))
}
