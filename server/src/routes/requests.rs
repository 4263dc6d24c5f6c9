use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use db::entities::{GameType, Request};
use db::requests::CreateRequestInput;

use crate::error::{data, ApiError, Data};
use crate::identity::{Identity, LeagueId};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub slot: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Query(query): Query<ListQuery>,
) -> Result<Json<Data<Vec<Request>>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let requests = state
        .client
        .list_requests(&ctx, query.slot.as_deref())
        .await?;
    Ok(data(requests))
}

async fn create(
    state: AppState,
    identity: Identity,
    league: LeagueId,
    input: CreateRequestInput,
    game_type: GameType,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let request = state.client.create_request(&ctx, input, game_type).await?;
    Ok((StatusCode::CREATED, data(request)))
}

pub async fn create_game(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Json(input): Json<CreateRequestInput>,
) -> Result<impl IntoResponse, ApiError> {
    create(state, identity, league, input, GameType::Game).await
}

pub async fn create_practice(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Json(input): Json<CreateRequestInput>,
) -> Result<impl IntoResponse, ApiError> {
    create(state, identity, league, input, GameType::Practice).await
}

pub async fn approve_game(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Path(request_id): Path<String>,
) -> Result<Json<Data<Request>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let request = state
        .client
        .approve_request(&ctx, &request_id, GameType::Game)
        .await?;
    Ok(data(request))
}

pub async fn approve_practice(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Path(request_id): Path<String>,
) -> Result<Json<Data<Request>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let request = state
        .client
        .approve_request(&ctx, &request_id, GameType::Practice)
        .await?;
    Ok(data(request))
}

pub async fn reject_game(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Path(request_id): Path<String>,
) -> Result<Json<Data<Request>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let request = state
        .client
        .reject_request(&ctx, &request_id, GameType::Game)
        .await?;
    Ok(data(request))
}

pub async fn reject_practice(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Path(request_id): Path<String>,
) -> Result<Json<Data<Request>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let request = state
        .client
        .reject_request(&ctx, &request_id, GameType::Practice)
        .await?;
    Ok(data(request))
}

pub async fn withdraw(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Path(request_id): Path<String>,
) -> Result<Json<Data<Request>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let request = state.client.withdraw_request(&ctx, &request_id).await?;
    Ok(data(request))
}
