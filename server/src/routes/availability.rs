use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use db::availability::{CreateExceptionInput, CreateRuleInput, ExpandInput, ExpansionOutcome};
use db::entities::{AvailabilityRule, RuleException};

use crate::error::{data, ApiError, Data};
use crate::identity::{Identity, LeagueId};
use crate::AppState;

pub async fn list_rules(
    State(state): State<AppState>,
    _identity: Identity,
    league: LeagueId,
) -> Result<Json<Data<Vec<AvailabilityRule>>>, ApiError> {
    let rules = state.client.list_rules(&league.0).await?;
    Ok(data(rules))
}

pub async fn create_rule(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Json(input): Json<CreateRuleInput>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let rule = state.client.create_rule(&ctx, input).await?;
    Ok((StatusCode::CREATED, data(rule)))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Path(rule_id): Path<String>,
) -> Result<Json<Data<()>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    state.client.delete_rule(&ctx, &rule_id).await?;
    Ok(data(()))
}

pub async fn add_exception(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Path(rule_id): Path<String>,
    Json(input): Json<CreateExceptionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let exception = state.client.add_exception(&ctx, &rule_id, input).await?;
    Ok((StatusCode::CREATED, data::<RuleException>(exception)))
}

/// Materializes the league's availability rules into open slots over the
/// requested window.
pub async fn expand(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Json(input): Json<ExpandInput>,
) -> Result<Json<Data<ExpansionOutcome>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let outcome = state.client.expand_and_apply(&ctx, input).await?;
    Ok(data(outcome))
}
