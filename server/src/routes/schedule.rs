use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use backend::export::{encode, Dialect};
use backend::schedule::generate::generate;
use backend::schedule::{Constraints, ScheduleResult};
use db::report::PreScheduleReport;
use db::schedule::AppliedSchedule;

use crate::error::{data, ApiError, Data};
use crate::identity::{Identity, LeagueId};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub division: String,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub preferred_days: Option<Vec<String>>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    pub result: ScheduleResult,
    pub outcome: AppliedSchedule,
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("could not parse date `{raw}`")))
}

fn parse_window(request: &ScheduleRequest) -> Result<Option<(NaiveDate, NaiveDate)>, ApiError> {
    match (&request.from, &request.to) {
        (Some(from), Some(to)) => {
            let window = (parse_date(from)?, parse_date(to)?);
            if window.0 > window.1 {
                return Err(ApiError::bad_request("window start is after its end"));
            }
            Ok(Some(window))
        }
        (None, None) => Ok(None),
        _ => Err(ApiError::bad_request(
            "a schedule window needs both `from` and `to`",
        )),
    }
}

fn parse_preferred_days(request: &ScheduleRequest) -> Result<Option<Vec<Weekday>>, ApiError> {
    let Some(days) = &request.preferred_days else {
        return Ok(None);
    };

    days.iter()
        .map(|day| {
            day.parse::<Weekday>()
                .map_err(|_| ApiError::bad_request(format!("unknown weekday `{day}`")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

async fn run_generator(
    state: &AppState,
    identity: &Identity,
    league: &LeagueId,
    request: &ScheduleRequest,
) -> Result<(db::roles::RoleContext, ScheduleResult), ApiError> {
    let ctx = state.authorize(identity, league).await?;
    ctx.require_admin()?;

    let window = parse_window(request)?;
    let preferred_days = parse_preferred_days(request)?;

    let inputs = state
        .client
        .schedule_inputs(&ctx.league_id, &request.division, window)
        .await?;

    let result = generate(
        &inputs.teams,
        &inputs.open_slots,
        &request.constraints,
        preferred_days.as_deref(),
    );

    Ok((ctx, result))
}

/// Generator + validator, no writes.
pub async fn preview(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<Data<ScheduleResult>>, ApiError> {
    let (_, result) = run_generator(&state, &identity, &league, &request).await?;
    Ok(data(result))
}

/// Generator + persist: internal games confirm their slots, leftovers are
/// flagged as external offers.
pub async fn apply(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<Data<ApplyResponse>>, ApiError> {
    let (ctx, result) = run_generator(&state, &identity, &league, &request).await?;
    let outcome = state.client.apply_schedule(&ctx, &result).await?;
    Ok(data(ApplyResponse { result, outcome }))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub dialect: String,
    #[serde(default)]
    pub division: Option<String>,
}

pub async fn export(
    State(state): State<AppState>,
    _identity: Identity,
    league: LeagueId,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let dialect: Dialect = query
        .dialect
        .parse()
        .map_err(|error: backend::export::UnknownDialect| ApiError::bad_request(error.to_string()))?;

    let assignments = state
        .client
        .scheduled_assignments(&league.0, query.division.as_deref())
        .await?;
    let fields = state.client.field_directory(&league.0).await?;
    let team_names = state.client.team_names(&league.0).await?;

    let csv = encode(dialect, &assignments, &fields, &team_names)?;

    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        csv,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from: String,
    pub to: String,
}

pub async fn report(
    State(state): State<AppState>,
    identity: Identity,
    league: LeagueId,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Data<PreScheduleReport>>, ApiError> {
    let ctx = state.authorize(&identity, &league).await?;
    let report = state
        .client
        .pre_schedule_report(&ctx, parse_date(&query.from)?, parse_date(&query.to)?)
        .await?;
    Ok(data(report))
}
