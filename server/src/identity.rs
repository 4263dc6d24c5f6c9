//! Extractors for the identity headers injected by the edge.
//!
//! `x-user-id` / `x-user-email` identify the caller (missing -> 401);
//! `x-league-id` scopes the request to a league (missing -> 400). Header
//! values never reach the logs.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const LEAGUE_ID_HEADER: &str = "x-league-id";

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

#[derive(Clone, Debug)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing identity headers"))?;
        let email = header(parts, USER_EMAIL_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing identity headers"))?;

        Ok(Self { user_id, email })
    }
}

#[derive(Clone, Debug)]
pub struct LeagueId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for LeagueId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header(parts, LEAGUE_ID_HEADER)
            .map(Self)
            .ok_or_else(|| ApiError::bad_request("missing x-league-id header"))
    }
}
