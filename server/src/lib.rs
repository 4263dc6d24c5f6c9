//! HTTP front-end for the league scheduler.
//!
//! The edge injects identity headers; everything else — role gating, the
//! slot state machine, schedule generation — lives behind the `db` and
//! `backend` crates. Handlers translate between the response envelope and
//! typed domain operations, nothing more.

pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

pub use state::AppState;

use axum::Router;

pub fn app(state: AppState) -> Router {
    routes::router(state)
}
