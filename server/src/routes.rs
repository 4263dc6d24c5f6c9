pub mod availability;
pub mod requests;
pub mod schedule;
pub mod slots;

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/slots", get(slots::list).post(slots::create))
        .route(
            "/slots/:slot_id",
            get(slots::get_one).patch(slots::update).delete(slots::cancel),
        )
        .route("/requests", get(requests::list).post(requests::create_game))
        .route("/requests/:request_id/approve", patch(requests::approve_game))
        .route("/requests/:request_id/reject", patch(requests::reject_game))
        .route("/requests/:request_id/withdraw", patch(requests::withdraw))
        .route("/practice-requests", post(requests::create_practice))
        .route(
            "/practice-requests/:request_id/approve",
            patch(requests::approve_practice),
        )
        .route(
            "/practice-requests/:request_id/reject",
            patch(requests::reject_practice),
        )
        .route(
            "/availability/rules",
            get(availability::list_rules).post(availability::create_rule),
        )
        .route("/availability/rules/:rule_id", delete(availability::delete_rule))
        .route(
            "/availability/rules/:rule_id/exceptions",
            post(availability::add_exception),
        )
        .route("/availability/expand", post(availability::expand))
        .route("/schedule/preview", post(schedule::preview))
        .route("/schedule/apply", post(schedule::apply))
        .route("/schedule/export", get(schedule::export))
        .route("/schedule/report", get(schedule::report))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
