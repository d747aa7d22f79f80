use crate::api::handlers::records;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/records", post(records::submit_record))
        .route(
            "/records/:id/request-correction",
            post(records::request_correction),
        )
        .route("/records/:id/not-duplicate", post(records::mark_not_duplicate))
}
