mod helpers;
mod open;
mod results;
mod submit;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:exam_id/sections/:kind/open", post(open::open_section))
        .route("/section-attempts/:section_attempt_id/answers", post(submit::submit_answers))
        .route("/attempts", get(results::list_attempts))
        .route("/attempts/:attempt_id", get(results::get_attempt))
}
