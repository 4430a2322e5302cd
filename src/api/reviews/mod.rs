mod claim;
mod detail;
mod queue;
mod score;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/queue", get(queue::list_queue))
        .route("/:task_id", get(detail::get_review))
        .route("/:task_id/claim", post(claim::claim_task))
        .route("/:task_id/score", post(score::submit_score))
}

#[cfg(test)]
mod tests;
