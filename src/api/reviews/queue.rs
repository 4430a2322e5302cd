use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentReviewer;
use crate::api::pagination::{self, PaginatedResponse};
use crate::core::state::AppState;
use crate::db::types::{ExamTrack, ReviewStatus, SectionKind};
use crate::repositories;
use crate::schemas::review::{format_primitive, ReviewQueueItemResponse};

#[derive(Debug, Deserialize)]
pub(in crate::api::reviews) struct QueueQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    limit: i64,
    #[serde(default)]
    status: Option<ReviewStatus>,
    #[serde(default)]
    kind: Option<SectionKind>,
    #[serde(default)]
    track: Option<ExamTrack>,
    #[serde(default)]
    search: Option<String>,
}

pub(in crate::api::reviews) fn queue_item(row: repositories::reviews::QueueRow) -> ReviewQueueItemResponse {
    ReviewQueueItemResponse {
        id: row.id,
        status: row.status,
        section_attempt_id: row.section_attempt_id,
        kind: row.kind,
        candidate_id: row.candidate_id,
        candidate_name: row.candidate_name,
        candidate_username: row.candidate_username,
        exam_id: row.exam_id,
        exam_title: row.exam_title,
        track: row.track,
        language: row.language,
        reviewer_id: row.reviewer_id,
        total_score: row.total_score,
        submitted_at: format_primitive(row.submitted_at),
        created_at: format_primitive(row.created_at),
        updated_at: format_primitive(row.updated_at),
    }
}

pub(in crate::api::reviews) async fn list_queue(
    CurrentReviewer(reviewer): CurrentReviewer,
    State(state): State<AppState>,
    Query(params): Query<QueueQuery>,
) -> Result<Json<PaginatedResponse<ReviewQueueItemResponse>>, ApiError> {
    let (skip, limit) = pagination::window(params.skip, params.limit);

    let rows = repositories::reviews::list_queue(
        state.db(),
        repositories::reviews::QueueParams {
            reviewer_id: &reviewer.id,
            status: params.status,
            kind: params.kind,
            track: params.track,
            search: params.search.as_deref().filter(|search| !search.trim().is_empty()),
            skip,
            limit,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list review queue"))?;

    let total_count = rows.first().map(|row| row.total_count).unwrap_or(0);
    let items = rows.into_iter().map(queue_item).collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}
