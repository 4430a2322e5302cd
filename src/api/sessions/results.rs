use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{self, PaginatedResponse};
use crate::core::state::AppState;
use crate::db::types::SectionStatus;
use crate::repositories;
use crate::schemas::session::{
    format_primitive, AttemptDetailResponse, AttemptSummaryResponse,
    SectionAttemptSummaryResponse,
};

#[derive(Debug, Deserialize)]
pub(in crate::api::sessions) struct ListAttemptsQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    limit: i64,
}

pub(in crate::api::sessions) async fn list_attempts(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ListAttemptsQuery>,
) -> Result<Json<PaginatedResponse<AttemptSummaryResponse>>, ApiError> {
    let (skip, limit) = pagination::window(params.skip, params.limit);

    let attempts = repositories::attempts::list_by_candidate(state.db(), &user.id, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;
    let total_count = repositories::attempts::count_by_candidate(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    let exam_ids: Vec<String> = attempts.iter().map(|attempt| attempt.exam_id.clone()).collect();
    let titles: HashMap<String, String> = repositories::exams::titles_by_ids(state.db(), &exam_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam titles"))?
        .into_iter()
        .map(|row| (row.id, row.title))
        .collect();

    let items = attempts
        .into_iter()
        .map(|attempt| AttemptSummaryResponse {
            id: attempt.id,
            exam_title: titles.get(&attempt.exam_id).cloned().unwrap_or_default(),
            exam_id: attempt.exam_id,
            status: attempt.status,
            score: attempt.score,
            level: attempt.level.map(|level| level.label().to_string()),
            created_at: format_primitive(attempt.created_at),
            updated_at: format_primitive(attempt.updated_at),
        })
        .collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

pub(in crate::api::sessions) async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptDetailResponse>, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    if attempt.candidate_id != user.id {
        return Err(ApiError::NotFound("Attempt not found".to_string()));
    }

    let exam = repositories::exams::find_by_id(state.db(), &attempt.exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let section_attempts =
        repositories::section_attempts::list_by_attempt(state.db(), &attempt.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list section attempts"))?;
    let required_kinds = repositories::exams::section_kinds(state.db(), &attempt.exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exam section kinds"))?;

    let completed_kinds: std::collections::HashSet<_> = section_attempts
        .iter()
        .filter(|record| record.status == SectionStatus::Completed)
        .map(|record| record.kind)
        .collect();

    let sections = section_attempts
        .into_iter()
        .map(|record| SectionAttemptSummaryResponse {
            id: record.id,
            section_id: record.section_id,
            kind: record.kind,
            status: record.status,
            score: record.score,
            start_time: format_primitive(record.start_time),
            end_time: record.end_time.map(format_primitive),
        })
        .collect();

    Ok(Json(AttemptDetailResponse {
        id: attempt.id,
        exam_id: attempt.exam_id,
        exam_title: exam.title,
        track: exam.track,
        status: attempt.status,
        score: attempt.score,
        level: attempt.level.map(|level| level.label().to_string()),
        completed_sections: completed_kinds.len(),
        total_sections: required_kinds.len(),
        sections,
        created_at: format_primitive(attempt.created_at),
        updated_at: format_primitive(attempt.updated_at),
    }))
}
