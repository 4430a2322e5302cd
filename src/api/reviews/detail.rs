use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentReviewer;
use crate::core::state::AppState;
use crate::db::models::User;
use crate::db::types::ReviewStatus;
use crate::repositories;
use crate::schemas::review::{
    format_primitive, QuestionScoreResponse, ReviewDetailResponse, ReviewLogResponse,
};
use crate::services::scoring;

/// Pending tasks are open to every reviewer; once claimed, only the holder
/// may look inside.
pub(in crate::api::reviews) fn check_visibility(
    status: ReviewStatus,
    reviewer_id: Option<&str>,
    user: &User,
) -> Result<(), ApiError> {
    if status == ReviewStatus::Pending || reviewer_id == Some(user.id.as_str()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("This review belongs to another reviewer"))
    }
}

pub(in crate::api::reviews) async fn get_review(
    Path(task_id): Path<String>,
    CurrentReviewer(reviewer): CurrentReviewer,
    State(state): State<AppState>,
) -> Result<Json<ReviewDetailResponse>, ApiError> {
    let task = repositories::reviews::find_task(state.db(), &task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch review task"))?
        .ok_or_else(|| ApiError::NotFound("Review task not found".to_string()))?;

    check_visibility(task.status, task.reviewer_id.as_deref(), &reviewer)?;

    let row = repositories::reviews::find_queue_row(state.db(), &task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch review task"))?
        .ok_or_else(|| ApiError::Internal("Review task joins are missing".to_string()))?;

    let section_attempt =
        repositories::section_attempts::find_by_id(state.db(), &task.section_attempt_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch section attempt"))?
            .ok_or_else(|| ApiError::Internal("Section attempt is missing".to_string()))?;
    let section = repositories::exams::find_section(state.db(), &section_attempt.section_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch section"))?;

    let question_scores = repositories::reviews::list_question_scores(state.db(), &task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list question scores"))?
        .into_iter()
        .map(|score| QuestionScoreResponse {
            question_number: score.question_number,
            score: score.score,
            max_score: score.max_score,
            comment: score.comment,
        })
        .collect();

    let audit_log = repositories::reviews::list_logs(state.db(), &task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list review log"))?
        .into_iter()
        .map(|entry| ReviewLogResponse {
            action: entry.action,
            actor_id: entry.actor_id,
            question_number: entry.question_number,
            old_value: entry.old_value,
            new_value: entry.new_value,
            created_at: format_primitive(entry.created_at),
        })
        .collect();

    let word_count =
        section_attempt.response_text.as_deref().map(scoring::word_count).unwrap_or(0);

    Ok(Json(ReviewDetailResponse {
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
        prompt: section.and_then(|section| section.prompt),
        response_text: section_attempt.response_text,
        word_count,
        question_scores,
        audit_log,
        submitted_at: format_primitive(row.submitted_at),
        reviewed_at: task.reviewed_at.map(format_primitive),
        created_at: format_primitive(row.created_at),
        updated_at: format_primitive(row.updated_at),
    }))
}
