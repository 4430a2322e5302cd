use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentReviewer;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{ReviewAction, ReviewStatus};
use crate::repositories;
use crate::schemas::review::{format_primitive, SubmitScoreRequest, SubmitScoreResponse};
use crate::services::{attempt_finalize, scoring};

use super::detail::check_visibility;

/// Saves a draft or finishes the review. Finishing stamps the score onto the
/// section attempt and wakes the attempt aggregator; every score change lands
/// in the audit log either way.
pub(in crate::api::reviews) async fn submit_score(
    Path(task_id): Path<String>,
    CurrentReviewer(reviewer): CurrentReviewer,
    State(state): State<AppState>,
    Json(payload): Json<SubmitScoreRequest>,
) -> Result<Json<SubmitScoreResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let row = repositories::reviews::find_queue_row(state.db(), &task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch review task"))?
        .ok_or_else(|| ApiError::NotFound("Review task not found".to_string()))?;

    let section_cap = scoring::section_max(row.track);
    if payload.total_score > section_cap {
        return Err(ApiError::BadRequest(format!(
            "total_score must not exceed {section_cap} for this track"
        )));
    }

    let now = primitive_now_utc();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let task = repositories::reviews::find_task_for_update(&mut *tx, &task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch review task"))?
        .ok_or_else(|| ApiError::NotFound("Review task not found".to_string()))?;

    match task.status {
        ReviewStatus::Checked => {
            return Err(ApiError::InvalidState("Review is already checked".to_string()));
        }
        ReviewStatus::Pending => {
            return Err(ApiError::InvalidState("Claim the review before scoring".to_string()));
        }
        ReviewStatus::Reviewing => {
            check_visibility(task.status, task.reviewer_id.as_deref(), &reviewer)?;
        }
    }

    let existing: HashMap<i32, f64> =
        repositories::reviews::list_question_scores(&mut *tx, &task_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list question scores"))?
            .into_iter()
            .map(|score| (score.question_number, score.score))
            .collect();

    for question_score in &payload.question_scores {
        if question_score.score > question_score.max_score {
            return Err(ApiError::BadRequest(format!(
                "Question {} score exceeds its maximum",
                question_score.question_number
            )));
        }

        let old_value = existing.get(&question_score.question_number).copied();

        repositories::reviews::upsert_question_score(
            &mut *tx,
            repositories::reviews::UpsertQuestionScore {
                id: &Uuid::new_v4().to_string(),
                review_task_id: &task_id,
                question_number: question_score.question_number,
                score: question_score.score,
                max_score: question_score.max_score,
                comment: question_score.comment.as_deref(),
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to save question score"))?;

        let action = match old_value {
            None => Some(ReviewAction::CreateQuestionScore),
            Some(old) if old != question_score.score => Some(ReviewAction::UpdateQuestionScore),
            Some(_) => None,
        };

        if let Some(action) = action {
            repositories::reviews::append_log(
                &mut *tx,
                repositories::reviews::AppendLog {
                    id: &Uuid::new_v4().to_string(),
                    review_task_id: &task_id,
                    actor_id: Some(&reviewer.id),
                    action,
                    question_number: Some(question_score.question_number),
                    old_value,
                    new_value: Some(question_score.score),
                    created_at: now,
                },
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to log score change"))?;
        }
    }

    if payload.is_draft {
        repositories::reviews::save_draft(&mut *tx, &task_id, Some(payload.total_score), now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to save draft"))?;

        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

        return Ok(Json(SubmitScoreResponse {
            task_id,
            status: ReviewStatus::Reviewing,
            total_score: Some(payload.total_score),
            reviewed_at: None,
        }));
    }

    let checked =
        repositories::reviews::mark_checked(&mut *tx, &task_id, payload.total_score, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to mark review checked"))?;
    if !checked {
        return Err(ApiError::InvalidState("Review is already checked".to_string()));
    }

    if task.total_score != Some(payload.total_score) {
        repositories::reviews::append_log(
            &mut *tx,
            repositories::reviews::AppendLog {
                id: &Uuid::new_v4().to_string(),
                review_task_id: &task_id,
                actor_id: Some(&reviewer.id),
                action: ReviewAction::UpdateTotalScore,
                question_number: None,
                old_value: task.total_score,
                new_value: Some(payload.total_score),
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to log total score"))?;
    }

    repositories::reviews::append_log(
        &mut *tx,
        repositories::reviews::AppendLog {
            id: &Uuid::new_v4().to_string(),
            review_task_id: &task_id,
            actor_id: Some(&reviewer.id),
            action: ReviewAction::Checked,
            question_number: None,
            old_value: None,
            new_value: Some(payload.total_score),
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to log checked"))?;

    let section_attempt =
        repositories::section_attempts::find_by_id(&mut *tx, &task.section_attempt_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch section attempt"))?
            .ok_or_else(|| ApiError::Internal("Section attempt is missing".to_string()))?;

    repositories::section_attempts::set_reviewed_score(
        &mut *tx,
        &section_attempt.id,
        payload.total_score,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store reviewed score"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        task_id = %task_id,
        reviewer_id = %reviewer.id,
        total_score = payload.total_score,
        "Review checked"
    );

    attempt_finalize::execute_follow_ups(
        &state,
        vec![attempt_finalize::FollowUp::Aggregate {
            attempt_id: section_attempt.attempt_id.clone(),
        }],
    )
    .await;

    Ok(Json(SubmitScoreResponse {
        task_id,
        status: ReviewStatus::Checked,
        total_score: Some(payload.total_score),
        reviewed_at: Some(format_primitive(now)),
    }))
}
