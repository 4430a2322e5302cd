use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentReviewer;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{ReviewAction, ReviewStatus};
use crate::repositories;
use crate::schemas::review::ReviewQueueItemResponse;
use crate::services::attempt_finalize;

use super::queue::queue_item;

/// Moves a pending task to reviewing under the caller's name. The capacity
/// count and the claim run in one transaction with the task row locked, so
/// two reviewers cannot both take the last slot.
pub(in crate::api::reviews) async fn claim_task(
    Path(task_id): Path<String>,
    CurrentReviewer(reviewer): CurrentReviewer,
    State(state): State<AppState>,
) -> Result<Json<ReviewQueueItemResponse>, ApiError> {
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

    if task.status != ReviewStatus::Pending {
        return Err(ApiError::InvalidState("Review task is already claimed".to_string()));
    }

    let reviewing = repositories::reviews::count_reviewing(&mut *tx, &reviewer.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count claimed reviews"))?;
    let capacity = state.settings().review().capacity as i64;
    if reviewing >= capacity {
        return Err(ApiError::CapacityExceeded(
            "Finish some of your claimed reviews before taking more",
        ));
    }

    let claimed = repositories::reviews::claim(&mut *tx, &task_id, &reviewer.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to claim review task"))?;
    if !claimed {
        return Err(ApiError::InvalidState("Review task is already claimed".to_string()));
    }

    repositories::reviews::append_log(
        &mut *tx,
        repositories::reviews::AppendLog {
            id: &Uuid::new_v4().to_string(),
            review_task_id: &task_id,
            actor_id: Some(&reviewer.id),
            action: ReviewAction::Claim,
            question_number: None,
            old_value: None,
            new_value: None,
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to log claim"))?;

    let notification_message_id = task.notification_message_id;
    if notification_message_id.is_some() {
        repositories::reviews::clear_notification_message(&mut *tx, &task_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to clear notification reference"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(task_id = %task_id, reviewer_id = %reviewer.id, "Review task claimed");

    if let Some(message_id) = notification_message_id {
        attempt_finalize::execute_follow_ups(
            &state,
            vec![attempt_finalize::FollowUp::RetractNotification { message_id }],
        )
        .await;
    }

    let row = repositories::reviews::find_queue_row(state.db(), &task_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch review task"))?
        .ok_or_else(|| ApiError::Internal("Review task joins are missing".to_string()))?;

    Ok(Json(queue_item(row)))
}
