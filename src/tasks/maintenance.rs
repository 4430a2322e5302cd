use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::ReviewTask;
use crate::db::types::ReviewAction;
use crate::repositories::{attempts, reviews, section_attempts};
use crate::services::attempt_finalize::{self, FollowUp};

/// Upper bound per sweep pass. Anything left over is picked up on the next
/// tick, which keeps a single pass from holding the pool for minutes after
/// downtime.
const SWEEP_BATCH: i64 = 200;

/// Scheduled half of deadline enforcement. The lazy check in the API closes a
/// section when the candidate comes back; this sweep closes the ones nobody
/// comes back to, so their attempts can still aggregate. A failure on one
/// record logs and moves on to the rest of the batch.
pub(crate) async fn close_expired_section_attempts(state: &AppState) -> Result<usize> {
    let now = primitive_now_utc();

    let expired = section_attempts::list_expired(state.db(), now, SWEEP_BATCH)
        .await
        .context("Failed to list expired section attempts")?;
    if expired.is_empty() {
        return Ok(0);
    }

    let mut closed = 0;
    for record in &expired {
        match section_attempts::close(state.db(), &record.id, None, None, now).await {
            Ok(true) => {}
            // Submitted or closed between the listing and this update.
            Ok(false) => continue,
            Err(err) => {
                tracing::error!(
                    section_attempt_id = %record.id,
                    error = %err,
                    "Failed to close expired section attempt"
                );
                continue;
            }
        }

        closed += 1;
        metrics::counter!("exam_sections_expired_total").increment(1);
        attempt_finalize::execute_follow_ups(
            state,
            vec![FollowUp::Aggregate { attempt_id: record.attempt_id.clone() }],
        )
        .await;
    }

    if closed > 0 {
        tracing::info!(closed, "Closed expired section attempts");
    }

    Ok(closed)
}

/// Returns reviews that sat in `reviewing` past the stale window back to the
/// pending queue. Draft scores are dropped with the claim so the next
/// reviewer starts clean; the audit log keeps the reset itself.
pub(crate) async fn reset_stale_reviews(state: &AppState) -> Result<usize> {
    let now = primitive_now_utc();
    let cutoff = state.settings().review().stale_cutoff(now);

    let tasks = reviews::list_stale(state.db(), cutoff, SWEEP_BATCH)
        .await
        .context("Failed to list stale review tasks")?;
    if tasks.is_empty() {
        return Ok(0);
    }

    let mut reclaimed = 0;
    for task in &tasks {
        match reset_stale_task(state.db(), task, cutoff).await {
            Ok(true) => {
                reclaimed += 1;
                metrics::counter!("review_tasks_stale_reset_total").increment(1);
                tracing::info!(
                    task_id = %task.id,
                    reviewer_id = ?task.reviewer_id,
                    "Returned stale review task to the queue"
                );
            }
            // The reviewer touched the task after the listing; their claim stands.
            Ok(false) => {}
            Err(err) => {
                tracing::error!(
                    task_id = %task.id,
                    error = %err,
                    "Failed to reset stale review task"
                );
            }
        }
    }

    if reclaimed > 0 {
        tracing::info!(reclaimed, "Reset stale review tasks");
    }

    Ok(reclaimed)
}

async fn reset_stale_task(
    pool: &PgPool,
    task: &ReviewTask,
    cutoff: time::PrimitiveDateTime,
) -> Result<bool> {
    let now = primitive_now_utc();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let reset = reviews::reset_stale(&mut *tx, &task.id, cutoff, now)
        .await
        .context("Failed to reset review task")?;
    if !reset {
        return Ok(false);
    }

    reviews::delete_question_scores(&mut *tx, &task.id)
        .await
        .context("Failed to drop draft question scores")?;
    reviews::append_log(
        &mut *tx,
        reviews::AppendLog {
            id: &Uuid::new_v4().to_string(),
            review_task_id: &task.id,
            actor_id: None,
            action: ReviewAction::StaleReset,
            question_number: None,
            old_value: None,
            new_value: None,
            created_at: now,
        },
    )
    .await
    .context("Failed to record stale reset")?;

    tx.commit().await.context("Failed to commit stale reset")?;
    Ok(true)
}

/// Backstop for attempts whose aggregation follow-up was lost, typically to a
/// crash between a section closing and the follow-up running. Finalization is
/// idempotent, so re-driving an attempt that already settled is harmless.
pub(crate) async fn finalize_pending_attempts(state: &AppState) -> Result<usize> {
    let ids = attempts::list_finalize_candidates(state.db(), SWEEP_BATCH)
        .await
        .context("Failed to list attempts pending aggregation")?;

    let driven = ids.len();
    for attempt_id in ids {
        attempt_finalize::execute_follow_ups(state, vec![FollowUp::Aggregate { attempt_id }])
            .await;
    }

    Ok(driven)
}
