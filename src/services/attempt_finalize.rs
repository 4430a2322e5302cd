use std::collections::VecDeque;

use anyhow::{Context, Result};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::services::notifier::{ResultNotification, ReviewNotification};
use crate::services::scoring;

/// Side effects owed after a state transition. Transition functions return
/// these instead of firing them inline so the caller controls ordering and
/// failure handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FollowUp {
    Aggregate { attempt_id: String },
    NotifyReviewers { task_id: String },
    NotifyCandidate { attempt_id: String },
    RetractNotification { message_id: i64 },
}

/// Drains a follow-up list. Aggregation may enqueue further follow-ups (the
/// candidate notification); failures are logged and never propagate, the
/// backstop sweep re-derives anything missed.
pub(crate) async fn execute_follow_ups(state: &AppState, follow_ups: Vec<FollowUp>) {
    let mut queue: VecDeque<FollowUp> = follow_ups.into();

    while let Some(follow_up) = queue.pop_front() {
        match follow_up {
            FollowUp::Aggregate { attempt_id } => {
                match finalize_attempt(state, &attempt_id).await {
                    Ok(more) => queue.extend(more),
                    Err(err) => {
                        tracing::error!(error = %err, attempt_id, "Failed to aggregate attempt");
                    }
                }
            }
            FollowUp::NotifyReviewers { task_id } => {
                if let Err(err) = notify_reviewers(state, &task_id).await {
                    tracing::error!(error = %err, task_id, "Failed to notify reviewers");
                }
            }
            FollowUp::NotifyCandidate { attempt_id } => {
                if let Err(err) = notify_candidate(state, &attempt_id).await {
                    tracing::error!(error = %err, attempt_id, "Failed to notify candidate");
                }
            }
            FollowUp::RetractNotification { message_id } => {
                state.notifier().retract_notification(message_id).await;
            }
        }
    }
}

/// Idempotent aggregator. Runs after every section close and after every
/// review reaches checked; only the invocation that flips the finalized flag
/// emits the candidate notification.
pub(crate) async fn finalize_attempt(
    state: &AppState,
    attempt_id: &str,
) -> Result<Vec<FollowUp>> {
    let Some(attempt) = crate::repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .context("Failed to fetch attempt")?
    else {
        tracing::warn!(attempt_id, "Attempt vanished before aggregation");
        return Ok(Vec::new());
    };

    if attempt.finalized {
        return Ok(Vec::new());
    }

    let required_kinds =
        crate::repositories::exams::section_kinds(state.db(), &attempt.exam_id)
            .await
            .context("Failed to fetch exam section kinds")?;
    if required_kinds.is_empty() {
        return Ok(Vec::new());
    }

    let completed =
        crate::repositories::section_attempts::latest_completed_per_kind(state.db(), attempt_id)
            .await
            .context("Failed to fetch completed sections")?;
    if completed.len() < required_kinds.len() {
        return Ok(Vec::new());
    }

    let Some(exam) = crate::repositories::exams::find_by_id(state.db(), &attempt.exam_id)
        .await
        .context("Failed to fetch exam")?
    else {
        tracing::warn!(attempt_id, exam_id = %attempt.exam_id, "Exam vanished before aggregation");
        return Ok(Vec::new());
    };

    let mut total = 0.0;
    for section_attempt in &completed {
        match section_attempt.score {
            Some(score) => total += score,
            None => {
                let open_review =
                    crate::repositories::reviews::has_open_task(state.db(), &section_attempt.id)
                        .await
                        .context("Failed to check open review task")?;
                if open_review {
                    // A manual score is still owed; stay in started.
                    return Ok(Vec::new());
                }
                // Closed without a score and nothing owed: counts as zero.
            }
        }
    }

    let final_score = scoring::final_score(exam.track, total, required_kinds.len());
    let level = scoring::level_from_score(final_score);

    let finalized = crate::repositories::attempts::finalize(
        state.db(),
        attempt_id,
        final_score,
        Some(level),
        primitive_now_utc(),
    )
    .await
    .context("Failed to finalize attempt")?;

    if !finalized {
        return Ok(Vec::new());
    }

    metrics::counter!("attempts_finalized_total").increment(1);
    tracing::info!(attempt_id, final_score, level = level.label(), "Attempt finalized");

    Ok(vec![FollowUp::NotifyCandidate { attempt_id: attempt_id.to_string() }])
}

async fn notify_reviewers(state: &AppState, task_id: &str) -> Result<()> {
    let Some(row) = crate::repositories::reviews::find_queue_row(state.db(), task_id)
        .await
        .context("Failed to fetch review task context")?
    else {
        tracing::warn!(task_id, "Review task vanished before notification");
        return Ok(());
    };

    let message_id = state
        .notifier()
        .notify_reviewers(ReviewNotification {
            task_id,
            candidate_name: &row.candidate_name,
            exam_title: &row.exam_title,
            section_kind: row.kind.as_str(),
        })
        .await;

    if let Some(message_id) = message_id {
        crate::repositories::reviews::store_notification_message(state.db(), task_id, message_id)
            .await
            .context("Failed to store notification message id")?;
    }

    Ok(())
}

async fn notify_candidate(state: &AppState, attempt_id: &str) -> Result<()> {
    let Some(attempt) = crate::repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .context("Failed to fetch attempt")?
    else {
        return Ok(());
    };

    let (Some(score), Some(level)) = (attempt.score, attempt.level) else {
        tracing::warn!(attempt_id, "Attempt has no final score, skipping notification");
        return Ok(());
    };

    let candidate = crate::repositories::users::find_by_id(state.db(), &attempt.candidate_id)
        .await
        .context("Failed to fetch candidate")?;
    let exam = crate::repositories::exams::find_by_id(state.db(), &attempt.exam_id)
        .await
        .context("Failed to fetch exam")?;

    let candidate_name =
        candidate.map(|user| user.full_name).unwrap_or_else(|| attempt.candidate_id.clone());
    let exam_title = exam.map(|exam| exam.title).unwrap_or_else(|| attempt.exam_id.clone());

    state
        .notifier()
        .notify_candidate_result(ResultNotification {
            candidate_name: &candidate_name,
            exam_title: &exam_title,
            score,
            level: level.label(),
        })
        .await;

    Ok(())
}
