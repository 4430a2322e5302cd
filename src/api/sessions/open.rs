use axum::{
    extract::{Path, State},
    Json,
};
use rand::rngs::StdRng;
use rand::{seq::SliceRandom, SeedableRng};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::session::OpenSectionResponse;
use crate::services::{attempt_finalize, section_timing};

use super::helpers;

/// Opens (or resumes) the candidate's live section attempt of the given
/// kind. The whole decision runs under an advisory lock so double-clicks
/// and parallel tabs converge on one live row.
pub(in crate::api::sessions) async fn open_section(
    Path((exam_id, kind)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<OpenSectionResponse>, ApiError> {
    let kind = helpers::parse_kind(&kind)?;
    let exam = helpers::fetch_exam(state.db(), &exam_id).await?;

    if !exam.is_active {
        return Err(ApiError::BadRequest("Exam is not available".to_string()));
    }

    let sections = repositories::exams::list_sections_by_kind(state.db(), &exam.id, kind)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list sections"))?;
    if sections.is_empty() {
        return Err(ApiError::NotFound(format!(
            "Exam has no {} section",
            kind.as_str()
        )));
    }

    let now = helpers::now_primitive();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let lock_key = format!("{}:{}:{}", user.id, exam.id, kind.as_str());
    repositories::section_attempts::acquire_open_lock(&mut *tx, &lock_key)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire open lock"))?;

    let attempt = repositories::attempts::find_open(&mut *tx, &user.id, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    let attempt = match attempt {
        Some(attempt) => attempt,
        None => {
            let attempt_id = Uuid::new_v4().to_string();
            repositories::attempts::create(
                &mut *tx,
                repositories::attempts::CreateAttempt {
                    id: &attempt_id,
                    candidate_id: &user.id,
                    exam_id: &exam.id,
                    status: AttemptStatus::Started,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;

            repositories::attempts::find_open(&mut *tx, &user.id, &exam.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
                .ok_or_else(|| {
                    ApiError::Internal("Attempt vanished after insert".to_string())
                })?
        }
    };

    let live = repositories::section_attempts::find_live(&mut *tx, &attempt.id, kind)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch section attempt"))?;

    let mut expired_closed = false;
    if let Some(live) = live {
        if !section_timing::is_expired(now, live.end_time) {
            tx.commit()
                .await
                .map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
            let response = helpers::open_section_response(&state, live).await?;
            return Ok(Json(response));
        }

        // Past its deadline: close in place and fall through to a fresh one.
        repositories::section_attempts::close(&mut *tx, &live.id, None, None, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to close expired section attempt"))?;
        metrics::counter!("exam_sections_expired_total").increment(1);
        expired_closed = true;
    }

    let used = repositories::section_attempts::used_section_ids(&mut *tx, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list used sections"))?;

    let fresh: Vec<_> =
        sections.iter().filter(|section| !used.contains(&section.id)).collect();
    let mut rng = StdRng::from_entropy();
    let section = match fresh.choose(&mut rng) {
        Some(section) => *section,
        // Every variant was already seen; reuse is better than refusing.
        None => sections
            .choose(&mut rng)
            .ok_or_else(|| ApiError::Internal("Section list became empty".to_string()))?,
    };

    let end_time = section_timing::deadline_for(now, section.duration_minutes);
    let section_attempt_id = Uuid::new_v4().to_string();
    let inserted = repositories::section_attempts::create(
        &mut *tx,
        repositories::section_attempts::CreateSectionAttempt {
            id: &section_attempt_id,
            attempt_id: &attempt.id,
            section_id: &section.id,
            kind,
            start_time: now,
            end_time,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create section attempt"))?;

    let section_attempt = if inserted {
        repositories::section_attempts::find_by_id(&mut *tx, &section_attempt_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch section attempt"))?
            .ok_or_else(|| {
                ApiError::Internal("Section attempt vanished after insert".to_string())
            })?
    } else {
        repositories::section_attempts::find_live(&mut *tx, &attempt.id, kind)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch section attempt"))?
            .ok_or_else(|| {
                ApiError::InvalidState("Section attempt is already completed".to_string())
            })?
    };

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        attempt_id = %attempt.id,
        section_attempt_id = %section_attempt.id,
        kind = %kind.as_str(),
        "Section attempt opened"
    );

    if expired_closed {
        attempt_finalize::execute_follow_ups(
            &state,
            vec![attempt_finalize::FollowUp::Aggregate { attempt_id: attempt.id.clone() }],
        )
        .await;
    }

    let response = helpers::open_section_response(&state, section_attempt).await?;
    Ok(Json(response))
}
