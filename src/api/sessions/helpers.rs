use std::collections::HashMap;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
pub(crate) use crate::core::time::primitive_now_utc as now_primitive;
use crate::db::models::{Attempt, Exam, Question, QuestionOption, Section, SectionAttempt};
use crate::db::types::SectionKind;
use crate::repositories;
use crate::schemas::session::{
    format_primitive, AnswerSubmission, OpenSectionResponse, QuestionOptionResponse,
    QuestionResponse,
};
use crate::services::{attempt_finalize, section_timing};

pub(in crate::api::sessions) fn parse_kind(raw: &str) -> Result<SectionKind, ApiError> {
    SectionKind::parse(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown section kind '{raw}'")))
}

pub(in crate::api::sessions) async fn fetch_exam(
    pool: &sqlx::PgPool,
    exam_id: &str,
) -> Result<Exam, ApiError> {
    repositories::exams::find_by_id(pool, exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}

pub(in crate::api::sessions) async fn fetch_section(
    pool: &sqlx::PgPool,
    section_id: &str,
) -> Result<Section, ApiError> {
    repositories::exams::find_section(pool, section_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch section"))?
        .ok_or_else(|| ApiError::NotFound("Section not found".to_string()))
}

/// Section attempts are only visible to the candidate who owns them; anyone
/// else gets the same 404 as a nonexistent id.
pub(in crate::api::sessions) async fn fetch_owned_section_attempt(
    pool: &sqlx::PgPool,
    section_attempt_id: &str,
    candidate_id: &str,
) -> Result<(SectionAttempt, Attempt), ApiError> {
    let section_attempt = repositories::section_attempts::find_by_id(pool, section_attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch section attempt"))?
        .ok_or_else(|| ApiError::NotFound("Section attempt not found".to_string()))?;

    let attempt = repositories::attempts::find_by_id(pool, &section_attempt.attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Section attempt not found".to_string()))?;

    if attempt.candidate_id != candidate_id {
        return Err(ApiError::NotFound("Section attempt not found".to_string()));
    }

    Ok((section_attempt, attempt))
}

/// Lazy half of deadline enforcement: a request touching an expired section
/// closes it in place, then reports 410 to the caller. The caller never
/// writes into an expired section.
pub(in crate::api::sessions) async fn enforce_deadline(
    state: &AppState,
    section_attempt: &SectionAttempt,
) -> Result<(), ApiError> {
    let now = now_primitive();
    if !section_timing::is_expired(now, section_attempt.end_time) {
        return Ok(());
    }

    let closed =
        repositories::section_attempts::close(state.db(), &section_attempt.id, None, None, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to close expired section attempt"))?;

    if closed {
        tracing::info!(
            section_attempt_id = %section_attempt.id,
            kind = %section_attempt.kind.as_str(),
            "Section attempt expired on access"
        );
        metrics::counter!("exam_sections_expired_total").increment(1);
        attempt_finalize::execute_follow_ups(
            state,
            vec![attempt_finalize::FollowUp::Aggregate {
                attempt_id: section_attempt.attempt_id.clone(),
            }],
        )
        .await;
    }

    Err(ApiError::TestExpired("Section time limit has passed"))
}

/// Marks an answer right or wrong against the section's key material.
/// Option questions compare the chosen option, free-text questions compare
/// the normalized answer text.
pub(in crate::api::sessions) fn grade_answer(
    question: &Question,
    options: &HashMap<String, Vec<QuestionOption>>,
    submission: &AnswerSubmission,
) -> bool {
    if question.has_options {
        let Some(option_id) = submission.option_id.as_deref() else {
            return false;
        };
        options
            .get(&question.id)
            .map(|candidates| {
                candidates.iter().any(|option| option.id == option_id && option.is_correct)
            })
            .unwrap_or(false)
    } else {
        let Some(key) = question.answer_key.as_deref() else {
            return false;
        };
        let Some(given) = submission.text.as_deref() else {
            return false;
        };
        key.trim().to_lowercase() == given.trim().to_lowercase()
    }
}

pub(in crate::api::sessions) fn group_options(
    options: Vec<QuestionOption>,
) -> HashMap<String, Vec<QuestionOption>> {
    let mut grouped: HashMap<String, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        grouped.entry(option.question_id.clone()).or_default().push(option);
    }
    grouped
}

pub(in crate::api::sessions) async fn open_section_response(
    state: &AppState,
    section_attempt: SectionAttempt,
) -> Result<OpenSectionResponse, ApiError> {
    let section = fetch_section(state.db(), &section_attempt.section_id).await?;

    let questions = repositories::exams::list_questions(state.db(), &section.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;
    let options = repositories::exams::list_options_for_section(state.db(), &section.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list question options"))?;
    let mut grouped = group_options(options);

    let questions = questions
        .into_iter()
        .map(|question| {
            let options = grouped
                .remove(&question.id)
                .unwrap_or_default()
                .into_iter()
                .map(|option| QuestionOptionResponse { id: option.id, text: option.text })
                .collect();
            QuestionResponse {
                id: question.id,
                position: question.position,
                text: question.text,
                has_options: question.has_options,
                options,
            }
        })
        .collect();

    Ok(OpenSectionResponse {
        section_attempt_id: section_attempt.id,
        attempt_id: section_attempt.attempt_id,
        exam_id: section.exam_id,
        section_id: section.id,
        kind: section_attempt.kind,
        title: section.title,
        prompt: section.prompt,
        status: section_attempt.status,
        duration_minutes: section.duration_minutes,
        start_time: format_primitive(section_attempt.start_time),
        end_time: section_attempt.end_time.map(format_primitive),
        questions,
    })
}
