use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Json,
};
use time::PrimitiveDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::db::models::{Attempt, Question, Section, SectionAttempt};
use crate::db::types::{AttemptStatus, SectionKind, SectionStatus};
use crate::repositories;
use crate::schemas::session::{SubmitAnswersRequest, SubmitAnswersResponse};
use crate::services::{attempt_finalize, scoring};

use super::helpers;

pub(in crate::api::sessions) async fn submit_answers(
    Path(section_attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<Json<SubmitAnswersResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (section_attempt, attempt) =
        helpers::fetch_owned_section_attempt(state.db(), &section_attempt_id, &user.id).await?;

    if section_attempt.status != SectionStatus::Started {
        return Err(ApiError::InvalidState("Section attempt is already completed".to_string()));
    }

    helpers::enforce_deadline(&state, &section_attempt).await?;

    let section = helpers::fetch_section(state.db(), &section_attempt.section_id).await?;
    let exam = helpers::fetch_exam(state.db(), &attempt.exam_id).await?;

    let questions = repositories::exams::list_questions(state.db(), &section.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    for answer in &payload.answers {
        if !questions.iter().any(|question| question.id == answer.question_id) {
            return Err(ApiError::BadRequest(format!(
                "Question '{}' does not belong to this section",
                answer.question_id
            )));
        }
    }

    let now = helpers::now_primitive();

    if section_attempt.kind.is_auto_scored() {
        submit_auto(&state, &attempt, &section_attempt, &section, &exam, &questions, payload, now)
            .await
    } else {
        submit_manual(&state, &attempt, &section_attempt, &section, &questions, payload, now)
            .await
    }
}

/// Listening and reading: every stored answer is marked against the key, and
/// the section closes with its table score once all questions are answered.
#[allow(clippy::too_many_arguments)]
async fn submit_auto(
    state: &AppState,
    attempt: &Attempt,
    section_attempt: &SectionAttempt,
    section: &Section,
    exam: &crate::db::models::Exam,
    questions: &[Question],
    payload: SubmitAnswersRequest,
    now: PrimitiveDateTime,
) -> Result<Json<SubmitAnswersResponse>, ApiError> {
    let options = repositories::exams::list_options_for_section(state.db(), &section.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list question options"))?;
    let grouped = helpers::group_options(options);

    for answer in &payload.answers {
        let question = questions
            .iter()
            .find(|question| question.id == answer.question_id)
            .ok_or_else(|| ApiError::Internal("Question lookup failed".to_string()))?;
        let is_correct = helpers::grade_answer(question, &grouped, answer);

        repositories::answers::upsert(
            state.db(),
            repositories::answers::UpsertAnswer {
                id: &Uuid::new_v4().to_string(),
                section_attempt_id: &section_attempt.id,
                question_id: &answer.question_id,
                option_id: answer.option_id.as_deref(),
                text_answer: answer.text.as_deref(),
                is_correct: Some(is_correct),
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to save answer"))?;
    }

    let answered =
        repositories::answers::count_by_section_attempt(state.db(), &section_attempt.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count answers"))?;

    if answered < i64::from(section.question_count) {
        return Ok(Json(SubmitAnswersResponse {
            section_attempt_id: section_attempt.id.clone(),
            status: SectionStatus::Started,
            answered,
            question_count: section.question_count,
            section_completed: false,
            score: None,
            review_task_id: None,
            attempt_status: attempt.status,
        }));
    }

    let correct = repositories::answers::count_correct(state.db(), &section_attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count correct answers"))?;
    let score = scoring::score_from_correct_count(section_attempt.kind, correct, exam.track);

    let closed = repositories::section_attempts::close(
        state.db(),
        &section_attempt.id,
        Some(score),
        None,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to close section attempt"))?;

    if closed {
        tracing::info!(
            section_attempt_id = %section_attempt.id,
            kind = %section_attempt.kind.as_str(),
            correct,
            score,
            "Section attempt auto-scored"
        );
        attempt_finalize::execute_follow_ups(
            state,
            vec![attempt_finalize::FollowUp::Aggregate { attempt_id: attempt.id.clone() }],
        )
        .await;
    }

    let attempt_status = current_attempt_status(state, attempt).await;

    Ok(Json(SubmitAnswersResponse {
        section_attempt_id: section_attempt.id.clone(),
        status: SectionStatus::Completed,
        answered,
        question_count: section.question_count,
        section_completed: true,
        score: Some(score),
        review_task_id: None,
        attempt_status,
    }))
}

/// Writing and speaking: responses are stored verbatim. Once every part is
/// in, the section closes unscored and a review task carries it to a human.
/// Parts under the word gate never reach the scoring service.
async fn submit_manual(
    state: &AppState,
    attempt: &Attempt,
    section_attempt: &SectionAttempt,
    section: &Section,
    questions: &[Question],
    payload: SubmitAnswersRequest,
    now: PrimitiveDateTime,
) -> Result<Json<SubmitAnswersResponse>, ApiError> {
    for answer in &payload.answers {
        repositories::answers::upsert(
            state.db(),
            repositories::answers::UpsertAnswer {
                id: &Uuid::new_v4().to_string(),
                section_attempt_id: &section_attempt.id,
                question_id: &answer.question_id,
                option_id: None,
                text_answer: answer.text.as_deref(),
                is_correct: None,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to save answer"))?;
    }

    let answered =
        repositories::answers::count_by_section_attempt(state.db(), &section_attempt.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count answers"))?;

    if answered < i64::from(section.question_count) {
        return Ok(Json(SubmitAnswersResponse {
            section_attempt_id: section_attempt.id.clone(),
            status: SectionStatus::Started,
            answered,
            question_count: section.question_count,
            section_completed: false,
            score: None,
            review_task_id: None,
            attempt_status: attempt.status,
        }));
    }

    let stored = repositories::answers::list_by_section_attempt(state.db(), &section_attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answers"))?;
    let texts: HashMap<&str, &str> = stored
        .iter()
        .map(|answer| (answer.question_id.as_str(), answer.text_answer.as_deref().unwrap_or("")))
        .collect();

    let mut parts = Vec::new();
    for question in questions {
        let text = texts.get(question.id.as_str()).copied().unwrap_or("");
        parts.push(ResponsePart::new(section_attempt.kind, question, text));
    }

    let combined =
        parts.iter().map(|part| part.text).collect::<Vec<_>>().join("\n\n");

    if parts.iter().all(|part| !part.passes_gate) {
        return close_unreviewable(state, attempt, section_attempt, section, answered, &combined, now)
            .await;
    }

    // Advisory prefill. A configured grader that cannot be reached aborts
    // the submit so the candidate can retry; answers are already saved.
    let mut prefills = Vec::new();
    if state.grader().is_configured() {
        for part in &parts {
            if part.passes_gate {
                let verdict =
                    state.grader().grade(part.prompt, part.text).await.map_err(|_| {
                        ApiError::UpstreamUnavailable(
                            "Scoring service is unavailable; your answers were saved".to_string(),
                        )
                    })?;
                let score = scoring::normalize_grader_score(verdict.score, 100.0, part.max_score);
                prefills.push(Prefill {
                    question_number: part.position,
                    score,
                    max_score: part.max_score,
                    comment: Some(verdict.commentary),
                });
            } else {
                prefills.push(Prefill {
                    question_number: part.position,
                    score: 0.0,
                    max_score: part.max_score,
                    comment: Some("Below minimum word count".to_string()),
                });
            }
        }
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let closed = repositories::section_attempts::close(
        &mut *tx,
        &section_attempt.id,
        None,
        Some(&combined),
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to close section attempt"))?;

    if !closed {
        return Err(ApiError::InvalidState("Section attempt is already completed".to_string()));
    }

    let task_id = Uuid::new_v4().to_string();
    let created = repositories::reviews::create_task(
        &mut *tx,
        repositories::reviews::CreateReviewTask {
            id: &task_id,
            section_attempt_id: &section_attempt.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create review task"))?;

    let task_id = if created {
        task_id
    } else {
        repositories::reviews::find_task_by_section_attempt(&mut *tx, &section_attempt.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch review task"))?
            .ok_or_else(|| ApiError::Internal("Review task vanished after insert".to_string()))?
            .id
    };

    for prefill in &prefills {
        repositories::reviews::upsert_question_score(
            &mut *tx,
            repositories::reviews::UpsertQuestionScore {
                id: &Uuid::new_v4().to_string(),
                review_task_id: &task_id,
                question_number: prefill.question_number,
                score: prefill.score,
                max_score: prefill.max_score,
                comment: prefill.comment.as_deref(),
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store draft score"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        section_attempt_id = %section_attempt.id,
        review_task_id = %task_id,
        kind = %section_attempt.kind.as_str(),
        "Section attempt queued for review"
    );

    attempt_finalize::execute_follow_ups(
        state,
        vec![
            attempt_finalize::FollowUp::NotifyReviewers { task_id: task_id.clone() },
            attempt_finalize::FollowUp::Aggregate { attempt_id: attempt.id.clone() },
        ],
    )
    .await;

    let attempt_status = current_attempt_status(state, attempt).await;

    Ok(Json(SubmitAnswersResponse {
        section_attempt_id: section_attempt.id.clone(),
        status: SectionStatus::Completed,
        answered,
        question_count: section.question_count,
        section_completed: true,
        score: None,
        review_task_id: Some(task_id),
        attempt_status,
    }))
}

/// Every part fell under its word gate: the section scores zero outright and
/// no reviewer ever sees it.
async fn close_unreviewable(
    state: &AppState,
    attempt: &Attempt,
    section_attempt: &SectionAttempt,
    section: &Section,
    answered: i64,
    combined: &str,
    now: PrimitiveDateTime,
) -> Result<Json<SubmitAnswersResponse>, ApiError> {
    let closed = repositories::section_attempts::close(
        state.db(),
        &section_attempt.id,
        Some(0.0),
        Some(combined),
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to close section attempt"))?;

    if closed {
        tracing::info!(
            section_attempt_id = %section_attempt.id,
            kind = %section_attempt.kind.as_str(),
            "Section attempt scored zero below word gate"
        );
        attempt_finalize::execute_follow_ups(
            state,
            vec![attempt_finalize::FollowUp::Aggregate { attempt_id: attempt.id.clone() }],
        )
        .await;
    }

    let attempt_status = current_attempt_status(state, attempt).await;

    Ok(Json(SubmitAnswersResponse {
        section_attempt_id: section_attempt.id.clone(),
        status: SectionStatus::Completed,
        answered,
        question_count: section.question_count,
        section_completed: true,
        score: Some(0.0),
        review_task_id: None,
        attempt_status,
    }))
}

struct ResponsePart<'a> {
    position: i32,
    prompt: &'a str,
    text: &'a str,
    passes_gate: bool,
    max_score: f64,
}

impl<'a> ResponsePart<'a> {
    fn new(kind: SectionKind, question: &'a Question, text: &'a str) -> Self {
        let (passes_gate, max_score) = match kind {
            SectionKind::Writing => {
                let requirement = scoring::writing_word_requirement(question.position);
                (
                    scoring::word_count(text) >= requirement.min_words,
                    f64::from(requirement.max_score),
                )
            }
            _ => (!text.trim().is_empty(), 75.0),
        };

        Self { position: question.position, prompt: &question.text, text, passes_gate, max_score }
    }
}

struct Prefill {
    question_number: i32,
    score: f64,
    max_score: f64,
    comment: Option<String>,
}

/// The aggregate follow-up may have just finalized the attempt; report the
/// status the candidate would see on a fresh read.
async fn current_attempt_status(state: &AppState, attempt: &Attempt) -> AttemptStatus {
    repositories::attempts::find_by_id(state.db(), &attempt.id)
        .await
        .ok()
        .flatten()
        .map(|attempt| attempt.status)
        .unwrap_or(attempt.status)
}
