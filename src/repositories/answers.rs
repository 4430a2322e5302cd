use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Answer;

const COLUMNS: &str = "\
    id, section_attempt_id, question_id, option_id, text_answer, is_correct, \
    created_at, updated_at";

pub(crate) struct UpsertAnswer<'a> {
    pub id: &'a str,
    pub section_attempt_id: &'a str,
    pub question_id: &'a str,
    pub option_id: Option<&'a str>,
    pub text_answer: Option<&'a str>,
    pub is_correct: Option<bool>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

/// Last write wins per (section attempt, question); resubmitting a question
/// replaces the stored answer.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    params: UpsertAnswer<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO answers
             (id, section_attempt_id, question_id, option_id, text_answer, is_correct,
              created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (section_attempt_id, question_id) DO UPDATE
         SET option_id = EXCLUDED.option_id,
             text_answer = EXCLUDED.text_answer,
             is_correct = EXCLUDED.is_correct,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(params.id)
    .bind(params.section_attempt_id)
    .bind(params.question_id)
    .bind(params.option_id)
    .bind(params.text_answer)
    .bind(params.is_correct)
    .bind(params.created_at)
    .bind(params.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn list_by_section_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    section_attempt_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM answers WHERE section_attempt_id = $1 ORDER BY created_at"
    ))
    .bind(section_attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn count_by_section_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    section_attempt_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM answers WHERE section_attempt_id = $1")
        .bind(section_attempt_id)
        .fetch_one(executor)
        .await
}

pub(crate) async fn count_correct(
    pool: &PgPool,
    section_attempt_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM answers WHERE section_attempt_id = $1 AND is_correct = TRUE",
    )
    .bind(section_attempt_id)
    .fetch_one(pool)
    .await
}
