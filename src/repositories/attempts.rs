use sqlx::PgPool;

use crate::db::models::Attempt;
use crate::db::types::{AttemptStatus, CefrBand};

pub(crate) const COLUMNS: &str =
    "id, candidate_id, exam_id, status, score, level, finalized, created_at, updated_at";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// The open attempt for a candidate/exam pair, if any. The partial unique
/// index on (candidate_id, exam_id) guarantees at most one row here.
pub(crate) async fn find_open(
    executor: impl sqlx::PgExecutor<'_>,
    candidate_id: &str,
    exam_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts
         WHERE candidate_id = $1 AND exam_id = $2 AND status <> 'completed'"
    ))
    .bind(candidate_id)
    .bind(exam_id)
    .fetch_optional(executor)
    .await
}

pub(crate) struct CreateAttempt<'a> {
    pub id: &'a str,
    pub candidate_id: &'a str,
    pub exam_id: &'a str,
    pub status: AttemptStatus,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO attempts (id, candidate_id, exam_id, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (candidate_id, exam_id) WHERE status <> 'completed' DO NOTHING",
    )
    .bind(params.id)
    .bind(params.candidate_id)
    .bind(params.exam_id)
    .bind(params.status)
    .bind(params.created_at)
    .bind(params.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_by_candidate(
    pool: &PgPool,
    candidate_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE candidate_id = $1
         ORDER BY created_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(candidate_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_candidate(
    pool: &PgPool,
    candidate_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE candidate_id = $1")
        .bind(candidate_id)
        .fetch_one(pool)
        .await
}

/// Stamps the final score exactly once. Returns false when another writer
/// already finalized the attempt.
pub(crate) async fn finalize(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    score: f64,
    level: Option<CefrBand>,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts
         SET status = 'completed', score = $2, level = $3, finalized = TRUE, updated_at = $4
         WHERE id = $1 AND finalized = FALSE",
    )
    .bind(id)
    .bind(score)
    .bind(level)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Attempts whose section work is all closed but whose final score has not
/// been stamped yet. Fed to the aggregator by the backstop sweep.
pub(crate) async fn list_finalize_candidates(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT a.id FROM attempts a
         WHERE a.status = 'started'
           AND a.finalized = FALSE
           AND EXISTS (
               SELECT 1 FROM section_attempts sa WHERE sa.attempt_id = a.id
           )
           AND NOT EXISTS (
               SELECT 1 FROM section_attempts sa
               WHERE sa.attempt_id = a.id AND sa.status <> 'completed'
           )
         ORDER BY a.updated_at
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
