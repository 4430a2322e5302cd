use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::SectionAttempt;
use crate::db::types::SectionKind;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, section_id, kind, status, score, response_text, \
    start_time, end_time, created_at, updated_at";

/// Serializes section opening for one candidate/exam/kind triple. Advisory
/// locks key on a stable text hash so both binaries agree on the lock id.
pub(crate) async fn acquire_open_lock(
    executor: impl sqlx::PgExecutor<'_>,
    key: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(key)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<SectionAttempt>, sqlx::Error> {
    sqlx::query_as::<_, SectionAttempt>(&format!(
        "SELECT {COLUMNS} FROM section_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// The live (not yet completed) section attempt of a given kind, if any.
pub(crate) async fn find_live(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    kind: SectionKind,
) -> Result<Option<SectionAttempt>, sqlx::Error> {
    sqlx::query_as::<_, SectionAttempt>(&format!(
        "SELECT {COLUMNS} FROM section_attempts
         WHERE attempt_id = $1 AND kind = $2 AND status <> 'completed'"
    ))
    .bind(attempt_id)
    .bind(kind)
    .fetch_optional(executor)
    .await
}

pub(crate) struct CreateSectionAttempt<'a> {
    pub id: &'a str,
    pub attempt_id: &'a str,
    pub section_id: &'a str,
    pub kind: SectionKind,
    pub start_time: PrimitiveDateTime,
    pub end_time: Option<PrimitiveDateTime>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateSectionAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO section_attempts
             (id, attempt_id, section_id, kind, status, start_time, end_time,
              created_at, updated_at)
         VALUES ($1, $2, $3, $4, 'started', $5, $6, $7, $8)
         ON CONFLICT (attempt_id, kind) WHERE status <> 'completed' DO NOTHING",
    )
    .bind(params.id)
    .bind(params.attempt_id)
    .bind(params.section_id)
    .bind(params.kind)
    .bind(params.start_time)
    .bind(params.end_time)
    .bind(params.created_at)
    .bind(params.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Closes a started section attempt. Returns false when it was already
/// closed by a concurrent writer or sweep.
pub(crate) async fn close(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    score: Option<f64>,
    response_text: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE section_attempts
         SET status = 'completed',
             score = $2,
             response_text = COALESCE($3, response_text),
             updated_at = $4
         WHERE id = $1 AND status = 'started'",
    )
    .bind(id)
    .bind(score)
    .bind(response_text)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Backfills the score on an already completed attempt once its manual
/// review lands.
pub(crate) async fn set_reviewed_score(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    score: f64,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE section_attempts SET score = $2, updated_at = $3
         WHERE id = $1 AND status = 'completed'",
    )
    .bind(id)
    .bind(score)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_expired(
    pool: &PgPool,
    now: PrimitiveDateTime,
    limit: i64,
) -> Result<Vec<SectionAttempt>, sqlx::Error> {
    sqlx::query_as::<_, SectionAttempt>(&format!(
        "SELECT {COLUMNS} FROM section_attempts
         WHERE status = 'started' AND end_time IS NOT NULL AND end_time < $1
         ORDER BY end_time
         LIMIT $2"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_attempt(
    pool: &PgPool,
    attempt_id: &str,
) -> Result<Vec<SectionAttempt>, sqlx::Error> {
    sqlx::query_as::<_, SectionAttempt>(&format!(
        "SELECT {COLUMNS} FROM section_attempts WHERE attempt_id = $1 ORDER BY created_at"
    ))
    .bind(attempt_id)
    .fetch_all(pool)
    .await
}

/// Most recent completed attempt per kind; the rows the aggregator scores.
pub(crate) async fn latest_completed_per_kind(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<SectionAttempt>, sqlx::Error> {
    sqlx::query_as::<_, SectionAttempt>(&format!(
        "SELECT DISTINCT ON (kind) {COLUMNS} FROM section_attempts
         WHERE attempt_id = $1 AND status = 'completed'
         ORDER BY kind, updated_at DESC"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

/// Section ids already used by this attempt, so reopening prefers fresh
/// material when the exam offers several sections of one kind.
pub(crate) async fn used_section_ids(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT section_id FROM section_attempts WHERE attempt_id = $1",
    )
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}
