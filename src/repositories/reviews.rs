use sqlx::PgPool;
use sqlx::{Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::{QuestionScore, ReviewLogEntry, ReviewTask};
use crate::db::types::{ExamTrack, ReviewAction, ReviewStatus, SectionKind};

const TASK_COLUMNS: &str = "\
    id, section_attempt_id, status, reviewer_id, total_score, \
    notification_message_id, reviewed_at, created_at, updated_at";

const SCORE_COLUMNS: &str =
    "id, review_task_id, question_number, score, max_score, comment, created_at, updated_at";

const LOG_COLUMNS: &str =
    "id, review_task_id, actor_id, action, question_number, old_value, new_value, created_at";

pub(crate) struct CreateReviewTask<'a> {
    pub id: &'a str,
    pub section_attempt_id: &'a str,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

/// One task per section attempt; a duplicate submit is a no-op.
pub(crate) async fn create_task(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateReviewTask<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO review_tasks (id, section_attempt_id, status, created_at, updated_at)
         VALUES ($1, $2, 'pending', $3, $4)
         ON CONFLICT (section_attempt_id) DO NOTHING",
    )
    .bind(params.id)
    .bind(params.section_attempt_id)
    .bind(params.created_at)
    .bind(params.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn find_task(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ReviewTask>, sqlx::Error> {
    sqlx::query_as::<_, ReviewTask>(&format!(
        "SELECT {TASK_COLUMNS} FROM review_tasks WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_task_for_update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ReviewTask>, sqlx::Error> {
    sqlx::query_as::<_, ReviewTask>(&format!(
        "SELECT {TASK_COLUMNS} FROM review_tasks WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_task_by_section_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    section_attempt_id: &str,
) -> Result<Option<ReviewTask>, sqlx::Error> {
    sqlx::query_as::<_, ReviewTask>(&format!(
        "SELECT {TASK_COLUMNS} FROM review_tasks WHERE section_attempt_id = $1"
    ))
    .bind(section_attempt_id)
    .fetch_optional(executor)
    .await
}

/// True while a pending or in-progress review still owes this section a
/// score. Blocks attempt aggregation.
pub(crate) async fn has_open_task(
    executor: impl sqlx::PgExecutor<'_>,
    section_attempt_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (
             SELECT 1 FROM review_tasks
             WHERE section_attempt_id = $1 AND status <> 'checked'
         )",
    )
    .bind(section_attempt_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn count_reviewing(
    executor: impl sqlx::PgExecutor<'_>,
    reviewer_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM review_tasks WHERE reviewer_id = $1 AND status = 'reviewing'",
    )
    .bind(reviewer_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn claim(
    executor: impl sqlx::PgExecutor<'_>,
    task_id: &str,
    reviewer_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE review_tasks SET status = 'reviewing', reviewer_id = $2, updated_at = $3
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(task_id)
    .bind(reviewer_id)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn save_draft(
    executor: impl sqlx::PgExecutor<'_>,
    task_id: &str,
    total_score: Option<f64>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE review_tasks SET total_score = $2, updated_at = $3
         WHERE id = $1 AND status = 'reviewing'",
    )
    .bind(task_id)
    .bind(total_score)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn mark_checked(
    executor: impl sqlx::PgExecutor<'_>,
    task_id: &str,
    total_score: f64,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE review_tasks
         SET status = 'checked', total_score = $2, reviewed_at = $3, updated_at = $3
         WHERE id = $1 AND status = 'reviewing'",
    )
    .bind(task_id)
    .bind(total_score)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_stale(
    pool: &PgPool,
    cutoff: PrimitiveDateTime,
    limit: i64,
) -> Result<Vec<ReviewTask>, sqlx::Error> {
    sqlx::query_as::<_, ReviewTask>(&format!(
        "SELECT {TASK_COLUMNS} FROM review_tasks
         WHERE status = 'reviewing' AND updated_at < $1
         ORDER BY updated_at
         LIMIT $2"
    ))
    .bind(cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Returns the task to the pending pool. The cutoff guard keeps a reviewer
/// who touched the task after the sweep started from losing it.
pub(crate) async fn reset_stale(
    executor: impl sqlx::PgExecutor<'_>,
    task_id: &str,
    cutoff: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE review_tasks
         SET status = 'pending', reviewer_id = NULL, total_score = NULL,
             reviewed_at = NULL, updated_at = $3
         WHERE id = $1 AND status = 'reviewing' AND updated_at < $2",
    )
    .bind(task_id)
    .bind(cutoff)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn store_notification_message(
    executor: impl sqlx::PgExecutor<'_>,
    task_id: &str,
    message_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE review_tasks SET notification_message_id = $2 WHERE id = $1")
        .bind(task_id)
        .bind(message_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn clear_notification_message(
    executor: impl sqlx::PgExecutor<'_>,
    task_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE review_tasks SET notification_message_id = NULL WHERE id = $1")
        .bind(task_id)
        .execute(executor)
        .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct QueueRow {
    pub(crate) id: String,
    pub(crate) status: ReviewStatus,
    pub(crate) reviewer_id: Option<String>,
    pub(crate) total_score: Option<f64>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) section_attempt_id: String,
    pub(crate) kind: SectionKind,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) candidate_id: String,
    pub(crate) candidate_name: String,
    pub(crate) candidate_username: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) track: ExamTrack,
    pub(crate) language: String,
    pub(crate) total_count: i64,
}

const QUEUE_SELECT: &str = "\
    SELECT rt.id,
           rt.status,
           rt.reviewer_id,
           rt.total_score,
           rt.created_at,
           rt.updated_at,
           sa.id AS section_attempt_id,
           sa.kind,
           sa.updated_at AS submitted_at,
           u.id AS candidate_id,
           u.full_name AS candidate_name,
           u.username AS candidate_username,
           e.id AS exam_id,
           e.title AS exam_title,
           e.track,
           e.language,
           COUNT(*) OVER() AS total_count
    FROM review_tasks rt
    JOIN section_attempts sa ON sa.id = rt.section_attempt_id
    JOIN attempts a ON a.id = sa.attempt_id
    JOIN users u ON u.id = a.candidate_id
    JOIN exams e ON e.id = a.exam_id";

pub(crate) struct QueueParams<'a> {
    pub reviewer_id: &'a str,
    pub status: Option<ReviewStatus>,
    pub kind: Option<SectionKind>,
    pub track: Option<ExamTrack>,
    pub search: Option<&'a str>,
    pub skip: i64,
    pub limit: i64,
}

/// Pending tasks are visible to everyone; claimed and checked ones only to
/// the reviewer who holds them.
pub(crate) async fn list_queue(
    pool: &PgPool,
    params: QueueParams<'_>,
) -> Result<Vec<QueueRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(QUEUE_SELECT);

    builder.push(" WHERE (rt.status = 'pending' OR rt.reviewer_id = ");
    builder.push_bind(params.reviewer_id);
    builder.push(")");

    if let Some(status) = params.status {
        builder.push(" AND rt.status = ");
        builder.push_bind(status);
    }

    if let Some(kind) = params.kind {
        builder.push(" AND sa.kind = ");
        builder.push_bind(kind);
    }

    if let Some(track) = params.track {
        builder.push(" AND e.track = ");
        builder.push_bind(track);
    }

    if let Some(search) = params.search {
        let pattern = format!("%{}%", search.trim());
        builder.push(" AND (u.full_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR u.username ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    builder.push(" ORDER BY rt.created_at OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<QueueRow>().fetch_all(pool).await
}

pub(crate) async fn find_queue_row(
    pool: &PgPool,
    task_id: &str,
) -> Result<Option<QueueRow>, sqlx::Error> {
    sqlx::query_as::<_, QueueRow>(&format!("{QUEUE_SELECT} WHERE rt.id = $1"))
        .bind(task_id)
        .fetch_optional(pool)
        .await
}

pub(crate) struct UpsertQuestionScore<'a> {
    pub id: &'a str,
    pub review_task_id: &'a str,
    pub question_number: i32,
    pub score: f64,
    pub max_score: f64,
    pub comment: Option<&'a str>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn upsert_question_score(
    executor: impl sqlx::PgExecutor<'_>,
    params: UpsertQuestionScore<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO question_scores
             (id, review_task_id, question_number, score, max_score, comment,
              created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (review_task_id, question_number) DO UPDATE
         SET score = EXCLUDED.score,
             max_score = EXCLUDED.max_score,
             comment = EXCLUDED.comment,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(params.id)
    .bind(params.review_task_id)
    .bind(params.question_number)
    .bind(params.score)
    .bind(params.max_score)
    .bind(params.comment)
    .bind(params.created_at)
    .bind(params.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn list_question_scores(
    executor: impl sqlx::PgExecutor<'_>,
    task_id: &str,
) -> Result<Vec<QuestionScore>, sqlx::Error> {
    sqlx::query_as::<_, QuestionScore>(&format!(
        "SELECT {SCORE_COLUMNS} FROM question_scores
         WHERE review_task_id = $1 ORDER BY question_number"
    ))
    .bind(task_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn delete_question_scores(
    executor: impl sqlx::PgExecutor<'_>,
    task_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM question_scores WHERE review_task_id = $1")
        .bind(task_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) struct AppendLog<'a> {
    pub id: &'a str,
    pub review_task_id: &'a str,
    pub actor_id: Option<&'a str>,
    pub action: ReviewAction,
    pub question_number: Option<i32>,
    pub old_value: Option<f64>,
    pub new_value: Option<f64>,
    pub created_at: PrimitiveDateTime,
}

pub(crate) async fn append_log(
    executor: impl sqlx::PgExecutor<'_>,
    params: AppendLog<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO review_logs
             (id, review_task_id, actor_id, action, question_number, old_value,
              new_value, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(params.id)
    .bind(params.review_task_id)
    .bind(params.actor_id)
    .bind(params.action)
    .bind(params.question_number)
    .bind(params.old_value)
    .bind(params.new_value)
    .bind(params.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn list_logs(
    pool: &PgPool,
    task_id: &str,
) -> Result<Vec<ReviewLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, ReviewLogEntry>(&format!(
        "SELECT {LOG_COLUMNS} FROM review_logs WHERE review_task_id = $1 ORDER BY created_at"
    ))
    .bind(task_id)
    .fetch_all(pool)
    .await
}
