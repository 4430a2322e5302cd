use sqlx::PgPool;
use sqlx::{Postgres, QueryBuilder};

use crate::db::models::{Exam, Question, QuestionOption, Section};
use crate::db::types::{ExamTrack, SectionKind};

pub(crate) const COLUMNS: &str = "id, track, language, title, price, is_active, created_at";

const SECTION_COLUMNS: &str =
    "id, exam_id, kind, title, prompt, duration_minutes, question_count, created_at";

const QUESTION_COLUMNS: &str = "id, section_id, position, text, has_options, answer_key";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_active(
    pool: &PgPool,
    track: Option<ExamTrack>,
    language: Option<&str>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Exam>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM exams WHERE is_active = TRUE"));

    if let Some(track) = track {
        builder.push(" AND track = ");
        builder.push_bind(track);
    }

    if let Some(language) = language {
        builder.push(" AND language = ");
        builder.push_bind(language);
    }

    builder.push(" ORDER BY created_at DESC OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<Exam>().fetch_all(pool).await
}

pub(crate) async fn count_active(
    pool: &PgPool,
    track: Option<ExamTrack>,
    language: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM exams WHERE is_active = TRUE");

    if let Some(track) = track {
        builder.push(" AND track = ");
        builder.push_bind(track);
    }

    if let Some(language) = language {
        builder.push(" AND language = ");
        builder.push_bind(language);
    }

    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExamTitle {
    pub(crate) id: String,
    pub(crate) title: String,
}

pub(crate) async fn titles_by_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<ExamTitle>, sqlx::Error> {
    sqlx::query_as::<_, ExamTitle>("SELECT id, title FROM exams WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

pub(crate) async fn find_section(
    pool: &PgPool,
    section_id: &str,
) -> Result<Option<Section>, sqlx::Error> {
    sqlx::query_as::<_, Section>(&format!(
        "SELECT {SECTION_COLUMNS} FROM sections WHERE id = $1"
    ))
    .bind(section_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_sections(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<Section>, sqlx::Error> {
    sqlx::query_as::<_, Section>(&format!(
        "SELECT {SECTION_COLUMNS} FROM sections WHERE exam_id = $1 ORDER BY kind, created_at"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_sections_by_kind(
    pool: &PgPool,
    exam_id: &str,
    kind: SectionKind,
) -> Result<Vec<Section>, sqlx::Error> {
    sqlx::query_as::<_, Section>(&format!(
        "SELECT {SECTION_COLUMNS} FROM sections WHERE exam_id = $1 AND kind = $2
         ORDER BY created_at"
    ))
    .bind(exam_id)
    .bind(kind)
    .fetch_all(pool)
    .await
}

/// Distinct section kinds offered by an exam. An attempt is complete once
/// every listed kind has a completed section attempt.
pub(crate) async fn section_kinds(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<SectionKind>, sqlx::Error> {
    sqlx::query_scalar::<_, SectionKind>(
        "SELECT DISTINCT kind FROM sections WHERE exam_id = $1",
    )
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_questions(
    pool: &PgPool,
    section_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE section_id = $1 ORDER BY position"
    ))
    .bind(section_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_options_for_section(
    pool: &PgPool,
    section_id: &str,
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(
        "SELECT o.id, o.question_id, o.text, o.is_correct
         FROM question_options o
         JOIN questions q ON q.id = o.question_id
         WHERE q.section_id = $1
         ORDER BY q.position, o.id",
    )
    .bind(section_id)
    .fetch_all(pool)
    .await
}
