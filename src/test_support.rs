use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::PgPool;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api;
use crate::core::{config::Settings, security, state::AppState, time::primitive_now_utc};
use crate::db::models::User;
use crate::db::types::{ExamTrack, SectionKind, UserRole};
use crate::repositories;
use crate::services::{grader::GraderClient, notifier::Notifier};

const TEST_SECRET_KEY: &str = "test-secret";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    dotenvy::dotenv().ok();

    std::env::set_var("LINGVO_ENV", "test");
    std::env::set_var("LINGVO_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::set_var("SWEEP_INTERVAL_SECONDS", "300");
    std::env::set_var("REVIEW_STALE_HOURS", "12");
    std::env::set_var("REVIEW_CAPACITY", "10");
    std::env::remove_var("GRADER_BASE_URL");
    std::env::remove_var("GRADER_API_KEY");
    std::env::remove_var("TELEGRAM_BOT_TOKEN");
    std::env::remove_var("TELEGRAM_REVIEWERS_CHAT_ID");
    std::env::remove_var("TELEGRAM_RESULTS_CHAT_ID");
}

/// Integration fixtures need a disposable Postgres; set TEST_DATABASE_URL to
/// point one out. Tests return early when it is absent.
pub(crate) async fn setup_test_context() -> Option<TestContext> {
    let guard = env_lock().await;
    set_test_env();

    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("skipping: TEST_DATABASE_URL is not set");
        return None;
    };
    std::env::set_var("DATABASE_URL", &database_url);

    let settings = Settings::load().expect("settings");
    let db = prepare_db(&settings).await;

    let grader = GraderClient::from_settings(&settings).expect("grader client");
    let notifier = Notifier::from_settings(&settings);

    let state = AppState::new(settings, db, grader, notifier);
    let app = api::router::router(state.clone());

    Some(TestContext { state, app, _guard: guard })
}

async fn prepare_db(settings: &Settings) -> PgPool {
    let db = crate::db::init_pool(settings).await.expect("db pool");
    ensure_schema(&db).await.expect("schema");
    reset_db(&db).await.expect("reset db");
    db
}

pub(crate) async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    let migrations_dir =
        std::env::var("LINGVO_MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".to_string());
    let mut migrator = sqlx::migrate::Migrator::new(std::path::Path::new(&migrations_dir))
        .await
        .map_err(|error| sqlx::Error::Migrate(Box::new(error)))?;
    migrator.set_ignore_missing(true);
    migrator.run(pool).await.map_err(|error| sqlx::Error::Migrate(Box::new(error)))?;
    Ok(())
}

pub(crate) async fn reset_db(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "TRUNCATE review_logs, question_scores, review_tasks, answers, section_attempts, \
         attempts, question_options, questions, sections, exams, users \
         RESTART IDENTITY CASCADE",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn insert_user(
    pool: &PgPool,
    username: &str,
    full_name: &str,
    role: UserRole,
) -> User {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users (id, username, full_name, phone, role, is_active, created_at)
         VALUES ($1, $2, $3, NULL, $4, TRUE, $5)",
    )
    .bind(&id)
    .bind(username)
    .bind(full_name)
    .bind(role)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert user");

    repositories::users::find_by_id(pool, &id).await.expect("load user").expect("user row")
}

pub(crate) async fn insert_exam(
    pool: &PgPool,
    track: ExamTrack,
    language: &str,
    title: &str,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO exams (id, track, language, title, price, is_active, created_at)
         VALUES ($1, $2, $3, $4, 0, TRUE, $5)",
    )
    .bind(&id)
    .bind(track)
    .bind(language)
    .bind(title)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert exam");
    id
}

pub(crate) async fn insert_section(
    pool: &PgPool,
    exam_id: &str,
    kind: SectionKind,
    title: &str,
    duration_minutes: i32,
    question_count: i32,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO sections
             (id, exam_id, kind, title, prompt, duration_minutes, question_count, created_at)
         VALUES ($1, $2, $3, $4, NULL, $5, $6, $7)",
    )
    .bind(&id)
    .bind(exam_id)
    .bind(kind)
    .bind(title)
    .bind(duration_minutes)
    .bind(question_count)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert section");
    id
}

pub(crate) async fn insert_question(
    pool: &PgPool,
    section_id: &str,
    position: i32,
    text: &str,
    has_options: bool,
    answer_key: Option<&str>,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO questions (id, section_id, position, text, has_options, answer_key)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(&id)
    .bind(section_id)
    .bind(position)
    .bind(text)
    .bind(has_options)
    .bind(answer_key)
    .execute(pool)
    .await
    .expect("insert question");
    id
}

pub(crate) async fn insert_option(
    pool: &PgPool,
    question_id: &str,
    text: &str,
    is_correct: bool,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO question_options (id, question_id, text, is_correct)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(&id)
    .bind(question_id)
    .bind(text)
    .bind(is_correct)
    .execute(pool)
    .await
    .expect("insert option");
    id
}

/// A 35-question option section where option "A" is always the right one.
pub(crate) async fn insert_keyed_section(
    pool: &PgPool,
    exam_id: &str,
    kind: SectionKind,
    question_count: i32,
) -> (String, Vec<(String, String, String)>) {
    let section_id =
        insert_section(pool, exam_id, kind, "Keyed section", 40, question_count).await;

    let mut questions = Vec::new();
    for position in 1..=question_count {
        let question_id =
            insert_question(pool, &section_id, position, &format!("Q{position}"), true, None)
                .await;
        let right = insert_option(pool, &question_id, "A", true).await;
        let wrong = insert_option(pool, &question_id, "B", false).await;
        questions.push((question_id, right, wrong));
    }

    (section_id, questions)
}

pub(crate) struct ReviewFixture {
    pub(crate) attempt_id: String,
    pub(crate) section_attempt_id: String,
    pub(crate) task_id: String,
}

/// Seeds a completed manual section with a pending review task, skipping the
/// HTTP submission flow.
pub(crate) async fn insert_review_fixture(
    pool: &PgPool,
    candidate_id: &str,
    exam_id: &str,
    section_id: &str,
    kind: SectionKind,
    response_text: &str,
) -> ReviewFixture {
    let now = primitive_now_utc();
    let attempt_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO attempts (id, candidate_id, exam_id, status, created_at, updated_at)
         VALUES ($1, $2, $3, 'started', $4, $4)",
    )
    .bind(&attempt_id)
    .bind(candidate_id)
    .bind(exam_id)
    .bind(now)
    .execute(pool)
    .await
    .expect("insert attempt");

    let section_attempt_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO section_attempts
             (id, attempt_id, section_id, kind, status, score, response_text,
              start_time, end_time, created_at, updated_at)
         VALUES ($1, $2, $3, $4, 'completed', NULL, $5, $6, NULL, $6, $6)",
    )
    .bind(&section_attempt_id)
    .bind(&attempt_id)
    .bind(section_id)
    .bind(kind)
    .bind(response_text)
    .bind(now)
    .execute(pool)
    .await
    .expect("insert section attempt");

    let task_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO review_tasks (id, section_attempt_id, status, created_at, updated_at)
         VALUES ($1, $2, 'pending', $3, $3)",
    )
    .bind(&task_id)
    .bind(&section_attempt_id)
    .bind(now)
    .execute(pool)
    .await
    .expect("insert review task");

    ReviewFixture { attempt_id, section_attempt_id, task_id }
}

pub(crate) fn bearer_token(user_id: &str, settings: &Settings) -> String {
    security::create_access_token(user_id, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
