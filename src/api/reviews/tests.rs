use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::{ExamTrack, SectionKind, UserRole};
use crate::test_support;

async fn get(
    ctx: &test_support::TestContext,
    token: &str,
    uri: &str,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, uri, Some(token), None))
        .await
        .expect("request");
    let status = response.status();
    let body = test_support::read_json(response).await;
    (status, body)
}

async fn post(
    ctx: &test_support::TestContext,
    token: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, uri, Some(token), body))
        .await
        .expect("request");
    let status = response.status();
    let body = test_support::read_json(response).await;
    (status, body)
}

#[tokio::test]
async fn candidates_cannot_reach_review_endpoints() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let candidate =
        test_support::insert_user(ctx.state.db(), "cand101", "Candidate", UserRole::Candidate)
            .await;
    let token = test_support::bearer_token(&candidate.id, ctx.state.settings());

    let (status, body) = get(&ctx, &token, "/api/v1/reviews/queue").await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
}

#[tokio::test]
async fn claim_takes_the_task_and_hides_it_from_others() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let candidate =
        test_support::insert_user(ctx.state.db(), "cand102", "Madina Alim", UserRole::Candidate)
            .await;
    let first =
        test_support::insert_user(ctx.state.db(), "rev101", "First Reviewer", UserRole::Reviewer)
            .await;
    let second =
        test_support::insert_user(ctx.state.db(), "rev102", "Second Reviewer", UserRole::Reviewer)
            .await;

    let exam_id =
        test_support::insert_exam(ctx.state.db(), ExamTrack::Multilevel, "en", "Multilevel EN")
            .await;
    let section_id = test_support::insert_section(
        ctx.state.db(),
        &exam_id,
        SectionKind::Writing,
        "Writing",
        60,
        2,
    )
    .await;
    let fixture = test_support::insert_review_fixture(
        ctx.state.db(),
        &candidate.id,
        &exam_id,
        &section_id,
        SectionKind::Writing,
        "essay text",
    )
    .await;

    let first_token = test_support::bearer_token(&first.id, ctx.state.settings());
    let second_token = test_support::bearer_token(&second.id, ctx.state.settings());

    // Both reviewers see the pending task.
    let (status, body) = get(&ctx, &second_token, "/api/v1/reviews/queue").await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["total_count"], 1);

    let (status, body) =
        post(&ctx, &first_token, &format!("/api/v1/reviews/{}/claim", fixture.task_id), None)
            .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["status"], "reviewing");
    assert_eq!(body["reviewer_id"], first.id.as_str());

    // Claimed: gone from the other reviewer's queue and detail view.
    let (status, body) = get(&ctx, &second_token, "/api/v1/reviews/queue").await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["total_count"], 0);

    let (status, body) =
        get(&ctx, &second_token, &format!("/api/v1/reviews/{}", fixture.task_id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");

    // A second claim is refused.
    let (status, body) =
        post(&ctx, &second_token, &format!("/api/v1/reviews/{}/claim", fixture.task_id), None)
            .await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");

    // The claim landed in the audit log.
    let (status, body) =
        get(&ctx, &first_token, &format!("/api/v1/reviews/{}", fixture.task_id)).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["audit_log"][0]["action"], "claim");
}

#[tokio::test]
async fn claim_capacity_is_capped() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let reviewer =
        test_support::insert_user(ctx.state.db(), "rev103", "Busy Reviewer", UserRole::Reviewer)
            .await;
    let exam_id =
        test_support::insert_exam(ctx.state.db(), ExamTrack::Multilevel, "en", "Multilevel EN")
            .await;
    let section_id = test_support::insert_section(
        ctx.state.db(),
        &exam_id,
        SectionKind::Writing,
        "Writing",
        60,
        2,
    )
    .await;

    let token = test_support::bearer_token(&reviewer.id, ctx.state.settings());
    let capacity = ctx.state.settings().review().capacity;

    let mut last_task = String::new();
    for i in 0..=capacity {
        let candidate = test_support::insert_user(
            ctx.state.db(),
            &format!("cand2{i:02}"),
            &format!("Candidate {i}"),
            UserRole::Candidate,
        )
        .await;
        let fixture = test_support::insert_review_fixture(
            ctx.state.db(),
            &candidate.id,
            &exam_id,
            &section_id,
            SectionKind::Writing,
            "essay text",
        )
        .await;
        last_task = fixture.task_id;

        if i < capacity {
            let (status, body) =
                post(&ctx, &token, &format!("/api/v1/reviews/{last_task}/claim"), None).await;
            assert_eq!(status, StatusCode::OK, "claim {i}: {body}");
        }
    }

    let (status, body) =
        post(&ctx, &token, &format!("/api/v1/reviews/{last_task}/claim"), None).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");
    assert_eq!(body["detail"], "Finish some of your claimed reviews before taking more");
}

#[tokio::test]
async fn scoring_requires_claim_and_ownership() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let candidate =
        test_support::insert_user(ctx.state.db(), "cand103", "Nursultan Bek", UserRole::Candidate)
            .await;
    let owner =
        test_support::insert_user(ctx.state.db(), "rev104", "Owner Reviewer", UserRole::Reviewer)
            .await;
    let other =
        test_support::insert_user(ctx.state.db(), "rev105", "Other Reviewer", UserRole::Reviewer)
            .await;

    let exam_id =
        test_support::insert_exam(ctx.state.db(), ExamTrack::Multilevel, "en", "Multilevel EN")
            .await;
    let section_id = test_support::insert_section(
        ctx.state.db(),
        &exam_id,
        SectionKind::Writing,
        "Writing",
        60,
        2,
    )
    .await;
    let fixture = test_support::insert_review_fixture(
        ctx.state.db(),
        &candidate.id,
        &exam_id,
        &section_id,
        SectionKind::Writing,
        "essay text",
    )
    .await;

    let owner_token = test_support::bearer_token(&owner.id, ctx.state.settings());
    let other_token = test_support::bearer_token(&other.id, ctx.state.settings());
    let score_uri = format!("/api/v1/reviews/{}/score", fixture.task_id);
    let payload = json!({ "total_score": 60.0 });

    // Unclaimed tasks cannot be scored.
    let (status, body) = post(&ctx, &owner_token, &score_uri, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");

    let (status, body) =
        post(&ctx, &owner_token, &format!("/api/v1/reviews/{}/claim", fixture.task_id), None)
            .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");

    // Only the holder may score.
    let (status, body) = post(&ctx, &other_token, &score_uri, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");

    let (status, body) = post(&ctx, &owner_token, &score_uri, Some(payload)).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["status"], "checked");
    assert_eq!(body["total_score"], 60.0);
    assert!(body["reviewed_at"].is_string());

    // Checked is terminal.
    let (status, body) =
        post(&ctx, &owner_token, &score_uri, Some(json!({ "total_score": 70.0 }))).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");
}

#[tokio::test]
async fn draft_keeps_reviewing_and_checked_finalizes_the_attempt() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let candidate =
        test_support::insert_user(ctx.state.db(), "cand104", "Olzhas Serik", UserRole::Candidate)
            .await;
    let reviewer =
        test_support::insert_user(ctx.state.db(), "rev106", "Careful Reviewer", UserRole::Reviewer)
            .await;

    let exam_id =
        test_support::insert_exam(ctx.state.db(), ExamTrack::Multilevel, "en", "Multilevel EN")
            .await;
    let section_id = test_support::insert_section(
        ctx.state.db(),
        &exam_id,
        SectionKind::Writing,
        "Writing",
        60,
        2,
    )
    .await;
    let fixture = test_support::insert_review_fixture(
        ctx.state.db(),
        &candidate.id,
        &exam_id,
        &section_id,
        SectionKind::Writing,
        "essay text",
    )
    .await;

    let token = test_support::bearer_token(&reviewer.id, ctx.state.settings());
    let score_uri = format!("/api/v1/reviews/{}/score", fixture.task_id);

    let (status, body) =
        post(&ctx, &token, &format!("/api/v1/reviews/{}/claim", fixture.task_id), None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");

    // Draft: question scores land, task stays reviewing, attempt stays open.
    let draft = json!({
        "total_score": 55.0,
        "is_draft": true,
        "question_scores": [
            { "question_number": 1, "score": 20.0, "max_score": 25.0 },
            { "question_number": 2, "score": 35.0, "max_score": 50.0 }
        ]
    });
    let (status, body) = post(&ctx, &token, &score_uri, Some(draft)).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["status"], "reviewing");
    assert!(body["reviewed_at"].is_null());

    let attempt_status: String =
        sqlx::query_scalar("SELECT status::text FROM attempts WHERE id = $1")
            .bind(&fixture.attempt_id)
            .fetch_one(ctx.state.db())
            .await
            .expect("attempt status");
    assert_eq!(attempt_status, "started");

    // Amend one question and finish.
    let checked = json!({
        "total_score": 62.5,
        "question_scores": [
            { "question_number": 2, "score": 42.5, "max_score": 50.0 }
        ]
    });
    let (status, body) = post(&ctx, &token, &score_uri, Some(checked)).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["status"], "checked");

    // The reviewed score reached the section attempt and the attempt closed.
    let (status, body) =
        get(&ctx, &token, &format!("/api/v1/reviews/{}", fixture.task_id)).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["total_score"], 62.5);
    let actions: Vec<&str> = body["audit_log"]
        .as_array()
        .expect("log")
        .iter()
        .map(|entry| entry["action"].as_str().expect("action"))
        .collect();
    assert!(actions.contains(&"claim"), "log: {actions:?}");
    assert!(actions.contains(&"create_question_score"), "log: {actions:?}");
    assert!(actions.contains(&"update_question_score"), "log: {actions:?}");
    assert!(actions.contains(&"update_total_score"), "log: {actions:?}");
    assert!(actions.contains(&"checked"), "log: {actions:?}");

    let section_score: Option<f64> =
        sqlx::query_scalar("SELECT score FROM section_attempts WHERE id = $1")
            .bind(&fixture.section_attempt_id)
            .fetch_one(ctx.state.db())
            .await
            .expect("section score");
    assert_eq!(section_score, Some(62.5));

    let (attempt_status, attempt_score): (String, Option<f64>) = sqlx::query_as(
        "SELECT status::text, score FROM attempts WHERE id = $1",
    )
    .bind(&fixture.attempt_id)
    .fetch_one(ctx.state.db())
    .await
    .expect("attempt row");
    assert_eq!(attempt_status, "completed");
    assert_eq!(attempt_score, Some(62.5));
}

#[tokio::test]
async fn tys_total_cannot_exceed_the_track_cap() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let candidate =
        test_support::insert_user(ctx.state.db(), "cand105", "Perizat Kair", UserRole::Candidate)
            .await;
    let reviewer =
        test_support::insert_user(ctx.state.db(), "rev107", "Strict Reviewer", UserRole::Reviewer)
            .await;

    let exam_id =
        test_support::insert_exam(ctx.state.db(), ExamTrack::Tys, "tr", "TYS Turkish").await;
    let section_id = test_support::insert_section(
        ctx.state.db(),
        &exam_id,
        SectionKind::Writing,
        "Writing",
        60,
        2,
    )
    .await;
    let fixture = test_support::insert_review_fixture(
        ctx.state.db(),
        &candidate.id,
        &exam_id,
        &section_id,
        SectionKind::Writing,
        "essay text",
    )
    .await;

    let token = test_support::bearer_token(&reviewer.id, ctx.state.settings());

    let (status, body) =
        post(&ctx, &token, &format!("/api/v1/reviews/{}/claim", fixture.task_id), None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");

    let (status, body) = post(
        &ctx,
        &token,
        &format!("/api/v1/reviews/{}/score", fixture.task_id),
        Some(json!({ "total_score": 40.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["detail"], "total_score must not exceed 25 for this track");
}
