use axum::extract::{Path, Query};
use axum::{routing::get, Json, Router};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{self, PaginatedResponse};
use crate::core::state::AppState;
use crate::db::types::ExamTrack;
use crate::repositories;
use crate::schemas::exam::{
    format_primitive, ExamDetailResponse, ExamResponse, SectionSummaryResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_exams)).route("/:exam_id", get(get_exam))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListExamsQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    limit: i64,
    #[serde(default)]
    track: Option<ExamTrack>,
    #[serde(default)]
    language: Option<String>,
}

async fn list_exams(
    CurrentUser(_user): CurrentUser,
    state: axum::extract::State<AppState>,
    Query(params): Query<ListExamsQuery>,
) -> Result<Json<PaginatedResponse<ExamResponse>>, ApiError> {
    let (skip, limit) = pagination::window(params.skip, params.limit);

    let exams = repositories::exams::list_active(
        state.db(),
        params.track,
        params.language.as_deref(),
        skip,
        limit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    let total_count =
        repositories::exams::count_active(state.db(), params.track, params.language.as_deref())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count exams"))?;

    let items = exams
        .into_iter()
        .map(|exam| ExamResponse {
            id: exam.id,
            track: exam.track,
            language: exam.language,
            title: exam.title,
            price: exam.price,
            is_active: exam.is_active,
            created_at: format_primitive(exam.created_at),
        })
        .collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

async fn get_exam(
    CurrentUser(_user): CurrentUser,
    state: axum::extract::State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<Json<ExamDetailResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    let sections = repositories::exams::list_sections(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exam sections"))?;

    let sections = sections
        .into_iter()
        .map(|section| SectionSummaryResponse {
            id: section.id,
            kind: section.kind,
            title: section.title,
            duration_minutes: section.duration_minutes,
            question_count: section.question_count,
        })
        .collect();

    Ok(Json(ExamDetailResponse {
        id: exam.id,
        track: exam.track,
        language: exam.language,
        title: exam.title,
        price: exam.price,
        is_active: exam.is_active,
        created_at: format_primitive(exam.created_at),
        sections,
    }))
}
