use serde::Serialize;

pub(crate) use crate::core::time::format_primitive;
use crate::db::types::{ExamTrack, SectionKind};

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) track: ExamTrack,
    pub(crate) language: String,
    pub(crate) title: String,
    pub(crate) price: i64,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionSummaryResponse {
    pub(crate) id: String,
    pub(crate) kind: SectionKind,
    pub(crate) title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) question_count: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamDetailResponse {
    pub(crate) id: String,
    pub(crate) track: ExamTrack,
    pub(crate) language: String,
    pub(crate) title: String,
    pub(crate) price: i64,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
    pub(crate) sections: Vec<SectionSummaryResponse>,
}
