use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::types::{ExamTrack, ReviewAction, ReviewStatus, SectionKind};

#[derive(Debug, Serialize)]
pub(crate) struct ReviewQueueItemResponse {
    pub(crate) id: String,
    pub(crate) status: ReviewStatus,
    pub(crate) section_attempt_id: String,
    pub(crate) kind: SectionKind,
    pub(crate) candidate_id: String,
    pub(crate) candidate_name: String,
    pub(crate) candidate_username: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) track: ExamTrack,
    pub(crate) language: String,
    pub(crate) reviewer_id: Option<String>,
    pub(crate) total_score: Option<f64>,
    pub(crate) submitted_at: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionScoreResponse {
    pub(crate) question_number: i32,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewLogResponse {
    pub(crate) action: ReviewAction,
    pub(crate) actor_id: Option<String>,
    pub(crate) question_number: Option<i32>,
    pub(crate) old_value: Option<f64>,
    pub(crate) new_value: Option<f64>,
    pub(crate) created_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewDetailResponse {
    pub(crate) id: String,
    pub(crate) status: ReviewStatus,
    pub(crate) section_attempt_id: String,
    pub(crate) kind: SectionKind,
    pub(crate) candidate_id: String,
    pub(crate) candidate_name: String,
    pub(crate) candidate_username: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) track: ExamTrack,
    pub(crate) language: String,
    pub(crate) reviewer_id: Option<String>,
    pub(crate) total_score: Option<f64>,
    pub(crate) prompt: Option<String>,
    pub(crate) response_text: Option<String>,
    pub(crate) word_count: usize,
    pub(crate) question_scores: Vec<QuestionScoreResponse>,
    pub(crate) audit_log: Vec<ReviewLogResponse>,
    pub(crate) submitted_at: String,
    pub(crate) reviewed_at: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionScorePayload {
    #[validate(range(min = 1, message = "question_number must be positive"))]
    pub(crate) question_number: i32,
    #[validate(range(min = 0.0, message = "score must be non-negative"))]
    pub(crate) score: f64,
    #[validate(range(exclusive_min = 0.0, message = "max_score must be positive"))]
    pub(crate) max_score: f64,
    #[serde(default)]
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitScoreRequest {
    #[validate(range(min = 0.0, max = 100.0, message = "total_score must be between 0 and 100"))]
    pub(crate) total_score: f64,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) question_scores: Vec<QuestionScorePayload>,
    #[serde(default)]
    pub(crate) is_draft: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitScoreResponse {
    pub(crate) task_id: String,
    pub(crate) status: ReviewStatus,
    pub(crate) total_score: Option<f64>,
    pub(crate) reviewed_at: Option<String>,
}
