use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::types::{AttemptStatus, SectionKind, SectionStatus};

/// Question as shown to the candidate: answer keys and option correctness
/// flags are stripped.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) position: i32,
    pub(crate) text: String,
    pub(crate) has_options: bool,
    pub(crate) options: Vec<QuestionOptionResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionOptionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenSectionResponse {
    pub(crate) section_attempt_id: String,
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) section_id: String,
    pub(crate) kind: SectionKind,
    pub(crate) title: String,
    pub(crate) prompt: Option<String>,
    pub(crate) status: SectionStatus,
    pub(crate) duration_minutes: i32,
    pub(crate) start_time: String,
    pub(crate) end_time: Option<String>,
    pub(crate) questions: Vec<QuestionResponse>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub(crate) struct AnswerSubmission {
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(default)]
    pub(crate) option_id: Option<String>,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitAnswersRequest {
    #[validate(length(min = 1, message = "answers must not be empty"))]
    #[validate(nested)]
    pub(crate) answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitAnswersResponse {
    pub(crate) section_attempt_id: String,
    pub(crate) status: SectionStatus,
    pub(crate) answered: i64,
    pub(crate) question_count: i32,
    pub(crate) section_completed: bool,
    pub(crate) score: Option<f64>,
    pub(crate) review_task_id: Option<String>,
    pub(crate) attempt_status: AttemptStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptSummaryResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) status: AttemptStatus,
    pub(crate) score: Option<f64>,
    pub(crate) level: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionAttemptSummaryResponse {
    pub(crate) id: String,
    pub(crate) section_id: String,
    pub(crate) kind: SectionKind,
    pub(crate) status: SectionStatus,
    pub(crate) score: Option<f64>,
    pub(crate) start_time: String,
    pub(crate) end_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptDetailResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) track: crate::db::types::ExamTrack,
    pub(crate) status: AttemptStatus,
    pub(crate) score: Option<f64>,
    pub(crate) level: Option<String>,
    pub(crate) completed_sections: usize,
    pub(crate) total_sections: usize,
    pub(crate) sections: Vec<SectionAttemptSummaryResponse>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}
