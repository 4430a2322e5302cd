use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AttemptStatus, CefrBand, ExamTrack, ReviewAction, ReviewStatus, SectionKind, SectionStatus,
    UserRole,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) phone: Option<String>,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) track: ExamTrack,
    pub(crate) language: String,
    pub(crate) title: String,
    pub(crate) price: i64,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Section {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) kind: SectionKind,
    pub(crate) title: String,
    pub(crate) prompt: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) question_count: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) section_id: String,
    pub(crate) position: i32,
    pub(crate) text: String,
    pub(crate) has_options: bool,
    pub(crate) answer_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) text: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) candidate_id: String,
    pub(crate) exam_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) score: Option<f64>,
    pub(crate) level: Option<CefrBand>,
    pub(crate) finalized: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct SectionAttempt {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) section_id: String,
    pub(crate) kind: SectionKind,
    pub(crate) status: SectionStatus,
    pub(crate) score: Option<f64>,
    pub(crate) response_text: Option<String>,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Answer {
    pub(crate) id: String,
    pub(crate) section_attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) option_id: Option<String>,
    pub(crate) text_answer: Option<String>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ReviewTask {
    pub(crate) id: String,
    pub(crate) section_attempt_id: String,
    pub(crate) status: ReviewStatus,
    pub(crate) reviewer_id: Option<String>,
    pub(crate) total_score: Option<f64>,
    pub(crate) notification_message_id: Option<i64>,
    pub(crate) reviewed_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionScore {
    pub(crate) id: String,
    pub(crate) review_task_id: String,
    pub(crate) question_number: i32,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) comment: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ReviewLogEntry {
    pub(crate) id: String,
    pub(crate) review_task_id: String,
    pub(crate) actor_id: Option<String>,
    pub(crate) action: ReviewAction,
    pub(crate) question_number: Option<i32>,
    pub(crate) old_value: Option<f64>,
    pub(crate) new_value: Option<f64>,
    pub(crate) created_at: PrimitiveDateTime,
}
