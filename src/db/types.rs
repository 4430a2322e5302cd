use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Candidate,
    Reviewer,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "examtrack", rename_all = "lowercase")]
pub(crate) enum ExamTrack {
    A1,
    A2,
    B1,
    B2,
    C1,
    Multilevel,
    Tys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "sectionkind", rename_all = "lowercase")]
pub(crate) enum SectionKind {
    Listening,
    Reading,
    Writing,
    Speaking,
}

impl SectionKind {
    /// Answer-key kinds are scored from lookup tables at submission time;
    /// the rest go through manual review.
    pub(crate) fn is_auto_scored(self) -> bool {
        matches!(self, SectionKind::Listening | SectionKind::Reading)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SectionKind::Listening => "listening",
            SectionKind::Reading => "reading",
            SectionKind::Writing => "writing",
            SectionKind::Speaking => "speaking",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "listening" => Some(SectionKind::Listening),
            "reading" => Some(SectionKind::Reading),
            "writing" => Some(SectionKind::Writing),
            "speaking" => Some(SectionKind::Speaking),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "attemptstatus", rename_all = "lowercase")]
pub(crate) enum AttemptStatus {
    Created,
    Started,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "sectionstatus", rename_all = "lowercase")]
pub(crate) enum SectionStatus {
    Created,
    Started,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "reviewstatus", rename_all = "lowercase")]
pub(crate) enum ReviewStatus {
    Pending,
    Reviewing,
    Checked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "reviewaction", rename_all = "snake_case")]
pub(crate) enum ReviewAction {
    Claim,
    CreateQuestionScore,
    UpdateQuestionScore,
    UpdateTotalScore,
    Checked,
    StaleReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "cefrband", rename_all = "snake_case")]
pub(crate) enum CefrBand {
    BelowB1,
    B1,
    B2,
    C1,
}

impl CefrBand {
    pub(crate) fn label(self) -> &'static str {
        match self {
            CefrBand::BelowB1 => "Below B1",
            CefrBand::B1 => "B1",
            CefrBand::B2 => "B2",
            CefrBand::C1 => "C1",
        }
    }
}
