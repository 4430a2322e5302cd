pub(crate) mod answers;
pub(crate) mod attempts;
pub(crate) mod exams;
pub(crate) mod reviews;
pub(crate) mod section_attempts;
pub(crate) mod users;
