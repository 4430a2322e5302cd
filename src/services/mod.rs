pub(crate) mod attempt_finalize;
pub(crate) mod grader;
pub(crate) mod notifier;
pub(crate) mod scoring;
pub(crate) mod section_timing;
