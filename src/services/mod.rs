pub(crate) mod ai_generation;
pub(crate) mod analytics;
pub(crate) mod assessment;
pub(crate) mod errors;
pub(crate) mod feedback;
pub(crate) mod grade_extraction;
pub(crate) mod grading;
pub(crate) mod prompts;
pub(crate) mod rubric;
pub(crate) mod store;
