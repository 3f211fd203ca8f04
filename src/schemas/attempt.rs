use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::AssessmentAttempt;
use crate::db::types::TranscriptTurn;
use crate::schemas::format_primitive;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AttemptCreate {
    #[serde(alias = "userId")]
    #[validate(length(min = 1, message = "user_id must not be empty"))]
    pub(crate) user_id: String,
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub(crate) username: String,
    #[validate(length(min = 1, message = "question must not be empty"))]
    pub(crate) question: String,
    #[serde(default)]
    pub(crate) responses: Vec<TranscriptTurn>,
    #[serde(default)]
    #[serde(alias = "timeElapsedSeconds")]
    #[validate(range(min = 0.0, message = "time_elapsed_seconds must be non-negative"))]
    pub(crate) time_elapsed_seconds: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttemptListQuery {
    #[serde(alias = "userId")]
    pub(crate) user_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) topic_id: String,
    pub(crate) question: String,
    pub(crate) responses: Vec<TranscriptTurn>,
    pub(crate) attempt_count: i32,
    pub(crate) time_elapsed_seconds: f64,
    pub(crate) created_at: String,
}

impl From<AssessmentAttempt> for AttemptResponse {
    fn from(attempt: AssessmentAttempt) -> Self {
        Self {
            id: attempt.id,
            user_id: attempt.user_id,
            username: attempt.username,
            topic_id: attempt.topic_id,
            question: attempt.question,
            responses: attempt.responses.0,
            attempt_count: attempt.attempt_count,
            time_elapsed_seconds: attempt.time_elapsed_seconds,
            created_at: format_primitive(attempt.created_at),
        }
    }
}
