use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::types::TranscriptTurn;
use crate::schemas::feedback::FeedbackResponse;
use crate::services::errors::GradingError;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradingInput {
    #[validate(length(min = 1, message = "question must not be empty"))]
    pub(crate) question: String,
    #[serde(default)]
    #[serde(alias = "responses")]
    pub(crate) transcript: Vec<TranscriptTurn>,
    #[serde(alias = "rubricId")]
    #[validate(length(min = 1, message = "rubric_id must not be empty"))]
    pub(crate) rubric_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeAttemptRequest {
    #[serde(alias = "classId")]
    #[validate(length(min = 1, message = "class_id must not be empty"))]
    pub(crate) class_id: String,
    #[serde(alias = "userId")]
    #[validate(length(min = 1, message = "user_id must not be empty"))]
    pub(crate) user_id: String,
    #[serde(alias = "topicId")]
    #[validate(length(min = 1, message = "topic_id must not be empty"))]
    pub(crate) topic_id: String,
    #[serde(alias = "attemptCount")]
    #[validate(range(min = 1, message = "attempt_count must be positive"))]
    pub(crate) attempt_count: i32,
    #[serde(alias = "rubricId")]
    #[validate(length(min = 1, message = "rubric_id must not be empty"))]
    pub(crate) rubric_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct FeedbackTextResponse {
    pub(crate) feedback: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeResponse {
    pub(crate) grade: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SlotError {
    pub(crate) kind: &'static str,
    pub(crate) detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) last_raw: Option<String>,
}

/// One half of a feedback+grade run.
#[derive(Debug, Serialize)]
pub(crate) struct ResultSlot {
    pub(crate) ok: bool,
    pub(crate) value: Option<String>,
    pub(crate) error: Option<SlotError>,
}

impl ResultSlot {
    pub(crate) fn from_result<T: ToString>(result: &Result<T, GradingError>) -> Self {
        match result {
            Ok(value) => Self { ok: true, value: Some(value.to_string()), error: None },
            Err(err) => {
                let (attempts, last_raw) = match err {
                    GradingError::GradeExtractionFailed { attempts, last_raw, .. } => {
                        (Some(*attempts), last_raw.clone())
                    }
                    _ => (None, None),
                };
                Self {
                    ok: false,
                    value: None,
                    error: Some(SlotError { kind: err.kind(), detail: err.to_string(), attempts, last_raw }),
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FeedbackAndGradeResponse {
    pub(crate) feedback: ResultSlot,
    pub(crate) grade: ResultSlot,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeAttemptResponse {
    pub(crate) feedback: ResultSlot,
    pub(crate) grade: ResultSlot,
    pub(crate) record: Option<FeedbackResponse>,
}
