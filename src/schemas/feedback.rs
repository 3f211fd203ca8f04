use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::FeedbackRecord;
use crate::schemas::format_primitive;
use crate::services::store::FeedbackWrite;

/// Missing fields deserialize as blanks so the write is rejected as a
/// validation error naming every absent field at once.
#[derive(Debug, Deserialize)]
pub(crate) struct FeedbackCreate {
    #[serde(default)]
    #[serde(alias = "userId")]
    pub(crate) user_id: String,
    #[serde(default)]
    pub(crate) username: String,
    #[serde(default)]
    #[serde(alias = "teacherUsername")]
    pub(crate) teacher_username: String,
    #[serde(default)]
    #[serde(alias = "topicId")]
    pub(crate) topic_id: String,
    #[serde(default)]
    #[serde(alias = "classId")]
    pub(crate) class_id: String,
    #[serde(default)]
    #[serde(alias = "attemptCount")]
    pub(crate) attempt_count: i32,
    #[serde(default)]
    pub(crate) grade: String,
    #[serde(default)]
    #[serde(alias = "feedbackText", alias = "feedback")]
    pub(crate) feedback_text: String,
}

impl From<FeedbackCreate> for FeedbackWrite {
    fn from(payload: FeedbackCreate) -> Self {
        FeedbackWrite {
            user_id: payload.user_id,
            username: payload.username,
            teacher_username: payload.teacher_username,
            topic_id: payload.topic_id,
            class_id: payload.class_id,
            attempt_count: payload.attempt_count,
            grade: payload.grade,
            feedback_text: payload.feedback_text,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct FeedbackUpdate {
    #[serde(alias = "teacherUsername")]
    #[validate(length(min = 1, message = "teacher_username must not be empty"))]
    pub(crate) teacher_username: String,
    #[validate(length(min = 1, message = "grade must not be empty"))]
    pub(crate) grade: String,
    #[serde(alias = "feedbackText", alias = "feedback")]
    #[validate(length(min = 1, message = "feedback_text must not be empty"))]
    pub(crate) feedback_text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct FeedbackResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) teacher_username: String,
    pub(crate) topic_id: String,
    pub(crate) class_id: String,
    pub(crate) attempt_count: i32,
    pub(crate) grade: String,
    pub(crate) feedback_text: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl From<FeedbackRecord> for FeedbackResponse {
    fn from(record: FeedbackRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            username: record.username,
            teacher_username: record.teacher_username,
            topic_id: record.topic_id,
            class_id: record.class_id,
            attempt_count: record.attempt_count,
            grade: record.grade,
            feedback_text: record.feedback_text,
            created_at: format_primitive(record.created_at),
            updated_at: format_primitive(record.updated_at),
        }
    }
}
