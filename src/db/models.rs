use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::TranscriptTurn;

/// Username written as `teacher_username` when the grade came from the AI.
pub(crate) const AI_TEACHER_USERNAME: &str = "AI";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Class {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) owner_username: String,
    pub(crate) ai_grading_enabled: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AssessmentAttempt {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) topic_id: String,
    pub(crate) question: String,
    pub(crate) responses: Json<Vec<TranscriptTurn>>,
    pub(crate) attempt_count: i32,
    pub(crate) time_elapsed_seconds: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct FeedbackRecord {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) teacher_username: String,
    pub(crate) topic_id: String,
    pub(crate) class_id: String,
    pub(crate) attempt_count: i32,
    pub(crate) grade: String,
    pub(crate) feedback_text: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct RubricRecord {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) column_order: Json<Vec<String>>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct RubricRowRecord {
    pub(crate) id: String,
    pub(crate) rubric_id: String,
    pub(crate) position: i32,
    pub(crate) criteria: String,
    pub(crate) weightage: f64,
    pub(crate) grading_values: Json<Vec<String>>,
}
