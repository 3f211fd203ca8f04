use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::feedback::{FeedbackCreate, FeedbackResponse, FeedbackUpdate};
use crate::services::errors::GradingError;
use crate::services::feedback;
use crate::services::store::{FeedbackKey, FeedbackWrite};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", post(create_feedback)).route(
        "/:username/:topic_id/:attempt_count",
        get(get_feedback).put(update_feedback).delete(delete_feedback),
    )
}

pub(crate) fn user_router() -> Router<AppState> {
    Router::new().route("/:user_id/feedback", get(list_user_feedback))
}

async fn create_feedback(
    State(state): State<AppState>,
    Json(payload): Json<FeedbackCreate>,
) -> Result<(StatusCode, Json<FeedbackResponse>), ApiError> {
    let write = FeedbackWrite::from(payload);
    let record = feedback::create(state.store().as_feedback(), &write).await?;

    tracing::info!(
        username = %record.username,
        topic_id = %record.topic_id,
        attempt_count = record.attempt_count,
        teacher = %record.teacher_username,
        "Feedback recorded"
    );
    Ok((StatusCode::CREATED, Json(FeedbackResponse::from(record))))
}

async fn get_feedback(
    Path((username, topic_id, attempt_count)): Path<(String, String, i32)>,
    State(state): State<AppState>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let key = FeedbackKey { username: &username, topic_id: &topic_id, attempt_count };
    let record = feedback::find(state.store().as_feedback(), key).await?;
    Ok(Json(FeedbackResponse::from(record)))
}

async fn update_feedback(
    Path((username, topic_id, attempt_count)): Path<(String, String, i32)>,
    State(state): State<AppState>,
    Json(payload): Json<FeedbackUpdate>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    payload.validate()?;
    let store = state.store().as_feedback();
    let key = FeedbackKey { username: &username, topic_id: &topic_id, attempt_count };
    let existing = feedback::find(store, key).await?;

    let write = FeedbackWrite {
        user_id: existing.user_id,
        username: existing.username,
        teacher_username: payload.teacher_username,
        topic_id: existing.topic_id,
        class_id: existing.class_id,
        attempt_count: existing.attempt_count,
        grade: payload.grade,
        feedback_text: payload.feedback_text,
    };
    let record = feedback::update(store, &write).await?;
    Ok(Json(FeedbackResponse::from(record)))
}

async fn delete_feedback(
    Path((username, topic_id, attempt_count)): Path<(String, String, i32)>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let key = FeedbackKey { username: &username, topic_id: &topic_id, attempt_count };
    feedback::delete(state.store().as_feedback(), key).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_user_feedback(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedbackResponse>>, ApiError> {
    let records = state.store().list_feedback_by_user(&user_id).await.map_err(GradingError::from)?;
    Ok(Json(records.into_iter().map(FeedbackResponse::from).collect()))
}
