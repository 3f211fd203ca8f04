use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::attempt::{AttemptCreate, AttemptListQuery, AttemptResponse};
use crate::services::errors::GradingError;
use crate::services::store::NewAttempt;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:topic_id/attempts", get(list_attempts).post(record_attempt))
}

async fn record_attempt(
    Path(topic_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<AttemptCreate>,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError> {
    payload.validate()?;

    let attempt = state
        .store()
        .create_attempt(NewAttempt {
            user_id: payload.user_id,
            username: payload.username,
            topic_id,
            question: payload.question,
            responses: payload.responses,
            time_elapsed_seconds: payload.time_elapsed_seconds,
        })
        .await
        .map_err(GradingError::from)?;

    tracing::info!(
        user_id = %attempt.user_id,
        topic_id = %attempt.topic_id,
        attempt_count = attempt.attempt_count,
        "Attempt recorded"
    );
    Ok((StatusCode::CREATED, Json(AttemptResponse::from(attempt))))
}

async fn list_attempts(
    Path(topic_id): Path<String>,
    Query(query): Query<AttemptListQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    let attempts = state
        .store()
        .list_attempts(&query.user_id, &topic_id)
        .await
        .map_err(GradingError::from)?;

    Ok(Json(attempts.into_iter().map(AttemptResponse::from).collect()))
}
