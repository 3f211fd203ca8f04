use axum::{extract::State, routing::post, Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::feedback::FeedbackResponse;
use crate::schemas::grading::{
    FeedbackAndGradeResponse, FeedbackTextResponse, GradeAttemptRequest, GradeAttemptResponse,
    GradeResponse, GradingInput, ResultSlot,
};
use crate::services::assessment::{self, AttemptRef};
use crate::services::errors::GradingError;
use crate::services::grading::GradingRequest;
use crate::services::rubric::Rubric;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/feedback", post(generate_feedback))
        .route("/grade", post(generate_grade))
        .route("/feedback-and-grade", post(generate_feedback_and_grade))
        .route("/attempts", post(grade_attempt))
}

async fn load_rubric(state: &AppState, rubric_id: &str) -> Result<Rubric, ApiError> {
    Ok(state
        .store()
        .fetch_rubric(rubric_id)
        .await
        .map_err(GradingError::from)?
        .ok_or_else(|| GradingError::not_found(format!("Rubric {rubric_id}")))?)
}

async fn generate_feedback(
    State(state): State<AppState>,
    Json(payload): Json<GradingInput>,
) -> Result<Json<FeedbackTextResponse>, ApiError> {
    payload.validate()?;
    let rubric = load_rubric(&state, &payload.rubric_id).await?;
    let request = GradingRequest {
        question: &payload.question,
        transcript: &payload.transcript,
        rubric: &rubric,
    };

    let feedback = state.orchestrator().generate_feedback(request).await?;
    Ok(Json(FeedbackTextResponse { feedback }))
}

async fn generate_grade(
    State(state): State<AppState>,
    Json(payload): Json<GradingInput>,
) -> Result<Json<GradeResponse>, ApiError> {
    payload.validate()?;
    let rubric = load_rubric(&state, &payload.rubric_id).await?;
    let request = GradingRequest {
        question: &payload.question,
        transcript: &payload.transcript,
        rubric: &rubric,
    };

    let grade = state.orchestrator().generate_grade(request, Some(state.shutdown())).await?;
    Ok(Json(GradeResponse { grade: grade.into_string() }))
}

async fn generate_feedback_and_grade(
    State(state): State<AppState>,
    Json(payload): Json<GradingInput>,
) -> Result<Json<FeedbackAndGradeResponse>, ApiError> {
    payload.validate()?;
    let rubric = load_rubric(&state, &payload.rubric_id).await?;
    let request = GradingRequest {
        question: &payload.question,
        transcript: &payload.transcript,
        rubric: &rubric,
    };

    let outcome =
        state.orchestrator().generate_feedback_and_grade(request, Some(state.shutdown())).await?;
    Ok(Json(FeedbackAndGradeResponse {
        feedback: ResultSlot::from_result(&outcome.feedback),
        grade: ResultSlot::from_result(&outcome.grade),
    }))
}

async fn grade_attempt(
    State(state): State<AppState>,
    Json(payload): Json<GradeAttemptRequest>,
) -> Result<Json<GradeAttemptResponse>, ApiError> {
    payload.validate()?;
    let target = AttemptRef {
        class_id: &payload.class_id,
        user_id: &payload.user_id,
        topic_id: &payload.topic_id,
        attempt_count: payload.attempt_count,
        rubric_id: &payload.rubric_id,
    };

    let outcome =
        assessment::grade_attempt(state.store(), state.orchestrator(), target, Some(state.shutdown()))
            .await?;

    Ok(Json(GradeAttemptResponse {
        feedback: ResultSlot::from_result(&outcome.feedback),
        grade: ResultSlot::from_result(&outcome.grade),
        record: outcome.record.map(FeedbackResponse::from),
    }))
}
