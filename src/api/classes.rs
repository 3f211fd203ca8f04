use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::analytics::{ResponseTimeQuery, ResponseTimeResponse};
use crate::schemas::class::{AiGradingToggle, ClassResponse};
use crate::services::analytics::{self, ClassAnalytics, IndividualAnalytics};
use crate::services::errors::GradingError;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:class_id/analytics", get(class_analytics))
        .route("/:class_id/analytics/:user_id", get(student_analytics))
        .route("/:class_id/response-time", get(response_time))
        .route("/:class_id/ai-grading", patch(set_ai_grading))
}

async fn class_analytics(
    Path(class_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ClassAnalytics>, ApiError> {
    let analytics = analytics::aggregate_class(state.store().as_feedback(), &class_id).await?;
    Ok(Json(analytics))
}

async fn student_analytics(
    Path((class_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<IndividualAnalytics>, ApiError> {
    let analytics =
        analytics::aggregate_individual(state.store().as_feedback(), &class_id, &user_id).await?;
    Ok(Json(analytics))
}

async fn response_time(
    Path(class_id): Path<String>,
    Query(query): Query<ResponseTimeQuery>,
    State(state): State<AppState>,
) -> Result<Json<ResponseTimeResponse>, ApiError> {
    let average_seconds = analytics::average_response_time(
        state.store().as_attempts(),
        &class_id,
        query.user_id.as_deref(),
    )
    .await?;

    Ok(Json(ResponseTimeResponse { class_id, user_id: query.user_id, average_seconds }))
}

/// Only the class owner may flip the toggle.
async fn set_ai_grading(
    Path(class_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<AiGradingToggle>,
) -> Result<Json<ClassResponse>, ApiError> {
    payload.validate()?;
    let store = state.store();

    let class = store
        .find_class(&class_id)
        .await
        .map_err(GradingError::from)?
        .ok_or_else(|| GradingError::not_found(format!("Class {class_id}")))?;
    if class.owner_username != payload.acting_username {
        return Err(GradingError::Forbidden(format!(
            "Only the owner of class {class_id} can change AI grading"
        ))
        .into());
    }

    let updated = store
        .set_ai_grading(&class_id, payload.enabled)
        .await
        .map_err(GradingError::from)?
        .ok_or_else(|| GradingError::not_found(format!("Class {class_id}")))?;

    tracing::info!(class_id = %class_id, enabled = payload.enabled, "Class AI grading toggled");
    Ok(Json(ClassResponse::from(updated)))
}
