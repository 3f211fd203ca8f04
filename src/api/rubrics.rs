use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::rubric::{
    ColumnCreate, ColumnRename, RubricResponse, RubricRowInput, RubricRowPatch,
    RubricValidationResponse, RubricWrite,
};
use crate::services::errors::GradingError;
use crate::services::rubric::{Rubric, SchemaError};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_rubrics).post(create_rubric))
        .route("/:rubric_id", get(get_rubric).put(replace_rubric).delete(delete_rubric))
        .route("/:rubric_id/rows", post(add_row))
        .route("/:rubric_id/rows/:row_id", patch(edit_row).delete(remove_row))
        .route("/:rubric_id/columns", post(add_column))
        .route("/:rubric_id/columns/:name", patch(rename_column).delete(remove_column))
        .route("/:rubric_id/validate", post(validate_rubric))
}

/// Builds a rubric from a full write payload; weightages are normalized here.
fn build_rubric(id: String, payload: RubricWrite) -> Result<Rubric, SchemaError> {
    let mut rubric = Rubric::new(id, payload.title.trim());
    for column in &payload.columns {
        rubric.add_column(column)?;
    }
    for row in payload.rows {
        rubric.add_row(row.into())?;
    }
    Ok(rubric)
}

async fn load(state: &AppState, rubric_id: &str) -> Result<Rubric, ApiError> {
    state
        .store()
        .fetch_rubric(rubric_id)
        .await
        .map_err(GradingError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("Rubric {rubric_id} not found")))
}

async fn persist(state: &AppState, rubric: &Rubric) -> Result<(), ApiError> {
    let saved = state.store().save_rubric(rubric).await.map_err(GradingError::from)?;
    if saved {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("Rubric {} not found", rubric.id())))
    }
}

async fn list_rubrics(State(state): State<AppState>) -> Result<Json<Vec<RubricResponse>>, ApiError> {
    let rubrics = state.store().list_rubrics().await.map_err(GradingError::from)?;
    Ok(Json(rubrics.iter().map(RubricResponse::from).collect()))
}

async fn create_rubric(
    State(state): State<AppState>,
    Json(payload): Json<RubricWrite>,
) -> Result<(StatusCode, Json<RubricResponse>), ApiError> {
    payload.validate()?;
    let rubric = build_rubric(Uuid::new_v4().to_string(), payload).map_err(GradingError::from)?;
    rubric.validate().map_err(GradingError::from)?;

    state.store().create_rubric(&rubric).await.map_err(GradingError::from)?;
    tracing::info!(rubric_id = %rubric.id(), rows = rubric.rows().len(), "Rubric created");

    Ok((StatusCode::CREATED, Json(RubricResponse::from(&rubric))))
}

async fn get_rubric(
    Path(rubric_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RubricResponse>, ApiError> {
    let rubric = load(&state, &rubric_id).await?;
    Ok(Json(RubricResponse::from(&rubric)))
}

async fn replace_rubric(
    Path(rubric_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<RubricWrite>,
) -> Result<Json<RubricResponse>, ApiError> {
    payload.validate()?;
    let rubric = build_rubric(rubric_id, payload).map_err(GradingError::from)?;
    rubric.validate().map_err(GradingError::from)?;
    persist(&state, &rubric).await?;

    Ok(Json(RubricResponse::from(&rubric)))
}

async fn delete_rubric(
    Path(rubric_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.store().delete_rubric(&rubric_id).await.map_err(GradingError::from)?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Rubric {rubric_id} not found")));
    }
    tracing::info!(rubric_id = %rubric_id, "Rubric deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Row and column edits are saved even while the weightages are mid-edit and
// do not yet sum to 100%; `validate` reports that state and grading refuses it.

async fn add_row(
    Path(rubric_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<RubricRowInput>,
) -> Result<(StatusCode, Json<RubricResponse>), ApiError> {
    let mut rubric = load(&state, &rubric_id).await?;
    rubric.add_row(payload.into()).map_err(GradingError::from)?;
    persist(&state, &rubric).await?;

    Ok((StatusCode::CREATED, Json(RubricResponse::from(&rubric))))
}

async fn edit_row(
    Path((rubric_id, row_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(payload): Json<RubricRowPatch>,
) -> Result<Json<RubricResponse>, ApiError> {
    payload.validate()?;
    let mut rubric = load(&state, &rubric_id).await?;
    if rubric.row(&row_id).is_none() {
        return Err(ApiError::NotFound(format!("Row {row_id} not found in rubric {rubric_id}")));
    }

    if let Some(criteria) = &payload.criteria {
        rubric.set_criteria(&row_id, criteria).map_err(GradingError::from)?;
    }
    if let Some(weightage) = &payload.weightage {
        rubric.set_weightage(&row_id, weightage).map_err(GradingError::from)?;
    }
    for (column, text) in &payload.values {
        rubric.set_value(&row_id, column, text.as_str()).map_err(GradingError::from)?;
    }
    persist(&state, &rubric).await?;

    Ok(Json(RubricResponse::from(&rubric)))
}

async fn remove_row(
    Path((rubric_id, row_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<RubricResponse>, ApiError> {
    let mut rubric = load(&state, &rubric_id).await?;
    rubric.remove_row(&row_id).map_err(|err| ApiError::NotFound(err.to_string()))?;
    persist(&state, &rubric).await?;

    Ok(Json(RubricResponse::from(&rubric)))
}

async fn add_column(
    Path(rubric_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<ColumnCreate>,
) -> Result<(StatusCode, Json<RubricResponse>), ApiError> {
    payload.validate()?;
    let mut rubric = load(&state, &rubric_id).await?;
    rubric.add_column(&payload.name).map_err(GradingError::from)?;
    persist(&state, &rubric).await?;

    Ok((StatusCode::CREATED, Json(RubricResponse::from(&rubric))))
}

async fn rename_column(
    Path((rubric_id, name)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(payload): Json<ColumnRename>,
) -> Result<Json<RubricResponse>, ApiError> {
    payload.validate()?;
    let mut rubric = load(&state, &rubric_id).await?;
    rubric.rename_column(&name, &payload.new_name).map_err(GradingError::from)?;
    persist(&state, &rubric).await?;

    tracing::info!(rubric_id = %rubric_id, from = %name, to = %payload.new_name, "Rubric column renamed");
    Ok(Json(RubricResponse::from(&rubric)))
}

async fn remove_column(
    Path((rubric_id, name)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<RubricResponse>, ApiError> {
    let mut rubric = load(&state, &rubric_id).await?;
    rubric.remove_column(&name).map_err(|err| ApiError::NotFound(err.to_string()))?;
    persist(&state, &rubric).await?;

    Ok(Json(RubricResponse::from(&rubric)))
}

async fn validate_rubric(
    Path(rubric_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RubricValidationResponse>, ApiError> {
    let rubric = load(&state, &rubric_id).await?;
    let error = rubric.validate().err().map(|err| err.to_string());

    Ok(Json(RubricValidationResponse {
        valid: error.is_none(),
        weightage_total: rubric.weightage_total(),
        error,
    }))
}
