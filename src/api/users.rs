use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::delete,
    Router,
};

use crate::api::errors::ApiError;
use crate::api::feedback;
use crate::core::state::AppState;
use crate::services::errors::GradingError;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:user_id", delete(delete_user)).merge(feedback::user_router())
}

async fn delete_user(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.store().delete_user_cascade(&user_id).await.map_err(GradingError::from)?;
    if !deleted {
        return Err(ApiError::NotFound(format!("User {user_id} not found")));
    }

    tracing::info!(user_id = %user_id, "User and owned data deleted");
    Ok(StatusCode::NO_CONTENT)
}
