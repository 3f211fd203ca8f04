use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::errors::{ExtractionFailure, GradingError};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    BadGateway(String),
    GatewayTimeout(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        match err {
            GradingError::Schema(err) => ApiError::BadRequest(err.to_string()),
            GradingError::Validation(message) => ApiError::Unprocessable(message),
            GradingError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            GradingError::Conflict(message) => ApiError::Conflict(message),
            GradingError::Forbidden(message) => ApiError::Forbidden(message),
            GradingError::Generation(err) => ApiError::BadGateway(err.to_string()),
            err @ GradingError::GradeExtractionFailed {
                reason: ExtractionFailure::AttemptTimedOut | ExtractionFailure::DeadlineExceeded,
                ..
            } => ApiError::GatewayTimeout(err.to_string()),
            err @ GradingError::GradeExtractionFailed { .. } => ApiError::BadGateway(err.to_string()),
            GradingError::Cancelled => {
                ApiError::ServiceUnavailable("Grading was cancelled; the server is shutting down".to_string())
            }
            GradingError::Store(err) => ApiError::internal(format!("{err:#}"), "Storage operation failed"),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Unprocessable(errors.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::ServiceUnavailable(message) => {
                tracing::warn!(error = %message, "Service unavailable");
                message
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                message
            }
            ApiError::BadGateway(message) | ApiError::GatewayTimeout(message) => {
                tracing::warn!(status = status.as_u16(), error = %message, "AI provider failure");
                message
            }
            ApiError::BadRequest(message)
            | ApiError::Forbidden(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message)
            | ApiError::Unprocessable(message) => message,
        };

        (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
    }
}
