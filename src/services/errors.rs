use std::fmt;

use thiserror::Error;

use crate::services::ai_generation::GenerationError;
use crate::services::rubric::SchemaError;

/// Why the grade-extraction loop gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExtractionFailure {
    /// Every reply was received but none contained a `Total Grade: N%` line.
    PatternNotFound,
    /// The last attempt failed at the provider.
    Generation(String),
    /// The last attempt exceeded the per-attempt timeout.
    AttemptTimedOut,
    /// The overall deadline elapsed before a grade was accepted.
    DeadlineExceeded,
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PatternNotFound => f.write_str("no 'Total Grade: N%' line in the AI reply"),
            Self::Generation(message) => write!(f, "AI generation failed: {message}"),
            Self::AttemptTimedOut => f.write_str("AI request timed out"),
            Self::DeadlineExceeded => f.write_str("grading deadline exceeded"),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("grade extraction failed after {attempts} attempt(s): {reason}")]
    GradeExtractionFailed { attempts: u32, reason: ExtractionFailure, last_raw: Option<String> },
    #[error("grading was cancelled")]
    Cancelled,
    #[error("{0} not found")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl GradingError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Short machine-readable label used in logs, metrics and partial results.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Schema(_) => "schema_error",
            Self::Generation(_) => "generation_error",
            Self::GradeExtractionFailed { .. } => "grade_extraction_failed",
            Self::Cancelled => "cancelled",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::Forbidden(_) => "forbidden",
            Self::Store(_) => "store_error",
        }
    }
}

impl From<validator::ValidationErrors> for GradingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
