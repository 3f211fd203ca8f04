use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Serialize, Serializer};
use tokio::sync::watch;
use tokio::time::{sleep_until, timeout_at, Instant};

use crate::core::config::GradingSettings;
use crate::services::ai_generation::{AiGenerationClient, Prompt};
use crate::services::errors::{ExtractionFailure, GradingError};

const MAX_BACKOFF_SHIFT: u32 = 6;

/// A grade accepted from an AI reply, kept exactly as `"<digits>%"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtractedGrade(String);

impl ExtractedGrade {
    pub(crate) fn from_digits(digits: &str) -> Self {
        Self(format!("{digits}%"))
    }

    #[cfg(test)]
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ExtractedGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ExtractedGrade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Bounds for the extraction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExtractionPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) attempt_timeout: Duration,
    pub(crate) deadline: Duration,
    pub(crate) retry_backoff: Duration,
}

impl ExtractionPolicy {
    pub(crate) fn from_settings(settings: &GradingSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            attempt_timeout: settings.attempt_timeout(),
            deadline: settings.deadline(),
            retry_backoff: settings.retry_backoff(),
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.retry_backoff.saturating_mul(1_u32 << shift)
    }
}

static TOTAL_GRADE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\btotal\s+grade\s*:\s*(\d+)\s*%").expect("total grade regex is invalid")
});

/// Finds the final `Total Grade: N%` line in free text. The last match wins
/// because the model tends to restate sub-totals before the final figure.
pub(crate) fn parse_total_grade(raw: &str) -> Option<ExtractedGrade> {
    TOTAL_GRADE
        .captures_iter(raw)
        .last()
        .and_then(|captures| captures.get(1))
        .map(|digits| ExtractedGrade::from_digits(digits.as_str()))
}

#[derive(Debug)]
enum ExtractionState {
    Requesting { attempt: u32 },
    Parsing { attempt: u32, raw: String },
    Accepted(ExtractedGrade),
    Rejected { attempt: u32, reason: ExtractionFailure },
}

/// Drives `Requesting -> Parsing -> Accepted | Rejected`, looping on rejection
/// until the policy's attempt bound or deadline is hit.
pub(crate) struct GradeExtractor<'a> {
    client: &'a dyn AiGenerationClient,
    policy: ExtractionPolicy,
}

impl<'a> GradeExtractor<'a> {
    pub(crate) fn new(client: &'a dyn AiGenerationClient, policy: ExtractionPolicy) -> Self {
        Self { client, policy }
    }

    pub(crate) async fn run(
        &self,
        prompt: &Prompt,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<ExtractedGrade, GradingError> {
        let deadline = Instant::now() + self.policy.deadline;
        let mut last_raw: Option<String> = None;
        let mut state = ExtractionState::Requesting { attempt: 1 };

        loop {
            state = match state {
                ExtractionState::Requesting { attempt } => {
                    metrics::counter!("grade_extraction_attempts_total").increment(1);
                    let attempt_deadline =
                        deadline.min(Instant::now() + self.policy.attempt_timeout);

                    tokio::select! {
                        _ = cancelled(&mut cancel) => {
                            record_outcome("cancelled");
                            tracing::info!(attempt, "Grade extraction cancelled");
                            return Err(GradingError::Cancelled);
                        }
                        outcome = timeout_at(attempt_deadline, self.client.generate(prompt)) => {
                            match outcome {
                                Ok(Ok(raw)) => ExtractionState::Parsing { attempt, raw },
                                Ok(Err(err)) => ExtractionState::Rejected {
                                    attempt,
                                    reason: ExtractionFailure::Generation(err.to_string()),
                                },
                                Err(_) if attempt_deadline >= deadline => ExtractionState::Rejected {
                                    attempt,
                                    reason: ExtractionFailure::DeadlineExceeded,
                                },
                                Err(_) => ExtractionState::Rejected {
                                    attempt,
                                    reason: ExtractionFailure::AttemptTimedOut,
                                },
                            }
                        }
                    }
                }
                ExtractionState::Parsing { attempt, raw } => match parse_total_grade(&raw) {
                    Some(grade) => {
                        tracing::debug!(attempt, grade = %grade, "Grade extracted from AI reply");
                        ExtractionState::Accepted(grade)
                    }
                    None => {
                        last_raw = Some(raw);
                        ExtractionState::Rejected { attempt, reason: ExtractionFailure::PatternNotFound }
                    }
                },
                ExtractionState::Accepted(grade) => {
                    record_outcome("accepted");
                    return Ok(grade);
                }
                ExtractionState::Rejected { attempt, reason } => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        reason = %reason,
                        "AI reply rejected during grade extraction"
                    );

                    let reason = if attempt >= self.policy.max_attempts {
                        Some(reason)
                    } else if Instant::now() >= deadline {
                        Some(ExtractionFailure::DeadlineExceeded)
                    } else {
                        None
                    };
                    if let Some(reason) = reason {
                        record_outcome("failed");
                        return Err(GradingError::GradeExtractionFailed {
                            attempts: attempt,
                            reason,
                            last_raw,
                        });
                    }

                    let resume_at = deadline.min(Instant::now() + self.policy.backoff_for(attempt));
                    tokio::select! {
                        _ = cancelled(&mut cancel) => {
                            record_outcome("cancelled");
                            return Err(GradingError::Cancelled);
                        }
                        _ = sleep_until(resume_at) => {}
                    }
                    ExtractionState::Requesting { attempt: attempt + 1 }
                }
            };
        }
    }
}

fn record_outcome(status: &'static str) {
    metrics::counter!("grade_extraction_total", "status" => status).increment(1);
}

/// Resolves once the flag flips to `true`. Never resolves without a receiver
/// or after the sender is dropped.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => {
            let sender_dropped = rx.wait_for(|flag| *flag).await.is_err();
            if sender_dropped {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}
