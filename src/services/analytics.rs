use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::models::{AssessmentAttempt, FeedbackRecord};
use crate::services::errors::GradingError;
use crate::services::store::{AttemptStore, FeedbackStore};

/// Letter band for a percentage grade. Ordered A (best) to F.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub(crate) enum GradeBand {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl GradeBand {
    pub(crate) const ALL: [GradeBand; 6] =
        [GradeBand::A, GradeBand::B, GradeBand::C, GradeBand::D, GradeBand::E, GradeBand::F];
}

/// Parses a stored grade such as `"82%"` or `" 57.5 % "`. Anything unusable is 0.
pub(crate) fn clean_grade(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    match number.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

pub(crate) fn classify(grade: f64) -> GradeBand {
    if grade >= 70.0 {
        GradeBand::A
    } else if grade >= 60.0 {
        GradeBand::B
    } else if grade >= 55.0 {
        GradeBand::C
    } else if grade >= 50.0 {
        GradeBand::D
    } else if grade >= 40.0 {
        GradeBand::E
    } else {
        GradeBand::F
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct GradeEntry {
    pub(crate) username: String,
    pub(crate) topic_id: String,
    pub(crate) attempt_count: i32,
    pub(crate) grade: f64,
    pub(crate) band: GradeBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ClassAnalytics {
    pub(crate) grades: Vec<GradeEntry>,
    pub(crate) average: f64,
    pub(crate) distribution: BTreeMap<GradeBand, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct IndividualAnalytics {
    pub(crate) grades: Vec<GradeEntry>,
    pub(crate) average: f64,
    pub(crate) distribution: BTreeMap<GradeBand, usize>,
    /// Number of feedback records found, not a sum of attempt counters.
    pub(crate) total_attempts: usize,
}

/// Pure aggregation over already-fetched records.
pub(crate) fn summarize(records: &[FeedbackRecord]) -> ClassAnalytics {
    let mut distribution: BTreeMap<GradeBand, usize> =
        GradeBand::ALL.iter().map(|band| (*band, 0)).collect();

    let grades: Vec<GradeEntry> = records
        .iter()
        .map(|record| {
            let grade = clean_grade(&record.grade);
            let band = classify(grade);
            *distribution.entry(band).or_insert(0) += 1;
            GradeEntry {
                username: record.username.clone(),
                topic_id: record.topic_id.clone(),
                attempt_count: record.attempt_count,
                grade,
                band,
            }
        })
        .collect();

    let average = if grades.is_empty() {
        0.0
    } else {
        grades.iter().map(|entry| entry.grade).sum::<f64>() / grades.len() as f64
    };

    ClassAnalytics { grades, average, distribution }
}

pub(crate) fn mean_response_time(attempts: &[AssessmentAttempt]) -> Option<f64> {
    if attempts.is_empty() {
        return None;
    }
    let total: f64 = attempts.iter().map(|attempt| attempt.time_elapsed_seconds).sum();
    Some(total / attempts.len() as f64)
}

pub(crate) async fn aggregate_class(
    store: &dyn FeedbackStore,
    class_id: &str,
) -> Result<ClassAnalytics, GradingError> {
    let records = store.list_feedback_by_class(class_id).await?;
    let analytics = summarize(&records);
    tracing::debug!(class_id, records = records.len(), average = analytics.average, "Class analytics computed");
    Ok(analytics)
}

pub(crate) async fn aggregate_individual(
    store: &dyn FeedbackStore,
    class_id: &str,
    user_id: &str,
) -> Result<IndividualAnalytics, GradingError> {
    let records = store.list_feedback_by_class_and_user(class_id, user_id).await?;
    let ClassAnalytics { grades, average, distribution } = summarize(&records);

    Ok(IndividualAnalytics { total_attempts: records.len(), grades, average, distribution })
}

pub(crate) async fn average_response_time(
    store: &dyn AttemptStore,
    class_id: &str,
    user_id: Option<&str>,
) -> Result<Option<f64>, GradingError> {
    let attempts = store.list_attempts_for_class(class_id, user_id).await?;
    Ok(mean_response_time(&attempts))
}
