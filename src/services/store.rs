use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::core::time::primitive_now_utc;
use crate::db::models::{AssessmentAttempt, Class, FeedbackRecord, RubricRecord, RubricRowRecord};
use crate::db::types::TranscriptTurn;
use crate::repositories;
use crate::services::rubric::{Rubric, RubricRow};

/// Identifies one feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FeedbackKey<'a> {
    pub(crate) username: &'a str,
    pub(crate) topic_id: &'a str,
    pub(crate) attempt_count: i32,
}

#[derive(Debug, Clone)]
pub(crate) struct NewAttempt {
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) topic_id: String,
    pub(crate) question: String,
    pub(crate) responses: Vec<TranscriptTurn>,
    pub(crate) time_elapsed_seconds: f64,
}

/// A feedback record to create or overwrite. Every field is mandatory.
#[derive(Debug, Clone, Validate)]
pub(crate) struct FeedbackWrite {
    #[validate(custom(function = "non_blank", message = "user_id is required"))]
    pub(crate) user_id: String,
    #[validate(custom(function = "non_blank", message = "username is required"))]
    pub(crate) username: String,
    #[validate(custom(function = "non_blank", message = "teacher_username is required"))]
    pub(crate) teacher_username: String,
    #[validate(custom(function = "non_blank", message = "topic_id is required"))]
    pub(crate) topic_id: String,
    #[validate(custom(function = "non_blank", message = "class_id is required"))]
    pub(crate) class_id: String,
    #[validate(range(min = 1, message = "attempt_count must be positive"))]
    pub(crate) attempt_count: i32,
    #[validate(custom(function = "non_blank", message = "grade is required"))]
    pub(crate) grade: String,
    #[validate(custom(function = "non_blank", message = "feedback_text is required"))]
    pub(crate) feedback_text: String,
}

fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("required"))
    } else {
        Ok(())
    }
}

impl FeedbackWrite {
    pub(crate) fn key(&self) -> FeedbackKey<'_> {
        FeedbackKey {
            username: &self.username,
            topic_id: &self.topic_id,
            attempt_count: self.attempt_count,
        }
    }
}

#[async_trait]
pub(crate) trait RubricStore: Send + Sync {
    async fn create_rubric(&self, rubric: &Rubric) -> anyhow::Result<()>;
    async fn fetch_rubric(&self, rubric_id: &str) -> anyhow::Result<Option<Rubric>>;
    async fn list_rubrics(&self) -> anyhow::Result<Vec<Rubric>>;
    /// Replaces title, column order and rows. `false` when the rubric is gone.
    async fn save_rubric(&self, rubric: &Rubric) -> anyhow::Result<bool>;
    async fn delete_rubric(&self, rubric_id: &str) -> anyhow::Result<bool>;
}

#[async_trait]
pub(crate) trait AttemptStore: Send + Sync {
    async fn create_attempt(&self, attempt: NewAttempt) -> anyhow::Result<AssessmentAttempt>;
    async fn find_attempt(
        &self,
        user_id: &str,
        topic_id: &str,
        attempt_count: i32,
    ) -> anyhow::Result<Option<AssessmentAttempt>>;
    async fn list_attempts(
        &self,
        user_id: &str,
        topic_id: &str,
    ) -> anyhow::Result<Vec<AssessmentAttempt>>;
    async fn list_attempts_for_class(
        &self,
        class_id: &str,
        user_id: Option<&str>,
    ) -> anyhow::Result<Vec<AssessmentAttempt>>;
}

#[async_trait]
pub(crate) trait FeedbackStore: Send + Sync {
    /// `None` when a record for the same key already exists.
    async fn create_feedback(&self, write: &FeedbackWrite) -> anyhow::Result<Option<FeedbackRecord>>;
    async fn update_feedback(&self, write: &FeedbackWrite) -> anyhow::Result<Option<FeedbackRecord>>;
    async fn find_feedback(&self, key: FeedbackKey<'_>) -> anyhow::Result<Option<FeedbackRecord>>;
    async fn delete_feedback(&self, key: FeedbackKey<'_>) -> anyhow::Result<bool>;
    async fn list_feedback_by_class(&self, class_id: &str) -> anyhow::Result<Vec<FeedbackRecord>>;
    async fn list_feedback_by_class_and_user(
        &self,
        class_id: &str,
        user_id: &str,
    ) -> anyhow::Result<Vec<FeedbackRecord>>;
    async fn list_feedback_by_user(&self, user_id: &str) -> anyhow::Result<Vec<FeedbackRecord>>;
}

#[async_trait]
pub(crate) trait ClassStore: Send + Sync {
    async fn find_class(&self, class_id: &str) -> anyhow::Result<Option<Class>>;
    async fn set_ai_grading(&self, class_id: &str, enabled: bool) -> anyhow::Result<Option<Class>>;
    /// Id of the class a topic belongs to.
    async fn find_topic_class(&self, topic_id: &str) -> anyhow::Result<Option<String>>;
}

#[async_trait]
pub(crate) trait UserStore: Send + Sync {
    /// All-or-nothing removal of the user and the data they own.
    async fn delete_user_cascade(&self, user_id: &str) -> anyhow::Result<bool>;
}

#[async_trait]
pub(crate) trait HealthCheck: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Everything the HTTP layer needs from persistence.
pub(crate) trait GradingStore:
    RubricStore + AttemptStore + FeedbackStore + ClassStore + UserStore + HealthCheck
{
    fn as_attempts(&self) -> &dyn AttemptStore;
    fn as_feedback(&self) -> &dyn FeedbackStore;
}

impl<T> GradingStore for T
where
    T: RubricStore + AttemptStore + FeedbackStore + ClassStore + UserStore + HealthCheck,
{
    fn as_attempts(&self) -> &dyn AttemptStore {
        self
    }

    fn as_feedback(&self) -> &dyn FeedbackStore {
        self
    }
}

/// Rebuilds domain rubrics from a header row and its (position-ordered) rows.
pub(crate) fn assemble_rubric(
    record: RubricRecord,
    rows: Vec<RubricRowRecord>,
) -> anyhow::Result<Rubric> {
    let rubric_id = record.id.clone();
    let rows = rows
        .into_iter()
        .map(|row| RubricRow::new(row.id, Some(&row.criteria), row.weightage, row.grading_values.0))
        .collect();
    Rubric::from_parts(record.id, record.title, record.column_order.0, rows)
        .with_context(|| format!("Stored rubric {rubric_id} is malformed"))
}

#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_rubric(&self, rubric: &Rubric, create: bool) -> anyhow::Result<bool> {
        let header = repositories::rubrics::UpsertRubric {
            id: rubric.id(),
            title: rubric.title(),
            column_order: rubric.columns(),
            now: primitive_now_utc(),
        };
        let rows: Vec<repositories::rubrics::InsertRow<'_>> = rubric
            .rows()
            .iter()
            .enumerate()
            .map(|(position, row)| repositories::rubrics::InsertRow {
                id: row.id(),
                position: position as i32,
                criteria: row.criteria(),
                weightage: row.weightage(),
                grading_values: row.values(),
            })
            .collect();

        let mut tx = self.pool.begin().await.context("Failed to begin rubric transaction")?;
        if create {
            repositories::rubrics::insert(&mut *tx, &header)
                .await
                .context("Failed to insert rubric")?;
        } else if repositories::rubrics::update_header(&mut *tx, &header)
            .await
            .context("Failed to update rubric")?
            .is_none()
        {
            tx.rollback().await.context("Failed to roll back rubric update")?;
            return Ok(false);
        }
        repositories::rubrics::replace_rows(&mut tx, rubric.id(), &rows)
            .await
            .context("Failed to write rubric rows")?;
        tx.commit().await.context("Failed to commit rubric")?;
        Ok(true)
    }
}

#[async_trait]
impl RubricStore for PgStore {
    async fn create_rubric(&self, rubric: &Rubric) -> anyhow::Result<()> {
        self.write_rubric(rubric, true).await?;
        Ok(())
    }

    async fn fetch_rubric(&self, rubric_id: &str) -> anyhow::Result<Option<Rubric>> {
        let Some(record) = repositories::rubrics::find_by_id(&self.pool, rubric_id)
            .await
            .context("Failed to fetch rubric")?
        else {
            return Ok(None);
        };
        let rows = repositories::rubrics::list_rows(&self.pool, &[record.id.clone()])
            .await
            .context("Failed to fetch rubric rows")?;
        assemble_rubric(record, rows).map(Some)
    }

    async fn list_rubrics(&self) -> anyhow::Result<Vec<Rubric>> {
        let records = repositories::rubrics::list(&self.pool).await.context("Failed to list rubrics")?;
        let ids: Vec<String> = records.iter().map(|record| record.id.clone()).collect();
        let rows = repositories::rubrics::list_rows(&self.pool, &ids)
            .await
            .context("Failed to list rubric rows")?;

        let mut rows_by_rubric: HashMap<String, Vec<RubricRowRecord>> = HashMap::new();
        for row in rows {
            rows_by_rubric.entry(row.rubric_id.clone()).or_default().push(row);
        }

        records
            .into_iter()
            .map(|record| {
                let rows = rows_by_rubric.remove(&record.id).unwrap_or_default();
                assemble_rubric(record, rows)
            })
            .collect()
    }

    async fn save_rubric(&self, rubric: &Rubric) -> anyhow::Result<bool> {
        self.write_rubric(rubric, false).await
    }

    async fn delete_rubric(&self, rubric_id: &str) -> anyhow::Result<bool> {
        repositories::rubrics::delete(&self.pool, rubric_id).await.context("Failed to delete rubric")
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn create_attempt(&self, attempt: NewAttempt) -> anyhow::Result<AssessmentAttempt> {
        let id = Uuid::new_v4().to_string();
        repositories::attempts::create_next(
            &self.pool,
            repositories::attempts::CreateAttempt {
                id: &id,
                user_id: &attempt.user_id,
                username: &attempt.username,
                topic_id: &attempt.topic_id,
                question: &attempt.question,
                responses: &attempt.responses,
                time_elapsed_seconds: attempt.time_elapsed_seconds,
                created_at: primitive_now_utc(),
            },
        )
        .await
        .context("Failed to record attempt")
    }

    async fn find_attempt(
        &self,
        user_id: &str,
        topic_id: &str,
        attempt_count: i32,
    ) -> anyhow::Result<Option<AssessmentAttempt>> {
        repositories::attempts::find(&self.pool, user_id, topic_id, attempt_count)
            .await
            .context("Failed to fetch attempt")
    }

    async fn list_attempts(
        &self,
        user_id: &str,
        topic_id: &str,
    ) -> anyhow::Result<Vec<AssessmentAttempt>> {
        repositories::attempts::list_for_user_topic(&self.pool, user_id, topic_id)
            .await
            .context("Failed to list attempts")
    }

    async fn list_attempts_for_class(
        &self,
        class_id: &str,
        user_id: Option<&str>,
    ) -> anyhow::Result<Vec<AssessmentAttempt>> {
        repositories::attempts::list_for_class(&self.pool, class_id, user_id)
            .await
            .context("Failed to list class attempts")
    }
}

#[async_trait]
impl FeedbackStore for PgStore {
    async fn create_feedback(&self, write: &FeedbackWrite) -> anyhow::Result<Option<FeedbackRecord>> {
        let id = Uuid::new_v4().to_string();
        repositories::feedback::create(
            &self.pool,
            repositories::feedback::CreateFeedback {
                id: &id,
                user_id: &write.user_id,
                username: &write.username,
                teacher_username: &write.teacher_username,
                topic_id: &write.topic_id,
                class_id: &write.class_id,
                attempt_count: write.attempt_count,
                grade: &write.grade,
                feedback_text: &write.feedback_text,
                now: primitive_now_utc(),
            },
        )
        .await
        .context("Failed to create feedback")
    }

    async fn update_feedback(&self, write: &FeedbackWrite) -> anyhow::Result<Option<FeedbackRecord>> {
        repositories::feedback::update(
            &self.pool,
            &write.username,
            &write.topic_id,
            write.attempt_count,
            repositories::feedback::UpdateFeedback {
                teacher_username: &write.teacher_username,
                grade: &write.grade,
                feedback_text: &write.feedback_text,
                updated_at: primitive_now_utc(),
            },
        )
        .await
        .context("Failed to update feedback")
    }

    async fn find_feedback(&self, key: FeedbackKey<'_>) -> anyhow::Result<Option<FeedbackRecord>> {
        repositories::feedback::find(&self.pool, key.username, key.topic_id, key.attempt_count)
            .await
            .context("Failed to fetch feedback")
    }

    async fn delete_feedback(&self, key: FeedbackKey<'_>) -> anyhow::Result<bool> {
        repositories::feedback::delete(&self.pool, key.username, key.topic_id, key.attempt_count)
            .await
            .context("Failed to delete feedback")
    }

    async fn list_feedback_by_class(&self, class_id: &str) -> anyhow::Result<Vec<FeedbackRecord>> {
        repositories::feedback::list_by_class(&self.pool, class_id)
            .await
            .context("Failed to list class feedback")
    }

    async fn list_feedback_by_class_and_user(
        &self,
        class_id: &str,
        user_id: &str,
    ) -> anyhow::Result<Vec<FeedbackRecord>> {
        repositories::feedback::list_by_class_and_user(&self.pool, class_id, user_id)
            .await
            .context("Failed to list student feedback")
    }

    async fn list_feedback_by_user(&self, user_id: &str) -> anyhow::Result<Vec<FeedbackRecord>> {
        repositories::feedback::list_by_user(&self.pool, user_id)
            .await
            .context("Failed to list user feedback")
    }
}

#[async_trait]
impl ClassStore for PgStore {
    async fn find_class(&self, class_id: &str) -> anyhow::Result<Option<Class>> {
        repositories::classes::find_by_id(&self.pool, class_id).await.context("Failed to fetch class")
    }

    async fn set_ai_grading(&self, class_id: &str, enabled: bool) -> anyhow::Result<Option<Class>> {
        repositories::classes::set_ai_grading(&self.pool, class_id, enabled, primitive_now_utc())
            .await
            .context("Failed to update class AI grading")
    }

    async fn find_topic_class(&self, topic_id: &str) -> anyhow::Result<Option<String>> {
        repositories::classes::find_topic_class(&self.pool, topic_id)
            .await
            .context("Failed to fetch topic class")
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn delete_user_cascade(&self, user_id: &str) -> anyhow::Result<bool> {
        repositories::users::delete_cascade(&self.pool, user_id)
            .await
            .context("Failed to delete user")
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn ping(&self) -> anyhow::Result<()> {
        repositories::health::ping(&self.pool).await.context("Database ping failed")
    }
}

#[cfg(test)]
mod tests {
    use sqlx::types::Json;

    use super::*;
    use crate::services::rubric::SchemaError;

    fn record(columns: &[&str]) -> RubricRecord {
        let now = primitive_now_utc();
        RubricRecord {
            id: "r1".to_string(),
            title: "Oral exam".to_string(),
            column_order: Json(columns.iter().map(|column| column.to_string()).collect()),
            created_at: now,
            updated_at: now,
        }
    }

    fn row(id: &str, position: i32, weightage: f64, values: &[&str]) -> RubricRowRecord {
        RubricRowRecord {
            id: id.to_string(),
            rubric_id: "r1".to_string(),
            position,
            criteria: format!("Criterion {id}"),
            weightage,
            grading_values: Json(values.iter().map(|value| value.to_string()).collect()),
        }
    }

    #[test]
    fn assembles_rows_in_given_order() {
        let rubric = assemble_rubric(
            record(&["Excellent", "Poor"]),
            vec![row("a", 0, 0.7, &["x1", "y1"]), row("b", 1, 0.3, &["x2", "y2"])],
        )
        .expect("rubric");

        assert_eq!(rubric.columns(), ["Excellent".to_string(), "Poor".to_string()]);
        assert_eq!(rubric.value("b", "Poor"), Some("y2"));
        assert!(rubric.validate().is_ok());
    }

    #[test]
    fn misaligned_row_is_reported() {
        let err = assemble_rubric(record(&["Excellent", "Poor"]), vec![row("a", 0, 1.0, &["x1"])])
            .expect_err("short row");
        assert!(matches!(
            err.downcast_ref::<SchemaError>(),
            Some(SchemaError::MissingColumnValue { .. })
        ));
    }
}
