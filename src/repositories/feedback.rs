use sqlx::PgPool;

use crate::db::models::FeedbackRecord;

const COLUMNS: &str = "id, user_id, username, teacher_username, topic_id, class_id, attempt_count, \
                       grade, feedback_text, created_at, updated_at";

pub(crate) struct CreateFeedback<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) username: &'a str,
    pub(crate) teacher_username: &'a str,
    pub(crate) topic_id: &'a str,
    pub(crate) class_id: &'a str,
    pub(crate) attempt_count: i32,
    pub(crate) grade: &'a str,
    pub(crate) feedback_text: &'a str,
    pub(crate) now: time::PrimitiveDateTime,
}

pub(crate) struct UpdateFeedback<'a> {
    pub(crate) teacher_username: &'a str,
    pub(crate) grade: &'a str,
    pub(crate) feedback_text: &'a str,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

/// Returns `None` when a record for the same (username, topic, attempt) exists.
pub(crate) async fn create(
    pool: &PgPool,
    params: CreateFeedback<'_>,
) -> Result<Option<FeedbackRecord>, sqlx::Error> {
    sqlx::query_as::<_, FeedbackRecord>(&format!(
        "INSERT INTO feedback_records (
            id, user_id, username, teacher_username, topic_id, class_id, attempt_count,
            grade, feedback_text, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$10)
         ON CONFLICT (username, topic_id, attempt_count) DO NOTHING
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.username)
    .bind(params.teacher_username)
    .bind(params.topic_id)
    .bind(params.class_id)
    .bind(params.attempt_count)
    .bind(params.grade)
    .bind(params.feedback_text)
    .bind(params.now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn update(
    pool: &PgPool,
    username: &str,
    topic_id: &str,
    attempt_count: i32,
    params: UpdateFeedback<'_>,
) -> Result<Option<FeedbackRecord>, sqlx::Error> {
    sqlx::query_as::<_, FeedbackRecord>(&format!(
        "UPDATE feedback_records SET
            teacher_username = $4, grade = $5, feedback_text = $6, updated_at = $7
         WHERE username = $1 AND topic_id = $2 AND attempt_count = $3
         RETURNING {COLUMNS}",
    ))
    .bind(username)
    .bind(topic_id)
    .bind(attempt_count)
    .bind(params.teacher_username)
    .bind(params.grade)
    .bind(params.feedback_text)
    .bind(params.updated_at)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find(
    pool: &PgPool,
    username: &str,
    topic_id: &str,
    attempt_count: i32,
) -> Result<Option<FeedbackRecord>, sqlx::Error> {
    sqlx::query_as::<_, FeedbackRecord>(&format!(
        "SELECT {COLUMNS} FROM feedback_records
         WHERE username = $1 AND topic_id = $2 AND attempt_count = $3"
    ))
    .bind(username)
    .bind(topic_id)
    .bind(attempt_count)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(
    pool: &PgPool,
    username: &str,
    topic_id: &str,
    attempt_count: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM feedback_records WHERE username = $1 AND topic_id = $2 AND attempt_count = $3",
    )
    .bind(username)
    .bind(topic_id)
    .bind(attempt_count)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_by_class(
    pool: &PgPool,
    class_id: &str,
) -> Result<Vec<FeedbackRecord>, sqlx::Error> {
    sqlx::query_as::<_, FeedbackRecord>(&format!(
        "SELECT {COLUMNS} FROM feedback_records WHERE class_id = $1 ORDER BY created_at, id"
    ))
    .bind(class_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_class_and_user(
    pool: &PgPool,
    class_id: &str,
    user_id: &str,
) -> Result<Vec<FeedbackRecord>, sqlx::Error> {
    sqlx::query_as::<_, FeedbackRecord>(&format!(
        "SELECT {COLUMNS} FROM feedback_records
         WHERE class_id = $1 AND user_id = $2
         ORDER BY created_at, id"
    ))
    .bind(class_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<FeedbackRecord>, sqlx::Error> {
    sqlx::query_as::<_, FeedbackRecord>(&format!(
        "SELECT {COLUMNS} FROM feedback_records WHERE user_id = $1 ORDER BY created_at, id"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}
