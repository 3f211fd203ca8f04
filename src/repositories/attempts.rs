use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::AssessmentAttempt;
use crate::db::types::TranscriptTurn;

const COLUMNS: &str = "id, user_id, username, topic_id, question, responses, attempt_count, \
                       time_elapsed_seconds, created_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) username: &'a str,
    pub(crate) topic_id: &'a str,
    pub(crate) question: &'a str,
    pub(crate) responses: &'a [TranscriptTurn],
    pub(crate) time_elapsed_seconds: f64,
    pub(crate) created_at: time::PrimitiveDateTime,
}

/// Inserts with `attempt_count = max(existing) + 1` for the (user, topic) pair.
/// The pair is locked for the duration of the transaction.
pub(crate) async fn create_next(
    pool: &PgPool,
    params: CreateAttempt<'_>,
) -> Result<AssessmentAttempt, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))")
        .bind(params.user_id)
        .bind(params.topic_id)
        .execute(&mut *tx)
        .await?;

    let next: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(attempt_count), 0) + 1 FROM assessment_attempts
         WHERE user_id = $1 AND topic_id = $2",
    )
    .bind(params.user_id)
    .bind(params.topic_id)
    .fetch_one(&mut *tx)
    .await?;

    let attempt = sqlx::query_as::<_, AssessmentAttempt>(&format!(
        "INSERT INTO assessment_attempts (
            id, user_id, username, topic_id, question, responses, attempt_count,
            time_elapsed_seconds, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.username)
    .bind(params.topic_id)
    .bind(params.question)
    .bind(Json(params.responses))
    .bind(next)
    .bind(params.time_elapsed_seconds)
    .bind(params.created_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(attempt)
}

pub(crate) async fn find(
    pool: &PgPool,
    user_id: &str,
    topic_id: &str,
    attempt_count: i32,
) -> Result<Option<AssessmentAttempt>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentAttempt>(&format!(
        "SELECT {COLUMNS} FROM assessment_attempts
         WHERE user_id = $1 AND topic_id = $2 AND attempt_count = $3"
    ))
    .bind(user_id)
    .bind(topic_id)
    .bind(attempt_count)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_for_user_topic(
    pool: &PgPool,
    user_id: &str,
    topic_id: &str,
) -> Result<Vec<AssessmentAttempt>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentAttempt>(&format!(
        "SELECT {COLUMNS} FROM assessment_attempts
         WHERE user_id = $1 AND topic_id = $2
         ORDER BY attempt_count"
    ))
    .bind(user_id)
    .bind(topic_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_for_class(
    pool: &PgPool,
    class_id: &str,
    user_id: Option<&str>,
) -> Result<Vec<AssessmentAttempt>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentAttempt>(
        "SELECT a.id, a.user_id, a.username, a.topic_id, a.question, a.responses, a.attempt_count,
                a.time_elapsed_seconds, a.created_at
         FROM assessment_attempts a
         JOIN topics t ON t.id = a.topic_id
         WHERE t.class_id = $1 AND ($2::varchar IS NULL OR a.user_id = $2)
         ORDER BY a.created_at",
    )
    .bind(class_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
}
