use sqlx::PgPool;

use crate::db::models::Class;

const COLUMNS: &str = "id, name, owner_username, ai_grading_enabled, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, class_id: &str) -> Result<Option<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(&format!("SELECT {COLUMNS} FROM classes WHERE id = $1"))
        .bind(class_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn set_ai_grading(
    pool: &PgPool,
    class_id: &str,
    enabled: bool,
    updated_at: time::PrimitiveDateTime,
) -> Result<Option<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(&format!(
        "UPDATE classes SET ai_grading_enabled = $2, updated_at = $3
         WHERE id = $1
         RETURNING {COLUMNS}",
    ))
    .bind(class_id)
    .bind(enabled)
    .bind(updated_at)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_topic_class(
    pool: &PgPool,
    topic_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT class_id FROM topics WHERE id = $1")
        .bind(topic_id)
        .fetch_optional(pool)
        .await
}
