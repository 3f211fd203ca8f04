use sqlx::PgPool;

/// Removes a user and everything hanging off them in one transaction:
/// their feedback and attempts, the topics they created, and the classes they own
/// together with those classes' topics, attempts and feedback.
pub(crate) async fn delete_cascade(pool: &PgPool, user_id: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let username: Option<String> = sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(username) = username else {
        tx.rollback().await?;
        return Ok(false);
    };

    sqlx::query(
        "DELETE FROM feedback_records
         WHERE user_id = $1
            OR class_id IN (SELECT id FROM classes WHERE owner_username = $2)
            OR topic_id IN (SELECT id FROM topics WHERE created_by = $1)",
    )
    .bind(user_id)
    .bind(&username)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "DELETE FROM assessment_attempts
         WHERE user_id = $1
            OR topic_id IN (
                SELECT t.id FROM topics t
                JOIN classes c ON c.id = t.class_id
                WHERE c.owner_username = $2
            )
            OR topic_id IN (SELECT id FROM topics WHERE created_by = $1)",
    )
    .bind(user_id)
    .bind(&username)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM topics WHERE created_by = $1").bind(user_id).execute(&mut *tx).await?;

    // Owned classes cascade to their remaining topics.
    sqlx::query("DELETE FROM classes WHERE owner_username = $1")
        .bind(&username)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM users WHERE id = $1").bind(user_id).execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(true)
}
