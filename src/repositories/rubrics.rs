use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::{RubricRecord, RubricRowRecord};

const RUBRIC_COLUMNS: &str = "id, title, column_order, created_at, updated_at";
const ROW_COLUMNS: &str = "id, rubric_id, position, criteria, weightage, grading_values";

pub(crate) struct UpsertRubric<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) column_order: &'a [String],
    pub(crate) now: time::PrimitiveDateTime,
}

pub(crate) struct InsertRow<'a> {
    pub(crate) id: &'a str,
    pub(crate) position: i32,
    pub(crate) criteria: &'a str,
    pub(crate) weightage: f64,
    pub(crate) grading_values: &'a [String],
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    params: &UpsertRubric<'_>,
) -> Result<RubricRecord, sqlx::Error> {
    sqlx::query_as::<_, RubricRecord>(&format!(
        "INSERT INTO rubrics (id, title, column_order, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $4)
         RETURNING {RUBRIC_COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(Json(params.column_order))
    .bind(params.now)
    .fetch_one(executor)
    .await
}

/// Returns `None` when the rubric does not exist.
pub(crate) async fn update_header(
    executor: impl sqlx::PgExecutor<'_>,
    params: &UpsertRubric<'_>,
) -> Result<Option<RubricRecord>, sqlx::Error> {
    sqlx::query_as::<_, RubricRecord>(&format!(
        "UPDATE rubrics SET title = $2, column_order = $3, updated_at = $4
         WHERE id = $1
         RETURNING {RUBRIC_COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(Json(params.column_order))
    .bind(params.now)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn replace_rows(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    rubric_id: &str,
    rows: &[InsertRow<'_>],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM rubric_rows WHERE rubric_id = $1")
        .bind(rubric_id)
        .execute(&mut **tx)
        .await?;

    for row in rows {
        sqlx::query(
            "INSERT INTO rubric_rows (id, rubric_id, position, criteria, weightage, grading_values)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(row.id)
        .bind(rubric_id)
        .bind(row.position)
        .bind(row.criteria)
        .bind(row.weightage)
        .bind(Json(row.grading_values))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    rubric_id: &str,
) -> Result<Option<RubricRecord>, sqlx::Error> {
    sqlx::query_as::<_, RubricRecord>(&format!("SELECT {RUBRIC_COLUMNS} FROM rubrics WHERE id = $1"))
        .bind(rubric_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(pool: &PgPool) -> Result<Vec<RubricRecord>, sqlx::Error> {
    sqlx::query_as::<_, RubricRecord>(&format!(
        "SELECT {RUBRIC_COLUMNS} FROM rubrics ORDER BY created_at, id"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_rows(
    pool: &PgPool,
    rubric_ids: &[String],
) -> Result<Vec<RubricRowRecord>, sqlx::Error> {
    sqlx::query_as::<_, RubricRowRecord>(&format!(
        "SELECT {ROW_COLUMNS} FROM rubric_rows WHERE rubric_id = ANY($1) ORDER BY rubric_id, position"
    ))
    .bind(rubric_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, rubric_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM rubrics WHERE id = $1").bind(rubric_id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
