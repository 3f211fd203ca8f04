use validator::Validate;

use crate::db::models::FeedbackRecord;
use crate::services::errors::GradingError;
use crate::services::store::{FeedbackKey, FeedbackStore, FeedbackWrite};

fn describe(key: FeedbackKey<'_>) -> String {
    format!(
        "Feedback for {} on topic {} attempt {}",
        key.username, key.topic_id, key.attempt_count
    )
}

pub(crate) async fn create(
    store: &dyn FeedbackStore,
    write: &FeedbackWrite,
) -> Result<FeedbackRecord, GradingError> {
    write.validate()?;
    store
        .create_feedback(write)
        .await?
        .ok_or_else(|| GradingError::Conflict(format!("{} already exists", describe(write.key()))))
}

pub(crate) async fn update(
    store: &dyn FeedbackStore,
    write: &FeedbackWrite,
) -> Result<FeedbackRecord, GradingError> {
    write.validate()?;
    store
        .update_feedback(write)
        .await?
        .ok_or_else(|| GradingError::not_found(describe(write.key())))
}

/// Creates the record, or overwrites the existing one for the same attempt.
pub(crate) async fn upsert(
    store: &dyn FeedbackStore,
    write: &FeedbackWrite,
) -> Result<FeedbackRecord, GradingError> {
    write.validate()?;
    if let Some(created) = store.create_feedback(write).await? {
        return Ok(created);
    }
    store
        .update_feedback(write)
        .await?
        .ok_or_else(|| GradingError::not_found(describe(write.key())))
}

pub(crate) async fn find(
    store: &dyn FeedbackStore,
    key: FeedbackKey<'_>,
) -> Result<FeedbackRecord, GradingError> {
    store.find_feedback(key).await?.ok_or_else(|| GradingError::not_found(describe(key)))
}

pub(crate) async fn delete(
    store: &dyn FeedbackStore,
    key: FeedbackKey<'_>,
) -> Result<(), GradingError> {
    if store.delete_feedback(key).await? {
        Ok(())
    } else {
        Err(GradingError::not_found(describe(key)))
    }
}
