use tokio::sync::watch;

use crate::db::models::{FeedbackRecord, AI_TEACHER_USERNAME};
use crate::services::errors::GradingError;
use crate::services::feedback;
use crate::services::grade_extraction::ExtractedGrade;
use crate::services::grading::{GradingOrchestrator, GradingRequest};
use crate::services::store::{FeedbackWrite, GradingStore};

#[derive(Debug, Clone, Copy)]
pub(crate) struct AttemptRef<'a> {
    pub(crate) class_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) topic_id: &'a str,
    pub(crate) attempt_count: i32,
    pub(crate) rubric_id: &'a str,
}

/// Outcome of AI grading one attempt. `record` is only set when both halves
/// succeeded and the feedback row was written.
#[derive(Debug)]
pub(crate) struct AttemptGrading {
    pub(crate) feedback: Result<String, GradingError>,
    pub(crate) grade: Result<ExtractedGrade, GradingError>,
    pub(crate) record: Option<FeedbackRecord>,
}

pub(crate) async fn grade_attempt(
    store: &dyn GradingStore,
    orchestrator: &GradingOrchestrator,
    target: AttemptRef<'_>,
    cancel: Option<watch::Receiver<bool>>,
) -> Result<AttemptGrading, GradingError> {
    let class = store
        .find_class(target.class_id)
        .await?
        .ok_or_else(|| GradingError::not_found(format!("Class {}", target.class_id)))?;
    if !class.ai_grading_enabled {
        return Err(GradingError::Validation(format!(
            "AI grading is disabled for class {}",
            class.id
        )));
    }

    let topic_class = store
        .find_topic_class(target.topic_id)
        .await?
        .ok_or_else(|| GradingError::not_found(format!("Topic {}", target.topic_id)))?;
    if topic_class != class.id {
        return Err(GradingError::Validation(format!(
            "Topic {} does not belong to class {}",
            target.topic_id, class.id
        )));
    }

    let attempt = store
        .find_attempt(target.user_id, target.topic_id, target.attempt_count)
        .await?
        .ok_or_else(|| {
            GradingError::not_found(format!(
                "Attempt {} of user {} on topic {}",
                target.attempt_count, target.user_id, target.topic_id
            ))
        })?;
    let rubric = store
        .fetch_rubric(target.rubric_id)
        .await?
        .ok_or_else(|| GradingError::not_found(format!("Rubric {}", target.rubric_id)))?;

    tracing::info!(
        class_id = %class.id,
        user_id = %attempt.user_id,
        topic_id = %attempt.topic_id,
        attempt_count = attempt.attempt_count,
        rubric_id = %rubric.id(),
        "Starting AI grading for attempt"
    );

    let request = GradingRequest {
        question: &attempt.question,
        transcript: &attempt.responses.0,
        rubric: &rubric,
    };
    let outcome = orchestrator.generate_feedback_and_grade(request, cancel).await?;

    let record = match (&outcome.feedback, &outcome.grade) {
        (Ok(feedback_text), Ok(grade)) => {
            let write = FeedbackWrite {
                user_id: attempt.user_id.clone(),
                username: attempt.username.clone(),
                teacher_username: AI_TEACHER_USERNAME.to_string(),
                topic_id: attempt.topic_id.clone(),
                class_id: class.id.clone(),
                attempt_count: attempt.attempt_count,
                grade: grade.to_string(),
                feedback_text: feedback_text.clone(),
            };
            Some(feedback::upsert(store.as_feedback(), &write).await?)
        }
        _ => {
            tracing::warn!(
                class_id = %class.id,
                topic_id = %attempt.topic_id,
                attempt_count = attempt.attempt_count,
                feedback_ok = outcome.feedback.is_ok(),
                grade_ok = outcome.grade.is_ok(),
                "Partial AI grading result; feedback record not written"
            );
            None
        }
    };

    Ok(AttemptGrading { feedback: outcome.feedback, grade: outcome.grade, record })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::services::ai_generation::{GenerationError, PromptKind};
    use crate::services::grade_extraction::ExtractionPolicy;
    use crate::services::store::{FeedbackKey, FeedbackStore};
    use crate::test_support::{self, MemoryStore, ScriptedAiClient};

    fn orchestrator(client: ScriptedAiClient) -> GradingOrchestrator {
        GradingOrchestrator::new(
            Arc::new(client),
            ExtractionPolicy {
                max_attempts: 2,
                attempt_timeout: Duration::from_secs(1),
                deadline: Duration::from_secs(5),
                retry_backoff: Duration::from_millis(1),
            },
        )
    }

    fn seeded_store(ai_grading_enabled: bool) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_class(test_support::class("c1", "teacher", ai_grading_enabled));
        store.insert_topic("t1", "c1");
        store.insert_rubric(test_support::sample_rubric());
        store.insert_attempt(test_support::attempt("u1", "alice", "t1", 1, 42.0));
        store
    }

    fn target(rubric_id: &str) -> AttemptRef<'_> {
        AttemptRef { class_id: "c1", user_id: "u1", topic_id: "t1", attempt_count: 1, rubric_id }
    }

    #[tokio::test]
    async fn writes_ai_feedback_when_both_halves_succeed() {
        let store = seeded_store(true);
        let orchestrator = orchestrator(
            ScriptedAiClient::new()
                .reply(PromptKind::Feedback, Ok("Well structured answer."))
                .reply(PromptKind::Grade, Ok("Total Grade: 81%")),
        );

        let outcome = grade_attempt(&store, &orchestrator, target(test_support::SAMPLE_RUBRIC_ID), None)
            .await
            .expect("graded");

        let record = outcome.record.expect("record written");
        assert_eq!(record.teacher_username, AI_TEACHER_USERNAME);
        assert_eq!(record.grade, "81%");
        assert_eq!(record.class_id, "c1");

        let stored = store
            .find_feedback(FeedbackKey { username: "alice", topic_id: "t1", attempt_count: 1 })
            .await
            .expect("find");
        assert_eq!(stored.expect("stored").feedback_text, "Well structured answer.");
    }

    #[tokio::test]
    async fn partial_result_is_reported_without_writing() {
        let store = seeded_store(true);
        let orchestrator = orchestrator(
            ScriptedAiClient::new()
                .reply(PromptKind::Feedback, Err(GenerationError::Transport("down".to_string())))
                .reply(PromptKind::Grade, Ok("Total Grade: 81%")),
        );

        let outcome = grade_attempt(&store, &orchestrator, target(test_support::SAMPLE_RUBRIC_ID), None)
            .await
            .expect("graded");

        assert!(outcome.feedback.is_err());
        assert_eq!(outcome.grade.expect("grade").as_str(), "81%");
        assert!(outcome.record.is_none());
        assert!(store.list_feedback_by_class("c1").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn disabled_class_is_rejected_before_any_call() {
        let store = seeded_store(false);
        let client = Arc::new(ScriptedAiClient::new().fallback(PromptKind::Grade, "Total Grade: 1%"));
        let orchestrator = GradingOrchestrator::new(
            client.clone(),
            ExtractionPolicy {
                max_attempts: 1,
                attempt_timeout: Duration::from_secs(1),
                deadline: Duration::from_secs(1),
                retry_backoff: Duration::from_millis(1),
            },
        );

        let err = grade_attempt(&store, &orchestrator, target(test_support::SAMPLE_RUBRIC_ID), None)
            .await
            .expect_err("disabled");

        assert!(matches!(err, GradingError::Validation(_)));
        assert_eq!(client.calls(PromptKind::Grade), 0);
    }

    #[tokio::test]
    async fn topic_from_another_class_is_rejected_before_any_call() {
        let store = seeded_store(true);
        store.insert_class(test_support::class("c2", "other_teacher", false));
        store.insert_topic("t2", "c2");
        store.insert_attempt(test_support::attempt("u1", "alice", "t2", 1, 12.0));
        let client = Arc::new(ScriptedAiClient::new().fallback(PromptKind::Grade, "Total Grade: 12%"));
        let orchestrator = GradingOrchestrator::new(
            client.clone(),
            ExtractionPolicy {
                max_attempts: 1,
                attempt_timeout: Duration::from_secs(1),
                deadline: Duration::from_secs(1),
                retry_backoff: Duration::from_millis(1),
            },
        );
        let target = AttemptRef {
            class_id: "c1",
            user_id: "u1",
            topic_id: "t2",
            attempt_count: 1,
            rubric_id: test_support::SAMPLE_RUBRIC_ID,
        };

        let err = grade_attempt(&store, &orchestrator, target, None).await.expect_err("wrong class");

        assert!(matches!(err, GradingError::Validation(_)));
        assert_eq!(client.calls(PromptKind::Grade), 0);
        assert!(store.list_feedback_by_class("c1").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn unknown_topic_is_not_found() {
        let store = seeded_store(true);
        let orchestrator = orchestrator(ScriptedAiClient::new());
        let target = AttemptRef { topic_id: "t-missing", ..target(test_support::SAMPLE_RUBRIC_ID) };

        let err = grade_attempt(&store, &orchestrator, target, None).await.expect_err("missing");
        assert!(matches!(err, GradingError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_rubric_is_not_found() {
        let store = seeded_store(true);
        let orchestrator = orchestrator(ScriptedAiClient::new());

        let err = grade_attempt(&store, &orchestrator, target("missing"), None).await.expect_err("missing");
        assert!(matches!(err, GradingError::NotFound(_)));
    }
}
