use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
};
use sqlx::types::Json;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::core::{config::Settings, state::AppState, time::primitive_now_utc};
use crate::db::models::{AssessmentAttempt, Class, FeedbackRecord};
use crate::db::types::{Sender, TranscriptTurn};
use crate::services::ai_generation::{AiGenerationClient, GenerationError, Prompt, PromptKind};
use crate::services::grade_extraction::ExtractionPolicy;
use crate::services::grading::GradingOrchestrator;
use crate::services::rubric::{Rubric, RubricRow};
use crate::services::store::{
    AttemptStore, ClassStore, FeedbackKey, FeedbackStore, FeedbackWrite, HealthCheck, NewAttempt,
    RubricStore, UserStore,
};

pub(crate) const SAMPLE_RUBRIC_ID: &str = "rubric-sample";

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

/// AI client that replays queued replies per prompt kind, then a fallback.
#[derive(Default)]
pub(crate) struct ScriptedAiClient {
    replies: StdMutex<HashMap<PromptKind, VecDeque<Result<String, GenerationError>>>>,
    fallbacks: HashMap<PromptKind, String>,
    calls: StdMutex<HashMap<PromptKind, usize>>,
    delay: Option<Duration>,
}

impl ScriptedAiClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, kind: PromptKind, reply: Result<&str, GenerationError>) -> Self {
        self.replies
            .lock()
            .expect("replies lock")
            .entry(kind)
            .or_default()
            .push_back(reply.map(str::to_string));
        self
    }

    pub(crate) fn fallback(mut self, kind: PromptKind, text: &str) -> Self {
        self.fallbacks.insert(kind, text.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self, kind: PromptKind) -> usize {
        self.calls.lock().expect("calls lock").get(&kind).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AiGenerationClient for ScriptedAiClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        *self.calls.lock().expect("calls lock").entry(prompt.kind).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .replies
            .lock()
            .expect("replies lock")
            .get_mut(&prompt.kind)
            .and_then(VecDeque::pop_front);
        match queued {
            Some(reply) => reply,
            None => self
                .fallbacks
                .get(&prompt.kind)
                .cloned()
                .ok_or_else(|| GenerationError::Transport("no scripted reply".to_string())),
        }
    }
}

struct TopicRow {
    class_id: String,
    created_by: Option<String>,
}

#[derive(Default)]
struct MemoryData {
    users: HashMap<String, String>,
    classes: HashMap<String, Class>,
    topics: HashMap<String, TopicRow>,
    attempts: Vec<AssessmentAttempt>,
    feedback: Vec<FeedbackRecord>,
    rubrics: HashMap<String, Rubric>,
}

/// In-memory stand-in for the Postgres store.
#[derive(Default)]
pub(crate) struct MemoryStore {
    data: StdMutex<MemoryData>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> std::sync::MutexGuard<'_, MemoryData> {
        self.data.lock().expect("memory store lock")
    }

    pub(crate) fn insert_class(&self, class: Class) {
        self.data().classes.insert(class.id.clone(), class);
    }

    pub(crate) fn insert_user(&self, user_id: &str, username: &str) {
        self.data().users.insert(user_id.to_string(), username.to_string());
    }

    pub(crate) fn insert_topic(&self, topic_id: &str, class_id: &str) {
        let topic = TopicRow { class_id: class_id.to_string(), created_by: None };
        self.data().topics.insert(topic_id.to_string(), topic);
    }

    pub(crate) fn insert_topic_by(&self, topic_id: &str, class_id: &str, created_by: &str) {
        let topic =
            TopicRow { class_id: class_id.to_string(), created_by: Some(created_by.to_string()) };
        self.data().topics.insert(topic_id.to_string(), topic);
    }

    pub(crate) fn insert_attempt(&self, attempt: AssessmentAttempt) {
        self.data().attempts.push(attempt);
    }

    pub(crate) fn insert_feedback(&self, record: FeedbackRecord) {
        self.data().feedback.push(record);
    }

    pub(crate) fn insert_rubric(&self, rubric: Rubric) {
        self.data().rubrics.insert(rubric.id().to_string(), rubric);
    }
}

fn matches_key(record: &FeedbackRecord, key: FeedbackKey<'_>) -> bool {
    record.username == key.username
        && record.topic_id == key.topic_id
        && record.attempt_count == key.attempt_count
}

#[async_trait]
impl RubricStore for MemoryStore {
    async fn create_rubric(&self, rubric: &Rubric) -> anyhow::Result<()> {
        self.insert_rubric(rubric.clone());
        Ok(())
    }

    async fn fetch_rubric(&self, rubric_id: &str) -> anyhow::Result<Option<Rubric>> {
        Ok(self.data().rubrics.get(rubric_id).cloned())
    }

    async fn list_rubrics(&self) -> anyhow::Result<Vec<Rubric>> {
        let mut rubrics: Vec<Rubric> = self.data().rubrics.values().cloned().collect();
        rubrics.sort_by(|a, b| a.title().cmp(b.title()));
        Ok(rubrics)
    }

    async fn save_rubric(&self, rubric: &Rubric) -> anyhow::Result<bool> {
        let mut data = self.data();
        match data.rubrics.get_mut(rubric.id()) {
            Some(existing) => {
                *existing = rubric.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_rubric(&self, rubric_id: &str) -> anyhow::Result<bool> {
        Ok(self.data().rubrics.remove(rubric_id).is_some())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn create_attempt(&self, attempt: NewAttempt) -> anyhow::Result<AssessmentAttempt> {
        let mut data = self.data();
        let next = data
            .attempts
            .iter()
            .filter(|existing| {
                existing.user_id == attempt.user_id && existing.topic_id == attempt.topic_id
            })
            .map(|existing| existing.attempt_count)
            .max()
            .unwrap_or(0)
            + 1;
        let created = AssessmentAttempt {
            id: Uuid::new_v4().to_string(),
            user_id: attempt.user_id,
            username: attempt.username,
            topic_id: attempt.topic_id,
            question: attempt.question,
            responses: Json(attempt.responses),
            attempt_count: next,
            time_elapsed_seconds: attempt.time_elapsed_seconds,
            created_at: primitive_now_utc(),
        };
        data.attempts.push(created.clone());
        Ok(created)
    }

    async fn find_attempt(
        &self,
        user_id: &str,
        topic_id: &str,
        attempt_count: i32,
    ) -> anyhow::Result<Option<AssessmentAttempt>> {
        Ok(self
            .data()
            .attempts
            .iter()
            .find(|attempt| {
                attempt.user_id == user_id
                    && attempt.topic_id == topic_id
                    && attempt.attempt_count == attempt_count
            })
            .cloned())
    }

    async fn list_attempts(
        &self,
        user_id: &str,
        topic_id: &str,
    ) -> anyhow::Result<Vec<AssessmentAttempt>> {
        let mut attempts: Vec<AssessmentAttempt> = self
            .data()
            .attempts
            .iter()
            .filter(|attempt| attempt.user_id == user_id && attempt.topic_id == topic_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|attempt| attempt.attempt_count);
        Ok(attempts)
    }

    async fn list_attempts_for_class(
        &self,
        class_id: &str,
        user_id: Option<&str>,
    ) -> anyhow::Result<Vec<AssessmentAttempt>> {
        let data = self.data();
        Ok(data
            .attempts
            .iter()
            .filter(|attempt| {
                data.topics.get(&attempt.topic_id).is_some_and(|topic| topic.class_id == class_id)
            })
            .filter(|attempt| user_id.map_or(true, |user_id| attempt.user_id == user_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn create_feedback(&self, write: &FeedbackWrite) -> anyhow::Result<Option<FeedbackRecord>> {
        let mut data = self.data();
        if data.feedback.iter().any(|record| matches_key(record, write.key())) {
            return Ok(None);
        }
        let now = primitive_now_utc();
        let record = FeedbackRecord {
            id: Uuid::new_v4().to_string(),
            user_id: write.user_id.clone(),
            username: write.username.clone(),
            teacher_username: write.teacher_username.clone(),
            topic_id: write.topic_id.clone(),
            class_id: write.class_id.clone(),
            attempt_count: write.attempt_count,
            grade: write.grade.clone(),
            feedback_text: write.feedback_text.clone(),
            created_at: now,
            updated_at: now,
        };
        data.feedback.push(record.clone());
        Ok(Some(record))
    }

    async fn update_feedback(&self, write: &FeedbackWrite) -> anyhow::Result<Option<FeedbackRecord>> {
        let mut data = self.data();
        let Some(record) = data.feedback.iter_mut().find(|record| matches_key(record, write.key()))
        else {
            return Ok(None);
        };
        record.teacher_username = write.teacher_username.clone();
        record.grade = write.grade.clone();
        record.feedback_text = write.feedback_text.clone();
        record.updated_at = primitive_now_utc();
        Ok(Some(record.clone()))
    }

    async fn find_feedback(&self, key: FeedbackKey<'_>) -> anyhow::Result<Option<FeedbackRecord>> {
        Ok(self.data().feedback.iter().find(|record| matches_key(record, key)).cloned())
    }

    async fn delete_feedback(&self, key: FeedbackKey<'_>) -> anyhow::Result<bool> {
        let mut data = self.data();
        let before = data.feedback.len();
        data.feedback.retain(|record| !matches_key(record, key));
        Ok(data.feedback.len() != before)
    }

    async fn list_feedback_by_class(&self, class_id: &str) -> anyhow::Result<Vec<FeedbackRecord>> {
        Ok(self.data().feedback.iter().filter(|record| record.class_id == class_id).cloned().collect())
    }

    async fn list_feedback_by_class_and_user(
        &self,
        class_id: &str,
        user_id: &str,
    ) -> anyhow::Result<Vec<FeedbackRecord>> {
        Ok(self
            .data()
            .feedback
            .iter()
            .filter(|record| record.class_id == class_id && record.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_feedback_by_user(&self, user_id: &str) -> anyhow::Result<Vec<FeedbackRecord>> {
        Ok(self.data().feedback.iter().filter(|record| record.user_id == user_id).cloned().collect())
    }
}

#[async_trait]
impl ClassStore for MemoryStore {
    async fn find_class(&self, class_id: &str) -> anyhow::Result<Option<Class>> {
        Ok(self.data().classes.get(class_id).cloned())
    }

    async fn set_ai_grading(&self, class_id: &str, enabled: bool) -> anyhow::Result<Option<Class>> {
        let mut data = self.data();
        Ok(data.classes.get_mut(class_id).map(|class| {
            class.ai_grading_enabled = enabled;
            class.updated_at = primitive_now_utc();
            class.clone()
        }))
    }

    async fn find_topic_class(&self, topic_id: &str) -> anyhow::Result<Option<String>> {
        Ok(self.data().topics.get(topic_id).map(|topic| topic.class_id.clone()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn delete_user_cascade(&self, user_id: &str) -> anyhow::Result<bool> {
        let mut data = self.data();
        let Some(username) = data.users.get(user_id).cloned() else {
            return Ok(false);
        };

        let owned: Vec<String> = data
            .classes
            .values()
            .filter(|class| class.owner_username == username)
            .map(|class| class.id.clone())
            .collect();
        let doomed_topics: Vec<String> = data
            .topics
            .iter()
            .filter(|(_, topic)| {
                owned.contains(&topic.class_id) || topic.created_by.as_deref() == Some(user_id)
            })
            .map(|(topic_id, _)| topic_id.clone())
            .collect();

        data.feedback.retain(|record| {
            record.user_id != user_id
                && !owned.contains(&record.class_id)
                && !doomed_topics.contains(&record.topic_id)
        });
        data.attempts.retain(|attempt| {
            attempt.user_id != user_id && !doomed_topics.contains(&attempt.topic_id)
        });
        data.topics.retain(|topic_id, _| !doomed_topics.contains(topic_id));
        data.classes.retain(|class_id, _| !owned.contains(class_id));
        data.users.remove(user_id);
        Ok(true)
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// App state over a fresh in-memory store with a short extraction policy.
pub(crate) fn test_state(
    settings: Settings,
    store: Arc<MemoryStore>,
    client: Arc<ScriptedAiClient>,
) -> AppState {
    let orchestrator = GradingOrchestrator::new(
        client,
        ExtractionPolicy {
            max_attempts: 2,
            attempt_timeout: Duration::from_secs(2),
            deadline: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(1),
        },
    );
    // Dropping the sender leaves the receiver at `false` for good.
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    AppState::new(settings, store, orchestrator, shutdown_rx)
}

pub(crate) fn sample_rubric() -> Rubric {
    let columns = vec!["Excellent".to_string(), "Poor".to_string()];
    let rows = vec![
        RubricRow::new(
            "row-accuracy",
            Some("Accuracy"),
            0.6,
            vec!["Facts are correct and complete".to_string(), "Major factual errors".to_string()],
        ),
        RubricRow::new(
            "row-fluency",
            Some("Fluency"),
            0.4,
            vec!["Speaks smoothly with few pauses".to_string(), "Frequent long pauses".to_string()],
        ),
    ];
    Rubric::from_parts(SAMPLE_RUBRIC_ID, "Oral science check", columns, rows).expect("sample rubric")
}

pub(crate) fn sample_transcript() -> Vec<TranscriptTurn> {
    vec![
        TranscriptTurn::new(Sender::Ai, "What happens to water placed next to a salty solution?"),
        TranscriptTurn::new(Sender::User, "Water moves across the membrane toward the salt."),
        TranscriptTurn::new(Sender::Ai, "Why does that happen?"),
        TranscriptTurn::new(Sender::User, "Because it balances the concentration on both sides."),
    ]
}

pub(crate) fn class(id: &str, owner_username: &str, ai_grading_enabled: bool) -> Class {
    let now = primitive_now_utc();
    Class {
        id: id.to_string(),
        name: format!("Class {id}"),
        owner_username: owner_username.to_string(),
        ai_grading_enabled,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn attempt(
    user_id: &str,
    username: &str,
    topic_id: &str,
    attempt_count: i32,
    time_elapsed_seconds: f64,
) -> AssessmentAttempt {
    AssessmentAttempt {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        username: username.to_string(),
        topic_id: topic_id.to_string(),
        question: "Explain osmosis".to_string(),
        responses: Json(sample_transcript()),
        attempt_count,
        time_elapsed_seconds,
        created_at: primitive_now_utc(),
    }
}

pub(crate) fn feedback_write(
    class_id: &str,
    user_id: &str,
    username: &str,
    topic_id: &str,
    attempt_count: i32,
    grade: &str,
) -> FeedbackWrite {
    FeedbackWrite {
        user_id: user_id.to_string(),
        username: username.to_string(),
        teacher_username: "ms_lee".to_string(),
        topic_id: topic_id.to_string(),
        class_id: class_id.to_string(),
        attempt_count,
        grade: grade.to_string(),
        feedback_text: "Keep practising.".to_string(),
    }
}

pub(crate) fn feedback_record(
    class_id: &str,
    user_id: &str,
    username: &str,
    topic_id: &str,
    attempt_count: i32,
    grade: &str,
) -> FeedbackRecord {
    let write = feedback_write(class_id, user_id, username, topic_id, attempt_count, grade);
    let now = primitive_now_utc();
    FeedbackRecord {
        id: Uuid::new_v4().to_string(),
        user_id: write.user_id,
        username: write.username,
        teacher_username: write.teacher_username,
        topic_id: write.topic_id,
        class_id: write.class_id,
        attempt_count: write.attempt_count,
        grade: write.grade,
        feedback_text: write.feedback_text,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    let bytes = serde_json::to_vec(&body).expect("serialize body");
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("request body")
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
