use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PromptKind {
    Feedback,
    Grade,
}

impl PromptKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::Grade => "grade",
        }
    }
}

/// A chat-style prompt: fixed instructions plus the request-specific body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Prompt {
    pub(crate) kind: PromptKind,
    pub(crate) system: String,
    pub(crate) user: String,
}

#[derive(Debug, Clone, Error)]
pub(crate) enum GenerationError {
    #[error("AI provider is not configured")]
    NotConfigured,
    #[error("AI provider request failed: {0}")]
    Transport(String),
    #[error("AI provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("AI provider response was malformed: {0}")]
    MalformedResponse(String),
}

/// Free-text generation collaborator. Output carries no format guarantee.
#[async_trait]
pub(crate) trait AiGenerationClient: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub(crate) struct OpenAiGenerationClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiGenerationClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.ai().ai_request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
            model: settings.ai().ai_model.clone(),
            max_tokens: settings.ai().ai_max_tokens,
            temperature: settings.ai().ai_temperature,
        })
    }

    fn payload(&self, prompt: &Prompt) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }

    async fn send(&self, prompt: &Prompt) -> Result<(String, Option<u64>), GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(prompt))
            .send()
            .await
            .map_err(|err| GenerationError::Transport(err.to_string()))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(GenerationError::Provider { status: status.as_u16(), body: body.to_string() });
        }

        let content = extract_content(&body)?;
        let tokens_used = body
            .get("usage")
            .and_then(|usage| usage.get("total_tokens"))
            .and_then(|value| value.as_u64());

        Ok((content, tokens_used))
    }
}

#[async_trait]
impl AiGenerationClient for OpenAiGenerationClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        if self.api_key.is_empty() || self.base_url.is_empty() {
            return Err(GenerationError::NotConfigured);
        }

        let timer = Instant::now();
        let result = self.send(prompt).await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "ai_generation_requests_total",
            "kind" => prompt.kind.as_str(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!("ai_generation_duration_seconds", "kind" => prompt.kind.as_str())
            .record(timer.elapsed().as_secs_f64());

        let (content, tokens_used) = result?;
        tracing::debug!(
            kind = prompt.kind.as_str(),
            model = %self.model,
            duration_seconds = timer.elapsed().as_secs_f64(),
            tokens_used = tokens_used,
            "AI generation completed"
        );

        Ok(content)
    }
}

fn extract_content(body: &Value) -> Result<String, GenerationError> {
    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .ok_or_else(|| GenerationError::MalformedResponse("missing choices[0].message.content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_content_reads_first_choice() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "Total Grade: 70%"}}],
            "usage": {"total_tokens": 12}
        });
        assert_eq!(extract_content(&body).unwrap(), "Total Grade: 70%");
    }

    #[test]
    fn extract_content_rejects_missing_message() {
        let body = json!({"choices": []});
        assert!(matches!(extract_content(&body), Err(GenerationError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn unconfigured_client_fails_without_network() {
        let _guard = crate::test_support::env_lock().await;
        std::env::remove_var("OPENAI_API_KEY");
        let settings = Settings::load().expect("settings");

        let client = OpenAiGenerationClient::from_settings(&settings).expect("client");
        let prompt =
            Prompt { kind: PromptKind::Feedback, system: "s".to_string(), user: "u".to_string() };
        assert!(matches!(client.generate(&prompt).await, Err(GenerationError::NotConfigured)));
    }
}
