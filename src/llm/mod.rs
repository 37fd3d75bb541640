//! Chat-completion client for OpenAI-compatible endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    MissingApiKey,
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// What a provider handed back: some gateways answer with a bare string,
/// the rest with a `choices[].message` document.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmResponse {
    Text(String),
    Structured(Value),
}

impl LlmResponse {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => LlmResponse::Text(s),
            other => LlmResponse::Structured(other),
        }
    }

    /// First choice's message content, or `None` when the shape is unfamiliar.
    pub fn content(&self) -> Option<&str> {
        match self {
            LlmResponse::Text(s) => Some(s.as_str()),
            LlmResponse::Structured(v) => v
                .get("choices")?
                .get(0)?
                .get("message")?
                .get("content")?
                .as_str(),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<LlmResponse, LlmError>;
}

pub struct OpenAiCompatibleClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(api_base: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.llm_api_base, config.llm_api_key.clone())
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<LlmResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        tracing::debug!(model = %request.model, "sending chat completion");
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        Ok(match serde_json::from_str::<Value>(&text) {
            Ok(value) => LlmResponse::from_json(value),
            Err(_) => LlmResponse::Text(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_from_choice() {
        let resp = LlmResponse::from_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Trip Planning"}}]
        }));
        assert_eq!(resp.content(), Some("Trip Planning"));
    }

    #[test]
    fn content_from_bare_string() {
        assert_eq!(LlmResponse::from_json(json!("Hi")).content(), Some("Hi"));
    }

    #[test]
    fn unfamiliar_shapes_have_no_content() {
        for v in [json!({}), json!({"choices": []}), json!({"choices": [{"text": "x"}]})] {
            assert_eq!(LlmResponse::from_json(v).content(), None);
        }
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = OpenAiCompatibleClient::new("http://127.0.0.1:9", None);
        let err = client
            .complete(CompletionRequest {
                model: "m".into(),
                messages: vec![ChatMessage::user("hi")],
                max_tokens: None,
                temperature: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
