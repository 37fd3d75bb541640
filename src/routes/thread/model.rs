use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::utils::truncate_with_ellipsis;

const FALLBACK_MAX_CHARS: usize = 50;
const NAME_MAX_TOKENS: u32 = 20;
const NAME_TEMPERATURE: f32 = 0.7;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates extremely concise titles \
(2-4 words maximum) for chat threads based on the user's message. \
Respond with only the title, no other text or punctuation.";

#[derive(Debug, Deserialize)]
pub struct ThreadNameRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ThreadNameResponse {
    pub name: String,
}

/// Name used whenever the model gives nothing usable.
pub fn fallback_name(message: &str) -> String {
    truncate_with_ellipsis(message.trim(), FALLBACK_MAX_CHARS)
}

/// Strips the quoting and whitespace models like to wrap titles in.
pub fn clean_generated_name(raw: &str) -> String {
    raw.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .to_string()
}

pub async fn generate_thread_name(llm: &dyn LlmClient, model: &str, message: &str) -> String {
    let message = message.trim();
    let request = CompletionRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Generate an extremely brief title (2-4 words only) for a chat thread that starts with this message: \"{}\"",
                message
            )),
        ],
        max_tokens: Some(NAME_MAX_TOKENS),
        temperature: Some(NAME_TEMPERATURE),
    };

    let generated = match llm.complete(request).await {
        Ok(resp) => match resp.content() {
            Some(content) => clean_generated_name(content),
            None => {
                tracing::warn!("Unexpected LLM response shape for thread name: {:?}", resp);
                String::new()
            }
        },
        Err(e) => {
            tracing::error!("Thread name generation failed: {}", e);
            String::new()
        }
    };

    if generated.is_empty() {
        fallback_name(message)
    } else {
        generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, LlmResponse};
    use async_trait::async_trait;
    use serde_json::json;

    struct Canned(Result<LlmResponse, ()>);

    #[async_trait]
    impl LlmClient for Canned {
        async fn complete(&self, _request: CompletionRequest) -> Result<LlmResponse, LlmError> {
            self.0.clone().map_err(|_| LlmError::MissingApiKey)
        }
    }

    #[test]
    fn fallback_truncates_long_messages() {
        let msg = "a".repeat(80);
        let name = fallback_name(&msg);
        assert_eq!(name, format!("{}...", "a".repeat(47)));
        assert_eq!(fallback_name("  short one  "), "short one");
    }

    #[test]
    fn cleaning_strips_quotes() {
        assert_eq!(clean_generated_name("\"Paris Trip\"\n"), "Paris Trip");
        assert_eq!(clean_generated_name(" 'Budget Review' "), "Budget Review");
    }

    #[tokio::test]
    async fn uses_model_title() {
        let llm = Canned(Ok(LlmResponse::from_json(json!({
            "choices": [{"message": {"content": " \"Weekend Hiking Plans\" "}}]
        }))));
        let name = generate_thread_name(&llm, "m", "help me plan a hike").await;
        assert_eq!(name, "Weekend Hiking Plans");
    }

    #[tokio::test]
    async fn falls_back_on_shape_mismatch_empty_or_error() {
        let msg = "help me plan a hike this weekend";
        for llm in [
            Canned(Ok(LlmResponse::from_json(json!({"unexpected": true})))),
            Canned(Ok(LlmResponse::Text("  \"\"  ".into()))),
            Canned(Err(())),
        ] {
            assert_eq!(generate_thread_name(&llm, "m", msg).await, msg);
        }
    }
}
