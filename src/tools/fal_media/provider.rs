use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::MediaError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected provider reply: {0}")]
    Protocol(String),
    #[error("generation failed with status {0}")]
    Failed(String),
}

/// Raw provider payload plus the queue request id, when the call went through the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutput {
    pub payload: Value,
    pub request_id: Option<String>,
}

#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Queue-based call: submit, wait for completion, fetch the result.
    async fn subscribe(
        &self,
        model_id: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ProviderOutput, ProviderError>;

    /// Direct synchronous call.
    async fn run(
        &self,
        model_id: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ProviderOutput, ProviderError>;
}

/// At most two attempts: `subscribe`, then `run` with the same arguments.
pub async fn generate_with_fallback(
    provider: &dyn MediaProvider,
    model_id: &str,
    arguments: &Map<String, Value>,
) -> Result<ProviderOutput, MediaError> {
    let subscribe_err = match provider.subscribe(model_id, arguments).await {
        Ok(output) => return Ok(output),
        Err(e) => e,
    };
    tracing::warn!(model_id, "subscribe failed, falling back to run: {}", subscribe_err);

    provider
        .run(model_id, arguments)
        .await
        .map_err(|run_err| MediaError::BothAttemptsFailed {
            subscribe: subscribe_err.to_string(),
            run: run_err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Scripted {
        subscribe_ok: bool,
        run_ok: bool,
        subscribe_calls: AtomicUsize,
        run_calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaProvider for Scripted {
        async fn subscribe(
            &self,
            _model_id: &str,
            _arguments: &Map<String, Value>,
        ) -> Result<ProviderOutput, ProviderError> {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            if self.subscribe_ok {
                Ok(ProviderOutput {
                    payload: json!({"via": "subscribe"}),
                    request_id: Some("req-1".into()),
                })
            } else {
                Err(ProviderError::Protocol("queue unavailable".into()))
            }
        }

        async fn run(
            &self,
            _model_id: &str,
            _arguments: &Map<String, Value>,
        ) -> Result<ProviderOutput, ProviderError> {
            self.run_calls.fetch_add(1, Ordering::SeqCst);
            if self.run_ok {
                Ok(ProviderOutput {
                    payload: json!({"via": "run"}),
                    request_id: None,
                })
            } else {
                Err(ProviderError::Status {
                    status: 502,
                    body: "bad gateway".into(),
                })
            }
        }
    }

    #[tokio::test]
    async fn subscribe_success_skips_run() {
        let provider = Scripted {
            subscribe_ok: true,
            ..Default::default()
        };
        let out = generate_with_fallback(&provider, "m", &Map::new()).await.unwrap();
        assert_eq!(out.payload, json!({"via": "subscribe"}));
        assert_eq!(provider.run_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_is_the_single_fallback() {
        let provider = Scripted {
            run_ok: true,
            ..Default::default()
        };
        let out = generate_with_fallback(&provider, "m", &Map::new()).await.unwrap();
        assert_eq!(out.payload, json!({"via": "run"}));
        assert_eq!(provider.subscribe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.run_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn both_failures_are_combined() {
        let provider = Scripted::default();
        let err = generate_with_fallback(&provider, "m", &Map::new())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("queue unavailable"), "{err}");
        assert!(err.contains("bad gateway"), "{err}");
        assert_eq!(provider.subscribe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.run_calls.load(Ordering::SeqCst), 1);
    }
}
