use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::provider::{MediaProvider, ProviderError, ProviderOutput};

#[derive(Debug, Deserialize)]
struct QueueSubmission {
    request_id: String,
    #[serde(default)]
    status_url: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueLog {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
    #[serde(default)]
    logs: Option<Vec<QueueLog>>,
    #[serde(default)]
    queue_position: Option<u64>,
}

/// HTTP client for the fal.ai queue and direct-run endpoints.
pub struct FalClient {
    client: Client,
    api_key: String,
    queue_url: String,
    run_url: String,
    poll_interval: Duration,
}

impl FalClient {
    pub fn new(api_key: &str, queue_url: &str, run_url: &str, poll_interval: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            queue_url: queue_url.trim_end_matches('/').to_string(),
            run_url: run_url.trim_end_matches('/').to_string(),
            poll_interval,
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Key {}", self.api_key))
    }

    async fn json_body<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T, ProviderError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| ProviderError::Protocol(e.to_string()))
    }

    async fn submit(
        &self,
        model_id: &str,
        arguments: &Map<String, Value>,
    ) -> Result<QueueSubmission, ProviderError> {
        let resp = self
            .authorized(self.client.post(format!("{}/{}", self.queue_url, model_id)))
            .json(arguments)
            .send()
            .await?;
        Self::json_body(resp).await
    }

    /// Polls until the request completes, logging provider log lines as they appear.
    async fn wait_for_completion(&self, status_url: &str) -> Result<(), ProviderError> {
        let mut logs_seen = 0usize;
        loop {
            let resp = self
                .authorized(self.client.get(status_url))
                .query(&[("logs", "1")])
                .send()
                .await?;
            let status: QueueStatus = Self::json_body(resp).await?;

            let logs = status.logs.unwrap_or_default();
            for log in logs.iter().skip(logs_seen) {
                info!("fal: {}", log.message);
            }
            logs_seen = logs_seen.max(logs.len());

            match status.status.as_str() {
                "COMPLETED" => return Ok(()),
                "IN_QUEUE" | "IN_PROGRESS" => {
                    debug!(status = %status.status, queue_position = ?status.queue_position, "waiting");
                }
                other => return Err(ProviderError::Failed(other.to_string())),
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl MediaProvider for FalClient {
    async fn subscribe(
        &self,
        model_id: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ProviderOutput, ProviderError> {
        let submission = self.submit(model_id, arguments).await?;
        info!(request_id = %submission.request_id, model_id, "queued generation");

        let request_base = format!(
            "{}/{}/requests/{}",
            self.queue_url, model_id, submission.request_id
        );
        let status_url = submission
            .status_url
            .unwrap_or_else(|| format!("{}/status", request_base));
        let response_url = submission.response_url.unwrap_or(request_base);

        self.wait_for_completion(&status_url).await?;

        let resp = self
            .authorized(self.client.get(&response_url))
            .send()
            .await?;
        let payload: Value = Self::json_body(resp).await?;

        Ok(ProviderOutput {
            payload,
            request_id: Some(submission.request_id),
        })
    }

    async fn run(
        &self,
        model_id: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ProviderOutput, ProviderError> {
        let resp = self
            .authorized(self.client.post(format!("{}/{}", self.run_url, model_id)))
            .json(arguments)
            .send()
            .await?;
        let payload: Value = Self::json_body(resp).await?;

        Ok(ProviderOutput {
            payload,
            request_id: None,
        })
    }
}
