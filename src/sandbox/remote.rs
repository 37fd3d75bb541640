use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, multipart};

use super::{SandboxError, SandboxFs, clean_relative};

const WORKSPACE_ROOT: &str = "/workspace";

/// Sandbox reached through its toolbox HTTP API. Relative paths are placed
/// under `/workspace` inside the sandbox.
pub struct RemoteSandbox {
    client: Client,
    base_url: String,
    sandbox_id: String,
    api_key: Option<String>,
}

impl RemoteSandbox {
    pub fn new(base_url: &str, sandbox_id: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            sandbox_id: sandbox_id.to_string(),
            api_key,
        }
    }

    fn files_url(&self, action: &str) -> String {
        format!(
            "{}/toolbox/{}/toolbox/files/{}",
            self.base_url, self.sandbox_id, action
        )
    }

    fn absolute(relative: &str) -> Result<String, SandboxError> {
        let clean = clean_relative(relative)?;
        Ok(format!("{}/{}", WORKSPACE_ROOT, clean.to_string_lossy()))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

async fn ensure_success(resp: Response) -> Result<(), SandboxError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SandboxError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SandboxFs for RemoteSandbox {
    async fn create_folder(&self, path: &str, mode: &str) -> Result<(), SandboxError> {
        let path = Self::absolute(path)?;
        let resp = self
            .authorized(self.client.post(self.files_url("folder")))
            .query(&[("path", path.as_str()), ("mode", mode)])
            .send()
            .await?;
        ensure_success(resp).await
    }

    async fn upload_file(&self, path: &str, content: Vec<u8>) -> Result<(), SandboxError> {
        let path = Self::absolute(path)?;
        let file_name = path.rsplit('/').next().unwrap_or("upload").to_string();
        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(content).file_name(file_name));

        let resp = self
            .authorized(self.client.post(self.files_url("upload")))
            .query(&[("path", path.as_str())])
            .multipart(form)
            .send()
            .await?;
        ensure_success(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn paths_are_rooted_in_workspace() {
        assert_eq!(
            RemoteSandbox::absolute("generated_images/a.png").unwrap(),
            "/workspace/generated_images/a.png"
        );
        assert!(RemoteSandbox::absolute("../a.png").is_err());
    }

    #[tokio::test]
    async fn folder_and_upload_hit_toolbox_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/toolbox/sb-1/toolbox/files/folder"))
            .and(query_param("path", "/workspace/generated_images"))
            .and(query_param("mode", "755"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/toolbox/sb-1/toolbox/files/upload"))
            .and(query_param("path", "/workspace/generated_images/a.png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sandbox = RemoteSandbox::new(&server.uri(), "sb-1", Some("secret".into()));
        sandbox.create_folder("generated_images", "755").await.unwrap();
        sandbox
            .upload_file("generated_images/a.png", vec![1, 2, 3])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let sandbox = RemoteSandbox::new(&server.uri(), "sb-1", None);
        let err = sandbox
            .upload_file("generated_images/a.png", vec![1])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
