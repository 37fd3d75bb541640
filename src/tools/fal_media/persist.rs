use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::sandbox::SandboxFs;

pub const GENERATED_IMAGES_DIR: &str = "generated_images";
const FOLDER_MODE: &str = "755";
const KNOWN_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Extension taken from the URL path when it is a known image type, else `png`.
fn extension_for(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((_, ext)) => KNOWN_EXTENSIONS
            .iter()
            .find(|known| known.eq_ignore_ascii_case(ext))
            .copied()
            .unwrap_or("png"),
        None => "png",
    }
}

/// `{model}_{YYYYmmdd_HHMMSS}[_seed{N}]_{index}.{ext}`, with `index` 1-based.
pub fn image_file_name(
    model_id: &str,
    at: DateTime<Utc>,
    seed: Option<i64>,
    index: usize,
    url: &str,
) -> String {
    let model_name = model_id.rsplit('/').next().unwrap_or(model_id);
    let seed_suffix = seed.map(|s| format!("_seed{}", s)).unwrap_or_default();
    format!(
        "{}_{}{}_{}.{}",
        model_name,
        at.format("%Y%m%d_%H%M%S"),
        seed_suffix,
        index,
        extension_for(url)
    )
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PersistOutcome {
    pub saved: Vec<String>,
    pub failures: Vec<String>,
}

/// Downloads generated images and uploads them into the workspace, one at a time.
pub struct ImagePersister {
    client: Client,
    workspace: Arc<dyn SandboxFs>,
}

impl ImagePersister {
    pub fn new(workspace: Arc<dyn SandboxFs>, download_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(download_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default download client: {}", e);
                Client::new()
            });
        Self { client, workspace }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        let bytes = resp.bytes().await.map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }

    /// Failures are collected per image; one bad download never stops the rest.
    pub async fn save_all(
        &self,
        urls: &[String],
        model_id: &str,
        seed: Option<i64>,
    ) -> PersistOutcome {
        let mut outcome = PersistOutcome::default();
        if urls.is_empty() {
            return outcome;
        }

        if let Err(e) = self
            .workspace
            .create_folder(GENERATED_IMAGES_DIR, FOLDER_MODE)
            .await
        {
            outcome
                .failures
                .push(format!("could not create {}: {}", GENERATED_IMAGES_DIR, e));
            return outcome;
        }

        let at = Utc::now();
        for (i, url) in urls.iter().enumerate() {
            let file_name = image_file_name(model_id, at, seed, i + 1, url);
            let path = format!("{}/{}", GENERATED_IMAGES_DIR, file_name);

            let content = match self.download(url).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Failed to download image {}: {}", i + 1, e);
                    outcome
                        .failures
                        .push(format!("image {} download failed: {}", i + 1, e));
                    continue;
                }
            };

            match self.workspace.upload_file(&path, content).await {
                Ok(()) => {
                    tracing::info!("Saved generated image to {}", path);
                    outcome.saved.push(path);
                }
                Err(e) => {
                    tracing::warn!("Failed to save image {}: {}", i + 1, e);
                    outcome
                        .failures
                        .push(format!("image {} save failed: {}", i + 1, e));
                }
            }
        }

        outcome
    }
}
