//! Image and video generation through fal.ai, exposed as the
//! `fal_media_generation` tool.
//!
//! Flow: check the API key, resolve the model (a configured selection
//! overrides the caller), build sparse arguments, call the provider with a
//! single fallback, normalize the URLs and, for image models with a workspace
//! attached, save the images under `generated_images/`.

mod client;
mod persist;
mod provider;
mod request;
mod response;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

use super::{Tool, ToolResult};
use crate::config::Config;
use crate::sandbox::SandboxFs;

pub use client::FalClient;
pub use persist::{GENERATED_IMAGES_DIR, ImagePersister, PersistOutcome, image_file_name};
pub use provider::{MediaProvider, ProviderError, ProviderOutput, generate_with_fallback};
pub use request::{FalMediaRequest, ImageSize, MODEL_IDS, PROVIDER_PREFIX, resolve_model};
pub use response::{
    FalMediaResponse, MediaUrl, extract_image_urls, extract_video_urls, is_video_model,
};

pub const TOOL_NAME: &str = "fal_media_generation";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FAL_KEY environment variable not set. Please configure your fal.ai API key.")]
    MissingApiKey,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("Both subscribe and run failed. Subscribe error: {subscribe}, Run error: {run}")]
    BothAttemptsFailed { subscribe: String, run: String },
}

#[derive(Debug, Clone, Default)]
pub struct MediaSettings {
    pub api_key: Option<String>,
    pub selected_model: Option<String>,
}

impl MediaSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.fal_key.clone(),
            selected_model: config.selected_media_model.clone(),
        }
    }
}

pub struct FalMediaTool {
    settings: MediaSettings,
    provider: Arc<dyn MediaProvider>,
    persister: Option<ImagePersister>,
}

impl FalMediaTool {
    pub fn new(
        settings: MediaSettings,
        provider: Arc<dyn MediaProvider>,
        persister: Option<ImagePersister>,
    ) -> Self {
        Self {
            settings,
            provider,
            persister,
        }
    }

    pub fn from_config(config: &Config, workspace: Option<Arc<dyn SandboxFs>>) -> Self {
        let settings = MediaSettings::from_config(config);
        let provider = Arc::new(FalClient::new(
            settings.api_key.as_deref().unwrap_or_default(),
            &config.fal_queue_url,
            &config.fal_run_url,
            config.fal_poll_interval(),
        ));
        let persister =
            workspace.map(|ws| ImagePersister::new(ws, config.media_download_timeout()));
        Self::new(settings, provider, persister)
    }

    pub async fn generate(&self, request: FalMediaRequest) -> Result<FalMediaResponse, MediaError> {
        if self.settings.api_key.is_none() {
            return Err(MediaError::MissingApiKey);
        }

        let request = FalMediaRequest {
            model_id: resolve_model(&request.model_id, self.settings.selected_model.as_deref()),
            ..request
        };
        request.validate()?;

        let arguments = request.arguments();
        let output =
            generate_with_fallback(self.provider.as_ref(), &request.model_id, &arguments).await?;

        let request_id = output
            .payload
            .get("request_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(output.request_id);

        let mut response = FalMediaResponse {
            success: true,
            request_id,
            ..Default::default()
        };

        if is_video_model(&request.model_id) {
            response.videos = extract_video_urls(&output.payload);
        } else {
            response.images = extract_image_urls(&output.payload);
            if let Some(persister) = &self.persister {
                let outcome = persister
                    .save_all(&response.images, &request.model_id, request.seed)
                    .await;
                response.saved_files = outcome.saved;
                if !outcome.failures.is_empty() {
                    response.error = Some(outcome.failures.join("; "));
                }
            }
        }

        response.message = summarize(&response, &request.model_id);
        Ok(response)
    }
}

fn summarize(response: &FalMediaResponse, model_id: &str) -> String {
    if !response.saved_files.is_empty() {
        let listing: Vec<String> = response
            .saved_files
            .iter()
            .map(|path| format!("- {}", path))
            .collect();
        return format!(
            "Successfully generated and saved {} image(s) to workspace:\n{}",
            response.saved_files.len(),
            listing.join("\n")
        );
    }
    if !response.videos.is_empty() {
        return format!(
            "Successfully generated {} video(s) with {}",
            response.videos.len(),
            model_id
        );
    }
    if !response.images.is_empty() {
        return format!(
            "Successfully generated {} image(s) with {}",
            response.images.len(),
            model_id
        );
    }
    format!("Generation with {} completed but returned no media URLs", model_id)
}

#[async_trait]
impl Tool for FalMediaTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Generate images and videos using fal.ai's AI models including FLUX, \
         Stable Diffusion, and video generation models."
    }

    fn parameters_schema(&self) -> Value {
        let sizes: Vec<&str> = ImageSize::ALL.iter().map(ImageSize::as_str).collect();
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The text prompt for media generation"
                },
                "model_id": {
                    "type": "string",
                    "description": "The fal.ai model ID",
                    "enum": MODEL_IDS
                },
                "seed": {
                    "type": "integer",
                    "description": "Random seed for reproducible results"
                },
                "image_size": {
                    "type": "string",
                    "description": "Image size/aspect ratio",
                    "enum": sizes
                },
                "num_images": {
                    "type": "integer",
                    "description": "Number of images to generate (1-4)",
                    "minimum": 1,
                    "maximum": request::MAX_IMAGES
                },
                "num_inference_steps": {
                    "type": "integer",
                    "description": "Number of inference steps (higher = better quality, slower)"
                },
                "guidance_scale": {
                    "type": "number",
                    "description": "Guidance scale (7.5 is typical, higher = more prompt adherence)"
                }
            },
            "required": ["prompt", "model_id"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        if self.settings.api_key.is_none() {
            return ToolResult::fail(MediaError::MissingApiKey.to_string());
        }

        let requested_model = args
            .get("model_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let request: FalMediaRequest = match serde_json::from_value(args) {
            Ok(request) => request,
            Err(e) => return ToolResult::fail(format!("Invalid arguments: {}", e)),
        };

        match self.generate(request).await {
            Ok(response) => match serde_json::to_string_pretty(&response) {
                Ok(output) => ToolResult::ok(output),
                Err(e) => ToolResult::fail(format!("Failed to encode result: {}", e)),
            },
            Err(e) => {
                tracing::error!("Media generation with {} failed: {}", requested_model, e);
                ToolResult::fail(format!(
                    "Failed to generate media with {}: {}",
                    requested_model, e
                ))
            }
        }
    }
}
