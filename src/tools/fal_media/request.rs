use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::MediaError;

/// Namespace every model id of this provider starts with.
pub const PROVIDER_PREFIX: &str = "fal-ai/";

pub const MODEL_IDS: [&str; 6] = [
    "fal-ai/flux/dev",
    "fal-ai/flux/schnell",
    "fal-ai/stable-diffusion-v3-medium",
    "fal-ai/photorealism",
    "fal-ai/stable-video-diffusion",
    "fal-ai/runway-gen3",
];

pub const MAX_IMAGES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[serde(rename = "square_hd")]
    SquareHd,
    #[serde(rename = "square")]
    Square,
    #[serde(rename = "portrait_4_3")]
    Portrait4x3,
    #[serde(rename = "portrait_16_9")]
    Portrait16x9,
    #[serde(rename = "landscape_4_3")]
    Landscape4x3,
    #[serde(rename = "landscape_16_9")]
    Landscape16x9,
}

impl ImageSize {
    pub const ALL: [ImageSize; 6] = [
        ImageSize::SquareHd,
        ImageSize::Square,
        ImageSize::Portrait4x3,
        ImageSize::Portrait16x9,
        ImageSize::Landscape4x3,
        ImageSize::Landscape16x9,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::SquareHd => "square_hd",
            ImageSize::Square => "square",
            ImageSize::Portrait4x3 => "portrait_4_3",
            ImageSize::Portrait16x9 => "portrait_16_9",
            ImageSize::Landscape4x3 => "landscape_4_3",
            ImageSize::Landscape16x9 => "landscape_16_9",
        }
    }
}

fn default_image_size() -> Option<ImageSize> {
    Some(ImageSize::Landscape4x3)
}

fn default_num_images() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FalMediaRequest {
    pub prompt: String,
    pub model_id: String,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default = "default_image_size")]
    pub image_size: Option<ImageSize>,
    #[serde(default = "default_num_images")]
    pub num_images: u32,
    #[serde(default)]
    pub num_inference_steps: Option<u32>,
    #[serde(default)]
    pub guidance_scale: Option<f64>,
}

impl FalMediaRequest {
    pub fn new(prompt: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model_id: model_id.into(),
            seed: None,
            image_size: default_image_size(),
            num_images: default_num_images(),
            num_inference_steps: None,
            guidance_scale: None,
        }
    }

    pub fn validate(&self) -> Result<(), MediaError> {
        if self.prompt.trim().is_empty() {
            return Err(MediaError::InvalidRequest("prompt must not be empty".into()));
        }
        if self.model_id.trim().is_empty() {
            return Err(MediaError::InvalidRequest("model_id must not be empty".into()));
        }
        if !(1..=MAX_IMAGES).contains(&self.num_images) {
            return Err(MediaError::InvalidRequest(format!(
                "num_images must be between 1 and {}, got {}",
                MAX_IMAGES, self.num_images
            )));
        }
        Ok(())
    }

    /// Provider arguments. Unset and default-valued fields are left out so the
    /// provider applies its own defaults.
    pub fn arguments(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("prompt".into(), Value::from(self.prompt.as_str()));

        if let Some(seed) = self.seed {
            args.insert("seed".into(), Value::from(seed));
        }
        if let Some(size) = self.image_size {
            args.insert("image_size".into(), Value::from(size.as_str()));
        }
        if self.num_images > 1 {
            args.insert("num_images".into(), Value::from(self.num_images));
        }
        if let Some(steps) = self.num_inference_steps.filter(|&s| s > 0) {
            args.insert("num_inference_steps".into(), Value::from(steps));
        }
        if let Some(scale) = self.guidance_scale.filter(|&g| g != 0.0) {
            args.insert("guidance_scale".into(), Value::from(scale));
        }

        args
    }
}

/// The configured model wins over the caller's when it belongs to this provider.
pub fn resolve_model(requested: &str, selected: Option<&str>) -> String {
    match selected {
        Some(selected) if selected.starts_with(PROVIDER_PREFIX) => {
            if selected != requested {
                tracing::info!(
                    "Using selected media model: {} (overriding {})",
                    selected,
                    requested
                );
            }
            selected.to_string()
        }
        _ => requested.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_request_sends_prompt_and_default_size() {
        let req = FalMediaRequest::new("a red circle", "fal-ai/flux/dev");
        assert_eq!(
            Value::Object(req.arguments()),
            json!({"prompt": "a red circle", "image_size": "landscape_4_3"})
        );
    }

    #[test]
    fn single_image_count_is_omitted() {
        let mut req = FalMediaRequest::new("p", "fal-ai/flux/dev");
        req.num_images = 1;
        assert!(!req.arguments().contains_key("num_images"));
        req.num_images = 3;
        assert_eq!(req.arguments()["num_images"], json!(3));
    }

    #[test]
    fn optional_fields_included_when_set() {
        let req = FalMediaRequest {
            seed: Some(0),
            image_size: None,
            num_inference_steps: Some(28),
            guidance_scale: Some(7.5),
            ..FalMediaRequest::new("p", "m")
        };
        assert_eq!(
            Value::Object(req.arguments()),
            json!({"prompt": "p", "seed": 0, "num_inference_steps": 28, "guidance_scale": 7.5})
        );
    }

    #[test]
    fn zero_steps_and_scale_are_treated_as_unset() {
        let req = FalMediaRequest {
            num_inference_steps: Some(0),
            guidance_scale: Some(0.0),
            ..FalMediaRequest::new("p", "m")
        };
        let args = req.arguments();
        assert!(!args.contains_key("num_inference_steps"));
        assert!(!args.contains_key("guidance_scale"));
    }

    #[test]
    fn deserializes_tool_arguments_with_defaults() {
        let req: FalMediaRequest =
            serde_json::from_value(json!({"prompt": "p", "model_id": "fal-ai/flux/dev"})).unwrap();
        assert_eq!(req, FalMediaRequest::new("p", "fal-ai/flux/dev"));

        let req: FalMediaRequest = serde_json::from_value(
            json!({"prompt": "p", "model_id": "m", "image_size": "square_hd", "num_images": 2}),
        )
        .unwrap();
        assert_eq!(req.image_size, Some(ImageSize::SquareHd));
        assert_eq!(req.num_images, 2);
    }

    #[test]
    fn validation_bounds_image_count() {
        let mut req = FalMediaRequest::new("p", "m");
        req.num_images = 5;
        assert!(req.validate().is_err());
        req.num_images = 0;
        assert!(req.validate().is_err());
        req.num_images = 4;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn selected_model_overrides_only_within_namespace() {
        assert_eq!(
            resolve_model("fal-ai/flux/dev", Some("fal-ai/flux/schnell")),
            "fal-ai/flux/schnell"
        );
        assert_eq!(
            resolve_model("fal-ai/flux/dev", Some("openai/dall-e-3")),
            "fal-ai/flux/dev"
        );
        assert_eq!(resolve_model("fal-ai/flux/dev", None), "fal-ai/flux/dev");
    }
}
