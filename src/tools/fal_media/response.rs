use serde::{Deserialize, Serialize};
use serde_json::Value;

const VIDEO_KEYWORDS: [&str; 5] = ["video", "runway", "pika", "sora", "stable-video"];

pub fn is_video_model(model_id: &str) -> bool {
    let model_id = model_id.to_lowercase();
    VIDEO_KEYWORDS.iter().any(|k| model_id.contains(k))
}

/// A media reference as providers return it: either the URL itself or an
/// object carrying it under `url`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MediaUrl {
    BareUrl(String),
    UrlObject { url: String },
}

impl MediaUrl {
    pub fn decode(value: &Value) -> Option<Self> {
        MediaUrl::deserialize(value).ok()
    }

    pub fn into_url(self) -> String {
        match self {
            MediaUrl::BareUrl(url) | MediaUrl::UrlObject { url } => url,
        }
    }
}

fn decode_single(value: &Value) -> Vec<String> {
    MediaUrl::decode(value)
        .map(|m| vec![m.into_url()])
        .unwrap_or_default()
}

fn decode_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(MediaUrl::decode)
                .map(MediaUrl::into_url)
                .collect()
        })
        .unwrap_or_default()
}

/// `images` wins over `image` when both keys are present.
pub fn extract_image_urls(payload: &Value) -> Vec<String> {
    if let Some(list) = payload.get("images") {
        decode_list(list)
    } else if let Some(single) = payload.get("image") {
        decode_single(single)
    } else {
        Vec::new()
    }
}

/// `video` wins over `videos` when both keys are present.
pub fn extract_video_urls(payload: &Value) -> Vec<String> {
    if let Some(single) = payload.get("video") {
        decode_single(single)
    } else if let Some(list) = payload.get("videos") {
        decode_list(list)
    } else {
        Vec::new()
    }
}

/// Tool output. Serialized as the JSON body of a successful tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FalMediaResponse {
    pub success: bool,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub saved_files: Vec<String>,
    pub request_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn image_list_of_objects() {
        let payload = json!({"images": [{"url": "http://x/a.png", "width": 1024}]});
        assert_eq!(extract_image_urls(&payload), vec!["http://x/a.png"]);
    }

    #[test]
    fn single_image_as_string() {
        let payload = json!({"image": "http://x/b.png"});
        assert_eq!(extract_image_urls(&payload), vec!["http://x/b.png"]);
    }

    #[test]
    fn missing_keys_yield_nothing() {
        assert!(extract_image_urls(&json!({"seed": 1})).is_empty());
        assert!(extract_video_urls(&json!({})).is_empty());
        assert!(extract_image_urls(&json!("not an object")).is_empty());
    }

    #[test]
    fn mixed_and_malformed_entries() {
        let payload = json!({"images": ["http://x/1.png", {"url": "http://x/2.png"}, {"nope": 1}, 7]});
        assert_eq!(
            extract_image_urls(&payload),
            vec!["http://x/1.png", "http://x/2.png"]
        );
        assert!(extract_image_urls(&json!({"images": {"url": "http://x"}})).is_empty());
        assert!(extract_image_urls(&json!({"image": {"width": 3}})).is_empty());
    }

    #[test]
    fn video_shapes() {
        assert_eq!(
            extract_video_urls(&json!({"video": {"url": "http://x/v.mp4"}})),
            vec!["http://x/v.mp4"]
        );
        assert_eq!(
            extract_video_urls(&json!({"videos": ["http://x/1.mp4", {"url": "http://x/2.mp4"}]})),
            vec!["http://x/1.mp4", "http://x/2.mp4"]
        );
    }

    #[test]
    fn video_model_classification() {
        assert!(is_video_model("fal-ai/runway-gen3"));
        assert!(is_video_model("fal-ai/Stable-Video-Diffusion"));
        assert!(is_video_model("vendor/sora-2"));
        assert!(!is_video_model("fal-ai/flux/dev"));
    }
}
