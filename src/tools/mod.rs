//! Agent-callable tools.

pub mod fal_media;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use fal_media::FalMediaTool;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            output: message.clone(),
            error: Some(message),
        }
    }
}

/// A tool an agent can invoke. Failures come back as an unsuccessful
/// [`ToolResult`], never as a panic or error.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the `args` accepted by [`Tool::execute`].
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, args: serde_json::Value) -> ToolResult;

    /// Function-calling declaration in the shape LLM providers expect.
    fn spec(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters_schema(),
            }
        })
    }
}
