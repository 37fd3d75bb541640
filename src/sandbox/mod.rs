//! Workspace storage that generated artifacts are written into.

mod local;
mod remote;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;

pub use local::LocalWorkspace;
pub use remote::RemoteSandbox;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("path traversal detected")]
    PathTraversal,
    #[error("operation outside sandbox root")]
    OutsideRoot,
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sandbox request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sandbox returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Folder creation and file upload by workspace-relative path.
#[async_trait]
pub trait SandboxFs: Send + Sync {
    async fn create_folder(&self, path: &str, mode: &str) -> Result<(), SandboxError>;
    async fn upload_file(&self, path: &str, content: Vec<u8>) -> Result<(), SandboxError>;
}

/// Normalizes a workspace-relative path, refusing anything that could escape the root.
pub fn clean_relative(relative: &str) -> Result<PathBuf, SandboxError> {
    let relative = Path::new(relative);
    if relative.components().count() == 0 {
        return Err(SandboxError::InvalidOperation(
            "path must not be empty".to_string(),
        ));
    }
    if relative.is_absolute() {
        return Err(SandboxError::OutsideRoot);
    }

    let mut clean = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::CurDir => continue,
            Component::Normal(part) => clean.push(part),
            Component::ParentDir => return Err(SandboxError::PathTraversal),
            Component::RootDir | Component::Prefix(_) => return Err(SandboxError::OutsideRoot),
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(SandboxError::InvalidOperation(
            "path must not be empty".to_string(),
        ));
    }
    Ok(clean)
}

/// Remote sandbox when one is configured, else a local directory, else nothing.
pub fn from_config(config: &Config) -> Result<Option<Arc<dyn SandboxFs>>, SandboxError> {
    if let (Some(url), Some(id)) = (&config.sandbox_api_url, &config.sandbox_id) {
        return Ok(Some(Arc::new(RemoteSandbox::new(
            url,
            id,
            config.sandbox_api_key.clone(),
        ))));
    }
    if let Some(dir) = &config.workspace_dir {
        return Ok(Some(Arc::new(LocalWorkspace::new(dir)?)));
    }
    Ok(None)
}
