use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::instrument;

use super::{SandboxError, SandboxFs, clean_relative};

/// Workspace rooted at a directory on this machine.
#[derive(Clone, Debug)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        if root.is_relative() {
            return Err(SandboxError::InvalidOperation(
                "workspace directory must be absolute".to_string(),
            ));
        }
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, SandboxError> {
        Ok(self.root.join(clean_relative(relative)?))
    }
}

#[cfg(unix)]
async fn apply_mode(path: &Path, mode: &str) -> Result<(), SandboxError> {
    use std::os::unix::fs::PermissionsExt;

    let bits = u32::from_str_radix(mode, 8)
        .map_err(|_| SandboxError::InvalidOperation(format!("invalid mode '{}'", mode)))?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(bits)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn apply_mode(_path: &Path, _mode: &str) -> Result<(), SandboxError> {
    Ok(())
}

#[async_trait]
impl SandboxFs for LocalWorkspace {
    #[instrument(skip(self))]
    async fn create_folder(&self, path: &str, mode: &str) -> Result<(), SandboxError> {
        let dir = self.resolve(path)?;
        tokio::fs::create_dir_all(&dir).await?;
        apply_mode(&dir, mode).await
    }

    #[instrument(skip(self, content), fields(size = content.len()))]
    async fn upload_file(&self, path: &str, content: Vec<u8>) -> Result<(), SandboxError> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(file, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn upload_lands_under_root() {
        let temp = TempDir::new().unwrap();
        let ws = LocalWorkspace::new(temp.path()).unwrap();

        ws.create_folder("generated_images", "755").await.unwrap();
        ws.upload_file("generated_images/a.png", b"png".to_vec())
            .await
            .unwrap();

        let bytes = std::fs::read(temp.path().join("generated_images/a.png")).unwrap();
        assert_eq!(bytes, b"png");
    }

    #[tokio::test]
    async fn traversal_is_refused() {
        let temp = TempDir::new().unwrap();
        let ws = LocalWorkspace::new(temp.path()).unwrap();

        let err = ws
            .upload_file("../evil.png", b"bad".to_vec())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("path traversal"));
    }

    #[test]
    fn relative_root_is_rejected() {
        assert!(LocalWorkspace::new("relative/dir").is_err());
    }
}
