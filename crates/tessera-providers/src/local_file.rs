//! Local file provider. Each resource is a file under a root directory.
//!
//! Arguments:
//! - `path` (required): file path relative to the root, no `..` components
//! - `content` (optional): file body, defaults to empty
//!
//! The backend id is the absolute file path.

use serde_json::json;
use std::path::{Component, Path, PathBuf};
use tessera_core::{CancellationToken, Fields, Provider, ProviderError, ProviderResult};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const RESOURCE_TYPE: &str = "local_file";

pub struct LocalFileProvider {
    root: PathBuf,
}

impl LocalFileProvider {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target_path(&self, args: &Fields) -> ProviderResult<PathBuf> {
        let rel = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::InvalidArgs("'path' must be a string".into()))?;
        let rel = Path::new(rel);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
            || rel.as_os_str().is_empty()
        {
            return Err(ProviderError::InvalidArgs(format!(
                "'path' must be relative without '..': {}",
                rel.display()
            )));
        }
        Ok(self.root.join(rel))
    }

    /// Backend ids handed back to us must live under the root.
    fn owned_path(&self, backend_id: &str) -> ProviderResult<PathBuf> {
        let path = PathBuf::from(backend_id);
        if !path.starts_with(&self.root) {
            return Err(ProviderError::InvalidArgs(format!(
                "{} is outside {}",
                backend_id,
                self.root.display()
            )));
        }
        Ok(path)
    }
}

fn content_arg(args: &Fields) -> &str {
    args.get("content").and_then(|v| v.as_str()).unwrap_or("")
}

fn check(cancel: &CancellationToken) -> ProviderResult<()> {
    if cancel.is_cancelled() {
        Err(ProviderError::Cancelled)
    } else {
        Ok(())
    }
}

fn not_found(path: &Path, e: std::io::Error) -> ProviderError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ProviderError::NotFound(path.display().to_string())
    } else {
        ProviderError::Io(e)
    }
}

/// Write the body of a file `create` just made. On failure the partial file
/// is removed before the error is returned.
async fn fill_new<W>(path: &Path, mut file: W, content: &str) -> ProviderResult<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        file.write_all(content.as_bytes()).await?;
        file.flush().await
    }
    .await;
    let Err(e) = written else {
        return Ok(());
    };
    drop(file);
    if let Err(cleanup) = tokio::fs::remove_file(path).await {
        tracing::warn!("could not remove partial {}: {}", path.display(), cleanup);
    }
    Err(e.into())
}

#[async_trait::async_trait]
impl Provider for LocalFileProvider {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn create(&self, args: &Fields, cancel: &CancellationToken) -> ProviderResult<String> {
        check(cancel)?;
        let path = self.target_path(args)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ProviderError::Conflict(format!(
                    "{} already exists",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        fill_new(&path, file, content_arg(args)).await?;
        tracing::debug!("created {}", path.display());
        Ok(path.display().to_string())
    }

    async fn read(&self, backend_id: &str, cancel: &CancellationToken) -> ProviderResult<Fields> {
        check(cancel)?;
        let path = self.owned_path(backend_id)?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| not_found(&path, e))?;
        let mut fields = Fields::new();
        fields.insert("path".into(), json!(backend_id));
        fields.insert("size".into(), json!(content.len()));
        fields.insert("content".into(), json!(content));
        Ok(fields)
    }

    async fn update(
        &self,
        backend_id: &str,
        args: &Fields,
        cancel: &CancellationToken,
    ) -> ProviderResult<()> {
        check(cancel)?;
        let path = self.owned_path(backend_id)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(ProviderError::NotFound(backend_id.to_string()));
        }
        tokio::fs::write(&path, content_arg(args)).await?;
        Ok(())
    }

    async fn delete(&self, backend_id: &str, cancel: &CancellationToken) -> ProviderResult<()> {
        check(cancel)?;
        let path = self.owned_path(backend_id)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found(&path, e))?;
        tracing::debug!("removed {}", path.display());
        Ok(())
    }

    async fn outputs(&self, backend_id: &str, cancel: &CancellationToken) -> ProviderResult<Fields> {
        check(cancel)?;
        let path = self.owned_path(backend_id)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| not_found(&path, e))?;
        let mut outputs = Fields::new();
        outputs.insert("path".into(), json!(backend_id));
        outputs.insert("size".into(), json!(meta.len()));
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            outputs.insert("file_name".into(), json!(name));
        }
        Ok(outputs)
    }
}
