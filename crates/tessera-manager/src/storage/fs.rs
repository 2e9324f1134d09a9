//! Local filesystem storage: one JSON document per record at `<root>/<type>/<id>.json`.

use std::path::{Path, PathBuf};
use tessera_core::{CancellationToken, ResourceRecord, Storage, StorageError, StorageResult};

const EXTENSION: &str = "json";

pub struct FsStorage {
    base_dir: PathBuf,
}

impl FsStorage {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn type_dir(&self, resource_type: &str) -> StorageResult<PathBuf> {
        validate_segment(resource_type)?;
        Ok(self.base_dir.join(resource_type))
    }

    fn record_path(&self, resource_type: &str, id: &str) -> StorageResult<PathBuf> {
        validate_segment(id)?;
        Ok(self
            .type_dir(resource_type)?
            .join(format!("{}.{}", id, EXTENSION)))
    }
}

/// Keys become path segments, so they must not escape the type directory.
fn validate_segment(segment: &str) -> StorageResult<()> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\'])
    {
        return Err(StorageError::Backend(format!(
            "invalid storage key segment '{}'",
            segment
        )));
    }
    Ok(())
}

fn check(cancel: &CancellationToken) -> StorageResult<()> {
    if cancel.is_cancelled() {
        Err(StorageError::Cancelled)
    } else {
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for FsStorage {
    async fn save(&self, record: &ResourceRecord, cancel: &CancellationToken) -> StorageResult<()> {
        check(cancel)?;
        let path = self.record_path(&record.resource_type, &record.id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec_pretty(record)?;
        // Write-then-rename so a reader never sees a half-written record.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!("wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    async fn load(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<ResourceRecord> {
        check(cancel)?;
        let path = self.record_path(resource_type, id)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(resource_type, id));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&content)?)
    }

    async fn delete(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        check(cancel)?;
        let path = self.record_path(resource_type, id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        resource_type: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<String>> {
        check(cancel)?;
        let dir = self.type_dir(resource_type)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
