//! Storage trait: pluggable persistence for resource records.

use crate::types::ResourceRecord;
use tokio_util::sync::CancellationToken;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Record persistence. Records are addressed by `(type, id)`.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, record: &ResourceRecord, cancel: &CancellationToken) -> StorageResult<()>;

    /// Load a record, failing with [`StorageError::NotFound`] if absent.
    async fn load(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<ResourceRecord>;

    /// Delete a record. Deleting an absent record succeeds.
    async fn delete(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;

    /// Record ids of one type, sorted.
    async fn list(
        &self,
        resource_type: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<String>>;
}
