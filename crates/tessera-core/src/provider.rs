//! Provider trait

use crate::types::Fields;
use tokio_util::sync::CancellationToken;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Provider error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend resource not found: {0}")]
    NotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Backend(String),
}

/// Backend adapter for one resource type.
///
/// Every call receives the run-wide cancellation token. Implementations that
/// block on a slow backend should race their work against `cancel` and
/// return [`ProviderError::Cancelled`] when it fires.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Resource type this provider serves when registered without an explicit type.
    fn resource_type(&self) -> &str;

    /// Create the backend resource and return its backend identifier.
    async fn create(&self, args: &Fields, cancel: &CancellationToken) -> ProviderResult<String>;

    /// Read the live attributes of a backend resource.
    async fn read(&self, backend_id: &str, cancel: &CancellationToken) -> ProviderResult<Fields>;

    async fn update(
        &self,
        backend_id: &str,
        args: &Fields,
        cancel: &CancellationToken,
    ) -> ProviderResult<()>;

    async fn delete(&self, backend_id: &str, cancel: &CancellationToken) -> ProviderResult<()>;

    /// Values other resources may consume as inputs.
    async fn outputs(&self, backend_id: &str, cancel: &CancellationToken)
        -> ProviderResult<Fields>;
}
