//! Error types for Tessera

use crate::provider::ProviderError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown node: {id}")]
    UnknownNode { id: String },

    #[error("dependency cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("invalid argument on '{resource_id}': {message}")]
    InvalidArgument { resource_id: String, message: String },

    #[error("no provider registered for resource type {0}")]
    UnknownProviderType(String),

    #[error("provider error: {resource_type} - {source}")]
    Provider {
        resource_type: String,
        #[source]
        source: ProviderError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The backend resource exists but its record could not be persisted.
    #[error("orphaned {resource_type} resource {backend_id}: {source}")]
    OrphanedResource {
        resource_type: String,
        backend_id: String,
        #[source]
        source: StorageError,
    },

    #[error("unresolved reference '{reference}' in '{resource_id}': {reason}")]
    UnresolvedReference {
        resource_id: String,
        reference: String,
        reason: String,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn unknown_node(id: impl Into<String>) -> Self {
        Self::UnknownNode { id: id.into() }
    }

    pub fn invalid_argument(resource_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            resource_id: resource_id.into(),
            message: message.into(),
        }
    }

    /// Wrap a provider failure, folding provider-side cancellation into [`Error::Cancelled`].
    pub fn provider(resource_type: impl Into<String>, source: ProviderError) -> Self {
        match source {
            ProviderError::Cancelled => Self::Cancelled,
            source => Self::Provider {
                resource_type: resource_type.into(),
                source,
            },
        }
    }

    /// Wrap a storage failure, folding storage-side cancellation into [`Error::Cancelled`].
    pub fn storage(source: StorageError) -> Self {
        match source {
            StorageError::Cancelled => Self::Cancelled,
            source => Self::Storage(source),
        }
    }

    pub fn unresolved(
        resource_id: impl Into<String>,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnresolvedReference {
            resource_id: resource_id.into(),
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::OrphanedResource {
                    source: StorageError::Cancelled,
                    ..
                }
        )
    }

    /// Planning errors are structural: they never involve a backend call.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownNode { .. } | Self::CycleDetected { .. } | Self::InvalidArgument { .. }
        )
    }
}
