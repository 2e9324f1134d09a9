//! Tessera Core - Resource model, collaborator traits, and error handling

pub mod error;
pub mod provider;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use provider::{Provider, ProviderError, ProviderResult};
pub use storage::{Storage, StorageError, StorageResult};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
