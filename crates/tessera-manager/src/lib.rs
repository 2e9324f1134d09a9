//! Tessera Manager - routes resource operations to providers and persists records

pub mod manager;
pub mod registry;
pub mod storage;

pub use manager::ResourceManager;
pub use registry::ProviderRegistry;
pub use storage::{FsStorage, MemoryStorage};
