//! Built-in providers.
//!
//! Each provider is a self-contained module implementing the Provider trait.
//! Register them with a ProviderRegistry before building the manager.

pub mod local_file;
pub mod memory;

pub use local_file::LocalFileProvider;
pub use memory::MemoryProvider;
