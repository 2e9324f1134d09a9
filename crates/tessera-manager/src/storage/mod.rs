//! Storage backends for resource records.
//!
//! Today: in-memory and local filesystem. Anything implementing
//! [`tessera_core::Storage`] can be plugged into the manager.

mod fs;
mod memory;

pub use fs::FsStorage;
pub use memory::MemoryStorage;
