//! Tessera: dependency-ordered infrastructure provisioning.
//!
//! The binary is a thin shell over these modules: settings and stack files
//! are parsed here, and [`setup`] wires providers, storage, and the engine.

pub mod config;
pub mod setup;
pub mod stack;

pub use config::{LogConfig, ProvidersConfig, StorageBackend, StorageConfig, TesseraConfig};
pub use stack::StackFile;
