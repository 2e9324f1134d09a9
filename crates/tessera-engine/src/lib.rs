//! Tessera Engine - dependency-ordered execution with rollback
//!
//! The engine takes a resolved [`Plan`] and drives every resource through the
//! [`ResourceManager`](tessera_manager::ResourceManager), either one at a time
//! or as a ready-set of concurrent tasks. Any failure rolls back what the run
//! created, dependents before dependencies.

pub mod config;
pub mod error;
pub mod executor;
pub mod report;
pub mod substitute;

pub use config::{EngineConfig, ExecutionMode};
pub use error::ExecuteError;
pub use executor::Engine;
pub use report::{CreatedResource, RollbackFailure, RollbackReport, RunReport, RunState};
pub use tessera_graph::Plan;
