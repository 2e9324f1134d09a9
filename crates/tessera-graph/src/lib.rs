//! Tessera Graph - dependency graph construction and plan resolution

pub mod graph;
pub mod planner;

pub use graph::{DependencyGraph, DependencyNode};
pub use planner::{plan, Plan, PlannedNode};
