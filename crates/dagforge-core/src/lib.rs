//!
//! Dagforge Core - domain model for generated workflows
//!
//! This crate defines the workflow graph produced from a configuration
//! document and the namespace that generated graphs are published into.
//! It is the foundation for the other crates in the workspace.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - workflow graphs, parameters and the shared namespace
pub mod domain;

/// Error types
pub mod error;

// Re-export key types
pub use error::CoreError;

pub use domain::graph::{TaskGroup, TaskNode, WorkflowGraph};
pub use domain::namespace::{
    ConfigSource, GenerationMarker, MemoryNamespace, NamespaceEntry, WorkflowNamespace,
};
pub use domain::workflow::{DefaultArgs, StartDate, WorkflowId, WorkflowParams};
