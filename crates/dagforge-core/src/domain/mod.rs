/// Workflow identifiers and workflow-level parameters
pub mod workflow;

/// Task graph of a single workflow
pub mod graph;

/// Shared namespace that generated workflows are published into
pub mod namespace;
