//! Per-definition compilation
//!
//! A [`WorkflowCompiler`] turns one workflow definition plus the shared
//! defaults of its document into a [`WorkflowGraph`]. [`DagBuilder`] is the
//! compiler shipped with this crate; hosts with their own task model can
//! plug in a different one.

mod operators;
mod params;

pub use operators::{OperatorRegistry, OperatorSpec, BASH, EMPTY, EXTERNAL_TASK_SENSOR, PYTHON};
pub use params::{
    merge_settings, parse_start_date, parse_timestamp, WorkflowSettings, DEFAULT_ARGS_KEY,
};

use crate::document::value_kind;
use crate::error::DslError;
use dagforge_core::{TaskGroup, TaskNode, WorkflowGraph, WorkflowId};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of compiling one definition
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltWorkflow {
    /// ID assigned by the compiler; may differ from the configuration key
    pub workflow_id: WorkflowId,

    /// The compiled graph
    pub graph: WorkflowGraph,
}

/// Compiles a single workflow definition
pub trait WorkflowCompiler {
    /// Compile the definition configured under `key`
    fn compile(
        &self,
        key: &str,
        definition: &Mapping,
        defaults: &Mapping,
    ) -> Result<BuiltWorkflow, DslError>;
}

#[derive(Debug, Deserialize)]
struct RawTask {
    operator: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    task_group_name: Option<String>,
    execution_timeout_secs: Option<u64>,
    #[serde(flatten)]
    params: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTaskGroup {
    tooltip: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Compiles definitions into task graphs using an operator registry
#[derive(Debug, Clone, Default)]
pub struct DagBuilder {
    operators: OperatorRegistry,
}

impl DagBuilder {
    /// A builder with the built-in operators
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder with a custom operator registry
    pub fn with_operators(operators: OperatorRegistry) -> Self {
        Self { operators }
    }

    /// The operator registry
    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    /// The operator registry, for registering extra operator types
    pub fn operators_mut(&mut self) -> &mut OperatorRegistry {
        &mut self.operators
    }

    /// Build one task from its configuration
    pub fn make_task(&self, task_id: &str, config: &Value) -> Result<TaskNode, DslError> {
        let raw: RawTask =
            serde_yaml::from_value(config.clone()).map_err(|source| DslError::Decode {
                context: format!("task {task_id}"),
                source,
            })?;

        let operator = raw
            .operator
            .ok_or_else(|| DslError::MissingRequiredField(format!("tasks.{task_id}.operator")))?;
        let spec = self
            .operators
            .get(&operator)
            .ok_or_else(|| DslError::UnknownOperator(operator.clone()))?;

        let mut params = raw.params;
        spec.apply(task_id, &mut params)?;

        Ok(TaskNode {
            task_id: task_id.to_string(),
            operator,
            params,
            upstream: raw.dependencies.into_iter().collect(),
            task_group: raw.task_group_name,
            execution_timeout: raw.execution_timeout_secs.map(Duration::from_secs),
        })
    }

    fn make_task_group(group_id: &str, config: &Value) -> Result<TaskGroup, DslError> {
        let raw = match config {
            Value::Null => RawTaskGroup::default(),
            config => serde_yaml::from_value(config.clone()).map_err(|source| DslError::Decode {
                context: format!("task group {group_id}"),
                source,
            })?,
        };

        Ok(TaskGroup {
            group_id: group_id.to_string(),
            tooltip: raw.tooltip,
            dependencies: raw.dependencies,
        })
    }

    /// Every task of a group waits for every task of the groups it depends on
    fn link_task_groups(graph: &mut WorkflowGraph) -> Result<(), DslError> {
        let mut edges = Vec::new();
        for group in graph.task_groups() {
            let downstream = graph.group_task_ids(&group.group_id);
            for upstream_group in &group.dependencies {
                for upstream in graph.group_task_ids(upstream_group) {
                    for task in &downstream {
                        edges.push((upstream.to_string(), task.to_string()));
                    }
                }
            }
        }

        for (upstream, downstream) in edges {
            graph.add_dependency(&upstream, &downstream)?;
        }
        Ok(())
    }
}

impl WorkflowCompiler for DagBuilder {
    fn compile(
        &self,
        key: &str,
        definition: &Mapping,
        defaults: &Mapping,
    ) -> Result<BuiltWorkflow, DslError> {
        let merged = merge_settings(definition, defaults);
        let settings = WorkflowSettings::decode(key, merged)?;

        let workflow_id = WorkflowId::new(settings.dag_id.unwrap_or_else(|| key.to_string()));
        let mut graph = WorkflowGraph::new(workflow_id.clone(), settings.params);

        for (group_id, config) in &settings.task_groups {
            let group_id = entry_key(group_id, "task group")?;
            graph.add_task_group(Self::make_task_group(group_id, config)?);
        }

        for (task_id, config) in &settings.tasks {
            let task_id = entry_key(task_id, "task")?;
            graph.add_task(self.make_task(task_id, config)?)?;
        }

        Self::link_task_groups(&mut graph)?;
        graph.validate()?;

        tracing::trace!(
            workflow = %workflow_id,
            tasks = graph.task_count(),
            "Compiled workflow definition"
        );

        Ok(BuiltWorkflow { workflow_id, graph })
    }
}

fn entry_key<'a>(key: &'a Value, what: &str) -> Result<&'a str, DslError> {
    key.as_str().ok_or_else(|| {
        DslError::InvalidDefinition(format!("{what} id must be a string, found {}", value_kind(key)))
    })
}
