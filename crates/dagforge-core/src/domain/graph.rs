use crate::domain::workflow::{WorkflowId, WorkflowParams};
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::time::Duration;

/// A task in a workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    /// ID of the task, unique within its workflow
    pub task_id: String,

    /// Operator type the engine instantiates for this task
    pub operator: String,

    /// Operator parameters
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,

    /// Tasks that must finish before this task starts
    #[serde(default)]
    pub upstream: BTreeSet<String>,

    /// Task group this task belongs to
    pub task_group: Option<String>,

    /// Timeout of a single task execution
    pub execution_timeout: Option<Duration>,
}

impl TaskNode {
    /// Create a task with no parameters and no dependencies
    pub fn new(task_id: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            operator: operator.into(),
            params: BTreeMap::new(),
            upstream: BTreeSet::new(),
            task_group: None,
            execution_timeout: None,
        }
    }

    /// Add an upstream dependency
    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        self.upstream.insert(task_id.into());
        self
    }

    /// Place the task in a group
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.task_group = Some(group_id.into());
        self
    }
}

/// A named group of tasks rendered and ordered as a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    /// ID of the group
    pub group_id: String,

    /// Tooltip shown by the engine's UI
    pub tooltip: Option<String>,

    /// Groups that must finish before this group starts
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl TaskGroup {
    /// Create an empty group
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            tooltip: None,
            dependencies: Vec::new(),
        }
    }
}

/// A compiled workflow: parameters plus a directed acyclic graph of tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// ID the workflow is published under
    pub id: WorkflowId,

    /// Workflow-level parameters
    pub params: WorkflowParams,

    tasks: BTreeMap<String, TaskNode>,

    task_groups: BTreeMap<String, TaskGroup>,
}

impl WorkflowGraph {
    /// Create a workflow without tasks
    pub fn new(id: WorkflowId, params: WorkflowParams) -> Self {
        Self {
            id,
            params,
            tasks: BTreeMap::new(),
            task_groups: BTreeMap::new(),
        }
    }

    /// Add a task; task ids must be unique
    pub fn add_task(&mut self, task: TaskNode) -> Result<(), CoreError> {
        if self.tasks.contains_key(&task.task_id) {
            return Err(CoreError::DuplicateTask(task.task_id));
        }
        self.tasks.insert(task.task_id.clone(), task);
        Ok(())
    }

    /// Add a task group, replacing a group with the same id
    pub fn add_task_group(&mut self, group: TaskGroup) {
        self.task_groups.insert(group.group_id.clone(), group);
    }

    /// Make `downstream` wait for `upstream`
    pub fn add_dependency(&mut self, upstream: &str, downstream: &str) -> Result<(), CoreError> {
        let task = self
            .tasks
            .get_mut(downstream)
            .ok_or_else(|| CoreError::TaskNotFound(downstream.to_string()))?;
        task.upstream.insert(upstream.to_string());
        Ok(())
    }

    /// Look up a task
    pub fn task(&self, task_id: &str) -> Option<&TaskNode> {
        self.tasks.get(task_id)
    }

    /// All tasks, ordered by id
    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.tasks.values()
    }

    /// Number of tasks
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Look up a task group
    pub fn task_group(&self, group_id: &str) -> Option<&TaskGroup> {
        self.task_groups.get(group_id)
    }

    /// All task groups, ordered by id
    pub fn task_groups(&self) -> impl Iterator<Item = &TaskGroup> {
        self.task_groups.values()
    }

    /// IDs of the tasks placed in a group
    pub fn group_task_ids(&self, group_id: &str) -> BTreeSet<&str> {
        self.tasks
            .values()
            .filter(|task| task.task_group.as_deref() == Some(group_id))
            .map(|task| task.task_id.as_str())
            .collect()
    }

    /// IDs of the tasks that directly wait for `task_id`
    pub fn downstream_task_ids(&self, task_id: &str) -> BTreeSet<&str> {
        self.tasks
            .values()
            .filter(|task| task.upstream.contains(task_id))
            .map(|task| task.task_id.as_str())
            .collect()
    }

    /// IDs of the tasks `task_id` directly waits for
    pub fn upstream_task_ids(&self, task_id: &str) -> BTreeSet<&str> {
        self.tasks
            .get(task_id)
            .map(|task| task.upstream.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Validate the workflow graph
    pub fn validate(&self) -> Result<(), CoreError> {
        // Check for valid upstream references
        for task in self.tasks.values() {
            for dep in &task.upstream {
                if !self.tasks.contains_key(dep) {
                    return Err(CoreError::ValidationError(format!(
                        "Task {} references non-existent dependency: {}",
                        task.task_id, dep
                    )));
                }
            }

            if let Some(group) = &task.task_group {
                if !self.task_groups.contains_key(group) {
                    return Err(CoreError::ValidationError(format!(
                        "Task {} references non-existent task group: {}",
                        task.task_id, group
                    )));
                }
            }
        }

        for group in self.task_groups.values() {
            for dep in &group.dependencies {
                if !self.task_groups.contains_key(dep) {
                    return Err(CoreError::ValidationError(format!(
                        "Task group {} references non-existent task group: {}",
                        group.group_id, dep
                    )));
                }
            }
        }

        // Check for cycles in dependencies
        self.check_for_cycles()
    }

    /// Order tasks so that every task comes after its upstream tasks.
    /// Ties are broken by task id.
    pub fn topological_order(&self) -> Result<Vec<&str>, CoreError> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .tasks
            .values()
            .map(|task| (task.task_id.as_str(), task.upstream.len()))
            .collect();

        let mut ready: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some(task_id) = ready.pop_front() {
            order.push(task_id);
            for downstream in self.downstream_task_ids(task_id) {
                if let Some(degree) = in_degree.get_mut(downstream) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(downstream);
                    }
                }
            }
        }

        if order.len() != self.tasks.len() {
            return Err(CoreError::ValidationError(format!(
                "Workflow {} has no topological order: task dependencies contain a cycle",
                self.id
            )));
        }

        Ok(order)
    }

    /// Check for cycles in the task dependencies
    fn check_for_cycles(&self) -> Result<(), CoreError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        let dep_map: HashMap<&str, &BTreeSet<String>> = self
            .tasks
            .values()
            .map(|task| (task.task_id.as_str(), &task.upstream))
            .collect();

        // DFS for cycle detection
        for task in self.tasks.values() {
            if Self::is_cyclic(task.task_id.as_str(), &dep_map, &mut visited, &mut rec_stack) {
                return Err(CoreError::ValidationError(format!(
                    "Cycle detected in task dependencies involving task: {}",
                    task.task_id
                )));
            }
        }

        Ok(())
    }

    fn is_cyclic<'a>(
        task_id: &'a str,
        dep_map: &HashMap<&'a str, &'a BTreeSet<String>>,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
    ) -> bool {
        if visited.insert(task_id) {
            rec_stack.insert(task_id);

            if let Some(deps) = dep_map.get(task_id) {
                for dep in deps.iter() {
                    let dep = dep.as_str();
                    if rec_stack.contains(dep)
                        || (!visited.contains(dep)
                            && Self::is_cyclic(dep, dep_map, visited, rec_stack))
                    {
                        return true;
                    }
                }
            }
        }

        rec_stack.remove(task_id);
        false
    }
}
