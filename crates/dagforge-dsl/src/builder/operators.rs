use crate::error::DslError;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

/// Runs a shell command
pub const BASH: &str = "bash";

/// Calls a function loaded from a file
pub const PYTHON: &str = "python";

/// Does nothing; used to join branches
pub const EMPTY: &str = "empty";

/// Waits on a task in another workflow
pub const EXTERNAL_TASK_SENSOR: &str = "external_task_sensor";

/// Describes the parameters an operator type accepts
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorSpec {
    type_id: String,
    required: Vec<String>,
    defaults: BTreeMap<String, Value>,
}

impl OperatorSpec {
    /// An operator type with no required parameters
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            required: Vec::new(),
            defaults: BTreeMap::new(),
        }
    }

    /// Mark a parameter as required
    pub fn require(mut self, param: impl Into<String>) -> Self {
        self.required.push(param.into());
        self
    }

    /// Fill a parameter with `value` when a task leaves it out
    pub fn with_default(mut self, param: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(param.into(), value);
        self
    }

    /// Operator type identifier
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Parameters a task must set
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Check required parameters and fill in defaults
    pub fn apply(&self, task_id: &str, params: &mut BTreeMap<String, Value>) -> Result<(), DslError> {
        for param in &self.required {
            if params.get(param).map_or(true, Value::is_null) {
                return Err(DslError::MissingOperatorParam {
                    task: task_id.to_string(),
                    operator: self.type_id.clone(),
                    param: param.clone(),
                });
            }
        }

        for (param, value) in &self.defaults {
            params.entry(param.clone()).or_insert_with(|| value.clone());
        }

        Ok(())
    }
}

/// Operator types a compiler can instantiate, keyed by type id
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    specs: HashMap<String, OperatorSpec>,
}

impl OperatorRegistry {
    /// A registry without any operator
    pub fn empty() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    /// A registry with the built-in operator types
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(OperatorSpec::new(BASH).require("bash_command"));
        registry.register(
            OperatorSpec::new(PYTHON)
                .require("python_callable_name")
                .require("python_callable_file"),
        );
        registry.register(OperatorSpec::new(EMPTY));
        registry.register(
            OperatorSpec::new(EXTERNAL_TASK_SENSOR)
                .require("external_dag_id")
                .with_default("external_task_id", Value::Null)
                .with_default("poke_interval", json!(60))
                .with_default("timeout", json!(3600))
                .with_default("executed_hours_ago", json!(24))
                .with_default("executed_same_day", json!(true))
                .with_default("allowed_states", json!(["success"]))
                .with_default("failed_states", json!(["failed"])),
        );
        registry
    }

    /// Register an operator type, returning the spec it replaced
    pub fn register(&mut self, spec: OperatorSpec) -> Option<OperatorSpec> {
        self.specs.insert(spec.type_id.clone(), spec)
    }

    /// Look up an operator type
    pub fn get(&self, type_id: &str) -> Option<&OperatorSpec> {
        self.specs.get(type_id)
    }

    /// Whether an operator type is registered
    pub fn contains(&self, type_id: &str) -> bool {
        self.specs.contains_key(type_id)
    }

    /// Registered type ids, sorted
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.specs.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
