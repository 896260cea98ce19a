use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Value object: Workflow ID
///
/// The identifier a workflow is published under. It usually equals the
/// configuration key of its definition, but a compiler may rename it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    /// Create a workflow id
    pub fn new(id: impl Into<String>) -> Self {
        WorkflowId(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkflowId {
    fn from(s: String) -> Self {
        WorkflowId(s)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        WorkflowId(s.to_string())
    }
}

impl AsRef<str> for WorkflowId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// When a workflow starts scheduling runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartDate {
    /// A fixed point in time
    Absolute(DateTime<Utc>),

    /// A span before the moment the engine loads the workflow (e.g. "2 days")
    Relative(Duration),
}

impl StartDate {
    /// Resolve the start date against the given load time
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            StartDate::Absolute(at) => *at,
            StartDate::Relative(ago) => chrono::Duration::from_std(*ago)
                .ok()
                .and_then(|ago| now.checked_sub_signed(ago))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }
}

/// Arguments applied to every task of a workflow unless the task overrides them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultArgs {
    /// Owner of the workflow's tasks
    pub owner: Option<String>,

    /// First schedulable date
    pub start_date: StartDate,

    /// Last schedulable date
    pub end_date: Option<DateTime<Utc>>,

    /// Number of retries per task
    pub retries: Option<u32>,

    /// Delay between task retries
    pub retry_delay: Option<Duration>,

    /// Arguments passed through untouched
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DefaultArgs {
    /// Default arguments with only a start date set
    pub fn starting(start_date: StartDate) -> Self {
        Self {
            owner: None,
            start_date,
            end_date: None,
            retries: None,
            retry_delay: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Workflow-level parameters after defaults have been merged in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowParams {
    /// Arguments applied to every task
    pub default_args: DefaultArgs,

    /// Human-readable description
    pub description: Option<String>,

    /// Cron expression or preset the engine schedules runs with
    pub schedule_interval: Option<String>,

    /// Maximum number of concurrently running tasks
    pub concurrency: Option<u32>,

    /// Maximum number of concurrently active runs
    pub max_active_runs: Option<u32>,

    /// Timeout of a single run
    pub dagrun_timeout: Option<Duration>,

    /// Whether missed intervals are back-filled
    pub catchup: Option<bool>,

    /// Default view in the engine's UI
    pub default_view: Option<String>,

    /// Graph orientation in the engine's UI
    pub orientation: Option<String>,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Markdown documentation
    pub doc_md: Option<String>,

    /// Parameters this crate does not interpret
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl WorkflowParams {
    /// Parameters with only the default arguments set
    pub fn new(default_args: DefaultArgs) -> Self {
        Self {
            default_args,
            description: None,
            schedule_interval: None,
            concurrency: None,
            max_active_runs: None,
            dagrun_timeout: None,
            catchup: None,
            default_view: None,
            orientation: None,
            tags: Vec::new(),
            doc_md: None,
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_workflow_id_conversions() {
        let id = WorkflowId::from("example_dag");
        assert_eq!(id.as_str(), "example_dag");
        assert_eq!(id.to_string(), "example_dag");
        assert_eq!(id, WorkflowId::new(String::from("example_dag")));
    }

    #[test]
    fn test_start_date_resolution() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let absolute = Utc.with_ymd_and_hms(2018, 3, 1, 0, 0, 0).unwrap();

        assert_eq!(StartDate::Absolute(absolute).resolve(now), absolute);
        assert_eq!(
            StartDate::Relative(Duration::from_secs(2 * 86_400)).resolve(now),
            Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap()
        );
    }
}
