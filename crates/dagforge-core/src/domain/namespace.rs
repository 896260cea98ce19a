//! Shared namespace for generated workflows
//!
//! The namespace is the registry an execution engine scans for runnable
//! workflows. It is shared with code that has nothing to do with generation,
//! so every entry says what it is: a graph generated from a configuration
//! source, a graph registered by other code, or an arbitrary value.

use crate::domain::graph::WorkflowGraph;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Where a set of workflow definitions was loaded from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigSource {
    /// A configuration file on disk
    File(PathBuf),

    /// A document handed over in memory, identified by a caller-chosen name
    Inline(String),
}

impl ConfigSource {
    /// Name given to in-memory documents that were not named explicitly
    pub const DEFAULT_INLINE_NAME: &'static str = "default";

    /// An in-memory source called `name`
    pub fn inline(name: impl Into<String>) -> Self {
        ConfigSource::Inline(name.into())
    }

    /// The file this source was loaded from, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::File(path) => Some(path),
            ConfigSource::Inline(_) => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Inline(name) => write!(f, "<inline:{}>", name),
        }
    }
}

/// Tag attached to every graph published by the workflow factory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationMarker {
    /// Configuration source the graph was generated from
    pub source: ConfigSource,
}

impl GenerationMarker {
    /// Create a marker for the given source
    pub fn new(source: ConfigSource) -> Self {
        Self { source }
    }
}

/// An entry of the shared namespace
#[derive(Debug, Clone, PartialEq)]
pub enum NamespaceEntry {
    /// A workflow graph generated from configuration
    Generated {
        /// The generated graph
        graph: Arc<WorkflowGraph>,
        /// Marker naming the generating source
        marker: GenerationMarker,
    },

    /// A workflow graph registered by other code
    Workflow(Arc<WorkflowGraph>),

    /// Anything else living in the namespace
    Value(serde_json::Value),
}

impl NamespaceEntry {
    /// Wrap a freshly generated graph
    pub fn generated(graph: WorkflowGraph, marker: GenerationMarker) -> Self {
        NamespaceEntry::Generated {
            graph: Arc::new(graph),
            marker,
        }
    }

    /// The workflow graph held by this entry, generated or not
    pub fn graph(&self) -> Option<&WorkflowGraph> {
        match self {
            NamespaceEntry::Generated { graph, .. } | NamespaceEntry::Workflow(graph) => {
                Some(graph)
            }
            NamespaceEntry::Value(_) => None,
        }
    }

    /// The generation marker, if this entry was generated
    pub fn marker(&self) -> Option<&GenerationMarker> {
        match self {
            NamespaceEntry::Generated { marker, .. } => Some(marker),
            _ => None,
        }
    }

    /// Whether this entry was generated from `source`
    pub fn is_generated_by(&self, source: &ConfigSource) -> bool {
        self.marker().is_some_and(|marker| &marker.source == source)
    }
}

/// Registry of named entries read by the execution engine
///
/// Operations are individually atomic; a sequence of operations is not.
pub trait WorkflowNamespace: Send + Sync {
    /// Insert an entry, replacing any entry with the same name
    fn publish(&self, name: &str, entry: NamespaceEntry) -> Result<(), CoreError>;

    /// Remove an entry, returning it if it existed
    fn remove(&self, name: &str) -> Result<Option<NamespaceEntry>, CoreError>;

    /// Look up an entry
    fn get(&self, name: &str) -> Result<Option<NamespaceEntry>, CoreError>;

    /// Copy of all entries, ordered by name
    fn snapshot(&self) -> Result<BTreeMap<String, NamespaceEntry>, CoreError>;

    /// Whether an entry exists under `name`
    fn contains(&self, name: &str) -> Result<bool, CoreError> {
        Ok(self.get(name)?.is_some())
    }

    /// Names of all entries, sorted
    fn names(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.snapshot()?.into_keys().collect())
    }
}

/// In-memory implementation of the workflow namespace
#[derive(Debug, Default, Clone)]
pub struct MemoryNamespace {
    entries: Arc<RwLock<HashMap<String, NamespaceEntry>>>,
}

impl MemoryNamespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the namespace has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkflowNamespace for MemoryNamespace {
    fn publish(&self, name: &str, entry: NamespaceEntry) -> Result<(), CoreError> {
        let mut entries = self.entries.write().map_err(|e| {
            CoreError::NamespaceError(format!("Failed to acquire write lock: {}", e))
        })?;

        if entries.insert(name.to_string(), entry).is_some() {
            tracing::trace!(name, "Replaced namespace entry");
        }

        Ok(())
    }

    fn remove(&self, name: &str) -> Result<Option<NamespaceEntry>, CoreError> {
        let mut entries = self.entries.write().map_err(|e| {
            CoreError::NamespaceError(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(entries.remove(name))
    }

    fn get(&self, name: &str) -> Result<Option<NamespaceEntry>, CoreError> {
        let entries = self.entries.read().map_err(|e| {
            CoreError::NamespaceError(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries.get(name).cloned())
    }

    fn snapshot(&self) -> Result<BTreeMap<String, NamespaceEntry>, CoreError> {
        let entries = self.entries.read().map_err(|e| {
            CoreError::NamespaceError(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{DefaultArgs, StartDate, WorkflowId, WorkflowParams};
    use serde_json::json;
    use std::time::Duration;

    fn graph(id: &str) -> WorkflowGraph {
        WorkflowGraph::new(
            WorkflowId::from(id),
            WorkflowParams::new(DefaultArgs::starting(StartDate::Relative(
                Duration::from_secs(86_400),
            ))),
        )
    }

    fn file_source(name: &str) -> ConfigSource {
        ConfigSource::File(PathBuf::from(format!("/etc/workflows/{name}.yml")))
    }

    #[test]
    fn test_publish_overwrites_existing_entry() {
        let namespace = MemoryNamespace::new();
        namespace
            .publish("example_dag", NamespaceEntry::Value(json!({"unrelated": true})))
            .unwrap();
        namespace
            .publish(
                "example_dag",
                NamespaceEntry::generated(graph("example_dag"), GenerationMarker::new(ConfigSource::inline("a"))),
            )
            .unwrap();

        let entry = namespace.get("example_dag").unwrap().unwrap();
        assert_eq!(entry.graph().map(|g| g.id.as_str()), Some("example_dag"));
        assert_eq!(namespace.len(), 1);
    }

    #[test]
    fn test_remove_and_contains() {
        let namespace = MemoryNamespace::new();
        namespace
            .publish("helper", NamespaceEntry::Value(json!(42)))
            .unwrap();

        assert!(namespace.contains("helper").unwrap());
        assert_eq!(
            namespace.remove("helper").unwrap(),
            Some(NamespaceEntry::Value(json!(42)))
        );
        assert!(!namespace.contains("helper").unwrap());
        assert_eq!(namespace.remove("helper").unwrap(), None);
        assert!(namespace.is_empty());
    }

    #[test]
    fn test_snapshot_is_ordered_copy() {
        let namespace = MemoryNamespace::new();
        namespace.publish("b", NamespaceEntry::Value(json!("b"))).unwrap();
        namespace.publish("a", NamespaceEntry::Value(json!("a"))).unwrap();

        let snapshot = namespace.snapshot().unwrap();
        namespace.remove("a").unwrap();

        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(namespace.len(), 1);
        assert_eq!(namespace.names().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_generation_marker_matching() {
        let generated = NamespaceEntry::generated(
            graph("a"),
            GenerationMarker::new(file_source("first")),
        );
        let foreign = NamespaceEntry::Workflow(Arc::new(graph("b")));
        let value = NamespaceEntry::Value(json!(null));

        assert!(generated.is_generated_by(&file_source("first")));
        assert!(!generated.is_generated_by(&file_source("second")));
        assert!(!generated.is_generated_by(&ConfigSource::inline("first")));
        assert!(!foreign.is_generated_by(&ConfigSource::inline("first")));
        assert!(foreign.marker().is_none());
        assert!(foreign.graph().is_some());
        assert!(value.graph().is_none());
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::inline("nightly").to_string(), "<inline:nightly>");
        assert_eq!(file_source("daily").to_string(), "/etc/workflows/daily.yml");
    }

    #[test]
    fn test_inline_sources_are_told_apart_by_name() {
        let entry = NamespaceEntry::generated(
            graph("a"),
            GenerationMarker::new(ConfigSource::inline("one")),
        );

        assert!(entry.is_generated_by(&ConfigSource::inline("one")));
        assert!(!entry.is_generated_by(&ConfigSource::inline("two")));
        assert_eq!(ConfigSource::inline("one").path(), None);
        assert_eq!(
            file_source("daily").path(),
            Some(Path::new("/etc/workflows/daily.yml"))
        );
    }
}
