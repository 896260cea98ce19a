//! Build orchestration and namespace reconciliation
//!
//! A [`WorkflowFactory`] owns one configuration source. It compiles every
//! definition of that source, publishes the resulting graphs into a
//! [`WorkflowNamespace`] and retracts graphs it generated earlier whose
//! definitions are gone. Entries it did not generate are never touched.

use dagforge_core::{
    ConfigSource, GenerationMarker, NamespaceEntry, WorkflowGraph, WorkflowId, WorkflowNamespace,
};
use dagforge_dsl::document::value_kind;
use dagforge_dsl::{
    ConfigDocument, ConfigResolver, DagBuilder, DslError, WorkflowCompiler, TASK_GROUPS_KEY,
};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{FactoryError, FactoryResult};

/// Graphs produced by one build, keyed by workflow id
pub type BuildResult = BTreeMap<WorkflowId, WorkflowGraph>;

/// Outcome of one build, publish and retract cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Source the cycle ran for
    pub source: ConfigSource,

    /// Workflows published, ordered by id
    pub published: Vec<WorkflowId>,

    /// Stale workflows retracted, ordered by name
    pub removed: Vec<String>,
}

/// Generates workflows from one configuration source
#[derive(Debug, Clone)]
pub struct WorkflowFactory<C = DagBuilder> {
    resolver: ConfigResolver,
    compiler: C,
}

impl WorkflowFactory<DagBuilder> {
    /// Construct from exactly one of a file path or a parsed document
    pub fn new(path: Option<&Path>, document: Option<ConfigDocument>) -> FactoryResult<Self> {
        let resolver = ConfigResolver::new(path, document)?;
        Ok(Self::with_compiler(resolver, DagBuilder::new()))
    }

    /// Load the configuration file at an absolute path
    pub fn from_path(path: impl AsRef<Path>) -> FactoryResult<Self> {
        let resolver = ConfigResolver::from_path(path)?;
        Ok(Self::with_compiler(resolver, DagBuilder::new()))
    }

    /// Use an in-memory configuration document.
    ///
    /// Unnamed documents share one source; see [`WorkflowFactory::from_named_document`].
    pub fn from_document(document: ConfigDocument) -> FactoryResult<Self> {
        let resolver = ConfigResolver::from_document(document)?;
        Ok(Self::with_compiler(resolver, DagBuilder::new()))
    }

    /// Use an in-memory configuration document under its own source name.
    ///
    /// Factories with different names never retract each other's workflows.
    pub fn from_named_document(
        name: impl Into<String>,
        document: ConfigDocument,
    ) -> FactoryResult<Self> {
        let resolver = ConfigResolver::from_named_document(name, document)?;
        Ok(Self::with_compiler(resolver, DagBuilder::new()))
    }
}

impl<C: WorkflowCompiler> WorkflowFactory<C> {
    /// Pair a resolver with a custom compiler
    pub fn with_compiler(resolver: ConfigResolver, compiler: C) -> Self {
        Self { resolver, compiler }
    }

    /// The configuration resolver
    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// The configuration resolver, for in-memory edits between cycles
    pub fn resolver_mut(&mut self) -> &mut ConfigResolver {
        &mut self.resolver
    }

    /// The compiler used for each definition
    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Where this factory's configuration came from
    pub fn source(&self) -> &ConfigSource {
        self.resolver.source()
    }

    /// Compile every definition.
    ///
    /// Stops at the first failing definition. When two definitions compile to
    /// the same workflow id, the later one in document order wins.
    pub fn build(&self) -> FactoryResult<BuildResult> {
        let defaults = self.resolver.defaults();
        let mut built = BuildResult::new();

        for (key, definition) in &self.resolver.definitions() {
            let key = key.as_str().unwrap_or_default();

            let workflow = prepare_definition(definition)
                .and_then(|definition| self.compiler.compile(key, &definition, &defaults))
                .map_err(|source| FactoryError::DefinitionBuild {
                    workflow: key.to_string(),
                    source,
                })?;

            debug!(key, workflow = %workflow.workflow_id, "Compiled workflow definition");
            built.insert(workflow.workflow_id, workflow.graph);
        }

        Ok(built)
    }

    /// Publish built graphs, replacing whatever is stored under the same names
    pub fn register(
        &self,
        built: BuildResult,
        namespace: &(impl WorkflowNamespace + ?Sized),
    ) -> FactoryResult<Vec<WorkflowId>> {
        let marker = GenerationMarker::new(self.source().clone());
        let mut published = Vec::with_capacity(built.len());

        for (workflow_id, graph) in built {
            namespace.publish(
                workflow_id.as_str(),
                NamespaceEntry::generated(graph, marker.clone()),
            )?;
            published.push(workflow_id);
        }

        info!(
            source = %self.source(),
            workflows = published.len(),
            "Published workflows"
        );

        Ok(published)
    }

    /// Build and publish
    pub fn generate(
        &self,
        namespace: &(impl WorkflowNamespace + ?Sized),
    ) -> FactoryResult<Vec<WorkflowId>> {
        let built = self.build()?;
        self.register(built, namespace)
    }

    /// Rebuild and retract generated workflows that are no longer defined.
    ///
    /// Returns the names removed. Running it twice without a configuration
    /// change removes nothing the second time.
    pub fn clean(&self, namespace: &(impl WorkflowNamespace + ?Sized)) -> FactoryResult<Vec<String>> {
        let current: Vec<WorkflowId> = self.build()?.into_keys().collect();
        self.retract_stale(&current, namespace)
    }

    /// Build once, publish the result and retract against that same result
    pub fn run_cycle(
        &self,
        namespace: &(impl WorkflowNamespace + ?Sized),
    ) -> FactoryResult<CycleReport> {
        let _span = tracing::info_span!("workflow_cycle", source = %self.source()).entered();

        let built = self.build()?;
        let current: Vec<WorkflowId> = built.keys().cloned().collect();
        let published = self.register(built, namespace)?;
        let removed = self.retract_stale(&current, namespace)?;

        Ok(CycleReport {
            source: self.source().clone(),
            published,
            removed,
        })
    }

    /// Remove entries generated from this source whose names are not in `current`
    fn retract_stale(
        &self,
        current: &[WorkflowId],
        namespace: &(impl WorkflowNamespace + ?Sized),
    ) -> FactoryResult<Vec<String>> {
        let source = self.source();

        let stale: Vec<String> = namespace
            .snapshot()?
            .into_iter()
            .filter(|(name, entry)| {
                entry.is_generated_by(source) && !current.iter().any(|id| id.as_str() == name)
            })
            .map(|(name, _)| name)
            .collect();

        for name in &stale {
            namespace.remove(name)?;
            info!(source = %source, workflow = %name, "Removed stale workflow");
        }

        Ok(stale)
    }
}

/// Give a definition an empty task-group mapping unless it has one
fn prepare_definition(definition: &Value) -> Result<Mapping, DslError> {
    let mut definition = match definition {
        Value::Mapping(definition) => definition.clone(),
        other => {
            return Err(DslError::InvalidDefinition(format!(
                "a workflow definition must be a mapping, found {}",
                value_kind(other)
            )))
        }
    };

    match definition.get(TASK_GROUPS_KEY) {
        None | Some(Value::Null) => {
            definition.insert(
                Value::String(TASK_GROUPS_KEY.to_string()),
                Value::Mapping(Mapping::new()),
            );
        }
        Some(_) => {}
    }

    Ok(definition)
}
