use dagforge_core::{
    ConfigSource, GenerationMarker, MemoryNamespace, NamespaceEntry, WorkflowGraph, WorkflowId,
    WorkflowNamespace,
};
use dagforge_dsl::{BuiltWorkflow, ConfigDocument, ConfigResolver, DagBuilder, DslError, WorkflowCompiler};
use dagforge_factory::{FactoryError, WorkflowFactory};
use pretty_assertions::assert_eq;
use serde_json::json;
use serde_yaml::Mapping;
use std::cell::RefCell;
use std::io::Write;
use std::sync::Arc;

const CONFIG: &str = r#"
default:
  default_args:
    owner: default_owner
    start_date: 2018-03-01
    retries: 1
    retry_delay_sec: 300
  concurrency: 1
  schedule_interval: "0 1 * * *"

a:
  tasks:
    task_1:
      operator: bash
      bash_command: echo 1
    task_2:
      operator: bash
      bash_command: echo 2
      dependencies: [task_1]

b:
  description: second workflow
  tasks:
    only:
      operator: empty
"#;

fn factory(yaml: &str) -> WorkflowFactory {
    WorkflowFactory::from_document(ConfigDocument::from_yaml_str(yaml).unwrap()).unwrap()
}

fn ids(ids: &[WorkflowId]) -> Vec<&str> {
    ids.iter().map(WorkflowId::as_str).collect()
}

fn foreign_graph(id: &str) -> WorkflowGraph {
    factory(CONFIG)
        .build()
        .unwrap()
        .remove(&WorkflowId::from("a"))
        .map(|mut graph| {
            graph.id = WorkflowId::from(id);
            graph
        })
        .unwrap()
}

#[test]
fn test_build_returns_every_definition() {
    let built = factory(CONFIG).build().unwrap();

    let keys: Vec<_> = built.keys().map(WorkflowId::as_str).collect();
    assert_eq!(keys, vec!["a", "b"]);
    assert_eq!(built[&WorkflowId::from("a")].task_count(), 2);
    assert_eq!(
        built[&WorkflowId::from("b")].params.description.as_deref(),
        Some("second workflow")
    );
}

#[test]
fn test_build_is_idempotent() {
    let factory = factory(CONFIG);
    assert_eq!(factory.build().unwrap(), factory.build().unwrap());
}

#[test]
fn test_generate_publishes_marked_graphs() {
    let namespace = MemoryNamespace::new();
    let published = factory(CONFIG).generate(&namespace).unwrap();

    assert_eq!(ids(&published), vec!["a", "b"]);
    let entry = namespace.get("a").unwrap().unwrap();
    assert_eq!(
        entry.marker(),
        Some(&GenerationMarker::new(ConfigSource::inline("default")))
    );
    assert_eq!(entry.graph().unwrap().upstream_task_ids("task_2").len(), 1);
}

#[test]
fn test_removed_definition_is_cleaned() {
    let namespace = MemoryNamespace::new();
    let mut factory = factory(CONFIG);
    factory.generate(&namespace).unwrap();
    assert!(namespace.contains("a").unwrap());
    assert!(namespace.contains("b").unwrap());

    factory.resolver_mut().document_mut().remove("b");
    let removed = factory.clean(&namespace).unwrap();

    assert_eq!(removed, vec!["b".to_string()]);
    assert!(namespace.contains("a").unwrap());
    assert!(!namespace.contains("b").unwrap());
}

#[test]
fn test_clean_is_idempotent() {
    let namespace = MemoryNamespace::new();
    let mut factory = factory(CONFIG);
    factory.run_cycle(&namespace).unwrap();

    factory.resolver_mut().document_mut().remove("a");
    assert_eq!(factory.clean(&namespace).unwrap(), vec!["a".to_string()]);

    let before = namespace.snapshot().unwrap();
    assert!(factory.clean(&namespace).unwrap().is_empty());
    assert_eq!(namespace.snapshot().unwrap(), before);
}

#[test]
fn test_clean_never_touches_unmarked_entries() {
    let namespace = MemoryNamespace::new();
    let mut factory = factory(CONFIG);
    factory.generate(&namespace).unwrap();

    namespace
        .publish("helper", NamespaceEntry::Value(json!({"kind": "connection"})))
        .unwrap();
    namespace
        .publish(
            "hand_written",
            NamespaceEntry::Workflow(Arc::new(foreign_graph("hand_written"))),
        )
        .unwrap();

    factory.resolver_mut().document_mut().remove("a");
    factory.resolver_mut().document_mut().remove("b");
    let removed = factory.clean(&namespace).unwrap();

    assert_eq!(removed, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(namespace.names().unwrap(), vec!["hand_written", "helper"]);
}

#[test]
fn test_clean_leaves_other_sources_alone() {
    let namespace = MemoryNamespace::new();
    namespace
        .publish(
            "elsewhere",
            NamespaceEntry::generated(
                foreign_graph("elsewhere"),
                GenerationMarker::new(ConfigSource::File("/etc/workflows/other.yml".into())),
            ),
        )
        .unwrap();

    let report = factory(CONFIG).run_cycle(&namespace).unwrap();

    assert!(report.removed.is_empty());
    assert!(namespace.contains("elsewhere").unwrap());
}

fn single(id: &str) -> ConfigDocument {
    ConfigDocument::from_yaml_str(&format!(
        "default:\n  default_args:\n    start_date: 2018-03-01\n{id}:\n  tasks: {{}}\n"
    ))
    .unwrap()
}

#[test]
fn test_named_documents_keep_their_own_workflows() {
    let namespace = MemoryNamespace::new();
    let one = WorkflowFactory::from_named_document("one", single("one")).unwrap();
    let two = WorkflowFactory::from_named_document("two", single("two")).unwrap();

    one.run_cycle(&namespace).unwrap();
    let report = two.run_cycle(&namespace).unwrap();

    assert!(report.removed.is_empty());
    assert_eq!(namespace.names().unwrap(), vec!["one", "two"]);
    assert!(one.clean(&namespace).unwrap().is_empty());
}

#[test]
fn test_unnamed_documents_share_a_source() {
    let namespace = MemoryNamespace::new();
    let one = WorkflowFactory::from_document(single("one")).unwrap();
    let two = WorkflowFactory::from_document(single("two")).unwrap();

    one.run_cycle(&namespace).unwrap();
    let report = two.run_cycle(&namespace).unwrap();

    assert_eq!(report.removed, vec!["one".to_string()]);
    assert_eq!(namespace.names().unwrap(), vec!["two"]);
}

#[test]
fn test_run_cycle_reports() {
    let namespace = MemoryNamespace::new();
    let mut factory = factory(CONFIG);

    let report = factory.run_cycle(&namespace).unwrap();
    assert_eq!(report.source, ConfigSource::inline("default"));
    assert_eq!(ids(&report.published), vec!["a", "b"]);
    assert!(report.removed.is_empty());

    factory.resolver_mut().document_mut().remove("a");
    let report = factory.run_cycle(&namespace).unwrap();
    assert_eq!(ids(&report.published), vec!["b"]);
    assert_eq!(report.removed, vec!["a".to_string()]);
    assert_eq!(namespace.len(), 1);
}

#[test]
fn test_publish_overwrites_same_name() {
    let namespace = MemoryNamespace::new();
    namespace.publish("a", NamespaceEntry::Value(json!(1))).unwrap();

    factory(CONFIG).generate(&namespace).unwrap();

    assert!(namespace.get("a").unwrap().unwrap().marker().is_some());
}

#[test]
fn test_malformed_document_leaves_namespace_unmodified() {
    let namespace = MemoryNamespace::new();
    namespace.publish("helper", NamespaceEntry::Value(json!(1))).unwrap();

    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    file.write_all(b"a:\n  tasks: [unclosed\n").unwrap();

    let err = WorkflowFactory::from_path(file.path())
        .and_then(|factory| factory.run_cycle(&namespace))
        .unwrap_err();

    assert!(err.is_document_error());
    assert_eq!(err.to_string(), "Invalid workflow configuration file");
    assert_eq!(namespace.names().unwrap(), vec!["helper"]);
}

#[test]
fn test_failing_definition_names_it_and_publishes_nothing() {
    let yaml = r#"
default:
  default_args:
    start_date: 2018-03-01
a:
  tasks: {}
broken:
  tasks:
    task_1:
      operator: bash
c:
  tasks: {}
"#;

    let namespace = MemoryNamespace::new();
    let err = factory(yaml).run_cycle(&namespace).unwrap_err();

    match &err {
        FactoryError::DefinitionBuild { workflow, source } => {
            assert_eq!(workflow, "broken");
            assert!(matches!(source, DslError::MissingOperatorParam { .. }));
        }
        other => panic!("Expected DefinitionBuild, got {:?}", other),
    }
    assert_eq!(err.workflow(), Some("broken"));
    assert!(namespace.is_empty());
}

#[test]
fn test_non_mapping_definition_fails_build() {
    let err = factory("default:\n  default_args:\n    start_date: 2018-03-01\nempty_dag:\n")
        .build()
        .unwrap_err();
    assert_eq!(err.workflow(), Some("empty_dag"));
}

#[test]
fn test_duplicate_ids_last_wins() {
    let yaml = r#"
default:
  default_args:
    start_date: 2018-03-01
first:
  dag_id: shared
  description: first
second:
  dag_id: shared
  description: second
"#;

    let built = factory(yaml).build().unwrap();

    assert_eq!(built.len(), 1);
    assert_eq!(
        built[&WorkflowId::from("shared")].params.description.as_deref(),
        Some("second")
    );
}

#[test]
fn test_precondition() {
    assert!(matches!(
        WorkflowFactory::new(None, None),
        Err(FactoryError::Config(DslError::Precondition(_)))
    ));
}

#[test]
fn test_relative_path_rejected_before_io() {
    let err = WorkflowFactory::from_path("dags/config.yml").unwrap_err();
    assert!(matches!(err, FactoryError::Config(DslError::ConfigPath(_))));
}

/// Records what the orchestrator hands to the compiler
struct RecordingCompiler {
    calls: RefCell<Vec<(String, Mapping, Mapping)>>,
}

impl WorkflowCompiler for RecordingCompiler {
    fn compile(
        &self,
        key: &str,
        definition: &Mapping,
        defaults: &Mapping,
    ) -> Result<BuiltWorkflow, DslError> {
        self.calls
            .borrow_mut()
            .push((key.to_string(), definition.clone(), defaults.clone()));
        DagBuilder::new().compile(key, definition, defaults)
    }
}

#[test]
fn test_compiler_receives_task_groups_and_unmerged_defaults() {
    let resolver =
        ConfigResolver::from_document(ConfigDocument::from_yaml_str(CONFIG).unwrap()).unwrap();
    let compiler = RecordingCompiler {
        calls: RefCell::new(Vec::new()),
    };
    let factory = WorkflowFactory::with_compiler(resolver, compiler);

    factory.build().unwrap();

    let calls = factory.compiler().calls.borrow();
    assert_eq!(calls.len(), 2);
    for (_, definition, defaults) in calls.iter() {
        assert_eq!(
            definition.get("task_groups"),
            Some(&serde_yaml::Value::Mapping(Mapping::new()))
        );
        assert!(!definition.contains_key("default_args"));
        assert_eq!(defaults, &factory.resolver().defaults());
    }
    assert_eq!(calls[0].0, "a");
    assert_eq!(calls[1].0, "b");
}
