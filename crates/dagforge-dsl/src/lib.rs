//! # Dagforge DSL
//!
//! Loads YAML workflow configuration documents and compiles the workflow
//! definitions they contain into [`dagforge_core::WorkflowGraph`]s.
//!
//! ## Features
//!
//! * Order-preserving configuration documents
//! * Separation of shared defaults from workflow definitions
//! * A pluggable per-definition compiler with an operator registry
//! * Dependency and task-group validation with cycle detection
//!
//! ## Example
//!
//! ```
//! use dagforge_dsl::{ConfigDocument, ConfigResolver, DagBuilder, WorkflowCompiler};
//!
//! let yaml = r#"
//! default:
//!   default_args:
//!     owner: data-team
//!     start_date: 2018-03-01
//! example_dag:
//!   schedule_interval: "0 3 * * *"
//!   tasks:
//!     extract:
//!       operator: bash
//!       bash_command: echo extract
//!     load:
//!       operator: bash
//!       bash_command: echo load
//!       dependencies: [extract]
//! "#;
//!
//! let resolver = ConfigResolver::from_document(ConfigDocument::from_yaml_str(yaml)?)?;
//! let builder = DagBuilder::new();
//!
//! for (key, definition) in &resolver.definitions() {
//!     let key = key.as_str().unwrap_or_default();
//!     let definition = definition.as_mapping().cloned().unwrap_or_default();
//!     let built = builder.compile(key, &definition, &resolver.defaults())?;
//!     assert_eq!(built.graph.topological_order()?, vec!["extract", "load"]);
//! }
//! # Ok::<(), dagforge_dsl::DslError>(())
//! ```

#![forbid(unsafe_code)]

mod error;

pub mod builder;
pub mod document;
pub mod resolver;

pub use builder::{
    BuiltWorkflow, DagBuilder, OperatorRegistry, OperatorSpec, WorkflowCompiler,
    WorkflowSettings,
};
pub use document::{
    is_reserved_key, ConfigDocument, CONFIG_FILE_SUFFIXES, DEFAULT_KEY, RESERVED_KEYS,
    TASK_GROUPS_KEY,
};
pub use error::DslError;
pub use resolver::ConfigResolver;
