//! # Dagforge Factory
//!
//! Generates workflow graphs from configuration sources and keeps a shared
//! [`WorkflowNamespace`](dagforge_core::WorkflowNamespace) in sync with them.
//!
//! ## Example
//!
//! ```
//! use dagforge_core::{MemoryNamespace, WorkflowNamespace};
//! use dagforge_dsl::ConfigDocument;
//! use dagforge_factory::WorkflowFactory;
//!
//! let yaml = r#"
//! default:
//!   default_args:
//!     start_date: 2018-03-01
//! example_dag:
//!   tasks:
//!     hello:
//!       operator: bash
//!       bash_command: echo hello
//! "#;
//!
//! let namespace = MemoryNamespace::new();
//! let factory = WorkflowFactory::from_document(ConfigDocument::from_yaml_str(yaml)?)?;
//!
//! let report = factory.run_cycle(&namespace)?;
//! assert_eq!(report.published.len(), 1);
//! assert!(namespace.contains("example_dag")?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Runtime configuration
pub mod config;

/// Error types
pub mod error;

/// Build orchestration and namespace reconciliation
pub mod factory;

/// Directory aggregation
pub mod loader;

/// Logging initialisation
pub mod logging;

pub use config::FactoryConfig;
pub use error::{FactoryError, FactoryResult};
pub use factory::{BuildResult, CycleReport, WorkflowFactory};
pub use loader::{load_directory, DirectoryReport};
pub use logging::init_logging;
