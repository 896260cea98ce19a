//! Error types for the workflow factory

use dagforge_core::CoreError;
use dagforge_dsl::DslError;
use std::path::PathBuf;
use thiserror::Error;

/// Factory error types
#[derive(Error, Debug)]
pub enum FactoryError {
    /// The configuration could not be loaded or resolved
    #[error(transparent)]
    Config(#[from] DslError),

    /// Compiling one definition failed; nothing from the build was published
    #[error("Failed to generate workflow {workflow}. Verify the configuration is correct")]
    DefinitionBuild {
        /// Configuration key of the failing definition
        workflow: String,
        /// What the compiler reported
        #[source]
        source: DslError,
    },

    /// The namespace rejected an operation
    #[error("Namespace error: {0}")]
    Namespace(#[from] CoreError),

    /// A directory could not be listed
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// Directory or entry being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Processing a configuration file during a directory walk failed
    #[error("Failed to process configuration file {}", path.display())]
    Source {
        /// The failing file
        path: PathBuf,
        /// What went wrong
        #[source]
        source: Box<FactoryError>,
    },

    /// Runtime configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl FactoryError {
    /// The configuration key of the failing definition, if a definition failed
    pub fn workflow(&self) -> Option<&str> {
        match self {
            FactoryError::DefinitionBuild { workflow, .. } => Some(workflow),
            FactoryError::Source { source, .. } => source.workflow(),
            _ => None,
        }
    }

    /// Whether the error comes from a malformed configuration document
    pub fn is_document_error(&self) -> bool {
        match self {
            FactoryError::Config(err) => err.is_document_error(),
            FactoryError::Source { source, .. } => source.is_document_error(),
            _ => false,
        }
    }
}

/// Result type for factory operations
pub type FactoryResult<T> = Result<T, FactoryError>;
