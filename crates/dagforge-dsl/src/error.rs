use dagforge_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// All possible errors that can occur while loading and compiling configuration
#[derive(Error, Debug)]
pub enum DslError {
    /// The configuration path is not absolute
    #[error("Workflow configuration path must be absolute: {}", .0.display())]
    ConfigPath(PathBuf),

    /// The configuration file could not be read
    #[error("Failed to read workflow configuration {}: {source}", path.display())]
    Io {
        /// File that failed to load
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML
    #[error("Invalid workflow configuration file")]
    MalformedDocument(#[source] serde_yaml::Error),

    /// The document is valid YAML but not shaped like a configuration document
    #[error("Invalid workflow configuration file: {0}")]
    InvalidDocument(String),

    /// Neither or both of a path and a document were supplied
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// A definition could not be decoded into its typed form
    #[error("Failed to decode {context}: {source}")]
    Decode {
        /// What was being decoded
        context: String,
        /// Underlying decode error
        #[source]
        source: serde_yaml::Error,
    },

    /// A definition is structurally wrong
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// A task names an operator nobody registered
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// A task omits a parameter its operator requires
    #[error("Task {task} is missing parameter `{param}` required by operator {operator}")]
    MissingOperatorParam {
        /// Offending task
        task: String,
        /// Operator type of the task
        operator: String,
        /// Missing parameter
        param: String,
    },

    /// The compiled graph failed validation
    #[error("Graph error: {0}")]
    Graph(#[from] CoreError),
}

impl DslError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DslError::ConfigPath(_) => "ERR_DSL_CONFIG_PATH",
            DslError::Io { .. } => "ERR_DSL_IO",
            DslError::MalformedDocument(_) => "ERR_DSL_YAML_PARSE",
            DslError::InvalidDocument(_) => "ERR_DSL_INVALID_DOCUMENT",
            DslError::Precondition(_) => "ERR_DSL_PRECONDITION",
            DslError::Decode { .. } => "ERR_DSL_DECODE",
            DslError::InvalidDefinition(_) => "ERR_DSL_INVALID_DEFINITION",
            DslError::MissingRequiredField(_) => "ERR_DSL_MISSING_FIELD",
            DslError::UnknownOperator(_) => "ERR_DSL_UNKNOWN_OPERATOR",
            DslError::MissingOperatorParam { .. } => "ERR_DSL_MISSING_OPERATOR_PARAM",
            DslError::Graph(_) => "ERR_DSL_INVALID_GRAPH",
        }
    }

    /// Whether the error comes from reading or parsing the document itself
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            DslError::MalformedDocument(_) | DslError::InvalidDocument(_)
        )
    }
}
