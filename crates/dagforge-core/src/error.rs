use thiserror::Error;

/// Core error type for the Dagforge domain model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A graph failed structural validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A task id was added twice to the same graph
    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    /// A task id was looked up but is not part of the graph
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// The namespace could not be read or written
    #[error("Namespace error: {0}")]
    NamespaceError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
