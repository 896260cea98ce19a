use crate::document::{is_reserved_key, value_kind, ConfigDocument, DEFAULT_KEY};
use crate::error::DslError;
use dagforge_core::ConfigSource;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

/// Resolves a configuration source into workflow definitions and shared defaults.
///
/// The resolver separates reserved top-level keys from definitions; it never
/// looks inside a definition. Structural checks belong to the compiler.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    source: ConfigSource,
    document: ConfigDocument,
}

impl ConfigResolver {
    /// Construct from exactly one of a file path or a parsed document
    pub fn new(path: Option<&Path>, document: Option<ConfigDocument>) -> Result<Self, DslError> {
        match (path, document) {
            (Some(path), None) => Self::from_path(path),
            (None, Some(document)) => Self::from_document(document),
            (Some(_), Some(_)) => Err(DslError::Precondition(
                "either a configuration path or a configuration document should be provided, not both"
                    .to_string(),
            )),
            (None, None) => Err(DslError::Precondition(
                "either a configuration path or a configuration document should be provided"
                    .to_string(),
            )),
        }
    }

    /// Load the document at an absolute path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DslError> {
        let path = path.as_ref();
        validate_config_path(path)?;
        let document = load_document(path)?;

        tracing::debug!(path = %path.display(), entries = document.len(), "Loaded configuration document");
        Ok(Self {
            source: ConfigSource::File(path.to_path_buf()),
            document,
        })
    }

    /// Wrap a document that is already in memory.
    ///
    /// Every unnamed document shares one source, so factories built this way
    /// retract each other's workflows. Use [`from_named_document`] to keep
    /// them apart.
    ///
    /// [`from_named_document`]: ConfigResolver::from_named_document
    pub fn from_document(document: ConfigDocument) -> Result<Self, DslError> {
        Self::from_named_document(ConfigSource::DEFAULT_INLINE_NAME, document)
    }

    /// Wrap an in-memory document under a caller-chosen source name
    pub fn from_named_document(
        name: impl Into<String>,
        document: ConfigDocument,
    ) -> Result<Self, DslError> {
        Ok(Self {
            source: ConfigSource::inline(name),
            document,
        })
    }

    /// Where the document came from
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// The loaded document
    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// The loaded document, for in-memory edits between build cycles
    pub fn document_mut(&mut self) -> &mut ConfigDocument {
        &mut self.document
    }

    /// Workflow definitions keyed by identifier, in document order.
    /// Reserved keys are excluded wherever they appear.
    pub fn definitions(&self) -> Mapping {
        self.document
            .iter()
            .filter(|(key, _)| !is_reserved_key(key))
            .map(|(key, definition)| (Value::String(key.to_string()), definition.clone()))
            .collect()
    }

    /// Settings shared by every definition, or an empty mapping.
    ///
    /// A `default` entry that is not a mapping is ignored with a warning.
    pub fn defaults(&self) -> Mapping {
        match self.document.get(DEFAULT_KEY) {
            Some(Value::Mapping(defaults)) => defaults.clone(),
            Some(Value::Null) | None => Mapping::new(),
            Some(other) => {
                tracing::warn!(
                    source = %self.source,
                    kind = value_kind(other),
                    "Ignoring shared defaults that are not a mapping"
                );
                Mapping::new()
            }
        }
    }
}

/// Reject configuration paths that are not absolute
pub fn validate_config_path(path: &Path) -> Result<(), DslError> {
    if !path.is_absolute() {
        return Err(DslError::ConfigPath(path.to_path_buf()));
    }
    Ok(())
}

/// Read and parse a configuration file
pub fn load_document(path: &Path) -> Result<ConfigDocument, DslError> {
    let yaml_str = fs::read_to_string(path).map_err(|source| DslError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigDocument::from_yaml_str(&yaml_str)
}
