use crate::error::DslError;
use serde_yaml::{Mapping, Value};

/// Top-level key holding the settings shared by every definition
pub const DEFAULT_KEY: &str = "default";

/// Key holding task-group settings
pub const TASK_GROUPS_KEY: &str = "task_groups";

/// Top-level keys that are never workflow identifiers
pub const RESERVED_KEYS: [&str; 2] = [DEFAULT_KEY, TASK_GROUPS_KEY];

/// File suffixes recognised as configuration documents
pub const CONFIG_FILE_SUFFIXES: [&str; 2] = ["yaml", "yml"];

/// Whether `key` is reserved for shared settings
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// A loaded configuration document: an ordered mapping from string keys to
/// arbitrary nested values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    entries: Mapping,
}

impl ConfigDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML string into a document.
    ///
    /// An empty document yields an empty mapping.
    pub fn from_yaml_str(yaml_str: &str) -> Result<Self, DslError> {
        let value: Value = serde_yaml::from_str(yaml_str).map_err(DslError::MalformedDocument)?;
        Self::from_value(value)
    }

    /// Build a document from an already parsed YAML value
    pub fn from_value(value: Value) -> Result<Self, DslError> {
        let entries = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(entries) => entries,
            other => {
                return Err(DslError::InvalidDocument(format!(
                    "expected a mapping at the top level, found {}",
                    value_kind(&other)
                )))
            }
        };

        if let Some(key) = entries.keys().find(|key| !key.is_string()) {
            return Err(DslError::InvalidDocument(format!(
                "top-level key {:?} is not a string",
                key
            )));
        }

        Ok(Self { entries })
    }

    /// Look up a top-level entry
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Insert or replace a top-level entry
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(Value::String(key.into()), value)
    }

    /// Remove a top-level entry
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Whether a top-level entry exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Top-level keys in document order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().filter_map(Value::as_str)
    }

    /// Top-level entries in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| key.as_str().map(|key| (key, value)))
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The underlying mapping
    pub fn as_mapping(&self) -> &Mapping {
        &self.entries
    }
}

impl TryFrom<Value> for ConfigDocument {
    type Error = DslError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Short name of a YAML value's kind, for error messages
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_preserves_order() {
        let yaml = r#"
        zeta:
          tasks: {}
        default:
          concurrency: 1
        alpha:
          tasks: {}
        "#;

        let doc = ConfigDocument::from_yaml_str(yaml).unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["zeta", "default", "alpha"]);
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_empty_document_is_empty_mapping() {
        let doc = ConfigDocument::from_yaml_str("").unwrap();
        assert!(doc.is_empty());

        let doc = ConfigDocument::from_yaml_str("# only a comment\n").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_invalid_yaml_syntax() {
        let yaml = r#"
        example_dag:
          tasks: [
            - broken
        "#;

        match ConfigDocument::from_yaml_str(yaml) {
            Err(DslError::MalformedDocument(_)) => {}
            other => panic!("Expected MalformedDocument, got {:?}", other),
        }
    }

    #[test]
    fn test_top_level_must_be_mapping() {
        let err = ConfigDocument::from_yaml_str("- a\n- b\n").unwrap_err();
        assert!(matches!(err, DslError::InvalidDocument(_)));
        assert!(err.to_string().contains("a sequence"));
    }

    #[test]
    fn test_top_level_keys_must_be_strings() {
        let err = ConfigDocument::from_yaml_str("1: {}\nexample: {}\n").unwrap_err();
        assert!(matches!(err, DslError::InvalidDocument(_)));
    }

    #[test]
    fn test_edit_in_memory() {
        let mut doc = ConfigDocument::from_yaml_str("a: {}\nb: {}\n").unwrap();
        assert!(doc.remove("b").is_some());
        assert!(doc.remove("b").is_none());
        doc.insert("c", Value::Mapping(Mapping::new()));

        assert!(doc.contains_key("a"));
        assert!(!doc.contains_key("b"));
        assert!(doc.get("c").is_some());
    }

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved_key("default"));
        assert!(is_reserved_key("task_groups"));
        assert!(!is_reserved_key("example_dag"));
    }
}
