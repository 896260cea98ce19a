//! Runtime configuration for the workflow factory
//!
//! Values come from defaults, optionally deserialized from a file by the host,
//! and are then overridden from environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::warn;

use crate::error::{FactoryError, FactoryResult};

/// Comma-separated list of configuration-file suffixes
pub const ENV_CONFIG_SUFFIXES: &str = "DAGFORGE_CONFIG_SUFFIXES";

/// Log filter directive, e.g. `info` or `dagforge_factory=debug`
pub const ENV_LOG_LEVEL: &str = "DAGFORGE_LOG_LEVEL";

/// Whether to emit JSON logs (`true`/`false`)
pub const ENV_LOG_JSON: &str = "DAGFORGE_LOG_JSON";

/// Factory configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// File suffixes (without the dot) recognised as configuration files
    #[serde(default = "default_config_suffixes")]
    pub config_suffixes: Vec<String>,

    /// Log filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Emit JSON logs instead of pretty ones
    #[serde(default)]
    pub json_logging: bool,
}

fn default_config_suffixes() -> Vec<String> {
    dagforge_dsl::CONFIG_FILE_SUFFIXES
        .iter()
        .map(|suffix| suffix.to_string())
        .collect()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            config_suffixes: default_config_suffixes(),
            log_filter: default_log_filter(),
            json_logging: false,
        }
    }
}

impl FactoryConfig {
    /// Load configuration from defaults and environment variables
    pub fn load() -> FactoryResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps variable names to values
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(suffixes) = lookup(ENV_CONFIG_SUFFIXES) {
            let suffixes: Vec<String> = suffixes
                .split(',')
                .map(|suffix| suffix.trim().trim_start_matches('.').to_string())
                .filter(|suffix| !suffix.is_empty())
                .collect();

            if suffixes.is_empty() {
                warn!("Ignoring empty {} value", ENV_CONFIG_SUFFIXES);
            } else {
                self.config_suffixes = suffixes;
            }
        }

        if let Some(filter) = lookup(ENV_LOG_LEVEL) {
            self.log_filter = filter;
        }

        if let Some(json) = lookup(ENV_LOG_JSON) {
            match json.parse::<bool>() {
                Ok(json) => self.json_logging = json,
                Err(_) => warn!("Invalid {} value: {}", ENV_LOG_JSON, json),
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> FactoryResult<()> {
        if self.config_suffixes.is_empty() {
            return Err(FactoryError::ConfigError(
                "at least one configuration file suffix is required".to_string(),
            ));
        }

        if let Some(suffix) = self
            .config_suffixes
            .iter()
            .find(|suffix| suffix.is_empty() || suffix.contains(['.', '/']))
        {
            return Err(FactoryError::ConfigError(format!(
                "invalid configuration file suffix `{}`",
                suffix
            )));
        }

        Ok(())
    }

    /// Whether `path` has one of the configured suffixes
    pub fn is_config_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.config_suffixes.iter().any(|suffix| suffix == ext))
    }
}
