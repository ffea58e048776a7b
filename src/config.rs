//! Runtime configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is a valid
//! configuration. A small set of environment variables can override the
//! file (see [`RiskgraphConfig::apply_env`]).

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GraphError, GraphResult};
use crate::id::DEFAULT_NAMESPACE;
use crate::page::PaginationPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskgraphConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Logical database every request is addressed to
    #[serde(default = "default_db_name")]
    pub db_name: String,

    /// Namespace UUID for identifier derivation.
    ///
    /// Changing it changes every derived id; existing data will no longer
    /// be found by identity.
    #[serde(default = "default_namespace")]
    pub namespace: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default)]
    pub policy: PaginationPolicy,

    /// Page size used when a request gives no `first` (none = all rows)
    #[serde(default)]
    pub default_first: Option<usize>,

    /// Upper bound applied to `first`
    #[serde(default = "default_max_first")]
    pub max_first: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum length of a text value after trimming
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_db_name() -> String {
    "riskgraph".to_string()
}

const fn default_namespace() -> Uuid {
    DEFAULT_NAMESPACE
}

const fn default_max_first() -> usize {
    1000
}

const fn default_max_text_len() -> usize {
    4096
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_name: default_db_name(),
            namespace: default_namespace(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            policy: PaginationPolicy::default(),
            default_first: None,
            max_first: default_max_first(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_text_len: default_max_text_len(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl RiskgraphConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` on syntax errors or invalid values.
    pub fn from_toml_str(content: &str) -> GraphResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| GraphError::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> GraphResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| GraphError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Applies environment overrides.
    ///
    /// Supported variables:
    /// - `RISKGRAPH_DB_NAME`: logical database name
    /// - `RISKGRAPH_PAGINATION_POLICY`: `heuristic` or `exact`
    /// - `RISKGRAPH_LOG_LEVEL`: default log filter
    /// - `RISKGRAPH_LOG_JSON`: `true` for JSON log lines
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` for unparseable values.
    pub fn apply_env(&mut self) -> GraphResult<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> GraphResult<()> {
        if let Some(db) = var("RISKGRAPH_DB_NAME") {
            self.store.db_name = db;
        }
        if let Some(policy) = var("RISKGRAPH_PAGINATION_POLICY") {
            self.pagination.policy = match policy.trim().to_ascii_lowercase().as_str() {
                "heuristic" => PaginationPolicy::Heuristic,
                "exact" => PaginationPolicy::Exact,
                other => {
                    return Err(GraphError::config(format!(
                        "RISKGRAPH_PAGINATION_POLICY: unknown policy '{other}'"
                    )))
                }
            };
        }
        if let Some(level) = var("RISKGRAPH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = var("RISKGRAPH_LOG_JSON") {
            self.logging.json = json
                .trim()
                .parse()
                .map_err(|_| {
                    GraphError::config(format!("RISKGRAPH_LOG_JSON: expected bool, got '{json}'"))
                })?;
        }
        self.validate()
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` describing the first invalid value.
    pub fn validate(&self) -> GraphResult<()> {
        if self.store.db_name.trim().is_empty() {
            return Err(GraphError::config("store.db_name must not be empty"));
        }
        if self.store.namespace.is_nil() {
            return Err(GraphError::config("store.namespace must not be the nil UUID"));
        }
        if self.pagination.max_first == 0 {
            return Err(GraphError::config("pagination.max_first must be positive"));
        }
        if let Some(first) = self.pagination.default_first {
            if first == 0 || first > self.pagination.max_first {
                return Err(GraphError::config(format!(
                    "pagination.default_first must be in 1..={}",
                    self.pagination.max_first
                )));
            }
        }
        if self.validation.max_text_len == 0 {
            return Err(GraphError::config("validation.max_text_len must be positive"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(GraphError::config("logging.level must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RiskgraphConfig::from_toml_str("").unwrap();
        assert_eq!(config, RiskgraphConfig::default());
        assert_eq!(config.store.db_name, "riskgraph");
        assert_eq!(config.store.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.pagination.policy, PaginationPolicy::Heuristic);
    }

    #[test]
    fn test_partial_document() {
        let config = RiskgraphConfig::from_toml_str(
            r#"
            [pagination]
            policy = "exact"
            default_first = 25

            [logging]
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.pagination.policy, PaginationPolicy::Exact);
        assert_eq!(config.pagination.default_first, Some(25));
        assert_eq!(config.pagination.max_first, 1000);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = RiskgraphConfig::from_toml_str("[pagination]\nmax_first = 0\n").unwrap_err();
        assert!(matches!(err, GraphError::Config { .. }));

        let err = RiskgraphConfig::from_toml_str(
            "[store]\nnamespace = \"00000000-0000-0000-0000-000000000000\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("nil UUID"));

        let err =
            RiskgraphConfig::from_toml_str("[pagination]\npolicy = \"sometimes\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid TOML"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RiskgraphConfig::default();
        config
            .apply_vars(|name| match name {
                "RISKGRAPH_DB_NAME" => Some("audit".to_string()),
                "RISKGRAPH_PAGINATION_POLICY" => Some("Exact".to_string()),
                "RISKGRAPH_LOG_JSON" => Some("true".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.store.db_name, "audit");
        assert_eq!(config.pagination.policy, PaginationPolicy::Exact);
        assert!(config.logging.json);

        let err = config
            .apply_vars(|name| (name == "RISKGRAPH_LOG_JSON").then(|| "yes".to_string()))
            .unwrap_err();
        assert!(matches!(err, GraphError::Config { .. }));
    }
}
