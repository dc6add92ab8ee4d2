//! Deployment configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::operations::GovernorConfig;
use crate::schema::AssemblerConfig;

/// Configuration for schema assembly and document admission, usually
/// deserialized from the host application's settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRouteConfig {
    /// Maximum query depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum query complexity.
    #[serde(default = "default_max_complexity")]
    pub max_complexity: usize,

    /// Whether introspection queries are answered.
    #[serde(default = "default_introspection_enabled")]
    pub introspection_enabled: bool,

    /// Ceiling on top-level selections per document.
    #[serde(default = "default_max_selections")]
    pub max_selections: usize,

    /// Top-level field names that are never executed.
    #[serde(default)]
    pub restricted_operations: Vec<String>,

    /// Whether multi-operation documents are validated once up front.
    #[serde(default = "default_validate_documents")]
    pub validate_documents: bool,
}

fn default_max_depth() -> usize {
    15
}

fn default_max_complexity() -> usize {
    500
}

fn default_introspection_enabled() -> bool {
    true
}

fn default_max_selections() -> usize {
    10
}

fn default_validate_documents() -> bool {
    true
}

impl Default for GraphRouteConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_complexity: default_max_complexity(),
            introspection_enabled: default_introspection_enabled(),
            max_selections: default_max_selections(),
            restricted_operations: Vec::new(),
            validate_documents: default_validate_documents(),
        }
    }
}

impl GraphRouteConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("max_depth must be greater than 0".to_string());
        }
        if self.max_complexity == 0 {
            return Err("max_complexity must be greater than 0".to_string());
        }
        if self.max_selections == 0 {
            return Err("max_selections must be greater than 0".to_string());
        }
        Ok(())
    }

    /// The assembly limits this configuration describes.
    pub fn assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig {
            max_depth: self.max_depth,
            max_complexity: self.max_complexity,
            introspection_enabled: self.introspection_enabled,
        }
    }

    /// The admission rules this configuration describes.
    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            max_selections: self.max_selections,
            restricted_operations: self
                .restricted_operations
                .iter()
                .cloned()
                .collect::<HashSet<_>>(),
            validate_documents: self.validate_documents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GraphRouteConfig::default();
        assert_eq!(config.max_depth, 15);
        assert_eq!(config.max_complexity, 500);
        assert!(config.introspection_enabled);
        assert_eq!(config.max_selections, 10);
        assert!(config.restricted_operations.is_empty());
        assert!(config.validate_documents);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GraphRouteConfig::default();
        config.max_selections = 0;
        assert!(config.validate().is_err());

        let mut config = GraphRouteConfig::default();
        config.max_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserialization_with_defaults() {
        let config: GraphRouteConfig = toml::from_str(
            r#"
            max_selections = 4
            restricted_operations = ["debugDump"]
            "#,
        )
        .unwrap();
        assert_eq!(config.max_selections, 4);
        assert_eq!(config.restricted_operations, ["debugDump"]);
        assert_eq!(config.max_depth, 15);
        assert!(config.validate_documents);
    }

    #[test]
    fn test_config_round_trip() {
        let config = GraphRouteConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let restored: GraphRouteConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(restored.max_complexity, config.max_complexity);
        assert_eq!(restored.max_selections, config.max_selections);
    }

    #[test]
    fn test_governor_config_conversion() {
        let mut config = GraphRouteConfig::default();
        config.restricted_operations = vec!["a".to_string(), "a".to_string()];
        let governor = config.governor_config();
        assert_eq!(governor.restricted_operations.len(), 1);
        assert!(governor.restricted_operations.contains("a"));
    }
}
