use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Translator configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Upper bound used for unbounded variable-length relationships (`*`, `*2..`)
    #[validate(range(
        min = 1,
        max = 32,
        message = "Max expansion hops must be between 1 and 32"
    ))]
    pub max_expansion_hops: u32,

    /// Maximum number of fixed-length variants one query may expand into
    #[validate(range(
        min = 1,
        max = 4096,
        message = "Max expansion variants must be between 1 and 4096"
    ))]
    pub max_expansion_variants: usize,

    /// Lower expanded variants on the rayon thread pool
    pub parallel_lowering: bool,

    /// Merge variants with UNION instead of UNION ALL
    pub union_distinct: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_expansion_hops: 8,
            max_expansion_variants: 256,
            parallel_lowering: true,
            union_distinct: false,
        }
    }
}

impl TranslatorConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_expansion_hops: parse_env_var("GTOPSQL_MAX_EXPANSION_HOPS", "8")?,
            max_expansion_variants: parse_env_var("GTOPSQL_MAX_EXPANSION_VARIANTS", "256")?,
            parallel_lowering: parse_env_var("GTOPSQL_PARALLEL_LOWERING", "true")?,
            union_distinct: parse_env_var("GTOPSQL_UNION_DISTINCT", "false")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TranslatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_expansion_hops, 8);
        assert_eq!(config.max_expansion_variants, 256);
        assert!(config.parallel_lowering);
        assert!(!config.union_distinct);
    }

    #[test]
    fn test_invalid_hop_range() {
        let config = TranslatorConfig {
            max_expansion_hops: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TranslatorConfig {
            max_expansion_hops: 33,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_variant_limit() {
        let config = TranslatorConfig {
            max_expansion_variants: 5000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file_fills_missing_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_expansion_hops: 3\nunion_distinct: true").unwrap();

        let config = TranslatorConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.max_expansion_hops, 3);
        assert!(config.union_distinct);
        assert_eq!(config.max_expansion_variants, 256);
    }

    #[test]
    fn test_yaml_file_is_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_expansion_hops: 100").unwrap();

        let err = TranslatorConfig::from_yaml_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_missing_yaml_file() {
        let err = TranslatorConfig::from_yaml_file("/nonexistent/gtopsql.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
