use crate::calculator::parser::ParserLimits;
use crate::constants::{config as keys, limits};
use crate::error::{FormflowError, FormflowResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Engine limits and switches.
///
/// Every field has a default, so a partial (or empty) TOML file is valid.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default = "default_max_expression_depth")]
    pub max_expression_depth: usize,
    #[serde(default = "default_max_expression_length")]
    pub max_expression_length: usize,
    #[serde(default = "default_true")]
    pub cache_expressions: bool,
    #[serde(default = "default_expression_cache_capacity")]
    pub expression_cache_capacity: usize,
    #[serde(default = "default_pattern_cache_capacity")]
    pub pattern_cache_capacity: usize,
}

fn default_max_expression_depth() -> usize {
    limits::MAX_EXPRESSION_DEPTH
}

fn default_max_expression_length() -> usize {
    limits::MAX_EXPRESSION_LENGTH
}

fn default_true() -> bool {
    true
}

fn default_expression_cache_capacity() -> usize {
    limits::EXPRESSION_CACHE_CAPACITY
}

fn default_pattern_cache_capacity() -> usize {
    limits::PATTERN_CACHE_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_expression_depth: default_max_expression_depth(),
            max_expression_length: default_max_expression_length(),
            cache_expressions: default_true(),
            expression_cache_capacity: default_expression_cache_capacity(),
            pattern_cache_capacity: default_pattern_cache_capacity(),
        }
    }
}

impl EngineConfig {
    /// Load from `FORMFLOW_CONFIG_PATH` (or `formflow.toml`), then apply environment
    /// overrides. A missing file means defaults; a malformed one is an error.
    pub fn load() -> FormflowResult<Self> {
        let config_path = std::env::var(keys::CONFIG_PATH_ENV)
            .unwrap_or_else(|_| keys::DEFAULT_CONFIG_PATH.to_string());

        let config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else {
            warn!(
                "Configuration file '{}' not found. Using default configuration.",
                config_path
            );
            Self::default()
        };

        config.apply_env_overrides()?.validated()
    }

    /// Load a specific TOML file without environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> FormflowResult<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|e| FormflowError::io(&path.display().to_string(), &e))?;
        Self::from_toml(&contents)
    }

    /// Parse TOML text
    pub fn from_toml(contents: &str) -> FormflowResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `FORMFLOW_*` environment overrides
    pub fn apply_env_overrides(self) -> FormflowResult<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; unparsable values are rejected
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> FormflowResult<Self> {
        if let Some(depth) = lookup(keys::MAX_DEPTH_ENV) {
            self.max_expression_depth = parse_setting(keys::MAX_DEPTH_ENV, &depth)?;
        }
        if let Some(length) = lookup(keys::MAX_LENGTH_ENV) {
            self.max_expression_length = parse_setting(keys::MAX_LENGTH_ENV, &length)?;
        }
        if let Some(cache) = lookup(keys::CACHE_ENV) {
            self.cache_expressions = parse_setting(keys::CACHE_ENV, &cache)?;
        }
        if let Some(capacity) = lookup(keys::EXPRESSION_CACHE_CAPACITY_ENV) {
            self.expression_cache_capacity =
                parse_setting(keys::EXPRESSION_CACHE_CAPACITY_ENV, &capacity)?;
        }
        if let Some(capacity) = lookup(keys::PATTERN_CACHE_CAPACITY_ENV) {
            self.pattern_cache_capacity = parse_setting(keys::PATTERN_CACHE_CAPACITY_ENV, &capacity)?;
        }

        info!(
            max_expression_depth = self.max_expression_depth,
            max_expression_length = self.max_expression_length,
            cache_expressions = self.cache_expressions,
            expression_cache_capacity = self.expression_cache_capacity,
            pattern_cache_capacity = self.pattern_cache_capacity,
            "engine configuration resolved"
        );
        Ok(self)
    }

    /// Reject limits that would make every expression fail or let one exhaust the stack
    pub fn validated(self) -> FormflowResult<Self> {
        check_range(
            "max_expression_depth",
            self.max_expression_depth,
            limits::MAX_EXPRESSION_DEPTH_CEILING,
        )?;
        check_range(
            "max_expression_length",
            self.max_expression_length,
            limits::MAX_EXPRESSION_LENGTH_CEILING,
        )?;
        Ok(self)
    }

    /// Expression cache capacity, `None` when caching is off
    pub fn expression_cache(&self) -> Option<usize> {
        self.cache_expressions.then_some(self.expression_cache_capacity)
    }

    /// Parser limits derived from this configuration
    pub fn parser_limits(&self) -> ParserLimits {
        ParserLimits {
            max_depth: self.max_expression_depth,
            max_length: self.max_expression_length,
        }
    }
}

fn check_range(key: &str, value: usize, ceiling: usize) -> FormflowResult<()> {
    if (1..=ceiling).contains(&value) {
        Ok(())
    } else {
        Err(FormflowError::configuration(key, format!("must be between 1 and {ceiling}")))
    }
}

fn parse_setting<T: std::str::FromStr>(key: &str, raw: &str) -> FormflowResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| FormflowError::configuration(key, format!("cannot parse '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml("max_expression_depth = 16").unwrap();
        assert_eq!(config.max_expression_depth, 16);
        assert_eq!(config.max_expression_length, 4096);
        assert!(config.cache_expressions);

        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_malformed_toml_is_a_configuration_error() {
        let err = EngineConfig::from_toml("max_expression_depth = \"deep\"").unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("FORMFLOW_MAX_EXPRESSION_DEPTH", "8"),
            ("FORMFLOW_CACHE_EXPRESSIONS", "false"),
        ]);
        let config = EngineConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.max_expression_depth, 8);
        assert_eq!(config.max_expression_length, 4096);
        assert!(!config.cache_expressions);
        assert_eq!(config.parser_limits(), ParserLimits { max_depth: 8, max_length: 4096 });
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let result = EngineConfig::default().apply_overrides(|key| {
            (key == "FORMFLOW_MAX_EXPRESSION_LENGTH").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(FormflowError::Configuration { .. })));
    }

    #[test]
    fn test_limits_outside_bounds_are_invalid() {
        let config = EngineConfig { max_expression_depth: 0, ..EngineConfig::default() };
        assert!(config.validated().is_err());

        let config = EngineConfig { max_expression_depth: 100_000, ..EngineConfig::default() };
        assert!(matches!(config.validated(), Err(FormflowError::Configuration { .. })));

        let config = EngineConfig { max_expression_length: 4_000_000, ..EngineConfig::default() };
        assert!(matches!(config.validated(), Err(FormflowError::Configuration { .. })));

        let config = EngineConfig {
            max_expression_depth: 256,
            max_expression_length: 65_536,
            ..EngineConfig::default()
        };
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_cache_capacities() {
        let config = EngineConfig::from_toml("expression_cache_capacity = 10").unwrap();
        assert_eq!(config.expression_cache(), Some(10));
        assert_eq!(config.pattern_cache_capacity, 256);

        let env = HashMap::from([
            ("FORMFLOW_PATTERN_CACHE_CAPACITY", "4"),
            ("FORMFLOW_CACHE_EXPRESSIONS", "false"),
        ]);
        let config = config.apply_overrides(|key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.pattern_cache_capacity, 4);
        assert_eq!(config.expression_cache(), None);
    }
}
