//! Pipeline configuration
//!
//! Every section has defaults, so an empty document is a valid
//! configuration. Loading never reads the environment or the filesystem;
//! the caller hands in the text.

use crate::error::ConfigError;
use crate::telemetry::TelemetryConfig;
use diffcov_analysis::MapperConfig;
use diffcov_patterns::LearnerConfig;
use diffcov_synth::SynthesisConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Default pattern cache capacity
pub const DEFAULT_CACHE_CAPACITY: u64 = 1000;

/// Configuration for [`PatchVerifier`](crate::PatchVerifier)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Diff-to-scope mapping
    pub mapper: MapperConfig,
    /// Corpus mining
    pub learner: LearnerConfig,
    /// Test synthesis
    pub synthesis: SynthesisConfig,
    /// Learned-pattern cache entries
    pub cache_capacity: u64,
    /// Log output
    pub telemetry: TelemetryConfig,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            mapper: MapperConfig::default(),
            learner: LearnerConfig::default(),
            synthesis: SynthesisConfig::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl VerifierConfig {
    /// Parse TOML and validate
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the text is malformed or a value is out of range
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML and validate
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the text is malformed or a value is out of range
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mapper.source_roots.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::invalid("mapper.source_roots", "empty root"));
        }
        if self.learner.max_files == 0 {
            return Err(ConfigError::invalid("learner.max_files", "must be at least 1"));
        }
        if self.learner.max_scanned == 0 {
            return Err(ConfigError::invalid("learner.max_scanned", "must be at least 1"));
        }
        if self.learner.test_markers.iter().all(|m| m.is_empty()) {
            return Err(ConfigError::invalid(
                "learner.test_markers",
                "at least one non-empty marker required",
            ));
        }
        if self.synthesis.max_examples == 0 {
            return Err(ConfigError::invalid("synthesis.max_examples", "must be at least 1"));
        }
        if self.synthesis.integer_spread < 0 {
            return Err(ConfigError::invalid("synthesis.integer_spread", "must not be negative"));
        }
        if let Some(bad) = self
            .synthesis
            .expected_exceptions
            .iter()
            .find(|e| !is_dotted_identifier(e))
        {
            return Err(ConfigError::invalid(
                "synthesis.expected_exceptions",
                format!("not an exception name: {bad:?}"),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::invalid("cache_capacity", "must be at least 1"));
        }
        EnvFilter::try_new(&self.telemetry.default_level)
            .map_err(|e| ConfigError::invalid("telemetry.default_level", e.to_string()))?;
        Ok(())
    }
}

fn is_dotted_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_documents_are_defaults() {
        assert_eq!(VerifierConfig::from_toml_str("").unwrap(), VerifierConfig::default());
        assert_eq!(VerifierConfig::from_yaml_str("{}").unwrap(), VerifierConfig::default());
    }

    #[test]
    fn toml_sections_override() {
        let config = VerifierConfig::from_toml_str(
            r#"
cache_capacity = 64

[mapper]
source_roots = ["lib"]

[learner]
max_files = 5

[synthesis]
max_examples = 200
expected_exceptions = ["ValueError", "pkg.errors.DomainError"]
"#,
        )
        .unwrap();
        assert_eq!(config.mapper.source_roots, vec!["lib".to_string()]);
        assert_eq!(config.learner.max_files, 5);
        assert_eq!(config.learner.test_markers, LearnerConfig::default().test_markers);
        assert_eq!(config.synthesis.max_examples, 200);
        assert_eq!(config.cache_capacity, 64);
    }

    #[test]
    fn yaml_sections_override() {
        let config = VerifierConfig::from_yaml_str(
            "synthesis:\n  integer_spread: 5\ntelemetry:\n  json: true\n  default_level: debug\n",
        )
        .unwrap();
        assert_eq!(config.synthesis.integer_spread, 5);
        assert!(config.telemetry.json);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = VerifierConfig::from_toml_str("[learner]\nmax_files = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "learner.max_files", .. }));

        let err = VerifierConfig::from_toml_str("[learner]\nmax_scanned = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "learner.max_scanned", .. }));

        let err = VerifierConfig::from_toml_str("[synthesis]\nexpected_exceptions = [\"Value Error\"]\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "synthesis.expected_exceptions", .. }));

        let err = VerifierConfig::from_toml_str("cache_capacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "cache_capacity", .. }));
    }

    #[test]
    fn malformed_text_is_rejected() {
        assert!(matches!(
            VerifierConfig::from_toml_str("[learner\n"),
            Err(ConfigError::InvalidToml(_))
        ));
        assert!(matches!(
            VerifierConfig::from_yaml_str("learner: [1, 2"),
            Err(ConfigError::InvalidYaml(_))
        ));
    }
}
