//! Error types for the diffcov pipeline
//!
//! Pipeline stages degrade instead of failing. Errors surface only where a
//! caller hands in something the pipeline cannot substitute: configuration
//! text and coverage report files.

use diffcov_coverage::ReportError;

/// Configuration loading or validation failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML text did not deserialize
    #[error("invalid TOML configuration: {0}")]
    InvalidToml(#[from] toml::de::Error),

    /// YAML text did not deserialize
    #[error("invalid YAML configuration: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// A value is out of range
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path
        field: &'static str,
        /// What is wrong
        reason: String,
    },
}

impl ConfigError {
    /// Create invalid-value error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Top-level pipeline error
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Coverage report unreadable
    #[error("coverage report error: {0}")]
    Report(#[from] ReportError),
}

impl VerifierError {
    /// Check if the error comes from configuration
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for pipeline operations
pub type VerifierResult<T> = Result<T, VerifierError>;
