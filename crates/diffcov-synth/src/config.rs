//! Synthesis configuration

use serde::{Deserialize, Serialize};

/// Test synthesizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Hypothesis `max_examples` per property test
    pub max_examples: u32,
    /// Exception types a guarded invocation accepts
    pub expected_exceptions: Vec<String>,
    /// Largest distinct-value set rendered as `sampled_from` alone
    pub closed_set_limit: usize,
    /// Margin added on each side of an observed numeric range
    pub integer_spread: i64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_examples: 50,
            expected_exceptions: vec!["ValueError".to_string(), "TypeError".to_string()],
            closed_set_limit: 8,
            integer_spread: 100,
        }
    }
}

impl SynthesisConfig {
    /// Set hypothesis example budget
    #[must_use]
    pub fn with_max_examples(mut self, max_examples: u32) -> Self {
        self.max_examples = max_examples;
        self
    }

    /// Replace accepted exception types
    #[must_use]
    pub fn with_expected_exceptions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_exceptions = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set numeric range margin
    #[must_use]
    pub fn with_integer_spread(mut self, spread: i64) -> Self {
        self.integer_spread = spread;
        self
    }

    /// Python tuple expression of the accepted exceptions
    #[must_use]
    pub fn exception_tuple(&self) -> String {
        match self.expected_exceptions.as_slice() {
            [] => "()".to_string(),
            [one] => format!("({one},)"),
            many => format!("({})", many.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_tuple_rendering() {
        let config = SynthesisConfig::default();
        assert_eq!(config.exception_tuple(), "(ValueError, TypeError)");
        assert_eq!(
            config.clone().with_expected_exceptions(["KeyError"]).exception_tuple(),
            "(KeyError,)"
        );
        assert_eq!(
            config.with_expected_exceptions(Vec::<String>::new()).exception_tuple(),
            "()"
        );
    }
}
