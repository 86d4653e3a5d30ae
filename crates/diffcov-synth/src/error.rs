//! Error types for test synthesis
//!
//! None of these reach the caller of
//! [`TestSynthesizer::synthesize`](crate::TestSynthesizer::synthesize); each
//! one lowers the tier chosen for the affected routine.

use diffcov_analysis::AnalysisError;

/// Errors raised while binding a changed routine to an invocation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthError {
    /// The post-patch source could not be parsed
    #[error("source not parseable: {0}")]
    Unparseable(#[from] AnalysisError),

    /// The changed routine has no definition in the source
    #[error("routine not found: {name}")]
    RoutineNotFound {
        /// Routine name
        name: String,
    },

    /// A nested routine's enclosing definition could not be located
    #[error("no importable ancestor for nested routine: {name}")]
    NoImportableAncestor {
        /// Routine name
        name: String,
    },
}

/// Result type alias for synthesis operations
pub type SynthResult<T> = Result<T, SynthError>;
