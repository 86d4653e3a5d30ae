//! Error types for pattern learning
//!
//! Per-candidate failures are logged and skipped by the learner; these only
//! escape from the lower-level extraction and discovery functions.

use diffcov_analysis::AnalysisError;
use std::path::PathBuf;

/// Errors raised while mining a test corpus
#[derive(Debug, thiserror::Error)]
pub enum LearnError {
    /// Corpus root does not exist or is not a directory
    #[error("corpus root is not a directory: {0}")]
    MissingCorpus(PathBuf),

    /// A candidate file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Candidate path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed
    #[error("corpus walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// A candidate did not parse as Python
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// Candidate path
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: AnalysisError,
    },
}

impl LearnError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create parse error for path
    pub fn parse_error(path: impl Into<PathBuf>, source: AnalysisError) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for learning operations
pub type LearnResult<T> = Result<T, LearnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_path() {
        let err = LearnError::parse_error(
            "tests/test_x.py",
            AnalysisError::SyntaxError { line: 2, column: 0 },
        );
        assert_eq!(err.to_string(), "cannot parse tests/test_x.py: syntax error at 2:0");
    }
}
