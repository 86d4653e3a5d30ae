//! Error types for coverage report loading
//!
//! Only report-file parsing surfaces these. Comparison itself is total: a
//! missing report or file entry counts as nothing executed.

use std::path::PathBuf;

/// Errors while reading a coverage report
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// No parser registered for the report's extension
    #[error("no report parser registered for extension: '{0}'")]
    NoParserForExtension(String),

    /// IO error during report read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Report path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Report is not valid coverage JSON
    #[error("malformed JSON report: {0}")]
    Json(#[from] serde_json::Error),

    /// LCOV record could not be read
    #[error("malformed LCOV at line {line}: {message}")]
    Lcov {
        /// 1-based line in the report
        line: usize,
        /// What was wrong
        message: String,
    },
}

impl ReportError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create LCOV error at a report line
    pub fn lcov_error(line: usize, message: impl Into<String>) -> Self {
        Self::Lcov {
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for report loading
pub type ReportResult<T> = Result<T, ReportError>;
