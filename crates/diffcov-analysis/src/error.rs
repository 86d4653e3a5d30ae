//! Error types for diff-to-scope analysis
//!
//! Every variant here is recoverable: the mapper turns them into an empty
//! [`ChangeAnalysis`](crate::ChangeAnalysis) instead of aborting.

/// Errors raised while parsing a diff or the post-patch source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// Hunk header does not follow `@@ -a,b +c,d @@`
    #[error("malformed hunk header at diff line {line}: {header}")]
    MalformedHunkHeader {
        /// 1-based line within the diff text
        line: usize,
        /// The offending header text
        header: String,
    },

    /// Hunk body contains more lines than its header declared
    #[error("hunk starting at diff line {line} overruns its declared {side} count")]
    HunkOverrun {
        /// 1-based line of the hunk header
        line: usize,
        /// Which side overflowed ("old" or "new")
        side: &'static str,
    },

    /// The tree-sitter grammar could not be loaded
    #[error("parser initialization failed: {0}")]
    ParserInit(String),

    /// The parser produced no tree at all
    #[error("parse failed")]
    ParseFailed,

    /// The source parsed, but the tree contains error nodes
    #[error("syntax error at {line}:{column}")]
    SyntaxError {
        /// 1-based line of the first error node
        line: u32,
        /// 0-based column of the first error node
        column: u32,
    },
}

impl AnalysisError {
    /// Create malformed-header error
    pub fn malformed_header(line: usize, header: impl Into<String>) -> Self {
        Self::MalformedHunkHeader {
            line,
            header: header.into(),
        }
    }

    /// Whether the failure came from the diff rather than the source
    #[inline]
    #[must_use]
    pub fn is_diff_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedHunkHeader { .. } | Self::HunkOverrun { .. }
        )
    }
}

/// Result type alias for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_header_display() {
        let err = AnalysisError::malformed_header(3, "@@ nope @@");
        assert_eq!(
            err.to_string(),
            "malformed hunk header at diff line 3: @@ nope @@"
        );
        assert!(err.is_diff_error());
    }

    #[test]
    fn syntax_error_is_not_diff_error() {
        let err = AnalysisError::SyntaxError { line: 4, column: 2 };
        assert!(err.to_string().contains("4:2"));
        assert!(!err.is_diff_error());
    }
}
