//! Coverage report parsers
//!
//! - coverage.py JSON (`.json`)
//! - LCOV tracefiles (`.info`, `.lcov`)

use crate::error::{ReportError, ReportResult};
use crate::model::CoverageReport;
use std::path::Path;

mod json;
mod lcov;

pub use json::JsonReportParser;
pub use lcov::LcovReportParser;

/// Parser converting report text into a [`CoverageReport`]
///
/// Implement this trait to accept another report format.
pub trait ReportParser: Send + Sync + 'static {
    /// Format name for logs
    fn name(&self) -> &'static str;

    /// Parse report text
    ///
    /// # Errors
    /// Returns a [`ReportError`] describing the first malformed construct.
    fn parse(&self, content: &str) -> ReportResult<CoverageReport>;

    /// Supported file extensions (without dot)
    fn extensions(&self) -> &[&str];

    /// Check if this parser can handle the given path
    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions().contains(&ext))
    }
}

/// Report parsers selected by file extension
pub struct ParserRegistry {
    parsers: Vec<Box<dyn ReportParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        default_parsers()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parser_count", &self.parsers.len())
            .field("extensions", &self.all_extensions())
            .finish()
    }
}

impl ParserRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Register a parser; later registrations win on shared extensions
    pub fn register<P: ReportParser>(&mut self, parser: P) {
        self.parsers.insert(0, Box::new(parser));
    }

    /// Find parser for path
    #[must_use]
    pub fn find_for_path(&self, path: &Path) -> Option<&dyn ReportParser> {
        self.parsers.iter().find(|p| p.can_parse(path)).map(|p| &**p)
    }

    /// Get all registered extensions
    #[must_use]
    pub fn all_extensions(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .flat_map(|p| p.extensions())
            .copied()
            .collect()
    }

    /// Read and parse the report at `path`
    ///
    /// # Errors
    /// - [`ReportError::NoParserForExtension`] if no parser claims the path
    /// - [`ReportError::Io`] if the file cannot be read
    /// - the parser's error if the content is malformed
    pub fn parse_file(&self, path: &Path) -> ReportResult<CoverageReport> {
        let parser = self.find_for_path(path).ok_or_else(|| {
            ReportError::NoParserForExtension(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default()
                    .to_string(),
            )
        })?;
        let content =
            std::fs::read_to_string(path).map_err(|e| ReportError::io_error(path, e))?;
        let report = parser.parse(&content)?;
        tracing::debug!(path = %path.display(), format = parser.name(), files = report.len(), "parsed coverage report");
        Ok(report)
    }

    /// Parse the report at `path`, or an empty report if it is absent or unreadable
    #[must_use]
    pub fn load_or_empty(&self, path: Option<&Path>) -> CoverageReport {
        let Some(path) = path else {
            tracing::warn!("coverage report missing; treating as nothing executed");
            return CoverageReport::new();
        };
        self.parse_file(path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "coverage report unusable; treating as nothing executed");
            CoverageReport::new()
        })
    }
}

/// Create default registry with the built-in parsers
#[inline]
#[must_use]
pub fn default_parsers() -> ParserRegistry {
    let mut registry = ParserRegistry::new();
    registry.register(JsonReportParser);
    registry.register(LcovReportParser);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_by_extension() {
        let registry = default_parsers();
        assert_eq!(registry.find_for_path(Path::new("coverage.json")).unwrap().name(), "coverage.py json");
        assert_eq!(registry.find_for_path(Path::new("out/lcov.info")).unwrap().name(), "lcov");
        assert!(registry.find_for_path(Path::new("coverage.xml")).is_none());
        assert!(registry.find_for_path(Path::new("coverage")).is_none());
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let err = default_parsers().parse_file(Path::new("report.xml")).unwrap_err();
        assert!(matches!(err, ReportError::NoParserForExtension(ext) if ext == "xml"));
    }

    #[test]
    fn missing_file_loads_empty() {
        let registry = default_parsers();
        assert!(registry.load_or_empty(None).is_empty());
        assert!(registry
            .load_or_empty(Some(Path::new("/nonexistent/coverage.json")))
            .is_empty());
    }

    #[test]
    fn registry_debug() {
        let debug_str = format!("{:?}", default_parsers());
        assert!(debug_str.contains("ParserRegistry"));
        assert!(debug_str.contains("info"));
    }
}
