//! Learner configuration

use serde::{Deserialize, Serialize};

/// Directories never descended into while scanning a corpus
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".nox",
    ".mypy_cache",
    ".pytest_cache",
    "node_modules",
    "build",
    "dist",
];

/// Pattern learner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Maximum candidate files parsed per query
    pub max_files: usize,
    /// Maximum test files read while looking for candidates
    pub max_scanned: usize,
    /// Substrings a file name must contain to count as a test file
    pub test_markers: Vec<String>,
    /// Directory names skipped during traversal
    pub skip_dirs: Vec<String>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            max_files: 50,
            max_scanned: 500,
            test_markers: vec!["test".to_string()],
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl LearnerConfig {
    /// Set candidate cap
    #[must_use]
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Set read budget for the candidate search
    #[must_use]
    pub fn with_max_scanned(mut self, max_scanned: usize) -> Self {
        self.max_scanned = max_scanned;
        self
    }

    /// Replace test-file markers
    #[must_use]
    pub fn with_test_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Add a directory name to skip
    #[must_use]
    pub fn with_skip_dir(mut self, dir: impl Into<String>) -> Self {
        self.skip_dirs.push(dir.into());
        self
    }

    /// Check if a file name marks a test file
    #[must_use]
    pub fn is_test_file_name(&self, file_name: &str) -> bool {
        self.test_markers.iter().any(|m| file_name.contains(m.as_str()))
    }

    /// Check if a directory name is skipped
    #[must_use]
    pub fn is_skipped_dir(&self, dir_name: &str) -> bool {
        self.skip_dirs.iter().any(|d| d == dir_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LearnerConfig::default();
        assert_eq!(config.max_files, 50);
        assert_eq!(config.max_scanned, 500);
        assert!(config.is_test_file_name("test_widget.py"));
        assert!(config.is_test_file_name("widget_test.py"));
        assert!(!config.is_test_file_name("widget.py"));
        assert!(config.is_skipped_dir("__pycache__"));
        assert!(!config.is_skipped_dir("tests"));
    }

    #[test]
    fn builders() {
        let config = LearnerConfig::default()
            .with_max_files(3)
            .with_test_markers(["spec"])
            .with_skip_dir("fixtures");
        assert_eq!(config.max_files, 3);
        assert!(config.is_test_file_name("widget_spec.py"));
        assert!(!config.is_test_file_name("test_widget.py"));
        assert!(config.is_skipped_dir("fixtures"));
    }
}
