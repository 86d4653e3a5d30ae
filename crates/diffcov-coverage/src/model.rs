//! Raw per-file execution data

use diffcov_analysis::paths_match;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A branch: origin line and producer-specific branch identifier
///
/// JSON reports identify a branch by its arc destination; LCOV by
/// `block * 1000 + branch`.
pub type BranchId = (u32, i64);

/// Execution data for one source file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Lines that ran
    pub executed_lines: BTreeSet<u32>,
    /// Measured lines that did not run
    pub missing_lines: BTreeSet<u32>,
    /// Branches taken
    pub executed_branches: BTreeSet<BranchId>,
    /// Branches never taken
    pub missing_branches: BTreeSet<BranchId>,
}

impl FileCoverage {
    /// Check if `line` ran
    #[inline]
    #[must_use]
    pub fn is_executed(&self, line: u32) -> bool {
        self.executed_lines.contains(&line)
    }

    /// Check if any branch was measured
    #[inline]
    #[must_use]
    pub fn has_branch_data(&self) -> bool {
        !self.executed_branches.is_empty() || !self.missing_branches.is_empty()
    }

    /// Every measured branch, taken or not
    #[must_use]
    pub fn all_branches(&self) -> BTreeSet<BranchId> {
        self.executed_branches
            .union(&self.missing_branches)
            .copied()
            .collect()
    }
}

/// A parsed coverage report, keyed by the producer's file paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    files: IndexMap<String, FileCoverage>,
}

impl CoverageReport {
    /// Create empty report
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file's data
    pub fn insert(&mut self, path: impl Into<String>, coverage: FileCoverage) {
        self.files.insert(path.into(), coverage);
    }

    /// Merge a file's data into any existing entry
    pub fn merge(&mut self, path: impl Into<String>, coverage: FileCoverage) {
        let entry = self.files.entry(path.into()).or_default();
        entry.executed_lines.extend(coverage.executed_lines);
        entry.missing_lines.extend(coverage.missing_lines);
        entry.executed_branches.extend(coverage.executed_branches);
        entry.missing_branches.extend(coverage.missing_branches);
        let executed = entry.executed_lines.clone();
        entry.missing_lines.retain(|l| !executed.contains(l));
        let taken = entry.executed_branches.clone();
        entry.missing_branches.retain(|b| !taken.contains(b));
    }

    /// Per-file data in report order
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileCoverage)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of files
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the report has no files
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Data for `path`: exact key first, then the longest whole-segment suffix match
    ///
    /// When several keys share the longest match (`a/util.py` and `b/util.py`
    /// for `util.py`) the lookup is ambiguous and yields nothing.
    #[must_use]
    pub fn file_for(&self, path: &str) -> Option<&FileCoverage> {
        if let Some(exact) = self.files.get(path) {
            return Some(exact);
        }

        let mut best: Option<(usize, &FileCoverage)> = None;
        let mut tied = false;
        for (key, file) in &self.files {
            if !paths_match(key, path) {
                continue;
            }
            let depth = shared_tail(key, path);
            match best {
                Some((current, _)) if depth < current => {}
                Some((current, _)) if depth == current => tied = true,
                _ => {
                    best = Some((depth, file));
                    tied = false;
                }
            }
        }

        if tied {
            tracing::debug!(path, "several coverage entries match equally; none chosen");
            return None;
        }
        best.map(|(_, file)| file)
    }
}

/// Number of trailing path segments two paths have in common
fn shared_tail(a: &str, b: &str) -> usize {
    let a = a.replace('\\', "/");
    let b = b.replace('\\', "/");
    a.rsplit('/')
        .zip(b.rsplit('/'))
        .take_while(|(x, y)| x == y && !x.is_empty() && *x != ".")
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(executed: &[u32]) -> FileCoverage {
        FileCoverage {
            executed_lines: executed.iter().copied().collect(),
            ..FileCoverage::default()
        }
    }

    #[test]
    fn lookup_prefers_exact_key() {
        let mut report = CoverageReport::new();
        report.insert("/repo/src/calc.py", lines(&[1]));
        report.insert("calc.py", lines(&[2]));
        assert!(report.file_for("calc.py").unwrap().is_executed(2));
        assert!(report.file_for("src/calc.py").unwrap().is_executed(1));
        assert!(report.file_for("lib/other.py").is_none());
    }

    #[test]
    fn lookup_prefers_longest_suffix_and_refuses_ties() {
        let mut report = CoverageReport::new();
        report.insert("/repo/a/util.py", lines(&[1]));
        report.insert("/repo/b/util.py", lines(&[2]));
        report.insert("/repo/pkg/b/util.py", lines(&[3]));

        assert!(report.file_for("a/util.py").unwrap().is_executed(1));
        assert!(report.file_for("pkg/b/util.py").unwrap().is_executed(3));
        // Two entries end in `b/util.py`; neither is preferred
        assert!(report.file_for("b/util.py").is_none());
        assert!(report.file_for("util.py").is_none());
    }

    #[test]
    fn merge_moves_lines_out_of_missing() {
        let mut report = CoverageReport::new();
        report.merge(
            "m.py",
            FileCoverage {
                missing_lines: [3, 4].into_iter().collect(),
                missing_branches: [(3, 4)].into_iter().collect(),
                ..lines(&[1])
            },
        );
        report.merge(
            "m.py",
            FileCoverage {
                executed_branches: [(3, 4)].into_iter().collect(),
                ..lines(&[3])
            },
        );
        let file = report.file_for("m.py").unwrap();
        assert_eq!(file.executed_lines, [1, 3].into_iter().collect());
        assert_eq!(file.missing_lines, [4].into_iter().collect());
        assert!(file.missing_branches.is_empty());
        assert_eq!(file.all_branches().len(), 1);
    }
}
