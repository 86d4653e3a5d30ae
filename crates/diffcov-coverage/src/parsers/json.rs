//! coverage.py JSON reports

use super::ReportParser;
use crate::error::ReportResult;
use crate::model::{BranchId, CoverageReport, FileCoverage};
use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Deserialize)]
struct RawReport {
    #[serde(default)]
    files: IndexMap<String, RawFile>,
}

#[derive(Deserialize)]
struct RawFile {
    #[serde(default)]
    executed_lines: Vec<u32>,
    #[serde(default)]
    missing_lines: Vec<u32>,
    #[serde(default)]
    executed_branches: Vec<[i64; 2]>,
    #[serde(default)]
    missing_branches: Vec<[i64; 2]>,
}

/// Parser for `coverage json` output
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportParser;

impl ReportParser for JsonReportParser {
    fn name(&self) -> &'static str {
        "coverage.py json"
    }

    fn parse(&self, content: &str) -> ReportResult<CoverageReport> {
        let raw: RawReport = serde_json::from_str(content)?;
        let mut report = CoverageReport::new();
        for (path, file) in raw.files {
            report.insert(
                path,
                FileCoverage {
                    executed_lines: file.executed_lines.into_iter().collect(),
                    missing_lines: file.missing_lines.into_iter().collect(),
                    executed_branches: arcs(&file.executed_branches),
                    missing_branches: arcs(&file.missing_branches),
                },
            );
        }
        Ok(report)
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }
}

/// Arcs leaving a real line; entry arcs (negative origin) are not branches
fn arcs(pairs: &[[i64; 2]]) -> std::collections::BTreeSet<BranchId> {
    pairs
        .iter()
        .filter_map(|&[from, to]| u32::try_from(from).ok().filter(|l| *l > 0).map(|l| (l, to)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_lines_and_arcs() {
        let content = r#"{
            "meta": {"version": "7.4.0"},
            "files": {
                "calc.py": {
                    "executed_lines": [10, 11, 12],
                    "missing_lines": [13],
                    "executed_branches": [[12, 14], [-1, 10]],
                    "missing_branches": [[12, 13], [14, -10]],
                    "summary": {"covered_lines": 3}
                }
            },
            "totals": {}
        }"#;
        let report = JsonReportParser.parse(content).unwrap();
        let file = report.file_for("calc.py").unwrap();
        assert_eq!(file.executed_lines, [10, 11, 12].into_iter().collect());
        assert_eq!(file.missing_lines, [13].into_iter().collect());
        assert_eq!(file.executed_branches, [(12, 14)].into_iter().collect());
        assert_eq!(file.missing_branches, [(12, 13), (14, -10)].into_iter().collect());
    }

    #[test]
    fn absent_fields_default_to_empty() {
        let report = JsonReportParser.parse(r#"{"files": {"m.py": {}}}"#).unwrap();
        assert_eq!(report.file_for("m.py"), Some(&FileCoverage::default()));
        assert!(JsonReportParser.parse("{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(JsonReportParser.parse("{\"files\": [").is_err());
    }
}
