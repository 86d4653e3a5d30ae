//! LCOV tracefiles
//!
//! Reads `SF`, `DA`, `BRDA` and `end_of_record`; other records are skipped.

use super::ReportParser;
use crate::error::{ReportError, ReportResult};
use crate::model::{CoverageReport, FileCoverage};

/// Parser for LCOV `.info` tracefiles
#[derive(Debug, Clone, Copy, Default)]
pub struct LcovReportParser;

impl ReportParser for LcovReportParser {
    fn name(&self) -> &'static str {
        "lcov"
    }

    fn parse(&self, content: &str) -> ReportResult<CoverageReport> {
        let mut report = CoverageReport::new();
        let mut current: Option<(String, FileCoverage)> = None;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if line == "end_of_record" {
                let (path, file) = current
                    .take()
                    .ok_or_else(|| ReportError::lcov_error(line_no, "end_of_record outside a record"))?;
                report.merge(path, file);
                continue;
            }
            let Some((tag, value)) = line.split_once(':') else {
                continue;
            };
            match tag {
                "SF" => {
                    if let Some((path, file)) = current.replace((value.to_string(), FileCoverage::default())) {
                        report.merge(path, file);
                    }
                }
                "DA" => {
                    let (_, file) = current
                        .as_mut()
                        .ok_or_else(|| ReportError::lcov_error(line_no, "DA before SF"))?;
                    let mut fields = value.split(',');
                    let line = parse_field::<u32>(fields.next(), line_no, "DA line")?;
                    let hits = parse_field::<u64>(fields.next(), line_no, "DA hit count")?;
                    if hits > 0 {
                        file.executed_lines.insert(line);
                        file.missing_lines.remove(&line);
                    } else if !file.executed_lines.contains(&line) {
                        file.missing_lines.insert(line);
                    }
                }
                "BRDA" => {
                    let (_, file) = current
                        .as_mut()
                        .ok_or_else(|| ReportError::lcov_error(line_no, "BRDA before SF"))?;
                    let fields: Vec<&str> = value.split(',').collect();
                    let [line, block, branch, taken] = fields.as_slice() else {
                        return Err(ReportError::lcov_error(line_no, "BRDA needs four fields"));
                    };
                    let line = parse_field::<u32>(Some(*line), line_no, "BRDA line")?;
                    let block = parse_field::<i64>(Some(*block), line_no, "BRDA block")?;
                    let branch = parse_field::<i64>(Some(*branch), line_no, "BRDA branch")?;
                    let id = (line, block.saturating_mul(1000).saturating_add(branch));
                    let hit = *taken != "-" && parse_field::<u64>(Some(*taken), line_no, "BRDA taken")? > 0;
                    if hit {
                        file.executed_branches.insert(id);
                        file.missing_branches.remove(&id);
                    } else if !file.executed_branches.contains(&id) {
                        file.missing_branches.insert(id);
                    }
                }
                _ => {}
            }
        }

        // Tolerate a final record without its terminator
        if let Some((path, file)) = current {
            report.merge(path, file);
        }
        Ok(report)
    }

    fn extensions(&self) -> &[&str] {
        &["info", "lcov"]
    }
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, line: usize, what: &str) -> ReportResult<T> {
    field
        .map(str::trim)
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| ReportError::lcov_error(line, format!("invalid {what}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TRACE: &str = "\
TN:
SF:src/calc.py
FN:10,divide
DA:10,1
DA:11,1
DA:12,0
BRDA:12,0,0,1
BRDA:12,0,1,-
BRDA:13,1,0,0
LF:3
LH:2
end_of_record
SF:src/other.py
DA:1,5
end_of_record
";

    #[test]
    fn parses_records() {
        let report = LcovReportParser.parse(TRACE).unwrap();
        assert_eq!(report.len(), 2);
        let calc = report.file_for("calc.py").unwrap();
        assert_eq!(calc.executed_lines, [10, 11].into_iter().collect());
        assert_eq!(calc.missing_lines, [12].into_iter().collect());
        assert_eq!(calc.executed_branches, [(12, 0)].into_iter().collect());
        assert_eq!(calc.missing_branches, [(12, 1), (13, 1000)].into_iter().collect());
    }

    #[test]
    fn data_outside_a_record_is_an_error() {
        let err = LcovReportParser.parse("DA:1,1\n").unwrap_err();
        assert!(matches!(err, ReportError::Lcov { line: 1, .. }));
        assert!(LcovReportParser.parse("SF:a.py\nBRDA:1,0\n").is_err());
        assert!(LcovReportParser.parse("SF:a.py\nDA:x,1\n").is_err());
    }

    #[test]
    fn unterminated_record_is_kept() {
        let report = LcovReportParser.parse("SF:a.py\nDA:3,2\n").unwrap();
        assert!(report.file_for("a.py").unwrap().is_executed(3));
    }
}
