//! Change-scoped coverage
//!
//! Every figure is taken over the patch's changed lines only. An empty
//! denominator counts as fully covered.

use crate::model::{BranchId, CoverageReport, FileCoverage};
use diffcov_analysis::ChangeAnalysis;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Branch coverage over branches leaving changed lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchCoverage {
    /// Branches whose origin line changed
    pub total_branches: usize,
    /// Of those, branches taken
    pub covered_branches: usize,
    /// `covered / total`, 1.0 when there are none
    pub coverage: f64,
    /// Untaken `(line, branch_id)` pairs
    pub missing_branches: Vec<BranchId>,
}

/// Coverage of one report against one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    /// Fraction of changed lines executed
    pub overall_coverage: f64,
    /// Fraction per changed routine
    pub per_function_coverage: IndexMap<String, f64>,
    /// Changed lines executed
    pub covered_lines: BTreeSet<u32>,
    /// Changed lines not executed
    pub uncovered_lines: BTreeSet<u32>,
    /// Present when the report measured branches
    pub branch_coverage: Option<BranchCoverage>,
}

/// Baseline against baseline-plus-synthesized coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageComparison {
    /// Pre-existing suite only
    pub baseline: CoverageResult,
    /// Pre-existing suite plus synthesized tests
    pub combined: CoverageResult,
    /// `combined.overall_coverage - baseline.overall_coverage`
    pub contribution: f64,
    /// Changed lines only the synthesized tests reach
    pub newly_covered_lines: BTreeSet<u32>,
}

/// Computes change-scoped coverage; stateless
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageDiffer;

impl CoverageDiffer {
    /// Create differ
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Coverage of the changed lines in one report
    #[must_use]
    pub fn compute(&self, report: &CoverageReport, analysis: &ChangeAnalysis) -> CoverageResult {
        let file = lookup(report, analysis, "report");
        let universe = file.map(FileCoverage::all_branches).unwrap_or_default();
        let measured = file.is_some_and(FileCoverage::has_branch_data);
        scoped(file, analysis, &universe, measured)
    }

    /// Compare baseline and combined reports
    ///
    /// A missing report is treated as executing nothing. Both results share
    /// the union of the reports' branches as their branch denominator.
    #[must_use]
    pub fn compare(
        &self,
        baseline: Option<&CoverageReport>,
        combined: Option<&CoverageReport>,
        analysis: &ChangeAnalysis,
    ) -> CoverageComparison {
        let empty = CoverageReport::new();
        let baseline_report = baseline.unwrap_or_else(|| {
            tracing::warn!(file = %analysis.file_path, "baseline coverage report missing");
            &empty
        });
        let combined_report = combined.unwrap_or_else(|| {
            tracing::warn!(file = %analysis.file_path, "combined coverage report missing");
            &empty
        });

        let baseline_file = lookup(baseline_report, analysis, "baseline");
        let combined_file = lookup(combined_report, analysis, "combined");

        let mut universe = BTreeSet::new();
        for file in [baseline_file, combined_file].into_iter().flatten() {
            universe.extend(file.all_branches());
        }
        let measured = [baseline_file, combined_file]
            .into_iter()
            .flatten()
            .any(FileCoverage::has_branch_data);

        let baseline = scoped(baseline_file, analysis, &universe, measured);
        let combined = scoped(combined_file, analysis, &universe, measured);
        let contribution = combined.overall_coverage - baseline.overall_coverage;
        let newly_covered_lines = combined
            .covered_lines
            .difference(&baseline.covered_lines)
            .copied()
            .collect();

        tracing::info!(
            file = %analysis.file_path,
            baseline = baseline.overall_coverage,
            combined = combined.overall_coverage,
            contribution,
            "compared change coverage"
        );

        CoverageComparison {
            baseline,
            combined,
            contribution,
            newly_covered_lines,
        }
    }
}

fn lookup<'r>(report: &'r CoverageReport, analysis: &ChangeAnalysis, label: &str) -> Option<&'r FileCoverage> {
    let file = report.file_for(&analysis.file_path);
    if file.is_none() && !analysis.all_changed_lines.is_empty() {
        tracing::warn!(file = %analysis.file_path, report = label, "no coverage entry for changed file; counting as unexecuted");
    }
    file
}

fn scoped(
    file: Option<&FileCoverage>,
    analysis: &ChangeAnalysis,
    universe: &BTreeSet<BranchId>,
    measured: bool,
) -> CoverageResult {
    let executed = |line: &u32| file.is_some_and(|f| f.is_executed(*line));

    let (covered_lines, uncovered_lines): (BTreeSet<u32>, BTreeSet<u32>) =
        analysis.all_changed_lines.iter().partition(|l| executed(*l));

    let per_function_coverage = analysis
        .changed_lines
        .iter()
        .map(|(name, lines)| {
            let hit = lines.iter().filter(|l| executed(*l)).count();
            (name.clone(), ratio(hit, lines.len()))
        })
        .collect();

    let branch_coverage = measured.then(|| {
        let relevant: Vec<BranchId> = universe
            .iter()
            .filter(|(line, _)| analysis.all_changed_lines.contains(line))
            .copied()
            .collect();
        let (taken, missing): (Vec<BranchId>, Vec<BranchId>) = relevant
            .iter()
            .partition(|b| file.is_some_and(|f| f.executed_branches.contains(b)));
        BranchCoverage {
            total_branches: relevant.len(),
            covered_branches: taken.len(),
            coverage: ratio(taken.len(), relevant.len()),
            missing_branches: missing,
        }
    });

    CoverageResult {
        overall_coverage: ratio(covered_lines.len(), analysis.all_changed_lines.len()),
        per_function_coverage,
        covered_lines,
        uncovered_lines,
        branch_coverage,
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(hit: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        hit as f64 / total as f64
    }
}
