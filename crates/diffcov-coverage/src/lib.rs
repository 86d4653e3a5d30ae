//! diffcov Coverage Differ
//!
//! Scopes line and branch coverage to the lines a patch touched, and
//! compares a baseline run against a run that includes synthesized tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use diffcov_coverage::{default_parsers, CoverageDiffer};
//!
//! let parsers = default_parsers();
//! let baseline = parsers.load_or_empty(Some(Path::new("baseline.json")));
//! let combined = parsers.load_or_empty(Some(Path::new("combined.json")));
//! let cmp = CoverageDiffer.compare(Some(&baseline), Some(&combined), &analysis);
//! println!("synthesized tests add {:.0}%", cmp.contribution * 100.0);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod differ;
pub mod error;
pub mod model;
pub mod parsers;

pub use differ::{BranchCoverage, CoverageComparison, CoverageDiffer, CoverageResult};
pub use error::{ReportError, ReportResult};
pub use model::{BranchId, CoverageReport, FileCoverage};
pub use parsers::{default_parsers, JsonReportParser, LcovReportParser, ParserRegistry, ReportParser};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
