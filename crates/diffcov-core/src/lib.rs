//! diffcov Core
//!
//! Change-aware patch verification. Given a unified diff and the patched
//! Python source, the pipeline finds the changed routines, learns how the
//! existing tests construct the affected types, synthesizes pytest +
//! hypothesis tests that invoke the changed code, and measures how much of
//! the change those tests cover beyond the baseline suite.
//!
//! ## Crates
//!
//! - [`diffcov_analysis`]: diff-to-scope mapping
//! - [`diffcov_patterns`]: test-corpus pattern learning
//! - [`diffcov_synth`]: test synthesis
//! - [`diffcov_coverage`]: change-scoped coverage
//!
//! # Example
//!
//! ```rust,ignore
//! use diffcov_core::{PatchInput, PatchVerifier, VerifierConfig};
//!
//! let verifier = PatchVerifier::try_new(VerifierConfig::from_toml_str(&text)?)?;
//! let prepared = verifier.prepare(PatchInput::new("src/calc.py", &diff, &source).with_corpus(repo));
//! // run prepared.synthesis.source with and without the suite, then:
//! let cmp = verifier.compare_files(&prepared.analysis, Some(baseline), Some(combined));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod telemetry;
pub mod verifier;

pub use config::{VerifierConfig, DEFAULT_CACHE_CAPACITY};
pub use error::{ConfigError, VerifierError, VerifierResult};
pub use telemetry::{init_tracing, TelemetryConfig};
pub use verifier::{PatchInput, PatchVerifier, PreparedPatch};

pub use diffcov_analysis::{ChangeAnalysis, ChangeTypes, MapperConfig};
pub use diffcov_coverage::{BranchCoverage, CoverageComparison, CoverageReport, CoverageResult};
pub use diffcov_patterns::{ClassTestPatterns, InstancePattern, LearnerConfig, PatternCache};
pub use diffcov_synth::{SynthesisConfig, SynthesisOutput, TierKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
