//! diffcov Test Synthesizer
//!
//! Turns a [`ChangeAnalysis`](diffcov_analysis::ChangeAnalysis) into a
//! pytest + hypothesis module exercising every changed routine.
//!
//! ## Tiers
//!
//! | Tier | Evidence | Output |
//! |------|----------|--------|
//! | [`TierKind::PatternReplay`] | learned corpus patterns | one replay per pattern plus a property test over learned values |
//! | [`TierKind::SignatureBased`] | annotations or literal defaults | property test over declared types |
//! | [`TierKind::GenericFallback`] | nothing | generic property test with determinism checks |
//!
//! Changed comparisons, loops and raises additionally get boundary, loop and
//! exception probes.
//!
//! # Example
//!
//! ```rust,ignore
//! use diffcov_synth::{PatternIndex, SynthesisConfig, TestSynthesizer};
//!
//! let synthesizer = TestSynthesizer::new(SynthesisConfig::default());
//! let output = synthesizer.synthesize(&analysis, source, &PatternIndex::new());
//! std::fs::write("test_changes.py", &output.source)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod emitter;
pub mod error;
pub mod probes;
pub mod strategy;
pub mod synthesizer;
pub mod target;
pub mod tier;

pub use config::SynthesisConfig;
pub use emitter::{is_module_path, TestFunction, TestModule};
pub use error::{SynthError, SynthResult};
pub use probes::{collect_probes, BoundaryProbe, ExceptionProbe, LoopProbe, ProbeRequest, Probes};
pub use strategy::Strategy;
pub use synthesizer::{PatternIndex, SynthesisOutput, SynthesizedTest, TestCategory, TestSynthesizer};
pub use target::{resolve_target, CallStyle, ParamSpec, RoutineQuery, Target};
pub use tier::{select_tier, Evidence, TierKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
