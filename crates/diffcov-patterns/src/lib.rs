//! diffcov Pattern Learner
//!
//! Mines an existing test corpus for literal-valued constructions and
//! invocations of a type or routine, and aggregates them into
//! [`ClassTestPatterns`] for the synthesizer.
//!
//! Arguments are read through a strict syntactic whitelist; no expression
//! from the corpus is ever evaluated.
//!
//! # Example
//!
//! ```rust,ignore
//! use diffcov_patterns::{LearnerConfig, PatternCache, PatternLearner};
//!
//! let learner = PatternLearner::new(LearnerConfig::default());
//! let cache = PatternCache::default();
//! let patterns = learner.learn_cached(&cache, "Widget", Some("shapes.widget"), corpus);
//! println!("{} distinct patterns", patterns.patterns.len());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod config;
pub mod error;
pub mod learner;
pub mod pattern;

pub use cache::{CacheStats, PatternCache, PatternKey};
pub use config::{LearnerConfig, DEFAULT_SKIP_DIRS};
pub use error::{LearnError, LearnResult};
pub use learner::{extract_calls, PatternLearner};
pub use pattern::{positional_slot, slot_position, ClassTestPatterns, InstancePattern, SourceLocation};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
