//! diffcov Diff-to-Scope Mapper
//!
//! Turns a unified diff plus the post-patch Python source into a
//! [`ChangeAnalysis`]: which routines changed, which lines belong to each,
//! and which branching, looping, exception and operator constructs the
//! added lines introduce.
//!
//! # Architecture
//!
//! ```text
//! diff text ──► UnifiedDiff ──► added new-side lines ─┐
//!                                                     ├──► DiffScopeMapper ──► ChangeAnalysis
//! source ────► PythonSource (tree-sitter) ──► routines┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use diffcov_analysis::{DiffScopeMapper, MapperConfig};
//!
//! let mapper = DiffScopeMapper::new(MapperConfig::default());
//! let analysis = mapper.analyze("src/pkg/calc.py", &diff, &source);
//! for name in &analysis.changed_functions {
//!     println!("{name}: {:?}", analysis.lines_for(name));
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod analysis;
pub mod diff;
pub mod error;
pub mod literal;
pub mod mapper;
pub mod module_path;
pub mod syntax;

pub use analysis::{
    ChangeAnalysis, ChangeCategory, ChangeKind, ChangeSite, ChangeTypes, FunctionSpan,
};
pub use diff::{paths_match, FileDiff, Hunk, UnifiedDiff};
pub use error::{AnalysisError, AnalysisResult};
pub use literal::{extract_literal, LiteralValue, ValueKind};
pub use mapper::{DiffScopeMapper, MapperConfig};
pub use module_path::{ModulePath, DEFAULT_SOURCE_ROOTS};
pub use syntax::{ParamKind, Parameter, PythonSource, RoutineDef};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
