//! Change description records
//!
//! [`ChangeAnalysis`] is produced once per patch and consumed by the
//! synthesizer and the coverage differ.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// Bucket a change site belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    /// Branching constructs
    Conditional,
    /// Iteration constructs
    Loop,
    /// Raise sites and handlers
    Exception,
    /// Comparisons, boolean and arithmetic operators
    Operation,
}

/// Syntax construct found on a changed line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// `if` / `elif`
    Conditional,
    /// `a if c else b`
    Ternary,
    /// `match` / `case`
    Match,
    /// `for`
    For,
    /// `while`
    While,
    /// Comprehensions and generator expressions
    Comprehension,
    /// `raise`
    Raise,
    /// `try`
    Try,
    /// `except`
    Except,
    /// `finally`
    Finally,
    /// `assert`
    Assert,
    /// `<`, `==`, `in`, `is`, ...
    Comparison,
    /// `and` / `or`
    Boolean,
    /// Binary arithmetic and bitwise operators
    Arithmetic,
    /// `not`, unary `-`/`+`/`~`
    Unary,
    /// `x += 1`
    AugmentedAssignment,
}

impl ChangeKind {
    /// Classify a tree-sitter node kind; first match wins
    #[must_use]
    pub fn from_node_kind(kind: &str) -> Option<Self> {
        let kind = match kind {
            "if_statement" | "elif_clause" => Self::Conditional,
            "conditional_expression" => Self::Ternary,
            "match_statement" | "case_clause" => Self::Match,
            "for_statement" => Self::For,
            "while_statement" => Self::While,
            "list_comprehension"
            | "set_comprehension"
            | "dictionary_comprehension"
            | "generator_expression" => Self::Comprehension,
            "raise_statement" => Self::Raise,
            "try_statement" => Self::Try,
            "except_clause" | "except_group_clause" => Self::Except,
            "finally_clause" => Self::Finally,
            "assert_statement" => Self::Assert,
            "comparison_operator" => Self::Comparison,
            "boolean_operator" => Self::Boolean,
            "binary_operator" => Self::Arithmetic,
            "not_operator" | "unary_operator" => Self::Unary,
            "augmented_assignment" => Self::AugmentedAssignment,
            _ => return None,
        };
        Some(kind)
    }

    /// Bucket for this kind
    #[must_use]
    pub fn category(self) -> ChangeCategory {
        match self {
            Self::Conditional | Self::Ternary | Self::Match => ChangeCategory::Conditional,
            Self::For | Self::While | Self::Comprehension => ChangeCategory::Loop,
            Self::Raise | Self::Try | Self::Except | Self::Finally | Self::Assert => {
                ChangeCategory::Exception
            }
            Self::Comparison
            | Self::Boolean
            | Self::Arithmetic
            | Self::Unary
            | Self::AugmentedAssignment => ChangeCategory::Operation,
        }
    }
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Conditional => "conditional",
            Self::Ternary => "ternary",
            Self::Match => "match",
            Self::For => "for",
            Self::While => "while",
            Self::Comprehension => "comprehension",
            Self::Raise => "raise",
            Self::Try => "try",
            Self::Except => "except",
            Self::Finally => "finally",
            Self::Assert => "assert",
            Self::Comparison => "comparison",
            Self::Boolean => "boolean",
            Self::Arithmetic => "arithmetic",
            Self::Unary => "unary",
            Self::AugmentedAssignment => "augmented_assignment",
        };
        f.write_str(name)
    }
}

/// A construct on a changed line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangeSite {
    /// 1-based line
    pub line: u32,
    /// Construct kind
    pub kind: ChangeKind,
}

/// Change sites grouped by category
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeTypes {
    /// Branching constructs
    pub conditionals: Vec<ChangeSite>,
    /// Iteration constructs
    pub loops: Vec<ChangeSite>,
    /// Raise sites and handlers
    pub exceptions: Vec<ChangeSite>,
    /// Operators
    pub operations: Vec<ChangeSite>,
}

impl ChangeTypes {
    /// File a site under its category, ignoring exact duplicates
    pub fn record(&mut self, site: ChangeSite) {
        let bucket = self.bucket_mut(site.kind.category());
        if !bucket.contains(&site) {
            bucket.push(site);
        }
    }

    /// Sites of one category
    #[must_use]
    pub fn bucket(&self, category: ChangeCategory) -> &[ChangeSite] {
        match category {
            ChangeCategory::Conditional => &self.conditionals,
            ChangeCategory::Loop => &self.loops,
            ChangeCategory::Exception => &self.exceptions,
            ChangeCategory::Operation => &self.operations,
        }
    }

    fn bucket_mut(&mut self, category: ChangeCategory) -> &mut Vec<ChangeSite> {
        match category {
            ChangeCategory::Conditional => &mut self.conditionals,
            ChangeCategory::Loop => &mut self.loops,
            ChangeCategory::Exception => &mut self.exceptions,
            ChangeCategory::Operation => &mut self.operations,
        }
    }

    /// Sort every bucket by line, then kind
    pub fn sort(&mut self) {
        for bucket in [
            &mut self.conditionals,
            &mut self.loops,
            &mut self.exceptions,
            &mut self.operations,
        ] {
            bucket.sort();
        }
    }

    /// Check if no site was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
            && self.loops.is_empty()
            && self.exceptions.is_empty()
            && self.operations.is_empty()
    }
}

/// Line span of a changed routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpan {
    /// Bare routine name, as written after `def`
    pub name: String,
    /// First line (1-based), decorators included
    pub start_line: u32,
    /// Last line (1-based)
    pub end_line: u32,
    /// Nearest enclosing routine, for nested definitions
    pub enclosing_function: Option<String>,
}

/// Structured description of what a patch changed in one file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    /// Path of the patched file, as given
    pub file_path: String,
    /// Dotted import path derived from `file_path`
    pub module_path: String,
    /// Routines whose span intersects an added line, in source order
    ///
    /// Keys are bare names unless two changed routines share one; those are
    /// qualified by owner (`Widget.__init__`) and, failing that, by start
    /// line (`Widget.value:14`).
    pub changed_functions: IndexSet<String>,
    /// Routine → added lines attributed to it (innermost routine wins)
    pub changed_lines: IndexMap<String, BTreeSet<u32>>,
    /// Every added line within the post-patch source
    pub all_changed_lines: BTreeSet<u32>,
    /// Constructs found on changed lines
    pub change_types: ChangeTypes,
    /// Routine → enclosing class, for methods only
    pub class_context: IndexMap<String, String>,
    /// Routine → line span, for every changed routine
    pub function_spans: IndexMap<String, FunctionSpan>,
}

impl ChangeAnalysis {
    /// Analysis with every collection empty
    #[must_use]
    pub fn empty(file_path: impl Into<String>, module_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            module_path: module_path.into(),
            ..Self::default()
        }
    }

    /// Check if nothing changed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all_changed_lines.is_empty() && self.changed_functions.is_empty()
    }

    /// Lines attributed to a routine
    #[must_use]
    pub fn lines_for(&self, function: &str) -> Option<&BTreeSet<u32>> {
        self.changed_lines.get(function)
    }

    /// Bare name of a changed routine key
    #[must_use]
    pub fn routine_name<'a>(&'a self, function: &'a str) -> &'a str {
        self.function_spans
            .get(function)
            .map_or(function, |span| span.name.as_str())
    }

    /// Enclosing class of a changed routine
    #[must_use]
    pub fn class_of(&self, function: &str) -> Option<&str> {
        self.class_context.get(function).map(String::as_str)
    }

    /// Distinct classes that own a changed routine
    #[must_use]
    pub fn changed_classes(&self) -> IndexSet<&str> {
        self.changed_functions
            .iter()
            .filter_map(|f| self.class_of(f))
            .collect()
    }

    /// Check if any changed line is a new branch
    #[inline]
    #[must_use]
    pub fn has_conditionals(&self) -> bool {
        !self.change_types.conditionals.is_empty()
    }

    /// Check if any changed line is a new loop
    #[inline]
    #[must_use]
    pub fn has_loops(&self) -> bool {
        !self.change_types.loops.is_empty()
    }

    /// Check if any changed line raises or handles an exception
    #[inline]
    #[must_use]
    pub fn has_exceptions(&self) -> bool {
        !self.change_types.exceptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification_priority() {
        assert_eq!(ChangeKind::from_node_kind("if_statement"), Some(ChangeKind::Conditional));
        assert_eq!(ChangeKind::from_node_kind("for_statement"), Some(ChangeKind::For));
        assert_eq!(ChangeKind::from_node_kind("raise_statement"), Some(ChangeKind::Raise));
        assert_eq!(ChangeKind::from_node_kind("comparison_operator"), Some(ChangeKind::Comparison));
        assert_eq!(ChangeKind::from_node_kind("identifier"), None);
    }

    #[test]
    fn record_deduplicates() {
        let mut types = ChangeTypes::default();
        let site = ChangeSite { line: 3, kind: ChangeKind::Comparison };
        types.record(site);
        types.record(site);
        assert_eq!(types.operations.len(), 1);
        assert!(types.conditionals.is_empty());
    }

    #[test]
    fn serializes_with_spec_field_names() {
        let mut analysis = ChangeAnalysis::empty("calc.py", "calc");
        analysis.changed_functions.insert("divide".into());
        analysis.change_types.record(ChangeSite { line: 12, kind: ChangeKind::Conditional });
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["changed_functions"][0], "divide");
        assert_eq!(json["change_types"]["conditionals"][0]["kind"], "conditional");
        assert_eq!(json["change_types"]["conditionals"][0]["line"], 12);
    }

    #[test]
    fn empty_analysis() {
        let analysis = ChangeAnalysis::empty("x.py", "x");
        assert!(analysis.is_empty());
        assert!(analysis.changed_classes().is_empty());
    }
}
