//! Diff-to-scope mapping
//!
//! Joins the new-side line numbers of a unified diff with the routine spans
//! of the post-patch syntax tree. The mapper is pure: the same inputs always
//! produce the same [`ChangeAnalysis`].

use crate::analysis::{ChangeAnalysis, ChangeKind, ChangeSite, ChangeTypes, FunctionSpan};
use crate::diff::UnifiedDiff;
use crate::error::AnalysisResult;
use crate::module_path::{ModulePath, DEFAULT_SOURCE_ROOTS};
use crate::syntax::{node_line, walk_routine_body, PythonSource, RoutineDef};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// Mapper configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Directories stripped from the front of file paths, first match wins
    pub source_roots: Vec<String>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            source_roots: DEFAULT_SOURCE_ROOTS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl MapperConfig {
    /// Replace the source roots
    #[must_use]
    pub fn with_source_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_roots = roots.into_iter().map(Into::into).collect();
        self
    }
}

/// Maps a patch onto the routines and constructs it touches
#[derive(Debug, Clone, Default)]
pub struct DiffScopeMapper {
    config: MapperConfig,
}

impl DiffScopeMapper {
    /// Create mapper
    #[inline]
    #[must_use]
    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Dotted module path for a file
    #[must_use]
    pub fn module_path(&self, file_path: &str) -> ModulePath {
        ModulePath::from_file_path(file_path, &self.config.source_roots)
    }

    /// Analyze a patch, degrading to an empty analysis on failure
    ///
    /// A malformed diff or unparseable source is logged and yields an
    /// analysis with both paths filled and every collection empty.
    #[must_use]
    pub fn analyze(&self, file_path: &str, diff: &str, source: &str) -> ChangeAnalysis {
        match self.try_analyze(file_path, diff, source) {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(file_path, error = %e, "change analysis degraded to empty");
                ChangeAnalysis::empty(file_path, self.module_path(file_path).to_string())
            }
        }
    }

    /// Analyze a patch, surfacing diff and source failures
    ///
    /// # Errors
    /// - Diff errors from [`UnifiedDiff::parse`]
    /// - [`AnalysisError::SyntaxError`](crate::AnalysisError::SyntaxError) when
    ///   the post-patch source does not parse cleanly
    pub fn try_analyze(
        &self,
        file_path: &str,
        diff: &str,
        source: &str,
    ) -> AnalysisResult<ChangeAnalysis> {
        let module_path = self.module_path(file_path).to_string();
        let added = UnifiedDiff::parse(diff)?.added_lines_for(file_path);

        if added.is_empty() {
            tracing::debug!(file_path, "diff adds no lines");
            return Ok(ChangeAnalysis::empty(file_path, module_path));
        }

        let parsed = PythonSource::parse(source)?;
        let line_count = parsed.line_count();
        let all_changed: BTreeSet<u32> = added
            .into_iter()
            .filter(|line| (1..=line_count).contains(line))
            .collect();

        let routines = parsed.routines();
        let changed: Vec<&RoutineDef<'_>> = routines
            .iter()
            .filter(|r| all_changed.range(r.start_line..=r.end_line).next().is_some())
            .collect();

        let mut analysis = ChangeAnalysis::empty(file_path, module_path);

        let keys = routine_keys(&changed);
        for (key, routine) in keys.iter().zip(&changed) {
            analysis.changed_functions.insert(key.clone());
            if let Some(class_name) = &routine.class_name {
                analysis.class_context.insert(key.clone(), class_name.clone());
            }
            analysis.function_spans.insert(
                key.clone(),
                FunctionSpan {
                    name: routine.name.clone(),
                    start_line: routine.start_line,
                    end_line: routine.end_line,
                    enclosing_function: routine.enclosing_function.clone(),
                },
            );
        }

        // Innermost owner per line, grouped in routine order
        let owners: Vec<(u32, usize)> = all_changed
            .iter()
            .filter_map(|&line| innermost(&changed, line).map(|idx| (line, idx)))
            .collect();
        for (idx, key) in keys.iter().enumerate() {
            let lines: BTreeSet<u32> = owners
                .iter()
                .filter(|(_, owner)| *owner == idx)
                .map(|(line, _)| *line)
                .collect();
            if !lines.is_empty() {
                analysis.changed_lines.insert(key.clone(), lines);
            }
        }

        analysis.change_types = classify_changes(&changed, &all_changed);
        analysis.all_changed_lines = all_changed;

        tracing::info!(
            file_path,
            module = %analysis.module_path,
            functions = analysis.changed_functions.len(),
            lines = analysis.all_changed_lines.len(),
            "mapped diff onto source"
        );

        Ok(analysis)
    }
}

/// Analysis keys for changed routines, parallel to `routines`
///
/// Bare names where unique, then owner-qualified names, then the start line
/// appended for routines that still collide (property getter and setter).
fn routine_keys(routines: &[&RoutineDef<'_>]) -> Vec<String> {
    fn occurrences(keys: &[String], key: &str) -> usize {
        keys.iter().filter(|k| k.as_str() == key).count()
    }

    let bare: Vec<String> = routines.iter().map(|r| r.name.clone()).collect();
    let qualified: Vec<String> = routines
        .iter()
        .map(|r| {
            if occurrences(&bare, &r.name) < 2 {
                return r.name.clone();
            }
            match r.class_path.as_deref().or(r.enclosing_function.as_deref()) {
                Some(owner) => format!("{owner}.{}", r.name),
                None => r.name.clone(),
            }
        })
        .collect();
    qualified
        .iter()
        .zip(routines)
        .map(|(key, r)| {
            if occurrences(&qualified, key) > 1 {
                tracing::debug!(key = %key, line = r.start_line, "routine key collides; appending start line");
                format!("{key}:{}", r.start_line)
            } else {
                key.clone()
            }
        })
        .collect()
}

/// Index of the smallest changed routine containing `line`
fn innermost(routines: &[&RoutineDef<'_>], line: u32) -> Option<usize> {
    routines
        .iter()
        .enumerate()
        .filter(|(_, r)| r.contains_line(line))
        .min_by_key(|(_, r)| (r.span_len(), Reverse(r.start_line)))
        .map(|(idx, _)| idx)
}

fn classify_changes(routines: &[&RoutineDef<'_>], changed: &BTreeSet<u32>) -> ChangeTypes {
    let mut types = ChangeTypes::default();
    for routine in routines {
        walk_routine_body(routine.node, &mut |node| {
            let line = node_line(node);
            if !changed.contains(&line) {
                return;
            }
            if let Some(kind) = ChangeKind::from_node_kind(node.kind()) {
                tracing::trace!(line, %kind, routine = %routine.name, "change site");
                types.record(ChangeSite { line, kind });
            }
        });
    }
    types.sort();
    types
}
