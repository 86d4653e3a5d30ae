//! Learned pattern records

use diffcov_analysis::{LiteralValue, ValueKind};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// Slot key for the positional argument at `index`
///
/// The `*` prefix cannot start a Python identifier, so slot keys never
/// collide with keyword names.
#[inline]
#[must_use]
pub fn positional_slot(index: usize) -> String {
    format!("*{index}")
}

/// Position encoded in a slot key, if it is positional
#[must_use]
pub fn slot_position(slot: &str) -> Option<usize> {
    slot.strip_prefix('*')?.parse().ok()
}

/// Where a pattern was first observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// File, relative to the corpus root when possible
    pub file: String,
    /// 1-based line of the call
    pub line: u32,
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One observed construction or invocation, literal arguments only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstancePattern {
    /// Callee name the pattern was learned for
    pub type_name: String,
    /// Leading positional literals, up to the first non-literal argument
    pub positional: Vec<LiteralValue>,
    /// Keyword literals, in call order
    pub parameters: IndexMap<String, LiteralValue>,
    /// First occurrence
    pub source_location: SourceLocation,
    /// Number of identical occurrences merged into this pattern
    pub frequency: u32,
}

impl InstancePattern {
    /// Canonical form used to merge identical calls
    ///
    /// Keyword order does not matter; positional order does.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut keywords: Vec<(&String, &LiteralValue)> = self.parameters.iter().collect();
        keywords.sort_by(|a, b| a.0.cmp(b.0));
        let args: Vec<String> = self
            .positional
            .iter()
            .map(LiteralValue::to_python)
            .chain(keywords.into_iter().map(|(k, v)| format!("{k}={}", v.to_python())))
            .collect();
        format!("{}({})", self.type_name, args.join(", "))
    }

    /// Argument list as Python source, in observed order
    #[must_use]
    pub fn call_arguments(&self) -> String {
        self.positional
            .iter()
            .map(LiteralValue::to_python)
            .chain(self.parameters.iter().map(|(k, v)| format!("{k}={}", v.to_python())))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Every (slot, value) pair, positional slots first
    pub fn slots(&self) -> impl Iterator<Item = (String, &LiteralValue)> {
        self.positional
            .iter()
            .enumerate()
            .map(|(i, v)| (positional_slot(i), v))
            .chain(self.parameters.iter().map(|(k, v)| (k.clone(), v)))
    }

    /// Check if no literal argument was captured
    #[inline]
    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.positional.is_empty() && self.parameters.is_empty()
    }
}

/// Aggregated evidence for one type or routine
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ClassTestPatterns {
    /// Target name
    pub type_name: String,
    /// Distinct patterns, in discovery order
    pub patterns: Vec<InstancePattern>,
    /// Slot → kinds of every observed value
    pub parameter_types: IndexMap<String, BTreeSet<ValueKind>>,
    /// Slot → distinct observed values, in discovery order
    pub common_parameters: IndexMap<String, Vec<LiteralValue>>,
}

impl ClassTestPatterns {
    /// Patterns with nothing observed
    #[must_use]
    pub fn empty(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Merge identical patterns and aggregate per-slot evidence
    #[must_use]
    pub fn from_observations(
        type_name: impl Into<String>,
        observations: impl IntoIterator<Item = InstancePattern>,
    ) -> Self {
        let mut merged: IndexMap<String, InstancePattern> = IndexMap::new();
        for pattern in observations {
            merged
                .entry(pattern.signature())
                .and_modify(|existing| existing.frequency += pattern.frequency)
                .or_insert(pattern);
        }

        let mut out = Self::empty(type_name);
        out.patterns = merged.into_values().collect();

        for pattern in &out.patterns {
            for (slot, value) in pattern.slots() {
                out.parameter_types
                    .entry(slot.clone())
                    .or_default()
                    .insert(value.kind());
                let values = out.common_parameters.entry(slot).or_default();
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }

        out
    }

    /// Check if no pattern was found
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Distinct values observed for a slot
    #[must_use]
    pub fn values_for(&self, slot: &str) -> &[LiteralValue] {
        self.common_parameters.get(slot).map_or(&[], Vec::as_slice)
    }

    /// Total merged occurrences
    #[must_use]
    pub fn total_frequency(&self) -> u32 {
        self.patterns.iter().map(|p| p.frequency).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn widget(positional: Vec<LiteralValue>, keywords: &[(&str, LiteralValue)], line: u32) -> InstancePattern {
        InstancePattern {
            type_name: "Widget".into(),
            positional,
            parameters: keywords.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect(),
            source_location: SourceLocation { file: "tests/test_widget.py".into(), line },
            frequency: 1,
        }
    }

    #[test]
    fn signature_ignores_keyword_order() {
        let a = widget(vec![], &[("size", LiteralValue::Int(1)), ("color", LiteralValue::Str("red".into()))], 1);
        let b = widget(vec![], &[("color", LiteralValue::Str("red".into())), ("size", LiteralValue::Int(1))], 2);
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature(), "Widget(color='red', size=1)");
        assert_eq!(a.call_arguments(), "size=1, color='red'");
    }

    #[test]
    fn merge_counts_and_aggregates() {
        let patterns = ClassTestPatterns::from_observations(
            "Widget",
            vec![
                widget(vec![LiteralValue::Int(3)], &[("color", LiteralValue::Str("red".into()))], 1),
                widget(vec![LiteralValue::Int(5)], &[("color", LiteralValue::Str("red".into()))], 2),
                widget(vec![LiteralValue::Int(5)], &[("color", LiteralValue::Str("red".into()))], 3),
                widget(vec![LiteralValue::Float(2.5)], &[], 4),
            ],
        );

        assert_eq!(patterns.patterns.len(), 3);
        assert_eq!(patterns.patterns[1].frequency, 2);
        assert_eq!(patterns.patterns[1].source_location.line, 2);
        assert_eq!(patterns.total_frequency(), 4);
        assert_eq!(
            patterns.values_for("*0"),
            &[LiteralValue::Int(3), LiteralValue::Int(5), LiteralValue::Float(2.5)]
        );
        assert_eq!(patterns.values_for("color"), &[LiteralValue::Str("red".into())]);
        let kinds: Vec<ValueKind> = patterns.parameter_types["*0"].iter().copied().collect();
        assert_eq!(kinds, vec![ValueKind::Int, ValueKind::Float]);
    }

    #[test]
    fn slot_keys() {
        assert_eq!(positional_slot(2), "*2");
        assert_eq!(slot_position("*2"), Some(2));
        assert_eq!(slot_position("size"), None);
    }

    #[test]
    fn bare_pattern() {
        assert!(widget(vec![], &[], 1).is_bare());
        assert!(ClassTestPatterns::empty("Widget").is_empty());
    }
}
