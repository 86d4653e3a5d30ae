//! Change-type probes
//!
//! Targeted inputs read off the changed constructs themselves: boundary
//! values around compared integer literals, empty/single/many iterables for
//! new loops, and trigger inputs for new `raise` sites.

use diffcov_analysis::syntax::{node_line, walk_routine_body};
use diffcov_analysis::{extract_literal, LiteralValue, PythonSource, RoutineDef};
use std::collections::BTreeSet;
use tree_sitter::Node;

/// `param OP n` on a changed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryProbe {
    /// Compared parameter
    pub param: String,
    /// Line of the comparison
    pub line: u32,
    /// The compared literal
    pub pivot: i64,
}

impl BoundaryProbe {
    /// `pivot - 1`, `pivot`, `pivot + 1`
    #[must_use]
    pub fn values(&self) -> [i64; 3] {
        [
            self.pivot.saturating_sub(1),
            self.pivot,
            self.pivot.saturating_add(1),
        ]
    }
}

/// A changed loop iterating over a parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopProbe {
    /// Iterated parameter
    pub param: String,
    /// Line of the loop
    pub line: u32,
}

/// A changed `raise`
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionProbe {
    /// Line of the raise
    pub line: u32,
    /// Raised exception name (`Exception` when unknown)
    pub exception: String,
    /// Parameter value that reaches the raise, when the guard allows it
    pub trigger: Option<(String, LiteralValue)>,
}

/// All probes for one routine
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Probes {
    /// Boundary probes, one per (param, pivot)
    pub boundaries: Vec<BoundaryProbe>,
    /// Loop probes, one per param
    pub loops: Vec<LoopProbe>,
    /// Exception probes, one per raise
    pub exceptions: Vec<ExceptionProbe>,
}

impl Probes {
    /// Check if nothing was found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty() && self.loops.is_empty() && self.exceptions.is_empty()
    }
}

/// Which probe families the analysis asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeRequest {
    /// A comparison changed
    pub comparisons: bool,
    /// A loop changed
    pub loops: bool,
    /// A raise changed
    pub raises: bool,
}

/// Collect probes from a routine's own changed lines
///
/// `params` are the names the test can pass; probes on anything else
/// (attributes, locals) are not derivable and are skipped.
#[must_use]
pub fn collect_probes(
    source: &PythonSource,
    routine: &RoutineDef<'_>,
    changed: &BTreeSet<u32>,
    params: &[&str],
    request: ProbeRequest,
) -> Probes {
    let mut probes = Probes::default();
    let is_param = |name: &str| params.contains(&name);

    walk_routine_body(routine.node, &mut |node| {
        let line = node_line(node);
        if !changed.contains(&line) {
            return;
        }
        match node.kind() {
            "comparison_operator" if request.comparisons => {
                if let Some((param, _, LiteralValue::Int(pivot))) = simple_comparison(node, source) {
                    let probe = BoundaryProbe { param, line, pivot };
                    if is_param(probe.param.as_str())
                        && !probes
                            .boundaries
                            .iter()
                            .any(|b| b.param == probe.param && b.pivot == probe.pivot)
                    {
                        probes.boundaries.push(probe);
                    }
                }
            }
            "for_statement" | "for_in_clause" if request.loops => {
                let iterated = node
                    .child_by_field_name("right")
                    .filter(|r| r.kind() == "identifier")
                    .map(|r| source.text(r).to_string());
                if let Some(param) = iterated.filter(|p| is_param(p.as_str())) {
                    if !probes.loops.iter().any(|l| l.param == param) {
                        probes.loops.push(LoopProbe { param, line });
                    }
                }
            }
            "raise_statement" if request.raises => {
                if let Some(exception) = raised_name(node, source) {
                    let trigger = guarding_condition(node, routine.node)
                        .and_then(|cond| trigger_for(cond, source))
                        .filter(|(param, _)| is_param(param.as_str()));
                    probes.exceptions.push(ExceptionProbe { line, exception, trigger });
                }
            }
            _ => {}
        }
    });

    probes
}

/// `ident OP literal` or `literal OP ident`, normalized to ident on the left
fn simple_comparison(node: Node<'_>, source: &PythonSource) -> Option<(String, String, LiteralValue)> {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    let [left, op, right] = children.as_slice() else {
        return None;
    };
    let op = source.text(*op).to_string();
    let bytes = source.bytes();

    if left.kind() == "identifier" {
        let value = extract_literal(*right, bytes)?;
        Some((source.text(*left).to_string(), op, value))
    } else if right.kind() == "identifier" {
        let value = extract_literal(*left, bytes)?;
        Some((source.text(*right).to_string(), flip(&op)?.to_string(), value))
    } else {
        None
    }
}

fn flip(op: &str) -> Option<&'static str> {
    Some(match op {
        "<" => ">",
        ">" => "<",
        "<=" => ">=",
        ">=" => "<=",
        "==" => "==",
        "!=" => "!=",
        "is" => "is",
        _ => return None,
    })
}

/// Name of the raised exception; `None` for a bare re-raise
fn raised_name(raise: Node<'_>, source: &PythonSource) -> Option<String> {
    let expr = raise.named_child(0)?;
    let callee = if expr.kind() == "call" {
        expr.child_by_field_name("function")?
    } else {
        expr
    };
    let name = match callee.kind() {
        "identifier" => source.text(callee).to_string(),
        "attribute" => callee
            .child_by_field_name("attribute")
            .map_or_else(|| "Exception".to_string(), |a| source.text(a).to_string()),
        _ => "Exception".to_string(),
    };
    Some(name)
}

/// Condition of the `if` whose body directly holds `raise`
///
/// Gives up when a `try` sits between the `if` and the routine, since the
/// raise could then be caught.
fn guarding_condition<'t>(raise: Node<'t>, routine: Node<'t>) -> Option<Node<'t>> {
    let block = raise.parent().filter(|p| p.kind() == "block")?;
    let if_stmt = block.parent().filter(|p| p.kind() == "if_statement")?;
    let consequence = if_stmt.child_by_field_name("consequence")?;
    if consequence.id() != block.id() {
        return None;
    }

    let mut scope = if_stmt.parent();
    while let Some(node) = scope {
        if node.id() == routine.id() {
            break;
        }
        if matches!(node.kind(), "try_statement" | "except_clause" | "with_statement") {
            return None;
        }
        scope = node.parent();
    }

    if_stmt.child_by_field_name("condition")
}

/// A (param, value) pair that makes `condition` true
fn trigger_for(condition: Node<'_>, source: &PythonSource) -> Option<(String, LiteralValue)> {
    match condition.kind() {
        "parenthesized_expression" => condition.named_child(0).and_then(|c| trigger_for(c, source)),
        "identifier" => Some((source.text(condition).to_string(), LiteralValue::Bool(true))),
        "not_operator" => {
            let arg = condition.child_by_field_name("argument")?;
            (arg.kind() == "identifier").then(|| (source.text(arg).to_string(), LiteralValue::None))
        }
        "boolean_operator" => {
            let op = condition.child_by_field_name("operator").map(|o| source.text(o))?;
            if op != "or" {
                return None;
            }
            condition
                .child_by_field_name("left")
                .and_then(|l| trigger_for(l, source))
                .or_else(|| {
                    condition
                        .child_by_field_name("right")
                        .and_then(|r| trigger_for(r, source))
                })
        }
        "comparison_operator" => {
            let (param, op, value) = simple_comparison(condition, source)?;
            satisfying_value(&op, value).map(|v| (param, v))
        }
        _ => None,
    }
}

fn satisfying_value(op: &str, value: LiteralValue) -> Option<LiteralValue> {
    match (op, value) {
        ("==" | "is", v) => Some(v),
        ("<=" | ">=", v @ (LiteralValue::Int(_) | LiteralValue::Float(_))) => Some(v),
        ("<", LiteralValue::Int(n)) => n.checked_sub(1).map(LiteralValue::Int),
        (">", LiteralValue::Int(n)) => n.checked_add(1).map(LiteralValue::Int),
        ("!=", LiteralValue::Int(n)) => n.checked_add(1).map(LiteralValue::Int),
        ("<", LiteralValue::Float(f)) => Some(LiteralValue::Float(f - 1.0)),
        (">", LiteralValue::Float(f)) => Some(LiteralValue::Float(f + 1.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "\
def process(items, limit, mode=None):
    if limit < 0:
        raise ValueError('negative')
    if not items or mode == 'strict':
        raise errors.EmptyError()
    total = 0
    for item in items:
        if item > limit:
            total += 1
    try:
        if limit == 7:
            raise KeyError(limit)
    except KeyError:
        pass
    return [x for x in items if x != 3]
";

    fn lines(range: std::ops::RangeInclusive<u32>) -> BTreeSet<u32> {
        range.collect()
    }

    fn all_requests() -> ProbeRequest {
        ProbeRequest { comparisons: true, loops: true, raises: true }
    }

    #[test]
    fn probes_from_changed_constructs() {
        let source = PythonSource::parse(SOURCE).unwrap();
        let routine = source.find_routine("process", None).unwrap();
        let probes = collect_probes(&source, &routine, &lines(1..=15), &["items", "limit", "mode"], all_requests());

        assert_eq!(
            probes.boundaries,
            vec![
                BoundaryProbe { param: "limit".into(), line: 2, pivot: 0 },
                BoundaryProbe { param: "limit".into(), line: 11, pivot: 7 },
            ]
        );
        assert_eq!(probes.boundaries[0].values(), [-1, 0, 1]);

        assert_eq!(probes.loops, vec![LoopProbe { param: "items".into(), line: 7 }]);

        assert_eq!(probes.exceptions.len(), 3);
        assert_eq!(probes.exceptions[0].exception, "ValueError");
        assert_eq!(probes.exceptions[0].trigger, Some(("limit".into(), LiteralValue::Int(-1))));
        assert_eq!(probes.exceptions[1].exception, "EmptyError");
        assert_eq!(probes.exceptions[1].trigger, Some(("items".into(), LiteralValue::None)));
        assert_eq!(probes.exceptions[2].exception, "KeyError");
        assert_eq!(probes.exceptions[2].trigger, None, "raise inside try is not triggered");
    }

    #[test]
    fn unchanged_lines_and_unrequested_families_are_ignored() {
        let source = PythonSource::parse(SOURCE).unwrap();
        let routine = source.find_routine("process", None).unwrap();
        let request = ProbeRequest { comparisons: true, ..ProbeRequest::default() };
        let probes = collect_probes(&source, &routine, &lines(2..=2), &["items", "limit"], request);
        assert_eq!(probes.boundaries.len(), 1);
        assert!(probes.loops.is_empty());
        assert!(probes.exceptions.is_empty());
    }

    #[test]
    fn comparisons_on_locals_are_skipped() {
        let source = PythonSource::parse(SOURCE).unwrap();
        let routine = source.find_routine("process", None).unwrap();
        let probes = collect_probes(&source, &routine, &lines(8..=8), &["limit"], all_requests());
        assert!(probes.is_empty(), "`item > limit` compares two names");
    }

    #[test]
    fn satisfying_values() {
        assert_eq!(satisfying_value(">=", LiteralValue::Int(5)), Some(LiteralValue::Int(5)));
        assert_eq!(satisfying_value("!=", LiteralValue::Int(5)), Some(LiteralValue::Int(6)));
        assert_eq!(satisfying_value("in", LiteralValue::Int(5)), None);
        assert_eq!(satisfying_value("is", LiteralValue::None), Some(LiteralValue::None));
    }
}
