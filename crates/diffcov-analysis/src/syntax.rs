//! Python syntax trees via tree-sitter
//!
//! Parses post-patch sources and resolves routine definitions, their line
//! spans, enclosing scopes and declared parameters.

use crate::error::{AnalysisError, AnalysisResult};
use crate::literal::{extract_literal, LiteralValue};
use tree_sitter::{Node, Parser, Tree};

/// Build a parser loaded with the Python grammar
///
/// # Errors
/// Returns [`AnalysisError::ParserInit`] if the grammar version is incompatible
pub fn python_parser() -> AnalysisResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| AnalysisError::ParserInit(e.to_string()))?;
    Ok(parser)
}

/// A parsed Python source file
#[derive(Debug)]
pub struct PythonSource {
    source: String,
    tree: Tree,
}

impl PythonSource {
    /// Parse source text, rejecting trees that contain syntax errors
    ///
    /// # Errors
    /// - [`AnalysisError::SyntaxError`] when the tree has error or missing nodes
    /// - [`AnalysisError::ParseFailed`] when no tree was produced
    pub fn parse(source: &str) -> AnalysisResult<Self> {
        let parsed = Self::parse_lenient(source)?;
        if let Some(node) = first_error(parsed.tree.root_node()) {
            return Err(AnalysisError::SyntaxError {
                line: row_to_line(node.start_position().row),
                column: u32::try_from(node.start_position().column).unwrap_or(u32::MAX),
            });
        }
        Ok(parsed)
    }

    /// Parse source text, keeping trees that contain syntax errors
    ///
    /// # Errors
    /// Returns [`AnalysisError::ParseFailed`] when no tree was produced
    pub fn parse_lenient(source: &str) -> AnalysisResult<Self> {
        let mut parser = python_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or(AnalysisError::ParseFailed)?;
        Ok(Self {
            source: source.to_string(),
            tree,
        })
    }

    /// Get source text
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get source bytes
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    /// Root node of the tree
    #[inline]
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Text covered by a node
    #[inline]
    #[must_use]
    pub fn text<'a>(&'a self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Number of lines in the source
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> u32 {
        u32::try_from(self.source.lines().count()).unwrap_or(u32::MAX)
    }

    /// All routine definitions, in source order
    #[must_use]
    pub fn routines(&self) -> Vec<RoutineDef<'_>> {
        let mut out = Vec::new();
        collect_routines(self.root(), self, &mut out);
        out
    }

    /// Find a routine by name, optionally restricted to a class
    #[must_use]
    pub fn find_routine(&self, name: &str, class_name: Option<&str>) -> Option<RoutineDef<'_>> {
        self.routines()
            .into_iter()
            .find(|r| r.name == name && (class_name.is_none() || r.class_name.as_deref() == class_name))
    }

    /// Find a class definition by name
    #[must_use]
    pub fn find_class(&self, name: &str) -> Option<Node<'_>> {
        find_node(self.root(), &|n| {
            n.kind() == "class_definition"
                && n.child_by_field_name("name")
                    .is_some_and(|id| self.text(id) == name)
        })
    }
}

/// A `def` / `async def`, with its resolved scope
#[derive(Debug, Clone)]
pub struct RoutineDef<'t> {
    /// Routine name
    pub name: String,
    /// The `function_definition` node
    pub node: Node<'t>,
    /// First line (1-based), including decorators
    pub start_line: u32,
    /// Last line (1-based)
    pub end_line: u32,
    /// Name of the class whose body directly holds this routine
    pub class_name: Option<String>,
    /// Dotted path from module level to that class (`Outer.Inner`), when
    /// no routine encloses it
    pub class_path: Option<String>,
    /// Name of the nearest enclosing routine, for nested definitions
    pub enclosing_function: Option<String>,
    /// Declared with `async def`
    pub is_async: bool,
    /// Decorator expressions, without the `@`
    pub decorators: Vec<String>,
    /// Declared parameters, in order
    pub parameters: Vec<Parameter>,
}

impl RoutineDef<'_> {
    /// Check if a 1-based line falls inside this routine
    #[inline]
    #[must_use]
    pub fn contains_line(&self, line: u32) -> bool {
        (self.start_line..=self.end_line).contains(&line)
    }

    /// Number of lines spanned
    #[inline]
    #[must_use]
    pub fn span_len(&self) -> u32 {
        self.end_line - self.start_line
    }

    /// Check for a decorator by its bare name (`staticmethod`, `property`)
    #[must_use]
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| {
            let head = d.split('(').next().unwrap_or(d).trim();
            head == name || head.rsplit('.').next() == Some(name)
        })
    }

    /// Parameters the caller supplies (drops `self`/`cls` on methods)
    #[must_use]
    pub fn call_parameters(&self) -> Vec<&Parameter> {
        let skip_receiver = self.class_name.is_some() && !self.has_decorator("staticmethod");
        self.parameters
            .iter()
            .enumerate()
            .filter(|(i, p)| !(skip_receiver && *i == 0 && p.kind.is_positional()))
            .map(|(_, p)| p)
            .collect()
    }
}

/// Parameter binding kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Declared before `/`
    PositionalOnly,
    /// Ordinary parameter
    Regular,
    /// Declared after `*` or `*args`
    KeywordOnly,
    /// `*args`
    VarPositional,
    /// `**kwargs`
    VarKeyword,
}

impl ParamKind {
    /// Can bind a positional argument
    #[inline]
    #[must_use]
    pub fn is_positional(self) -> bool {
        matches!(self, Self::PositionalOnly | Self::Regular)
    }

    /// `*args` or `**kwargs`
    #[inline]
    #[must_use]
    pub fn is_variadic(self) -> bool {
        matches!(self, Self::VarPositional | Self::VarKeyword)
    }
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Annotation source text
    pub annotation: Option<String>,
    /// Default value when it is a literal
    pub default: Option<LiteralValue>,
    /// Whether any default is declared (literal or not)
    pub has_default: bool,
    /// Binding kind
    pub kind: ParamKind,
}

/// Convert a 0-based tree-sitter row to a 1-based line
#[inline]
#[must_use]
pub fn row_to_line(row: usize) -> u32 {
    u32::try_from(row + 1).unwrap_or(u32::MAX)
}

/// 1-based line a node starts on
#[inline]
#[must_use]
pub fn node_line(node: Node<'_>) -> u32 {
    row_to_line(node.start_position().row)
}

/// First node (pre-order) matching a predicate
pub fn find_node<'t>(node: Node<'t>, pred: &dyn Fn(Node<'t>) -> bool) -> Option<Node<'t>> {
    if pred(node) {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(|child| find_node(child, pred))
}

/// Visit a routine's own subtree, not descending into nested definitions
pub fn walk_routine_body<'t>(routine: Node<'t>, visit: &mut dyn FnMut(Node<'t>)) {
    let mut cursor = routine.walk();
    let children: Vec<Node<'t>> = routine.children(&mut cursor).collect();
    for child in children {
        walk_skipping_definitions(child, visit);
    }
}

fn walk_skipping_definitions<'t>(node: Node<'t>, visit: &mut dyn FnMut(Node<'t>)) {
    if matches!(node.kind(), "function_definition" | "class_definition") {
        return;
    }
    visit(node);
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    for child in children {
        walk_skipping_definitions(child, visit);
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error).or(Some(node))
}

fn collect_routines<'t>(node: Node<'t>, source: &'t PythonSource, out: &mut Vec<RoutineDef<'t>>) {
    if node.kind() == "function_definition" {
        if let Some(def) = build_routine(node, source) {
            out.push(def);
        }
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    for child in children {
        collect_routines(child, source, out);
    }
}

fn build_routine<'t>(node: Node<'t>, source: &'t PythonSource) -> Option<RoutineDef<'t>> {
    let name = source.text(node.child_by_field_name("name")?).to_string();
    if name.is_empty() {
        return None;
    }

    // Decorators live on the wrapping decorated_definition
    let outer = node
        .parent()
        .filter(|p| p.kind() == "decorated_definition")
        .unwrap_or(node);

    let mut decorators = Vec::new();
    if outer.id() != node.id() {
        let mut cursor = outer.walk();
        for child in outer.named_children(&mut cursor) {
            if child.kind() == "decorator" {
                decorators.push(source.text(child).trim_start_matches('@').trim().to_string());
            }
        }
    }

    let is_async = {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).any(|c| c.kind() == "async");
        found || source.text(node).starts_with("async")
    };

    let Scopes {
        class_name,
        class_path,
        enclosing_function,
    } = enclosing_scopes(outer, source);

    Some(RoutineDef {
        name,
        node,
        start_line: node_line(outer),
        end_line: row_to_line(outer.end_position().row),
        class_name,
        class_path,
        enclosing_function,
        is_async,
        decorators,
        parameters: node
            .child_by_field_name("parameters")
            .map(|p| parse_parameters(p, source))
            .unwrap_or_default(),
    })
}

/// Scope links of one definition
struct Scopes {
    class_name: Option<String>,
    class_path: Option<String>,
    enclosing_function: Option<String>,
}

/// Walk outward: the nearest class only counts if no routine sits in between
fn enclosing_scopes(node: Node<'_>, source: &PythonSource) -> Scopes {
    let mut class_name = None;
    let mut enclosing_function = None;
    let mut classes: Vec<String> = Vec::new();
    let mut nearest_decided = false;
    let mut current = node.parent();

    while let Some(scope) = current {
        let name = || {
            scope
                .child_by_field_name("name")
                .map(|n| source.text(n).to_string())
        };
        match scope.kind() {
            "class_definition" => {
                if !nearest_decided {
                    class_name = name();
                    nearest_decided = true;
                }
                classes.extend(name());
            }
            "function_definition" => {
                enclosing_function = name();
                break;
            }
            _ => {}
        }
        current = scope.parent();
    }

    // A class inside a routine has no importable path
    let class_path = (class_name.is_some() && enclosing_function.is_none()).then(|| {
        classes.reverse();
        classes.join(".")
    });

    Scopes {
        class_name,
        class_path,
        enclosing_function,
    }
}

fn parse_parameters(node: Node<'_>, source: &PythonSource) -> Vec<Parameter> {
    let bytes = source.bytes();
    let mut params: Vec<Parameter> = Vec::new();
    let mut keyword_only = false;
    let mut cursor = node.walk();

    for child in node.named_children(&mut cursor) {
        let regular = if keyword_only { ParamKind::KeywordOnly } else { ParamKind::Regular };
        let param = match child.kind() {
            "identifier" => Some(Parameter {
                name: source.text(child).to_string(),
                annotation: None,
                default: None,
                has_default: false,
                kind: regular,
            }),
            "typed_parameter" => {
                let annotation = child
                    .child_by_field_name("type")
                    .map(|t| source.text(t).to_string());
                let mut inner = child.walk();
                let head = child.named_children(&mut inner).next();
                head.and_then(|h| match h.kind() {
                    "identifier" => Some((source.text(h).to_string(), regular)),
                    "list_splat_pattern" => Some((splat_name(h, source), ParamKind::VarPositional)),
                    "dictionary_splat_pattern" => Some((splat_name(h, source), ParamKind::VarKeyword)),
                    _ => None,
                })
                .map(|(name, kind)| Parameter {
                    name,
                    annotation,
                    default: None,
                    has_default: false,
                    kind,
                })
            }
            "default_parameter" | "typed_default_parameter" => {
                let value = child.child_by_field_name("value");
                child.child_by_field_name("name").map(|n| Parameter {
                    name: source.text(n).to_string(),
                    annotation: child
                        .child_by_field_name("type")
                        .map(|t| source.text(t).to_string()),
                    default: value.and_then(|v| extract_literal(v, bytes)),
                    has_default: value.is_some(),
                    kind: regular,
                })
            }
            "list_splat_pattern" => Some(Parameter {
                name: splat_name(child, source),
                annotation: None,
                default: None,
                has_default: false,
                kind: ParamKind::VarPositional,
            }),
            "dictionary_splat_pattern" => Some(Parameter {
                name: splat_name(child, source),
                annotation: None,
                default: None,
                has_default: false,
                kind: ParamKind::VarKeyword,
            }),
            "keyword_separator" => {
                keyword_only = true;
                None
            }
            "positional_separator" => {
                for p in &mut params {
                    if p.kind == ParamKind::Regular {
                        p.kind = ParamKind::PositionalOnly;
                    }
                }
                None
            }
            _ => None,
        };

        if let Some(p) = param {
            if p.kind == ParamKind::VarPositional {
                keyword_only = true;
            }
            params.push(p);
        }
    }

    params
}

fn splat_name(node: Node<'_>, source: &PythonSource) -> String {
    source
        .text(node)
        .trim_start_matches('*')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHAPES: &str = "\
import math


class Widget:
    def __init__(self, size: int = 1, color=\"red\"):
        self.size = size
        self.color = color

    @staticmethod
    def unit(scale, /, *, label: str = \"u\"):
        return Widget(scale)

    def area(self):
        def helper(x):
            return x * x
        return helper(self.size)


async def fetch(*args, **kwargs):
    return args
";

    #[test]
    fn rejects_invalid_source() {
        let err = PythonSource::parse("def broken(:\n    pass\n").unwrap_err();
        assert!(matches!(err, AnalysisError::SyntaxError { line: 1, .. }));
    }

    #[test]
    fn lenient_parse_keeps_errors() {
        assert!(PythonSource::parse_lenient("def broken(:\n").is_ok());
    }

    #[test]
    fn routines_with_spans_and_scopes() {
        let source = PythonSource::parse(SHAPES).unwrap();
        let routines = source.routines();
        let names: Vec<&str> = routines.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["__init__", "unit", "area", "helper", "fetch"]);

        let init = &routines[0];
        assert_eq!((init.start_line, init.end_line), (5, 7));
        assert_eq!(init.class_name.as_deref(), Some("Widget"));
        assert_eq!(init.class_path.as_deref(), Some("Widget"));

        let unit = &routines[1];
        assert_eq!(unit.start_line, 9, "span includes decorator line");
        assert!(unit.has_decorator("staticmethod"));

        let helper = &routines[3];
        assert_eq!(helper.class_name, None, "nearest scope is a routine");
        assert_eq!(helper.enclosing_function.as_deref(), Some("area"));

        let fetch = &routines[4];
        assert!(fetch.is_async);
        assert_eq!(fetch.class_name, None);
    }

    #[test]
    fn nested_classes_carry_dotted_path() {
        let source = PythonSource::parse(
            "class Outer:\n    class Inner:\n        def m(self):\n            return 1\n\n\ndef build():\n    class Local:\n        def n(self):\n            return 2\n    return Local\n",
        )
        .unwrap();
        let m = source.find_routine("m", None).unwrap();
        assert_eq!(m.class_name.as_deref(), Some("Inner"));
        assert_eq!(m.class_path.as_deref(), Some("Outer.Inner"));

        let n = source.find_routine("n", None).unwrap();
        assert_eq!(n.class_name.as_deref(), Some("Local"));
        assert_eq!(n.class_path, None);
        assert_eq!(n.enclosing_function.as_deref(), Some("build"));

        let build = source.find_routine("build", None).unwrap();
        assert_eq!((build.class_name, build.class_path), (None, None));
    }

    #[test]
    fn parameters_and_kinds() {
        let source = PythonSource::parse(SHAPES).unwrap();
        let init = source.find_routine("__init__", Some("Widget")).unwrap();
        let params = init.call_parameters();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "size");
        assert_eq!(params[0].annotation.as_deref(), Some("int"));
        assert_eq!(params[0].default, Some(LiteralValue::Int(1)));
        assert_eq!(params[1].default, Some(LiteralValue::Str("red".into())));

        let unit = source.find_routine("unit", None).unwrap();
        let kinds: Vec<ParamKind> = unit.call_parameters().iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ParamKind::PositionalOnly, ParamKind::KeywordOnly]);

        let fetch = source.find_routine("fetch", None).unwrap();
        let kinds: Vec<ParamKind> = fetch.parameters.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ParamKind::VarPositional, ParamKind::VarKeyword]);
        assert_eq!(fetch.parameters[0].name, "args");
    }

    #[test]
    fn finds_class() {
        let source = PythonSource::parse(SHAPES).unwrap();
        assert!(source.find_class("Widget").is_some());
        assert!(source.find_class("Gadget").is_none());
        assert_eq!(source.line_count(), 20);
    }
}
