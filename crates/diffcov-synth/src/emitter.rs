//! Python test-module rendering

use crate::config::SynthesisConfig;
use indexmap::IndexSet;
use std::collections::HashSet;
use std::fmt::Write as _;

const INDENT: &str = "    ";

/// Helpers shared by every synthesized test
const PREAMBLE: &str = r#"_PRIMITIVES = (type(None), bool, int, float, complex, str, bytes)


def _resolve(value):
    """Drive coroutines and other awaitables to completion."""
    if inspect.iscoroutine(value):
        return asyncio.run(value)
    if inspect.isawaitable(value):
        async def _await():
            return await value
        return asyncio.run(_await())
    return value


def _build_instance(_cls, /, *args, **kwargs):
    """Construct `_cls`, falling back to a bare instance if construction fails."""
    try:
        return _cls(*args, **kwargs)
    except Exception:
        return _cls.__new__(_cls)


def _outcome(fn):
    try:
        return ("ok", _resolve(fn()))
    except EXPECTED_EXCEPTIONS as exc:
        return ("raised", type(exc))


def _assert_deterministic(fn):
    """Invoke twice; outcomes must agree in kind, type, and primitive value."""
    first = _outcome(fn)
    second = _outcome(fn)
    assert first[0] == second[0], (first, second)
    if first[0] == "raised":
        assert first[1] is second[1], (first, second)
    elif isinstance(first[1], _PRIMITIVES) and isinstance(second[1], _PRIMITIVES):
        assert first[1] == second[1] or first[1] != first[1], (first, second)
    else:
        assert type(first[1]) is type(second[1]), (first, second)
    return first


def _resolve_exc(name):
    found = getattr(builtins, name, None) or getattr(target_module, name, None)
    if isinstance(found, type) and issubclass(found, BaseException):
        return found
    return Exception
"#;

/// One `def test_...` in the output
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestFunction {
    /// Function name, unique within the module
    pub name: String,
    /// Decorator lines, without `@`
    pub decorators: Vec<String>,
    /// Parameter names
    pub params: Vec<String>,
    /// One-line docstring
    pub docstring: Option<String>,
    /// Body lines, unindented
    pub body: Vec<String>,
}

impl TestFunction {
    /// Create test function
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a decorator
    #[must_use]
    pub fn decorated(mut self, decorator: impl Into<String>) -> Self {
        self.decorators.push(decorator.into());
        self
    }

    /// Set parameters
    #[must_use]
    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    /// Set docstring
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.docstring = Some(doc.into());
        self
    }

    /// Append body line
    #[must_use]
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }

    fn render(&self, out: &mut String) {
        for decorator in &self.decorators {
            let _ = writeln!(out, "@{decorator}");
        }
        let _ = writeln!(out, "def {}({}):", self.name, self.params.join(", "));
        if let Some(doc) = &self.docstring {
            let _ = writeln!(out, "{INDENT}\"\"\"{}\"\"\"", escape_doc(doc));
        }
        if self.body.is_empty() {
            let _ = writeln!(out, "{INDENT}pass");
        }
        for line in &self.body {
            if line.is_empty() {
                out.push('\n');
            } else {
                let _ = writeln!(out, "{INDENT}{line}");
            }
        }
    }
}

/// A synthesized pytest module
#[derive(Debug, Clone, Default)]
pub struct TestModule {
    module_path: String,
    imports: IndexSet<String>,
    functions: Vec<TestFunction>,
    taken: HashSet<String>,
}

impl TestModule {
    /// Create module targeting `module_path`
    #[must_use]
    pub fn new(module_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            ..Self::default()
        }
    }

    /// Record a name for `from <module> import ...`
    pub fn import(&mut self, name: &str) {
        if is_identifier(name) {
            self.imports.insert(name.to_string());
        }
    }

    /// Reserve a unique test name derived from `base`
    pub fn unique_name(&mut self, base: &str) -> String {
        let base = sanitize(base);
        let mut name = base.clone();
        let mut n = 2;
        while !self.taken.insert(name.clone()) {
            name = format!("{base}_{n}");
            n += 1;
        }
        name
    }

    /// Append a test function
    pub fn push(&mut self, function: TestFunction) {
        self.functions.push(function);
    }

    /// Number of test functions
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if no test function was added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Render the module text
    ///
    /// A module without tests is just its docstring.
    #[must_use]
    pub fn render(&self, config: &SynthesisConfig) -> String {
        let mut out = String::new();
        let target = if self.module_path.is_empty() { "<unknown>" } else { &self.module_path };
        let _ = writeln!(out, "\"\"\"Synthesized change-aware tests for {target}.");

        if !is_module_path(&self.module_path) {
            out.push_str("\nModule path cannot be loaded; nothing to exercise.\n\"\"\"\n");
            return out;
        }
        if self.functions.is_empty() {
            out.push_str("\nNo changed routines; nothing to exercise.\n\"\"\"\n");
            return out;
        }
        out.push_str("\"\"\"\n\n");

        out.push_str("import asyncio\nimport builtins\nimport inspect\n\n");
        out.push_str("import pytest\nfrom hypothesis import given, settings, strategies as st\n\n");
        let _ = writeln!(out, "import {} as target_module", self.module_path);
        if !self.imports.is_empty() {
            let names: Vec<&str> = self.imports.iter().map(String::as_str).collect();
            let _ = writeln!(out, "from {} import {}", self.module_path, names.join(", "));
        }
        out.push('\n');
        let _ = writeln!(out, "EXPECTED_EXCEPTIONS = {}", config.exception_tuple());
        out.push_str(PREAMBLE);

        for function in &self.functions {
            out.push_str("\n\n");
            function.render(&mut out);
        }
        out
    }
}

fn sanitize(base: &str) -> String {
    let mut out = String::with_capacity(base.len());
    let mut last_underscore = false;
    for c in base.chars() {
        let c = if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' };
        if c == '_' {
            if !last_underscore {
                out.push(c);
            }
            last_underscore = true;
        } else {
            out.push(c);
            last_underscore = false;
        }
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.starts_with("test_") {
        trimmed.to_string()
    } else {
        format!("test_{}", trimmed.trim_start_matches('_'))
    }
}

/// Dotted path of identifiers, usable after `import`
#[must_use]
pub fn is_module_path(path: &str) -> bool {
    path.split('.').all(is_identifier)
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn escape_doc(doc: &str) -> String {
    doc.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}
