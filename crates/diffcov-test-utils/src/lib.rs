//! Testing utilities for the diffcov workspace
//!
//! Shared Python fixtures, diff builders and temporary test corpora.

#![allow(missing_docs)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Arithmetic module; `divide` spans lines 10–14
pub const CALC_SOURCE: &str = r#""""Small arithmetic helpers."""


def add(a, b):
    return a + b


# Division with a guard

def divide(a, b):
    """Divide a by b."""
    if b == 0:
        raise ValueError("division by zero")
    return a / b
"#;

/// Rewrites the guard on line 12 of [`CALC_SOURCE`]
pub const CALC_DIFF: &str = r#"diff --git a/calc.py b/calc.py
--- a/calc.py
+++ b/calc.py
@@ -10,5 +10,5 @@ def add(a, b):
 def divide(a, b):
     """Divide a by b."""
-    if b is None:
+    if b == 0:
         raise ValueError("division by zero")
     return a / b
"#;

/// Class with a validated constructor and a loop-bearing method
pub const WIDGET_SOURCE: &str = r#"class Widget:
    def __init__(self, size: int = 1, color: str = "red"):
        if size < 0:
            raise ValueError("size must be non-negative")
        self.size = size
        self.color = color

    def area(self):
        return self.size * self.size

    def scaled(self, factors):
        out = []
        for factor in factors:
            out.append(self.size * factor)
        return out
"#;

/// Adds the negative-size guard (lines 3–4) to [`WIDGET_SOURCE`]
pub const WIDGET_DIFF: &str = r#"--- a/src/shapes/widget.py
+++ b/src/shapes/widget.py
@@ -1,4 +1,6 @@
 class Widget:
     def __init__(self, size: int = 1, color: str = "red"):
+        if size < 0:
+            raise ValueError("size must be non-negative")
         self.size = size
         self.color = color
"#;

/// Test file constructing `Widget` three times, two calls identical
pub const WIDGET_TESTS: &str = r#"from shapes.widget import Widget


def test_small():
    w = Widget(size=10, color="red")
    assert w.area() == 100


def test_large():
    w = Widget(size=20, color="red")
    assert w.area() == 400


def test_large_again():
    w = Widget(size=20, color="red")
    assert w.size == 20
"#;

/// A corpus directory on disk, removed on drop
#[derive(Debug)]
pub struct CorpusDir {
    dir: TempDir,
}

impl CorpusDir {
    /// Create an empty corpus
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Root of the corpus
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the root, creating parent directories
    pub fn write(&self, relative: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }
}

/// Corpus holding [`WIDGET_TESTS`] plus distractors the learner must skip
pub fn widget_corpus() -> io::Result<CorpusDir> {
    let corpus = CorpusDir::new()?;
    corpus.write("tests/test_widget.py", WIDGET_TESTS)?;
    // Name lacks the test marker
    corpus.write("tests/helpers.py", "from shapes.widget import Widget\nW = Widget(size=99)\n")?;
    // Skipped directory
    corpus.write(
        "tests/__pycache__/test_widget.py",
        "Widget(size=77, color=\"blue\")\n",
    )?;
    // Marker present but no mention of the type
    corpus.write("tests/test_other.py", "def test_noop():\n    assert True\n")?;
    Ok(corpus)
}

/// Build a single-hunk diff that inserts `added` after `context` lines
///
/// `context` is the unchanged text starting at `start` on both sides.
pub fn insertion_diff(path: &str, start: u32, context: &[&str], added: &[&str]) -> String {
    let old_len = context.len();
    let new_len = context.len() + added.len();
    let mut out = format!("--- a/{path}\n+++ b/{path}\n@@ -{start},{old_len} +{start},{new_len} @@\n");
    for line in context {
        out.push(' ');
        out.push_str(line);
        out.push('\n');
    }
    for line in added {
        out.push('+');
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// coverage.py JSON report for a single file
pub fn coverage_json(path: &str, executed: &[u32], missing: &[u32]) -> String {
    coverage_json_with_branches(path, executed, missing, &[], &[])
}

/// coverage.py JSON report for a single file, with branch arcs
pub fn coverage_json_with_branches(
    path: &str,
    executed: &[u32],
    missing: &[u32],
    executed_branches: &[(i64, i64)],
    missing_branches: &[(i64, i64)],
) -> String {
    let arcs = |pairs: &[(i64, i64)]| -> Vec<[i64; 2]> { pairs.iter().map(|&(a, b)| [a, b]).collect() };
    serde_json::json!({
        "meta": { "version": "7.4.0", "branch_coverage": !executed_branches.is_empty() || !missing_branches.is_empty() },
        "files": {
            path: {
                "executed_lines": executed,
                "missing_lines": missing,
                "executed_branches": arcs(executed_branches),
                "missing_branches": arcs(missing_branches),
                "summary": { "covered_lines": executed.len(), "num_statements": executed.len() + missing.len() }
            }
        }
    })
    .to_string()
}
