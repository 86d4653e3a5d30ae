//! Corpus scanning and call-site extraction
//!
//! The learner is stateless: every query walks the corpus again unless the
//! caller routes it through a [`PatternCache`].

use crate::cache::{PatternCache, PatternKey};
use crate::config::LearnerConfig;
use crate::error::{LearnError, LearnResult};
use crate::pattern::{ClassTestPatterns, InstancePattern, SourceLocation};
use diffcov_analysis::syntax::node_line;
use diffcov_analysis::{extract_literal, AnalysisResult, PythonSource};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tree_sitter::Node;
use walkdir::WalkDir;

/// Mines literal construction and call patterns from test files
#[derive(Debug, Clone, Default)]
pub struct PatternLearner {
    config: LearnerConfig,
}

impl PatternLearner {
    /// Create learner
    #[inline]
    #[must_use]
    pub fn new(config: LearnerConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Learn patterns for `target`, degrading to empty patterns on failure
    #[must_use]
    pub fn learn(
        &self,
        target: &str,
        module_hint: Option<&str>,
        corpus_root: &Path,
    ) -> ClassTestPatterns {
        match self.try_learn(target, module_hint, corpus_root) {
            Ok(patterns) => patterns,
            Err(e) => {
                tracing::warn!(name = target, corpus = %corpus_root.display(), error = %e, "pattern learning degraded to empty");
                ClassTestPatterns::empty(target)
            }
        }
    }

    /// Learn through a caller-owned cache
    pub fn learn_cached(
        &self,
        cache: &PatternCache,
        target: &str,
        module_hint: Option<&str>,
        corpus_root: &Path,
    ) -> Arc<ClassTestPatterns> {
        let key = PatternKey::new(target, module_hint, corpus_root);
        cache.get_or_learn(key, || self.learn(target, module_hint, corpus_root))
    }

    /// Learn patterns for `target`
    ///
    /// Unreadable and unparseable candidates are logged and skipped.
    ///
    /// # Errors
    /// - [`LearnError::MissingCorpus`] if `corpus_root` is not a directory
    /// - [`LearnError::Walk`] if the root itself cannot be traversed
    pub fn try_learn(
        &self,
        target: &str,
        module_hint: Option<&str>,
        corpus_root: &Path,
    ) -> LearnResult<ClassTestPatterns> {
        let scan = self.scan(target, module_hint, corpus_root)?;
        let mut observations = Vec::new();

        for candidate in &scan.candidates {
            let label = relative_label(corpus_root, &candidate.path);
            match extract_calls(&candidate.text, target, &label) {
                Ok(found) => {
                    tracing::debug!(file = %label, calls = found.len(), "scanned candidate");
                    observations.extend(found);
                }
                Err(e) => {
                    tracing::warn!(error = %LearnError::parse_error(&candidate.path, e), "skipping candidate");
                }
            }
        }

        let patterns = ClassTestPatterns::from_observations(target, observations);
        tracing::info!(
            name = target,
            candidates = scan.candidates.len(),
            read = scan.read,
            patterns = patterns.patterns.len(),
            "learned patterns"
        );
        Ok(patterns)
    }

    /// Test files under `corpus_root` that mention `target`, capped
    ///
    /// Files are visited in sorted order; those mentioning the last segment
    /// of `module_hint` come first. At most `max_scanned` test files are read.
    ///
    /// # Errors
    /// - [`LearnError::MissingCorpus`] if `corpus_root` is not a directory
    /// - [`LearnError::Walk`] if the root itself cannot be traversed
    pub fn candidate_files(
        &self,
        target: &str,
        module_hint: Option<&str>,
        corpus_root: &Path,
    ) -> LearnResult<Vec<PathBuf>> {
        Ok(self
            .scan(target, module_hint, corpus_root)?
            .candidates
            .into_iter()
            .map(|c| c.path)
            .collect())
    }

    /// Walk the corpus, reading test files until the candidate list is settled
    ///
    /// Scanning stops once `max_files` hinted candidates are held (nothing
    /// later can displace them), once `max_files` candidates are held and
    /// there is no hint, or when the `max_scanned` read budget runs out.
    fn scan(&self, target: &str, module_hint: Option<&str>, corpus_root: &Path) -> LearnResult<Scan> {
        if !corpus_root.is_dir() {
            return Err(LearnError::MissingCorpus(corpus_root.to_path_buf()));
        }

        let hint = module_hint
            .and_then(|h| h.rsplit('.').next())
            .filter(|s| !s.is_empty());
        let cap = self.config.max_files;

        let walker = WalkDir::new(corpus_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !self.config.is_skipped_dir(&entry.file_name().to_string_lossy())
            });

        let mut hinted: Vec<Candidate> = Vec::new();
        let mut plain: Vec<Candidate> = Vec::new();
        let mut read = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping corpus entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let is_test_source = {
                let name = entry.file_name().to_string_lossy();
                name.ends_with(".py") && self.config.is_test_file_name(&name)
            };
            if !is_test_source {
                continue;
            }

            if hinted.len() >= cap || (hint.is_none() && plain.len() >= cap) {
                tracing::debug!(name = target, cap, "candidate list settled");
                break;
            }
            if read >= self.config.max_scanned {
                tracing::debug!(name = target, budget = self.config.max_scanned, "read budget exhausted");
                break;
            }
            read += 1;

            let text = match fs::read_to_string(entry.path()) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(error = %LearnError::io_error(entry.path(), e), "skipping unreadable file");
                    continue;
                }
            };
            if !text.contains(target) {
                continue;
            }
            let is_hinted = hint.is_some_and(|h| text.contains(h));
            let candidate = Candidate {
                path: entry.into_path(),
                text,
            };
            if is_hinted {
                hinted.push(candidate);
            } else if plain.len() < cap {
                plain.push(candidate);
            }
        }

        // Sorted order is kept within each group
        let mut candidates = hinted;
        candidates.extend(plain);
        candidates.truncate(cap);
        Ok(Scan { candidates, read })
    }
}

/// A test file that mentions the target, with its text
#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    text: String,
}

/// Outcome of one corpus walk
#[derive(Debug)]
struct Scan {
    candidates: Vec<Candidate>,
    /// Test files read, matching or not
    read: usize,
}

/// Every call to `target` in `source`, literal arguments only
///
/// A callee matches when it is the bare name or an attribute access ending
/// in the name (`Widget(...)`, `shapes.Widget(...)`, `w.area(...)`).
///
/// # Errors
/// Returns the parse error if `source` is not valid Python
pub fn extract_calls(source: &str, target: &str, file: &str) -> AnalysisResult<Vec<InstancePattern>> {
    let parsed = PythonSource::parse(source)?;
    let mut out = Vec::new();
    collect_calls(parsed.root(), &parsed, target, file, &mut out);
    Ok(out)
}

fn collect_calls(
    node: Node<'_>,
    parsed: &PythonSource,
    target: &str,
    file: &str,
    out: &mut Vec<InstancePattern>,
) {
    if node.kind() == "call" {
        if let Some(pattern) = call_pattern(node, parsed, target, file) {
            out.push(pattern);
        }
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    for child in children {
        collect_calls(child, parsed, target, file, out);
    }
}

fn callee_matches(callee: Node<'_>, parsed: &PythonSource, target: &str) -> bool {
    match callee.kind() {
        "identifier" => parsed.text(callee) == target,
        "attribute" => callee
            .child_by_field_name("attribute")
            .is_some_and(|attr| parsed.text(attr) == target),
        _ => false,
    }
}

fn call_pattern(
    call: Node<'_>,
    parsed: &PythonSource,
    target: &str,
    file: &str,
) -> Option<InstancePattern> {
    let callee = call.child_by_field_name("function")?;
    if !callee_matches(callee, parsed, target) {
        return None;
    }

    let bytes = parsed.bytes();
    let mut positional = Vec::new();
    let mut parameters = IndexMap::new();
    // Positions after a dropped argument are unknown
    let mut positional_open = true;

    if let Some(args) = call
        .child_by_field_name("arguments")
        .filter(|a| a.kind() == "argument_list")
    {
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            match arg.kind() {
                "keyword_argument" => {
                    let name = arg.child_by_field_name("name").map(|n| parsed.text(n));
                    let value = arg
                        .child_by_field_name("value")
                        .and_then(|v| extract_literal(v, bytes));
                    if let (Some(name), Some(value)) = (name, value) {
                        parameters.insert(name.to_string(), value);
                    }
                }
                "comment" | "dictionary_splat" => {}
                "list_splat" => positional_open = false,
                _ if positional_open => match extract_literal(arg, bytes) {
                    Some(value) => positional.push(value),
                    None => positional_open = false,
                },
                _ => {}
            }
        }
    }

    Some(InstancePattern {
        type_name: target.to_string(),
        positional,
        parameters,
        source_location: SourceLocation {
            file: file.to_string(),
            line: node_line(call),
        },
        frequency: 1,
    })
}

fn relative_label(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffcov_analysis::LiteralValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_keyword_and_positional_literals() {
        let source = "\
import shapes

def test_it():
    a = Widget(3, -2.5, name='x', tags=['a', 'b'])
    b = shapes.Widget(size=len('abc'), color=None)
    c = Widget(*dims, 4)
    d = Widget(compute(), 7, flag=True)
    return Gadget(1)
";
        let calls = extract_calls(source, "Widget", "t.py").unwrap();
        assert_eq!(calls.len(), 4);

        assert_eq!(calls[0].positional, vec![LiteralValue::Int(3), LiteralValue::Float(-2.5)]);
        assert_eq!(calls[0].parameters["name"], LiteralValue::Str("x".into()));
        assert_eq!(calls[0].source_location.line, 4);

        // Non-literal keyword dropped, literal kept
        assert_eq!(calls[1].parameters.len(), 1);
        assert_eq!(calls[1].parameters["color"], LiteralValue::None);

        assert!(calls[2].positional.is_empty(), "positions after a splat are unknown");
        assert!(calls[3].positional.is_empty());
        assert_eq!(calls[3].parameters["flag"], LiteralValue::Bool(true));
    }

    #[test]
    fn zero_literal_calls_are_recorded() {
        let calls = extract_calls("w.area()\nw.area(other)\n", "area", "t.py").unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(InstancePattern::is_bare));
    }

    #[test]
    fn interpolated_strings_are_not_literals() {
        let calls = extract_calls("Widget(name=f'{x}')\n", "Widget", "t.py").unwrap();
        assert!(calls[0].parameters.is_empty());
    }

    #[test]
    fn unparseable_source_is_error() {
        assert!(extract_calls("Widget(size=\n", "Widget", "t.py").is_err());
    }

    #[test]
    fn reading_stops_once_candidates_are_settled() {
        let corpus = diffcov_test_utils::CorpusDir::new().unwrap();
        for i in 0..12 {
            corpus
                .write(&format!("test_{i:02}.py"), &format!("Widget(size={i})\n"))
                .unwrap();
        }

        let learner = PatternLearner::new(LearnerConfig::default().with_max_files(3));
        let scan = learner.scan("Widget", None, corpus.path()).unwrap();
        assert_eq!(scan.candidates.len(), 3);
        assert_eq!(scan.read, 3);

        // A hint nothing mentions keeps scanning, but only within the budget
        let budgeted = PatternLearner::new(
            LearnerConfig::default().with_max_files(3).with_max_scanned(5),
        );
        let scan = budgeted.scan("Widget", Some("pkg.gadget"), corpus.path()).unwrap();
        assert_eq!(scan.read, 5);
        let names: Vec<String> = scan
            .candidates
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["test_00.py", "test_01.py", "test_02.py"]);
    }

    #[test]
    fn hinted_files_fill_the_cap_first() {
        let corpus = diffcov_test_utils::CorpusDir::new().unwrap();
        corpus.write("test_a.py", "Widget(1)\n").unwrap();
        corpus.write("test_b.py", "from shapes import gadget\nWidget(2)\n").unwrap();
        corpus.write("test_c.py", "from shapes import gadget\nWidget(3)\n").unwrap();
        corpus.write("test_d.py", "from shapes import gadget\nWidget(4)\n").unwrap();

        let learner = PatternLearner::new(LearnerConfig::default().with_max_files(2));
        let scan = learner.scan("Widget", Some("shapes.gadget"), corpus.path()).unwrap();
        // test_d is never read: two hinted candidates already fill the cap
        assert_eq!(scan.read, 3);
        assert!(scan.candidates[0].path.ends_with("test_b.py"));
        assert!(scan.candidates[1].path.ends_with("test_c.py"));
    }

    #[test]
    fn missing_corpus() {
        let learner = PatternLearner::default();
        let err = learner
            .try_learn("Widget", None, Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, LearnError::MissingCorpus(_)));
        assert!(learner.learn("Widget", None, Path::new("/definitely/not/here")).is_empty());
    }
}
