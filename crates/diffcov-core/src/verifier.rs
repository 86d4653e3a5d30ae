//! Patch verification pipeline
//!
//! Wires the four stages together:
//!
//! ```text
//! diff + source ──► DiffScopeMapper ──► ChangeAnalysis
//!                                           │
//!          test corpus ──► PatternLearner ──┤ (per changed class / routine)
//!                                           ▼
//!                                   TestSynthesizer ──► test module text
//!                                                            │ (run externally, twice)
//!          baseline + combined reports ──► CoverageDiffer ◄──┘
//! ```

use crate::config::VerifierConfig;
use crate::error::{VerifierError, VerifierResult};
use diffcov_analysis::{ChangeAnalysis, DiffScopeMapper};
use diffcov_coverage::{default_parsers, CoverageComparison, CoverageDiffer, CoverageReport, ParserRegistry};
use diffcov_patterns::{PatternCache, PatternLearner};
use diffcov_synth::{PatternIndex, SynthesisOutput, TestSynthesizer};
use std::path::Path;

/// One patched file handed to the pipeline
#[derive(Debug, Clone, Copy)]
pub struct PatchInput<'a> {
    /// Repository-relative path of the patched file
    pub file_path: &'a str,
    /// Unified diff text
    pub diff: &'a str,
    /// Post-patch source
    pub source: &'a str,
    /// Existing test corpus to learn from, if any
    pub corpus_root: Option<&'a Path>,
}

impl<'a> PatchInput<'a> {
    /// Create input without a corpus
    #[must_use]
    pub fn new(file_path: &'a str, diff: &'a str, source: &'a str) -> Self {
        Self {
            file_path,
            diff,
            source,
            corpus_root: None,
        }
    }

    /// Learn patterns from `root`
    #[must_use]
    pub fn with_corpus(mut self, root: &'a Path) -> Self {
        self.corpus_root = Some(root);
        self
    }
}

/// Everything produced before the synthesized tests are run
#[derive(Debug, Clone)]
pub struct PreparedPatch {
    /// Changed scope
    pub analysis: ChangeAnalysis,
    /// Non-empty learned patterns, keyed by class or routine name
    pub patterns: PatternIndex,
    /// Synthesized test module
    pub synthesis: SynthesisOutput,
}

/// Change-aware patch verifier
#[derive(Debug)]
pub struct PatchVerifier {
    config: VerifierConfig,
    mapper: DiffScopeMapper,
    learner: PatternLearner,
    synthesizer: TestSynthesizer,
    differ: CoverageDiffer,
    parsers: ParserRegistry,
    cache: PatternCache,
}

impl Default for PatchVerifier {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}

impl PatchVerifier {
    /// Create verifier without validating the configuration
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            mapper: DiffScopeMapper::new(config.mapper.clone()),
            learner: PatternLearner::new(config.learner.clone()),
            synthesizer: TestSynthesizer::new(config.synthesis.clone()),
            differ: CoverageDiffer::new(),
            parsers: default_parsers(),
            cache: PatternCache::new(config.cache_capacity),
            config,
        }
    }

    /// Validate the configuration, then create verifier
    ///
    /// # Errors
    /// Returns [`VerifierError::Config`] if validation fails
    pub fn try_new(config: VerifierConfig) -> VerifierResult<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Share a caller-owned pattern cache
    #[must_use]
    pub fn with_cache(mut self, cache: PatternCache) -> Self {
        self.cache = cache;
        self
    }

    /// Accept additional coverage report formats
    #[must_use]
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Get pattern cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &PatternCache {
        &self.cache
    }

    /// Map a diff onto the post-patch source
    #[must_use]
    pub fn analyze(&self, file_path: &str, diff: &str, source: &str) -> ChangeAnalysis {
        self.mapper.analyze(file_path, diff, source)
    }

    /// Learn patterns for every changed class and top-level routine
    ///
    /// Nested routines are skipped: they are reached through an enclosing
    /// routine that is itself changed. Empty results are left out.
    #[must_use]
    pub fn learn(&self, analysis: &ChangeAnalysis, corpus_root: &Path) -> PatternIndex {
        let mut targets: Vec<&str> = analysis.changed_classes().into_iter().collect();
        for key in &analysis.changed_functions {
            let nested = analysis
                .function_spans
                .get(key)
                .is_some_and(|span| span.enclosing_function.is_some());
            let routine = analysis.routine_name(key);
            let dunder = routine.starts_with("__") && routine.ends_with("__");
            if !nested && !dunder && !targets.contains(&routine) {
                targets.push(routine);
            }
        }

        let module_hint = (!analysis.module_path.is_empty()).then_some(analysis.module_path.as_str());
        let mut index = PatternIndex::new();
        for target in targets {
            let patterns = self
                .learner
                .learn_cached(&self.cache, target, module_hint, corpus_root);
            tracing::debug!(name = target, patterns = patterns.patterns.len(), "learned patterns");
            if !patterns.is_empty() {
                index.insert(target.to_string(), patterns);
            }
        }
        index
    }

    /// Synthesize the test module
    #[must_use]
    pub fn synthesize(&self, analysis: &ChangeAnalysis, source: &str, patterns: &PatternIndex) -> SynthesisOutput {
        self.synthesizer.synthesize(analysis, source, patterns)
    }

    /// Analyze, learn and synthesize for one patched file
    #[must_use]
    pub fn prepare(&self, input: PatchInput<'_>) -> PreparedPatch {
        let _span = tracing::info_span!("prepare", file = input.file_path).entered();

        let analysis = self.analyze(input.file_path, input.diff, input.source);
        let patterns = match input.corpus_root {
            Some(root) if !analysis.changed_functions.is_empty() => self.learn(&analysis, root),
            _ => PatternIndex::new(),
        };
        let synthesis = self.synthesize(&analysis, input.source, &patterns);

        tracing::info!(
            functions = analysis.changed_functions.len(),
            learned = patterns.len(),
            tests = synthesis.test_count(),
            "prepared patch"
        );
        PreparedPatch {
            analysis,
            patterns,
            synthesis,
        }
    }

    /// Compare already-loaded reports
    #[must_use]
    pub fn compare(
        &self,
        analysis: &ChangeAnalysis,
        baseline: Option<&CoverageReport>,
        combined: Option<&CoverageReport>,
    ) -> CoverageComparison {
        self.differ.compare(baseline, combined, analysis)
    }

    /// Load a coverage report, failing on any problem
    ///
    /// # Errors
    /// Returns [`VerifierError::Report`] if the file is unreadable, malformed
    /// or of an unknown format
    pub fn load_report(&self, path: &Path) -> VerifierResult<CoverageReport> {
        self.parsers.parse_file(path).map_err(VerifierError::from)
    }

    /// Compare report files; absent or unreadable reports count as unexecuted
    #[must_use]
    pub fn compare_files(
        &self,
        analysis: &ChangeAnalysis,
        baseline: Option<&Path>,
        combined: Option<&Path>,
    ) -> CoverageComparison {
        let baseline = self.parsers.load_or_empty(baseline);
        let combined = self.parsers.load_or_empty(combined);
        self.compare(analysis, Some(&baseline), Some(&combined))
    }
}
