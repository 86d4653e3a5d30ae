//! Test synthesis
//!
//! For every changed routine the synthesizer picks a tier, emits the tier's
//! tests, then adds probes for the changed comparisons, loops and raises.
//! Every emitted test invokes the routine (or, for nested routines, its
//! importable ancestor); none only checks that a name exists.

use crate::config::SynthesisConfig;
use crate::emitter::{is_identifier, is_module_path, TestFunction, TestModule};
use crate::probes::{collect_probes, BoundaryProbe, ExceptionProbe, LoopProbe, ProbeRequest};
use crate::strategy::Strategy;
use crate::target::{resolve_target, CallStyle, ParamSpec, RoutineQuery, Target};
use crate::tier::{select_tier, Evidence, TierKind};
use diffcov_analysis::{ChangeAnalysis, ChangeKind, LiteralValue, ParamKind, PythonSource};
use diffcov_patterns::{slot_position, ClassTestPatterns, InstancePattern};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Learned patterns keyed by type or routine name
pub type PatternIndex = IndexMap<String, Arc<ClassTestPatterns>>;

/// What a synthesized test exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    /// Direct replay of one learned pattern
    Replay,
    /// Property test over learned values
    Property,
    /// Property test over declared signature
    Signature,
    /// Property test over generic values
    Generic,
    /// Zero-argument double invocation
    Invocation,
    /// Boundary values around a changed comparison
    Boundary,
    /// Empty, single and many-element iterables for a changed loop
    Loop,
    /// Reaching a changed raise
    Exception,
}

/// Metadata for one emitted test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedTest {
    /// Python function name
    pub name: String,
    /// Changed routine it targets
    pub routine: String,
    /// Tier of the routine
    pub tier: TierKind,
    /// What it exercises
    pub category: TestCategory,
}

/// Result of a synthesis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisOutput {
    /// Module the tests import
    pub module_path: String,
    /// Python source of the test module
    pub source: String,
    /// Emitted tests, in module order
    pub tests: Vec<SynthesizedTest>,
    /// Tier chosen per changed routine
    pub tiers: IndexMap<String, TierKind>,
}

impl SynthesisOutput {
    /// Number of tests emitted
    #[inline]
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Tests targeting one routine
    pub fn tests_for<'a>(&'a self, routine: &'a str) -> impl Iterator<Item = &'a SynthesizedTest> + 'a {
        self.tests.iter().filter(move |t| t.routine == routine)
    }

    /// Check if no test was emitted
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// An argument in a rendered call
#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Positional(String),
    Keyword(String, String),
}

fn render_args(args: &[Arg]) -> String {
    args.iter()
        .map(|a| match a {
            Arg::Positional(expr) => expr.clone(),
            Arg::Keyword(name, expr) => format!("{name}={expr}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn arg_for(param: &ParamSpec, expr: String) -> Arg {
    if param.kind == ParamKind::PositionalOnly {
        Arg::Positional(expr)
    } else {
        Arg::Keyword(param.name.clone(), expr)
    }
}

/// A hypothesis-drawn argument
#[derive(Debug, Clone)]
struct Drawn {
    var: String,
    strategy: Strategy,
    arg: Arg,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotTarget {
    Positional(usize),
    Keyword(String),
}

/// Per-routine context shared by the emitters
struct Plan<'a> {
    target: &'a Target,
    tier: TierKind,
    ctor_patterns: Option<&'a ClassTestPatterns>,
    call_patterns: Option<&'a ClassTestPatterns>,
}

impl Plan<'_> {
    fn label(&self, suffix: &str) -> String {
        let target = self.target;
        let routine = match target.style {
            CallStyle::Setter => format!("{} setter", target.routine),
            CallStyle::Deleter => format!("{} deleter", target.routine),
            _ => target.routine.clone(),
        };
        match target.class_path.as_deref().or(target.class_name.as_deref()) {
            Some(class) => format!("{class} {routine} {suffix}"),
            None => format!("{routine} {suffix}"),
        }
    }
}

/// Emits pytest + hypothesis tests for changed routines
#[derive(Debug, Clone, Default)]
pub struct TestSynthesizer {
    config: SynthesisConfig,
}

impl TestSynthesizer {
    /// Create synthesizer
    #[inline]
    #[must_use]
    pub fn new(config: SynthesisConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Synthesize a test module for every changed routine
    ///
    /// Never fails: an unparseable source or unresolvable routine lowers the
    /// routine to the generic tier, and an analysis with no changed routines
    /// yields a header-only module.
    #[must_use]
    pub fn synthesize(
        &self,
        analysis: &ChangeAnalysis,
        source: &str,
        patterns: &PatternIndex,
    ) -> SynthesisOutput {
        let mut tests = Vec::new();
        let mut tiers = IndexMap::new();

        let Some(module_path) = importable_module(analysis) else {
            tracing::warn!(
                file = %analysis.file_path,
                module = %analysis.module_path,
                "no importable module path; emitting header-only module"
            );
            return SynthesisOutput {
                module_path: analysis.module_path.clone(),
                source: TestModule::new(analysis.module_path.clone()).render(&self.config),
                tests,
                tiers,
            };
        };
        let mut module = TestModule::new(module_path.clone());

        if analysis.changed_functions.is_empty() {
            tracing::info!(module = %module_path, "no changed routines; emitting header-only module");
            return SynthesisOutput {
                module_path,
                source: module.render(&self.config),
                tests,
                tiers,
            };
        }

        let parsed = match PythonSource::parse(source) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(module = %analysis.module_path, error = %e, "source unparseable; all routines fall back to generic tier");
                None
            }
        };

        for routine in &analysis.changed_functions {
            let query = RoutineQuery::from_analysis(analysis, routine);
            let target = parsed
                .as_ref()
                .map(|p| resolve_target(p, &query))
                .transpose()
                .unwrap_or_else(|e| {
                    tracing::warn!(routine = %routine, error = %e, "cannot bind routine");
                    None
                })
                .unwrap_or_else(|| Target::unresolved(&query));

            let (ctor_patterns, call_patterns) = pattern_sources(&target, patterns);
            let evidence = Evidence {
                has_patterns: ctor_patterns.is_some() || call_patterns.is_some(),
                has_signature_info: target
                    .supplied_params()
                    .chain(target.supplied_ctor_params())
                    .any(ParamSpec::is_informative),
                resolved: target.resolved,
            };
            let tier = select_tier(evidence);
            tracing::debug!(routine = %routine, %tier, invoked = %target.invoked, "selected tier");

            if target.resolved {
                module.import(target.import_name());
            }
            tiers.insert(routine.clone(), tier);

            let plan = Plan {
                target: &target,
                tier,
                ctor_patterns,
                call_patterns,
            };
            let before = tests.len();
            match tier {
                TierKind::PatternReplay => self.emit_pattern_replay(&plan, &mut module, &mut tests),
                TierKind::SignatureBased => self.emit_signature(&plan, &mut module, &mut tests),
                TierKind::GenericFallback => self.emit_generic(&plan, &mut module, &mut tests),
            }

            if let (Some(parsed), true) = (parsed.as_ref(), target.resolved && target.is_direct()) {
                self.emit_probes(&plan, analysis, parsed, &mut module, &mut tests);
            }

            tracing::debug!(routine = %routine, tests = tests.len() - before, "emitted tests");
        }

        tracing::info!(
            module = %module_path,
            routines = tiers.len(),
            tests = tests.len(),
            "synthesized test module"
        );

        SynthesisOutput {
            module_path,
            source: module.render(&self.config),
            tests,
            tiers,
        }
    }

    fn emit_pattern_replay(
        &self,
        plan: &Plan<'_>,
        module: &mut TestModule,
        tests: &mut Vec<SynthesizedTest>,
    ) {
        let target = plan.target;
        let replay_calls = plan.call_patterns.is_some();
        let Some(primary) = plan.call_patterns.or(plan.ctor_patterns) else {
            self.emit_generic(plan, module, tests);
            return;
        };

        for (i, pattern) in primary.patterns.iter().enumerate() {
            let (ctor, call) = if replay_calls {
                (self.default_ctor_args(plan), pattern.call_arguments())
            } else {
                (pattern.call_arguments(), render_args(&fixed_args(target.supplied_params(), &[])))
            };
            let name = module.unique_name(&plan.label(&format!("replay {}", i + 1)));
            module.push(
                TestFunction::new(name.clone())
                    .with_doc(format!(
                        "Replay {} seen at {} ({}x).",
                        replay_label(pattern),
                        pattern.source_location,
                        pattern.frequency
                    ))
                    .line(format!("_assert_deterministic(lambda: {})", invocation(target, &ctor, &call))),
            );
            tests.push(self.record(plan, name, TestCategory::Replay));
        }

        // Learned values on the replayed side, declared strategies on the other
        let (ctor_drawn, call_drawn) = if replay_calls {
            let ctor = if target.needs_instance() {
                match plan.ctor_patterns {
                    Some(p) => bind_pattern_slots(p, &target.ctor_params, "init_", &self.config),
                    None => declared_drawn(target.supplied_ctor_params(), "init_", false),
                }
            } else {
                Vec::new()
            };
            (ctor, bind_pattern_slots(primary, &target.params, "", &self.config))
        } else {
            (
                bind_pattern_slots(primary, &target.ctor_params, "init_", &self.config),
                declared_drawn(target.supplied_params(), "", false),
            )
        };

        if ctor_drawn.is_empty() && call_drawn.is_empty() {
            return;
        }
        let name = module.unique_name(&plan.label("property"));
        module.push(self.property_test(
            name.clone(),
            "Learned values widened into generators; outcomes must be deterministic.",
            target,
            &ctor_drawn,
            &call_drawn,
        ));
        tests.push(self.record(plan, name, TestCategory::Property));
    }

    fn emit_signature(&self, plan: &Plan<'_>, module: &mut TestModule, tests: &mut Vec<SynthesizedTest>) {
        let target = plan.target;
        let ctor_drawn = if target.needs_instance() {
            declared_drawn(target.supplied_ctor_params(), "init_", false)
        } else {
            Vec::new()
        };
        let call_drawn = declared_drawn(target.supplied_params(), "", false);

        if ctor_drawn.is_empty() && call_drawn.is_empty() {
            self.emit_invocation(plan, module, tests);
            return;
        }
        let name = module.unique_name(&plan.label("signature"));
        module.push(self.property_test(
            name.clone(),
            "Generators from declared annotations and defaults.",
            target,
            &ctor_drawn,
            &call_drawn,
        ));
        tests.push(self.record(plan, name, TestCategory::Signature));
    }

    fn emit_generic(&self, plan: &Plan<'_>, module: &mut TestModule, tests: &mut Vec<SynthesizedTest>) {
        let target = plan.target;
        let call_drawn = declared_drawn(target.supplied_params(), "", true);
        if call_drawn.is_empty() {
            self.emit_invocation(plan, module, tests);
            return;
        }
        let name = module.unique_name(&plan.label("generic"));
        module.push(self.property_test(
            name.clone(),
            "Generic inputs; repeated calls must agree in outcome and type.",
            target,
            &[],
            &call_drawn,
        ));
        tests.push(self.record(plan, name, TestCategory::Generic));
    }

    /// Plain test calling the target twice with fixed arguments
    fn emit_invocation(&self, plan: &Plan<'_>, module: &mut TestModule, tests: &mut Vec<SynthesizedTest>) {
        let target = plan.target;
        let call = render_args(&fixed_args(target.supplied_params(), &[]));
        let ctor = self.default_ctor_args(plan);
        let name = module.unique_name(&plan.label("invocation"));
        let mut function = TestFunction::new(name.clone())
            .with_doc("Invoke twice; outcomes must agree in kind and type.");
        if !target.is_direct() {
            function = function.line(format!("# reaches {} through {}", target.routine, target.invoked));
        }
        module.push(function.line(format!(
            "_assert_deterministic(lambda: {})",
            invocation(target, &ctor, &call)
        )));
        tests.push(self.record(plan, name, TestCategory::Invocation));
    }

    fn emit_probes(
        &self,
        plan: &Plan<'_>,
        analysis: &ChangeAnalysis,
        parsed: &PythonSource,
        module: &mut TestModule,
        tests: &mut Vec<SynthesizedTest>,
    ) {
        let target = plan.target;
        let Some(lines) = analysis.lines_for(&target.key) else {
            return;
        };
        let Some(routine) = parsed
            .routines()
            .into_iter()
            .find(|r| r.name == target.routine && Some(r.start_line) == target.start_line)
        else {
            return;
        };

        let request = probe_request(analysis, lines);
        if request == ProbeRequest::default() {
            return;
        }
        let names: Vec<&str> = target.supplied_params().map(|p| p.name.as_str()).collect();
        let probes = collect_probes(parsed, &routine, lines, &names, request);
        let ctor = self.default_ctor_args(plan);

        for probe in &probes.boundaries {
            self.emit_boundary(plan, probe, &ctor, module, tests);
        }
        for probe in &probes.loops {
            self.emit_loop(plan, probe, &ctor, module, tests);
        }
        for probe in &probes.exceptions {
            self.emit_exception(plan, probe, &ctor, module, tests);
        }
    }

    fn emit_boundary(
        &self,
        plan: &Plan<'_>,
        probe: &BoundaryProbe,
        ctor: &str,
        module: &mut TestModule,
        tests: &mut Vec<SynthesizedTest>,
    ) {
        let target = plan.target;
        let call = render_args(&fixed_args(
            target.supplied_params(),
            &[(probe.param.as_str(), probe.param.clone())],
        ));
        let values: Vec<String> = probe.values().iter().map(ToString::to_string).collect();
        let name = module.unique_name(&plan.label(&format!("boundary {} line{}", probe.param, probe.line)));
        module.push(
            TestFunction::new(name.clone())
                .decorated(format!(
                    "pytest.mark.parametrize(\"{}\", [{}])",
                    probe.param,
                    values.join(", ")
                ))
                .with_params(vec![probe.param.clone()])
                .with_doc(format!(
                    "Either side of the comparison with {} on line {}.",
                    probe.pivot, probe.line
                ))
                .line(format!("_assert_deterministic(lambda: {})", invocation(target, ctor, &call))),
        );
        tests.push(self.record(plan, name, TestCategory::Boundary));
    }

    fn emit_loop(
        &self,
        plan: &Plan<'_>,
        probe: &LoopProbe,
        ctor: &str,
        module: &mut TestModule,
        tests: &mut Vec<SynthesizedTest>,
    ) {
        let target = plan.target;
        let call = render_args(&fixed_args(
            target.supplied_params(),
            &[(probe.param.as_str(), probe.param.clone())],
        ));
        let name = module.unique_name(&plan.label(&format!("loop {} line{}", probe.param, probe.line)));
        module.push(
            TestFunction::new(name.clone())
                .decorated(format!(
                    "pytest.mark.parametrize(\"{}\", [[], [0], list(range(25))], ids=[\"empty\", \"single\", \"many\"])",
                    probe.param
                ))
                .with_params(vec![probe.param.clone()])
                .with_doc(format!("Zero, one and many iterations of the loop on line {}.", probe.line))
                .line(format!("_assert_deterministic(lambda: {})", invocation(target, ctor, &call))),
        );
        tests.push(self.record(plan, name, TestCategory::Loop));
    }

    fn emit_exception(
        &self,
        plan: &Plan<'_>,
        probe: &ExceptionProbe,
        ctor: &str,
        module: &mut TestModule,
        tests: &mut Vec<SynthesizedTest>,
    ) {
        let target = plan.target;
        let exc = format!("_resolve_exc({})", LiteralValue::Str(probe.exception.clone()).to_python());

        let function = if let Some((param, value)) = &probe.trigger {
            let call = render_args(&fixed_args(
                target.supplied_params(),
                &[(param.as_str(), value.to_python())],
            ));
            let name = module.unique_name(&plan.label(&format!(
                "raises {} line{}",
                probe.exception, probe.line
            )));
            TestFunction::new(name)
                .with_doc(format!(
                    "{param}={} reaches the raise on line {}.",
                    value.to_python(),
                    probe.line
                ))
                .line(format!("with pytest.raises({exc}):"))
                .line(format!("    _resolve({})", invocation(target, ctor, &call)))
        } else {
            let call = render_args(&fixed_args(target.supplied_params(), &[]));
            let name = module.unique_name(&plan.label(&format!(
                "exception path line{}",
                probe.line
            )));
            TestFunction::new(name)
                .with_doc(format!(
                    "No trigger derivable for line {}; the raised type is tolerated.",
                    probe.line
                ))
                .line("try:")
                .line(format!("    _resolve({})", invocation(target, ctor, &call)))
                .line(format!("except ({exc}, *EXPECTED_EXCEPTIONS):"))
                .line("    pass")
        };

        let name = function.name.clone();
        module.push(function);
        tests.push(self.record(plan, name, TestCategory::Exception));
    }

    fn property_test(
        &self,
        name: String,
        doc: &str,
        target: &Target,
        ctor_drawn: &[Drawn],
        call_drawn: &[Drawn],
    ) -> TestFunction {
        let all: Vec<&Drawn> = ctor_drawn.iter().chain(call_drawn).collect();
        let given: Vec<String> = all
            .iter()
            .map(|d| format!("{}={}", d.var, d.strategy.render()))
            .collect();
        let ctor_args: Vec<Arg> = ctor_drawn.iter().map(|d| d.arg.clone()).collect();
        let call_args: Vec<Arg> = call_drawn.iter().map(|d| d.arg.clone()).collect();
        let ctor = if ctor_drawn.is_empty() && target.needs_instance() {
            render_args(&fixed_args(target.supplied_ctor_params(), &[]))
        } else {
            render_args(&ctor_args)
        };

        let mut function = TestFunction::new(name)
            .decorated(format!(
                "settings(max_examples={}, deadline=None)",
                self.config.max_examples
            ))
            .decorated(format!("given({})", given.join(", ")))
            .with_params(all.iter().map(|d| d.var.clone()).collect())
            .with_doc(doc);
        if !target.is_direct() {
            function = function.line(format!("# reaches {} through {}", target.routine, target.invoked));
        }
        function.line(format!(
            "_assert_deterministic(lambda: {})",
            invocation(target, &ctor, &render_args(&call_args))
        ))
    }

    /// Constructor arguments for probes and fixed calls
    fn default_ctor_args(&self, plan: &Plan<'_>) -> String {
        if !plan.target.needs_instance() {
            return String::new();
        }
        plan.ctor_patterns
            .and_then(|p| p.patterns.first())
            .map_or_else(
                || render_args(&fixed_args(plan.target.supplied_ctor_params(), &[])),
                InstancePattern::call_arguments,
            )
    }

    fn record(&self, plan: &Plan<'_>, name: String, category: TestCategory) -> SynthesizedTest {
        SynthesizedTest {
            name,
            routine: plan.target.key.clone(),
            tier: plan.tier,
            category,
        }
    }
}

/// Module the tests import: the analysis path, else the file stem
fn importable_module(analysis: &ChangeAnalysis) -> Option<String> {
    if is_module_path(&analysis.module_path) {
        return Some(analysis.module_path.clone());
    }
    let stem = Path::new(&analysis.file_path).file_stem()?.to_str()?;
    is_identifier(stem).then(|| {
        tracing::debug!(file = %analysis.file_path, stem, "module path unusable; importing file stem");
        stem.to_string()
    })
}

/// Patterns feeding construction and the call itself
fn pattern_sources<'a>(
    target: &Target,
    patterns: &'a PatternIndex,
) -> (Option<&'a ClassTestPatterns>, Option<&'a ClassTestPatterns>) {
    let lookup = |key: &str| -> Option<&'a ClassTestPatterns> {
        patterns.get(key).map(|p| &**p).filter(|p| !p.is_empty())
    };
    if !target.resolved {
        return (None, None);
    }
    match (target.style, target.class_name.as_deref()) {
        (CallStyle::Constructor, Some(class)) => (None, lookup(class)),
        (CallStyle::Method, Some(class)) => (lookup(class), lookup(&target.invoked)),
        (CallStyle::Property | CallStyle::Setter | CallStyle::Deleter, Some(class)) => (lookup(class), None),
        _ => (None, lookup(&target.invoked)),
    }
}

fn probe_request(analysis: &ChangeAnalysis, lines: &BTreeSet<u32>) -> ProbeRequest {
    let types = &analysis.change_types;
    ProbeRequest {
        comparisons: types
            .operations
            .iter()
            .any(|s| s.kind == ChangeKind::Comparison && lines.contains(&s.line)),
        loops: types.loops.iter().any(|s| lines.contains(&s.line)),
        raises: types
            .exceptions
            .iter()
            .any(|s| s.kind == ChangeKind::Raise && lines.contains(&s.line)),
    }
}

/// Fixed arguments: overrides, required params, and positional-only params
fn fixed_args<'p>(params: impl Iterator<Item = &'p ParamSpec>, overrides: &[(&str, String)]) -> Vec<Arg> {
    params
        .filter_map(|p| {
            if let Some((_, expr)) = overrides.iter().find(|(name, _)| *name == p.name) {
                Some(arg_for(p, expr.clone()))
            } else if !p.has_default || p.kind == ParamKind::PositionalOnly {
                Some(arg_for(p, p.sample()))
            } else {
                None
            }
        })
        .collect()
}

/// Drawn arguments from declared information
///
/// With `generic`, only required parameters are drawn, from name-based
/// generic strategies. Otherwise parameters with a recognized annotation or
/// literal default are drawn, required ones fall back to generic strategies,
/// and optional ones without usable information keep their default.
fn declared_drawn<'p>(params: impl Iterator<Item = &'p ParamSpec>, prefix: &str, generic: bool) -> Vec<Drawn> {
    params
        .filter_map(|p| {
            let strategy = if generic {
                (!p.has_default).then(|| Strategy::generic_for_name(&p.name))
            } else {
                match p.declared_strategy() {
                    Some(s) => Some(s),
                    None if !p.has_default => Some(Strategy::generic_for_name(&p.name)),
                    None => None,
                }
            }?;
            let var = format!("{prefix}{}", p.name);
            Some(Drawn {
                arg: arg_for(p, var.clone()),
                var,
                strategy,
            })
        })
        .collect()
}

/// Drawn arguments from learned slot values, mapped onto declared params
///
/// Positional slots naming a regular parameter merge into its keyword slot.
/// A positional slot survives only where the call cannot bind the same
/// parameter twice: positional-only and `*args` positions, or any position
/// when neither params nor keyword slots are known. Kept positions must be
/// contiguous from zero.
fn bind_pattern_slots(
    patterns: &ClassTestPatterns,
    params: &[ParamSpec],
    prefix: &str,
    config: &SynthesisConfig,
) -> Vec<Drawn> {
    let var_positional_from = params.iter().position(|p| p.kind == ParamKind::VarPositional);
    let has_keyword_slots = patterns
        .common_parameters
        .keys()
        .any(|slot| slot_position(slot).is_none());

    let mut merged: IndexMap<SlotTarget, Vec<LiteralValue>> = IndexMap::new();
    for (slot, values) in &patterns.common_parameters {
        let slot_target = match slot_position(slot) {
            Some(i) => match params.get(i) {
                Some(p) if p.kind == ParamKind::Regular => SlotTarget::Keyword(p.name.clone()),
                Some(p) if p.kind == ParamKind::PositionalOnly => SlotTarget::Positional(i),
                _ if var_positional_from.is_some_and(|k| k <= i) => SlotTarget::Positional(i),
                _ if params.is_empty() && !has_keyword_slots => SlotTarget::Positional(i),
                _ => {
                    tracing::debug!(slot = %slot, "dropping positional slot with no safe binding");
                    continue;
                }
            },
            None => SlotTarget::Keyword(slot.clone()),
        };
        let entry = merged.entry(slot_target).or_default();
        for value in values {
            if !entry.contains(value) {
                entry.push(value.clone());
            }
        }
    }

    let mut positional: Vec<(usize, Vec<LiteralValue>)> = Vec::new();
    let mut keywords: Vec<(String, Vec<LiteralValue>)> = Vec::new();
    for (slot_target, values) in merged {
        match slot_target {
            SlotTarget::Positional(i) => positional.push((i, values)),
            SlotTarget::Keyword(name) => keywords.push((name, values)),
        }
    }
    positional.sort_by_key(|(i, _)| *i);
    let contiguous = positional
        .iter()
        .enumerate()
        .take_while(|(n, (i, _))| n == i)
        .count();
    positional.truncate(contiguous);

    // A positional-only name passed by keyword would land twice
    let bound_positionally: BTreeSet<&str> = positional
        .iter()
        .filter_map(|(i, _)| params.get(*i))
        .filter(|p| p.kind == ParamKind::PositionalOnly)
        .map(|p| p.name.as_str())
        .collect();
    keywords.retain(|(name, _)| !bound_positionally.contains(name.as_str()));

    let positional = positional.into_iter().filter_map(|(i, values)| {
        let var = format!("{prefix}arg{i}");
        Strategy::from_observed(&values, config).map(|strategy| Drawn {
            arg: Arg::Positional(var.clone()),
            var,
            strategy,
        })
    });
    let keywords = keywords.into_iter().filter_map(|(name, values)| {
        let var = format!("{prefix}{name}");
        Strategy::from_observed(&values, config).map(|strategy| Drawn {
            arg: Arg::Keyword(name, var.clone()),
            var,
            strategy,
        })
    });
    positional.chain(keywords).collect()
}

/// Python expression invoking the target
fn invocation(target: &Target, ctor: &str, call: &str) -> String {
    let class = target.class_name.as_deref().unwrap_or_default();
    let path = target.class_path.as_deref().unwrap_or(class);
    let attr = attribute_name(&target.invoked, class);
    let instance = || {
        if ctor.is_empty() {
            format!("_build_instance(target_module.{path})")
        } else {
            format!("_build_instance(target_module.{path}, {ctor})")
        }
    };
    match target.style {
        CallStyle::Function => format!("target_module.{attr}({call})"),
        CallStyle::Constructor => format!("target_module.{path}({call})"),
        CallStyle::ClassLevel => format!("target_module.{path}.{attr}({call})"),
        CallStyle::Method => format!("{}.{attr}({call})", instance()),
        CallStyle::Property => format!("{}.{attr}", instance()),
        CallStyle::Setter => {
            let value = if call.is_empty() { "None" } else { call };
            format!("setattr({}, {attr:?}, {value})", instance())
        }
        CallStyle::Deleter => format!("delattr({}, {attr:?})", instance()),
    }
}

/// Attribute name after private-name mangling (`__x` on `C` → `_C__x`)
fn attribute_name(name: &str, class: &str) -> String {
    if !class.is_empty() && name.starts_with("__") && !name.ends_with("__") {
        format!("_{}{name}", class.trim_start_matches('_'))
    } else {
        name.to_string()
    }
}

fn replay_label(pattern: &InstancePattern) -> String {
    format!("{}({})", pattern.type_name, pattern.call_arguments())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn param(name: &str, kind: ParamKind, default: Option<LiteralValue>) -> ParamSpec {
        ParamSpec {
            name: name.into(),
            kind,
            annotation: None,
            has_default: default.is_some(),
            default,
        }
    }

    fn method_target(style: CallStyle, invoked: &str) -> Target {
        Target {
            key: invoked.into(),
            routine: invoked.into(),
            start_line: Some(1),
            invoked: invoked.into(),
            class_name: Some("Widget".into()),
            class_path: Some("Widget".into()),
            style,
            is_async: false,
            params: Vec::new(),
            ctor_params: Vec::new(),
            resolved: true,
        }
    }

    #[test]
    fn invocation_styles() {
        assert_eq!(
            invocation(&method_target(CallStyle::Method, "area"), "size=2", "scale=3"),
            "_build_instance(target_module.Widget, size=2).area(scale=3)"
        );
        assert_eq!(
            invocation(&method_target(CallStyle::Property, "doubled"), "", ""),
            "_build_instance(target_module.Widget).doubled"
        );
        assert_eq!(
            invocation(&method_target(CallStyle::Constructor, "__init__"), "", "size=1"),
            "target_module.Widget(size=1)"
        );
        assert_eq!(
            invocation(&method_target(CallStyle::Method, "__secret"), "", ""),
            "_build_instance(target_module.Widget)._Widget__secret()"
        );
    }

    #[test]
    fn accessor_and_nested_class_invocations() {
        assert_eq!(
            invocation(&method_target(CallStyle::Setter, "size"), "", "value"),
            "setattr(_build_instance(target_module.Widget), \"size\", value)"
        );
        assert_eq!(
            invocation(&method_target(CallStyle::Setter, "size"), "", ""),
            "setattr(_build_instance(target_module.Widget), \"size\", None)"
        );
        assert_eq!(
            invocation(&method_target(CallStyle::Deleter, "__size"), "n=1", ""),
            "delattr(_build_instance(target_module.Widget, n=1), \"_Widget__size\")"
        );

        let mut nested = method_target(CallStyle::Method, "m");
        nested.class_name = Some("Inner".into());
        nested.class_path = Some("Outer.Inner".into());
        assert_eq!(invocation(&nested, "", "x=1"), "_build_instance(target_module.Outer.Inner).m(x=1)");
        nested.style = CallStyle::Constructor;
        assert_eq!(invocation(&nested, "", ""), "target_module.Outer.Inner()");
    }

    #[test]
    fn fixed_args_keep_required_and_positional_only() {
        let params = vec![
            param("a", ParamKind::PositionalOnly, Some(LiteralValue::Int(4))),
            param("b", ParamKind::Regular, None),
            param("c", ParamKind::Regular, Some(LiteralValue::Int(2))),
            param("d", ParamKind::KeywordOnly, Some(LiteralValue::Bool(false))),
        ];
        let args = fixed_args(params.iter(), &[("d", "True".into())]);
        assert_eq!(render_args(&args), "4, b=1, d=True");
    }

    #[test]
    fn positional_slots_bind_to_parameter_names() {
        use diffcov_patterns::{InstancePattern, SourceLocation};
        let observed = |positional: Vec<LiteralValue>, keywords: Vec<(&str, LiteralValue)>| InstancePattern {
            type_name: "Widget".into(),
            positional,
            parameters: keywords.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            source_location: SourceLocation { file: "t.py".into(), line: 1 },
            frequency: 1,
        };
        let patterns = ClassTestPatterns::from_observations(
            "Widget",
            vec![
                observed(vec![LiteralValue::Int(3)], vec![]),
                observed(vec![], vec![("size", LiteralValue::Int(5))]),
            ],
        );
        let params = vec![param("size", ParamKind::Regular, None)];
        let drawn = bind_pattern_slots(&patterns, &params, "", &SynthesisConfig::default());
        assert_eq!(drawn.len(), 1);
        assert_eq!(drawn[0].var, "size");
        assert_eq!(drawn[0].arg, Arg::Keyword("size".into(), "size".into()));
        assert!(drawn[0].strategy.render().starts_with("st.one_of(st.sampled_from([3, 5])"));

        // Without a signature the positional slot could be `size` again
        let unbound = bind_pattern_slots(&patterns, &[], "init_", &SynthesisConfig::default());
        assert_eq!(unbound.len(), 1);
        assert_eq!(unbound[0].arg, Arg::Keyword("size".into(), "init_size".into()));
    }

    #[test]
    fn slots_never_bind_one_parameter_twice() {
        use diffcov_patterns::{InstancePattern, SourceLocation};
        let observed = |positional: Vec<LiteralValue>, keywords: Vec<(&str, LiteralValue)>| InstancePattern {
            type_name: "Widget".into(),
            positional,
            parameters: keywords.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            source_location: SourceLocation { file: "t.py".into(), line: 1 },
            frequency: 1,
        };
        let patterns = ClassTestPatterns::from_observations(
            "Widget",
            vec![
                observed(vec![LiteralValue::Int(1), LiteralValue::Int(2)], vec![]),
                observed(vec![], vec![("a", LiteralValue::Int(7)), ("b", LiteralValue::Int(9))]),
            ],
        );
        let config = SynthesisConfig::default();

        let regular = vec![
            param("a", ParamKind::Regular, None),
            param("b", ParamKind::Regular, None),
        ];
        let drawn = bind_pattern_slots(&patterns, &regular, "", &config);
        let args: Vec<&Arg> = drawn.iter().map(|d| &d.arg).collect();
        assert_eq!(
            args,
            vec![
                &Arg::Keyword("a".into(), "a".into()),
                &Arg::Keyword("b".into(), "b".into())
            ]
        );

        let positional_only = vec![
            param("a", ParamKind::PositionalOnly, None),
            param("b", ParamKind::Regular, None),
        ];
        let drawn = bind_pattern_slots(&patterns, &positional_only, "", &config);
        let rendered = render_args(&drawn.iter().map(|d| d.arg.clone()).collect::<Vec<_>>());
        assert_eq!(rendered, "arg0, b=b");

        // Slot 1 would fill `a` once slot 0 became a keyword
        let shifted = vec![
            param("a", ParamKind::Regular, None),
            param("rest", ParamKind::VarPositional, None),
        ];
        let drawn = bind_pattern_slots(&patterns, &shifted, "", &config);
        assert!(drawn.iter().all(|d| matches!(d.arg, Arg::Keyword(..))));
    }

    #[test]
    fn generic_drawing_skips_optional() {
        let params = vec![
            param("count", ParamKind::Regular, None),
            param("label", ParamKind::Regular, None),
            param("flag", ParamKind::Regular, Some(LiteralValue::Bool(true))),
        ];
        let drawn = declared_drawn(params.iter(), "", true);
        let vars: Vec<&str> = drawn.iter().map(|d| d.var.as_str()).collect();
        assert_eq!(vars, vec!["count", "label"]);
        assert_eq!(drawn[1].strategy, Strategy::Text);

        let declared = declared_drawn(params.iter(), "", false);
        assert_eq!(declared.len(), 3);
        assert_eq!(declared[2].strategy, Strategy::Booleans);
    }
}
