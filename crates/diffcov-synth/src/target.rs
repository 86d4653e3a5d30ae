//! Binding changed routines to importable invocations
//!
//! A changed routine is called through `target_module`. Methods go through an
//! instance, static and class methods through the class, properties are
//! read, assigned or deleted, and nested routines are reached through their
//! nearest importable ancestor.

use crate::error::{SynthError, SynthResult};
use crate::strategy::Strategy;
use diffcov_analysis::{ChangeAnalysis, LiteralValue, ParamKind, Parameter, PythonSource, RoutineDef};

/// How the target is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    /// `target_module.f(...)`
    Function,
    /// `target_module.C(...)` for `__init__`
    Constructor,
    /// `_build_instance(target_module.C, ...).m(...)`
    Method,
    /// `target_module.C.m(...)` for static and class methods
    ClassLevel,
    /// `_build_instance(target_module.C, ...).m`
    Property,
    /// `setattr(_build_instance(target_module.C, ...), "m", value)`
    Setter,
    /// `delattr(_build_instance(target_module.C, ...), "m")`
    Deleter,
}

/// A parameter the test supplies
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,
    /// Binding kind
    pub kind: ParamKind,
    /// Annotation source text
    pub annotation: Option<String>,
    /// Literal default
    pub default: Option<LiteralValue>,
    /// Any default declared
    pub has_default: bool,
}

impl From<&Parameter> for ParamSpec {
    fn from(p: &Parameter) -> Self {
        Self {
            name: p.name.clone(),
            kind: p.kind,
            annotation: p.annotation.clone(),
            default: p.default.clone(),
            has_default: p.has_default,
        }
    }
}

impl ParamSpec {
    /// Check if the parameter carries an annotation or a literal default
    #[inline]
    #[must_use]
    pub fn is_informative(&self) -> bool {
        self.annotation.is_some() || self.default.is_some()
    }

    /// Strategy from annotation, then default kind
    #[must_use]
    pub fn declared_strategy(&self) -> Option<Strategy> {
        self.annotation
            .as_deref()
            .and_then(Strategy::from_annotation)
            .or_else(|| self.default.as_ref().map(Strategy::from_literal))
    }

    /// Declared strategy, or a generic one
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.declared_strategy()
            .unwrap_or_else(|| Strategy::generic_for_name(&self.name))
    }

    /// Representative value as Python source
    #[must_use]
    pub fn sample(&self) -> String {
        self.default
            .as_ref()
            .map_or_else(|| self.strategy().sample(), LiteralValue::to_python)
    }
}

/// Which changed routine to bind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutineQuery<'a> {
    /// Key of the routine in the analysis
    pub key: &'a str,
    /// Bare routine name
    pub name: &'a str,
    /// Owning class, for methods
    pub class_name: Option<&'a str>,
    /// First line of the definition, to tell same-named routines apart
    pub start_line: Option<u32>,
}

impl<'a> RoutineQuery<'a> {
    /// Query by bare name only
    #[inline]
    #[must_use]
    pub fn named(name: &'a str) -> Self {
        Self {
            key: name,
            name,
            class_name: None,
            start_line: None,
        }
    }

    /// Restrict to a class
    #[inline]
    #[must_use]
    pub fn in_class(mut self, class_name: &'a str) -> Self {
        self.class_name = Some(class_name);
        self
    }

    /// Restrict to the definition starting on `line`
    #[inline]
    #[must_use]
    pub fn at_line(mut self, line: u32) -> Self {
        self.start_line = Some(line);
        self
    }

    /// Query for a changed routine key
    #[must_use]
    pub fn from_analysis(analysis: &'a ChangeAnalysis, key: &'a str) -> Self {
        Self {
            key,
            name: analysis.routine_name(key),
            class_name: analysis.class_of(key),
            start_line: analysis.function_spans.get(key).map(|span| span.start_line),
        }
    }

    fn matches(&self, routine: &RoutineDef<'_>) -> bool {
        routine.name == self.name
            && (self.class_name.is_none() || routine.class_name.as_deref() == self.class_name)
    }
}

/// A resolved invocation target
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Key of the changed routine in the analysis
    pub key: String,
    /// Changed routine name
    pub routine: String,
    /// First line of the changed routine
    pub start_line: Option<u32>,
    /// Routine actually invoked (differs for nested routines)
    pub invoked: String,
    /// Owning class of the invoked routine
    pub class_name: Option<String>,
    /// Dotted path of that class from module level
    pub class_path: Option<String>,
    /// Invocation style
    pub style: CallStyle,
    /// `async def`
    pub is_async: bool,
    /// Parameters of the invoked routine the caller supplies
    pub params: Vec<ParamSpec>,
    /// Constructor parameters, for instance-bound styles
    pub ctor_params: Vec<ParamSpec>,
    /// Whether the changed routine was located in the source
    pub resolved: bool,
}

impl Target {
    /// Best-effort target for a routine missing from the source
    #[must_use]
    pub fn unresolved(query: &RoutineQuery<'_>) -> Self {
        Self {
            key: query.key.to_string(),
            routine: query.name.to_string(),
            start_line: query.start_line,
            invoked: query.name.to_string(),
            class_name: query.class_name.map(str::to_string),
            class_path: query.class_name.map(str::to_string),
            style: if query.class_name.is_some() { CallStyle::Method } else { CallStyle::Function },
            is_async: false,
            params: Vec::new(),
            ctor_params: Vec::new(),
            resolved: false,
        }
    }

    /// Check if the changed routine is the one being called
    #[inline]
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.routine == self.invoked
    }

    /// Key under which learned patterns for this target are stored
    #[must_use]
    pub fn pattern_key(&self) -> &str {
        self.class_name.as_deref().unwrap_or(&self.invoked)
    }

    /// Whether construction precedes the call
    #[inline]
    #[must_use]
    pub fn needs_instance(&self) -> bool {
        matches!(
            self.style,
            CallStyle::Method | CallStyle::Property | CallStyle::Setter | CallStyle::Deleter
        )
    }

    /// Parameters that receive generated arguments (no variadics)
    pub fn supplied_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| !p.kind.is_variadic())
    }

    /// Constructor parameters that receive generated arguments
    pub fn supplied_ctor_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.ctor_params.iter().filter(|p| !p.kind.is_variadic())
    }

    /// Module-level name the test module imports directly
    ///
    /// For a nested class this is the outermost class.
    #[must_use]
    pub fn import_name(&self) -> &str {
        match self.class_path.as_deref() {
            Some(path) => path.split('.').next().unwrap_or(path),
            None => &self.invoked,
        }
    }
}

/// Resolve the invocation for a changed routine
///
/// Among same-named definitions the one starting on `query.start_line` wins,
/// then the first in source order.
///
/// # Errors
/// - [`SynthError::RoutineNotFound`] if no definition matches
/// - [`SynthError::NoImportableAncestor`] if a nested routine's parent chain breaks
pub fn resolve_target(source: &PythonSource, query: &RoutineQuery<'_>) -> SynthResult<Target> {
    let routines = source.routines();
    let changed = query
        .start_line
        .and_then(|line| routines.iter().find(|r| query.matches(r) && r.start_line == line))
        .or_else(|| routines.iter().find(|r| query.matches(r)))
        .ok_or_else(|| SynthError::RoutineNotFound {
            name: query.key.to_string(),
        })?;

    let mut invoked: &RoutineDef<'_> = changed;
    while let Some(parent) = invoked.enclosing_function.as_deref() {
        let child = invoked;
        invoked = routines
            .iter()
            .find(|r| {
                r.name == parent
                    && r.node.id() != child.node.id()
                    && r.start_line <= child.start_line
                    && r.end_line >= child.end_line
            })
            .ok_or_else(|| SynthError::NoImportableAncestor {
                name: query.key.to_string(),
            })?;
    }

    let style = match invoked.class_name {
        None => CallStyle::Function,
        Some(_) if invoked.name == "__init__" => CallStyle::Constructor,
        Some(_) if invoked.has_decorator("staticmethod") || invoked.has_decorator("classmethod") => {
            CallStyle::ClassLevel
        }
        Some(_) if invoked.has_decorator("setter") => CallStyle::Setter,
        Some(_) if invoked.has_decorator("deleter") => CallStyle::Deleter,
        Some(_) if invoked.has_decorator("property") || invoked.has_decorator("cached_property") => {
            CallStyle::Property
        }
        Some(_) => CallStyle::Method,
    };

    let ctor_params = match invoked.class_path.as_deref() {
        Some(path) if style != CallStyle::Constructor && style != CallStyle::ClassLevel => routines
            .iter()
            .find(|r| r.name == "__init__" && r.class_path.as_deref() == Some(path))
            .map(|init| init.call_parameters().into_iter().map(ParamSpec::from).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let params = match style {
        CallStyle::Property | CallStyle::Deleter => Vec::new(),
        // The assigned value arrives positionally through `setattr`
        CallStyle::Setter => invoked
            .call_parameters()
            .into_iter()
            .take(1)
            .map(|p| ParamSpec {
                kind: ParamKind::PositionalOnly,
                ..ParamSpec::from(p)
            })
            .collect(),
        _ => invoked.call_parameters().into_iter().map(ParamSpec::from).collect(),
    };

    Ok(Target {
        key: query.key.to_string(),
        routine: changed.name.clone(),
        start_line: Some(changed.start_line),
        invoked: invoked.name.clone(),
        class_name: invoked.class_name.clone(),
        class_path: invoked.class_path.clone(),
        style,
        is_async: invoked.is_async,
        params,
        ctor_params,
        resolved: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "\
class Counter:
    def __init__(self, start: int = 0):
        self.value = start

    def bump(self, by=1):
        def clamp(v):
            return max(v, 0)
        self.value = clamp(self.value + by)
        return self.value

    @staticmethod
    def zero():
        return Counter(0)

    @property
    def doubled(self):
        return self.value * 2


async def fetch(url: str, *, retries=3):
    return url
";

    fn parsed() -> PythonSource {
        PythonSource::parse(SOURCE).unwrap()
    }

    #[test]
    fn method_with_constructor() {
        let source = parsed();
        let target = resolve_target(&source, &RoutineQuery::named("bump").in_class("Counter")).unwrap();
        assert_eq!(target.style, CallStyle::Method);
        assert_eq!(target.params.len(), 1);
        assert_eq!(target.params[0].sample(), "1");
        assert_eq!(target.ctor_params[0].name, "start");
        assert_eq!(target.pattern_key(), "Counter");
    }

    #[test]
    fn nested_routine_goes_through_ancestor() {
        let source = parsed();
        let target = resolve_target(&source, &RoutineQuery::named("clamp")).unwrap();
        assert_eq!(target.invoked, "bump");
        assert!(!target.is_direct());
        assert_eq!(target.style, CallStyle::Method);
        assert_eq!(target.class_name.as_deref(), Some("Counter"));
    }

    #[test]
    fn decorated_styles() {
        let source = parsed();
        assert_eq!(
            resolve_target(&source, &RoutineQuery::named("zero").in_class("Counter")).unwrap().style,
            CallStyle::ClassLevel
        );
        let doubled = resolve_target(&source, &RoutineQuery::named("doubled").in_class("Counter")).unwrap();
        assert_eq!(doubled.style, CallStyle::Property);
        assert!(doubled.params.is_empty());
        assert_eq!(
            resolve_target(&source, &RoutineQuery::named("__init__").in_class("Counter")).unwrap().style,
            CallStyle::Constructor
        );
    }

    #[test]
    fn property_accessors_resolve_by_start_line() {
        let source = PythonSource::parse(
            "\
class Gauge:
    def __init__(self, level=0):
        self._level = level

    @property
    def level(self):
        return self._level

    @level.setter
    def level(self, value: int):
        self._level = value

    @level.deleter
    def level(self):
        del self._level
",
        )
        .unwrap();
        let query = RoutineQuery::named("level").in_class("Gauge");

        let getter = resolve_target(&source, &query).unwrap();
        assert_eq!(getter.style, CallStyle::Property);

        let setter = resolve_target(&source, &query.at_line(9)).unwrap();
        assert_eq!(setter.style, CallStyle::Setter);
        assert_eq!(setter.start_line, Some(9));
        assert_eq!(setter.params.len(), 1);
        assert_eq!(setter.params[0].kind, ParamKind::PositionalOnly);
        assert_eq!(setter.params[0].annotation.as_deref(), Some("int"));
        assert_eq!(setter.ctor_params[0].name, "level");
        assert!(setter.needs_instance());

        let deleter = resolve_target(&source, &query.at_line(13)).unwrap();
        assert_eq!(deleter.style, CallStyle::Deleter);
        assert!(deleter.params.is_empty());
    }

    #[test]
    fn nested_class_imports_outermost_name() {
        let source = PythonSource::parse(
            "class Outer:\n    class Inner:\n        def __init__(self, n):\n            self.n = n\n\n        def m(self, x):\n            return x\n",
        )
        .unwrap();
        let target = resolve_target(&source, &RoutineQuery::named("m").in_class("Inner")).unwrap();
        assert_eq!(target.class_path.as_deref(), Some("Outer.Inner"));
        assert_eq!(target.import_name(), "Outer");
        assert_eq!(target.pattern_key(), "Inner");
        assert_eq!(target.ctor_params[0].name, "n");
    }

    #[test]
    fn async_function() {
        let source = parsed();
        let target = resolve_target(&source, &RoutineQuery::named("fetch")).unwrap();
        assert!(target.is_async);
        assert_eq!(target.style, CallStyle::Function);
        assert_eq!(target.params[1].kind, ParamKind::KeywordOnly);
        assert_eq!(target.params[0].sample(), "'a'");
    }

    #[test]
    fn missing_routine() {
        let source = parsed();
        assert!(matches!(
            resolve_target(&source, &RoutineQuery::named("nope")),
            Err(SynthError::RoutineNotFound { .. })
        ));
    }
}
