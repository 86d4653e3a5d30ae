//! Hypothesis strategies
//!
//! A [`Strategy`] is rendered as a `hypothesis.strategies` expression and can
//! also produce one representative concrete value for direct calls.

use crate::config::SynthesisConfig;
use diffcov_analysis::{LiteralValue, ValueKind};

const INT_BOUND: i64 = 1_000;
const FLOAT_BOUND: f64 = 1e6;
const TEXT_MAX: usize = 20;
const COLLECTION_MAX: usize = 10;

/// Parameter names that suggest a text argument in the generic tier
const TEXT_NAME_HINTS: &[&str] = &[
    "name", "text", "label", "path", "key", "msg", "message", "prefix", "suffix", "word", "title",
];

/// A value generator
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// `st.integers`
    Integers {
        /// Inclusive lower bound
        min: i64,
        /// Inclusive upper bound
        max: i64,
    },
    /// `st.floats`, finite only
    Floats {
        /// Inclusive lower bound
        min: f64,
        /// Inclusive upper bound
        max: f64,
    },
    /// `st.text`
    Text,
    /// `st.booleans`
    Booleans,
    /// `st.binary`
    Binary,
    /// `st.none`
    NoneValue,
    /// `st.lists`
    Lists(Box<Strategy>),
    /// Lists converted to tuples
    Tuples(Box<Strategy>),
    /// `st.sets`
    Sets(Box<Strategy>),
    /// `st.dictionaries` with text keys
    Dictionaries(Box<Strategy>),
    /// `st.sampled_from`
    SampledFrom(Vec<LiteralValue>),
    /// `st.one_of`
    OneOf(Vec<Strategy>),
}

impl Strategy {
    /// Bounded integers used when nothing is known
    #[must_use]
    pub fn generic() -> Self {
        Self::Integers {
            min: -INT_BOUND,
            max: INT_BOUND,
        }
    }

    /// Generic strategy, text for names that look textual
    #[must_use]
    pub fn generic_for_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if TEXT_NAME_HINTS.iter().any(|h| lower.contains(h)) {
            Self::Text
        } else {
            Self::generic()
        }
    }

    /// Strategy covering observed literals
    ///
    /// Numbers widen to the observed range plus `integer_spread` on each side;
    /// small or mixed sets are sampled as-is; large string sets also admit
    /// arbitrary text.
    #[must_use]
    pub fn from_observed(values: &[LiteralValue], config: &SynthesisConfig) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let spread = config.integer_spread;
        let sampled = Self::SampledFrom(values.to_vec());

        let ints: Vec<i64> = values
            .iter()
            .filter_map(|v| match v {
                LiteralValue::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        if ints.len() == values.len() {
            let min = ints.iter().copied().min().unwrap_or(0);
            let max = ints.iter().copied().max().unwrap_or(0);
            return Some(Self::OneOf(vec![
                sampled,
                Self::Integers {
                    min: min.saturating_sub(spread),
                    max: max.saturating_add(spread),
                },
            ]));
        }

        let floats: Vec<f64> = values.iter().filter_map(LiteralValue::as_f64).collect();
        if floats.len() == values.len() && floats.iter().all(|f| f.is_finite()) {
            let min = floats.iter().copied().fold(f64::INFINITY, f64::min);
            let max = floats.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            #[allow(clippy::cast_precision_loss)]
            let spread = spread as f64;
            return Some(Self::OneOf(vec![
                sampled,
                Self::Floats {
                    min: min - spread,
                    max: max + spread,
                },
            ]));
        }

        let all_strings = values.iter().all(|v| v.kind() == ValueKind::Str);
        if all_strings && values.len() > config.closed_set_limit {
            return Some(Self::OneOf(vec![sampled, Self::Text]));
        }
        Some(sampled)
    }

    /// Strategy for a type annotation, if the annotation is recognized
    #[must_use]
    pub fn from_annotation(annotation: &str) -> Option<Self> {
        let text: String = annotation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let text = text.trim_matches(|c| c == '"' || c == '\'');
        let text = text.strip_prefix("typing.").unwrap_or(text);

        // X | None, None | X
        if text.contains('|') {
            let parts: Vec<&str> = text.split('|').collect();
            let mut options: Vec<Self> = Vec::new();
            for part in parts {
                options.push(Self::from_annotation(part)?);
            }
            return Some(Self::OneOf(options));
        }

        if let Some(inner) = generic_arg(text, "Optional") {
            return Some(Self::OneOf(vec![Self::NoneValue, Self::from_annotation(inner)?]));
        }

        let (head, arg) = match text.split_once('[') {
            Some((head, rest)) => (head, rest.strip_suffix(']')),
            None => (text, None),
        };
        let head = head.rsplit('.').next().unwrap_or(head);
        let element = || {
            arg.and_then(first_type_arg)
                .and_then(Self::from_annotation)
                .unwrap_or_else(Self::generic)
        };

        let strategy = match head {
            "int" => Self::generic(),
            "float" => Self::Floats {
                min: -FLOAT_BOUND,
                max: FLOAT_BOUND,
            },
            "str" => Self::Text,
            "bool" => Self::Booleans,
            "bytes" | "bytearray" => Self::Binary,
            "None" | "NoneType" => Self::NoneValue,
            "list" | "List" | "Sequence" | "Iterable" | "Collection" | "MutableSequence" => {
                Self::Lists(Box::new(element()))
            }
            "tuple" | "Tuple" => Self::Tuples(Box::new(element())),
            "set" | "Set" | "frozenset" | "FrozenSet" | "AbstractSet" => {
                Self::Sets(Box::new(element()))
            }
            "dict" | "Dict" | "Mapping" | "MutableMapping" => {
                let value = arg
                    .and_then(|a| a.split_once(',').map(|(_, v)| v))
                    .and_then(Self::from_annotation)
                    .unwrap_or_else(Self::generic);
                Self::Dictionaries(Box::new(value))
            }
            _ => return None,
        };
        Some(strategy)
    }

    /// Strategy matching the kind of a default value
    #[must_use]
    pub fn from_literal(value: &LiteralValue) -> Self {
        match value {
            LiteralValue::None => Self::NoneValue,
            LiteralValue::Bool(_) => Self::Booleans,
            LiteralValue::Int(_) => Self::generic(),
            LiteralValue::Float(_) => Self::Floats {
                min: -FLOAT_BOUND,
                max: FLOAT_BOUND,
            },
            LiteralValue::Str(_) => Self::Text,
            LiteralValue::Bytes(_) => Self::Binary,
            LiteralValue::List(items) => Self::Lists(Box::new(element_of(items))),
            LiteralValue::Tuple(items) => Self::Tuples(Box::new(element_of(items))),
            LiteralValue::Set(items) => Self::Sets(Box::new(element_of(items))),
            LiteralValue::Dict(pairs) => Self::Dictionaries(Box::new(
                pairs
                    .first()
                    .map_or_else(Self::generic, |(_, v)| Self::from_literal(v)),
            )),
        }
    }

    /// Render as a `hypothesis.strategies` expression (imported as `st`)
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Integers { min, max } => format!("st.integers(min_value={min}, max_value={max})"),
            Self::Floats { min, max } => format!(
                "st.floats(min_value={}, max_value={}, allow_nan=False, allow_infinity=False)",
                LiteralValue::Float(*min).to_python(),
                LiteralValue::Float(*max).to_python()
            ),
            Self::Text => format!("st.text(max_size={TEXT_MAX})"),
            Self::Booleans => "st.booleans()".to_string(),
            Self::Binary => format!("st.binary(max_size={TEXT_MAX})"),
            Self::NoneValue => "st.none()".to_string(),
            Self::Lists(inner) => format!("st.lists({}, max_size={COLLECTION_MAX})", inner.render()),
            Self::Tuples(inner) => format!(
                "st.lists({}, max_size={COLLECTION_MAX}).map(tuple)",
                inner.render()
            ),
            Self::Sets(inner) => format!("st.sets({}, max_size={COLLECTION_MAX})", inner.render()),
            Self::Dictionaries(value) => format!(
                "st.dictionaries(st.text(max_size={TEXT_MAX}), {}, max_size={COLLECTION_MAX})",
                value.render()
            ),
            Self::SampledFrom(values) => {
                let items: Vec<String> = values.iter().map(LiteralValue::to_python).collect();
                format!("st.sampled_from([{}])", items.join(", "))
            }
            Self::OneOf(options) => {
                let items: Vec<String> = options.iter().map(Self::render).collect();
                format!("st.one_of({})", items.join(", "))
            }
        }
    }

    /// One representative value as Python source
    #[must_use]
    pub fn sample(&self) -> String {
        match self {
            Self::Integers { min, max } => {
                let v = if (*min..=*max).contains(&1) { 1 } else { *min };
                v.to_string()
            }
            Self::Floats { min, max } => {
                let v = if *min <= 1.0 && 1.0 <= *max { 1.0 } else { *min };
                LiteralValue::Float(v).to_python()
            }
            Self::Text => "'a'".to_string(),
            Self::Booleans => "True".to_string(),
            Self::Binary => "b'a'".to_string(),
            Self::NoneValue => "None".to_string(),
            Self::Lists(inner) => format!("[{}]", inner.sample()),
            Self::Tuples(inner) => format!("({},)", inner.sample()),
            Self::Sets(inner) => format!("{{{}}}", inner.sample()),
            Self::Dictionaries(value) => format!("{{'a': {}}}", value.sample()),
            Self::SampledFrom(values) => values
                .first()
                .map_or_else(|| "None".to_string(), LiteralValue::to_python),
            Self::OneOf(options) => options
                .iter()
                .find(|o| !matches!(o, Self::NoneValue))
                .or_else(|| options.first())
                .map_or_else(|| "None".to_string(), Self::sample),
        }
    }

    /// Check if the strategy only draws from a fixed list
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::SampledFrom(_))
    }
}

fn element_of(items: &[LiteralValue]) -> Strategy {
    items
        .first()
        .map_or_else(Strategy::generic, Strategy::from_literal)
}

/// `Name[inner]` → `inner`
fn generic_arg<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.strip_prefix(name)?.strip_prefix('[')?.strip_suffix(']')
}

/// First top-level argument of a subscript, ignoring nested brackets
fn first_type_arg(args: &str) -> Option<&str> {
    let mut depth = 0usize;
    for (i, c) in args.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some(&args[..i]),
            _ => {}
        }
    }
    (!args.is_empty()).then_some(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integers_widen_around_observed() {
        let config = SynthesisConfig::default();
        let strategy =
            Strategy::from_observed(&[LiteralValue::Int(10), LiteralValue::Int(20)], &config).unwrap();
        assert_eq!(
            strategy.render(),
            "st.one_of(st.sampled_from([10, 20]), st.integers(min_value=-90, max_value=120))"
        );
        assert_eq!(strategy.sample(), "10");
    }

    #[test]
    fn closed_string_set() {
        let config = SynthesisConfig::default();
        let strategy = Strategy::from_observed(&[LiteralValue::Str("red".into())], &config).unwrap();
        assert_eq!(strategy.render(), "st.sampled_from(['red'])");
        assert!(strategy.is_closed());
    }

    #[test]
    fn large_string_set_admits_text() {
        let config = SynthesisConfig::default();
        let values: Vec<LiteralValue> = (0..9).map(|i| LiteralValue::Str(format!("v{i}"))).collect();
        let strategy = Strategy::from_observed(&values, &config).unwrap();
        assert!(matches!(strategy, Strategy::OneOf(ref o) if o.len() == 2 && o[1] == Strategy::Text));
    }

    #[test]
    fn mixed_kinds_are_sampled() {
        let config = SynthesisConfig::default();
        let values = vec![LiteralValue::Int(1), LiteralValue::None, LiteralValue::Str("x".into())];
        assert_eq!(
            Strategy::from_observed(&values, &config).unwrap().render(),
            "st.sampled_from([1, None, 'x'])"
        );
    }

    #[test]
    fn mixed_numbers_become_floats() {
        let config = SynthesisConfig::default().with_integer_spread(1);
        let values = vec![LiteralValue::Int(1), LiteralValue::Float(2.5)];
        let strategy = Strategy::from_observed(&values, &config).unwrap();
        assert!(strategy.render().contains("st.floats(min_value=0.0, max_value=3.5"));
    }

    #[test]
    fn annotations() {
        assert_eq!(Strategy::from_annotation("int"), Some(Strategy::generic()));
        assert_eq!(Strategy::from_annotation("str"), Some(Strategy::Text));
        assert_eq!(
            Strategy::from_annotation("Optional[int]"),
            Some(Strategy::OneOf(vec![Strategy::NoneValue, Strategy::generic()]))
        );
        assert_eq!(
            Strategy::from_annotation("int | None"),
            Some(Strategy::OneOf(vec![Strategy::generic(), Strategy::NoneValue]))
        );
        assert_eq!(
            Strategy::from_annotation("list[str]"),
            Some(Strategy::Lists(Box::new(Strategy::Text)))
        );
        assert_eq!(
            Strategy::from_annotation("typing.Dict[str, float]").map(|s| s.render()),
            Some(
                "st.dictionaries(st.text(max_size=20), st.floats(min_value=-1000000.0, max_value=1000000.0, allow_nan=False, allow_infinity=False), max_size=10)"
                    .to_string()
            )
        );
        assert_eq!(Strategy::from_annotation("Widget"), None);
        assert_eq!(Strategy::from_annotation("int | Widget"), None);
    }

    #[test]
    fn defaults_pick_kind() {
        assert_eq!(Strategy::from_literal(&LiteralValue::Bool(false)), Strategy::Booleans);
        assert_eq!(
            Strategy::from_literal(&LiteralValue::List(vec![LiteralValue::Str("a".into())])),
            Strategy::Lists(Box::new(Strategy::Text))
        );
    }

    #[test]
    fn generic_names() {
        assert_eq!(Strategy::generic_for_name("file_path"), Strategy::Text);
        assert_eq!(Strategy::generic_for_name("count"), Strategy::generic());
    }

    #[test]
    fn samples() {
        assert_eq!(Strategy::Lists(Box::new(Strategy::Text)).sample(), "['a']");
        assert_eq!(Strategy::Integers { min: 5, max: 9 }.sample(), "5");
        assert_eq!(Strategy::OneOf(vec![Strategy::NoneValue, Strategy::Booleans]).sample(), "True");
    }
}
