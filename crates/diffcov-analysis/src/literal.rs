//! Literal values read from Python syntax trees
//!
//! Extraction is a strict syntactic whitelist: numbers, strings without
//! interpolation, bytes, booleans, `None`, and list/tuple/set/dict displays
//! made only of those. Anything else yields `None` and is never evaluated.

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use std::fmt::{self, Display, Formatter, Write as _};
use tree_sitter::Node;

/// A literal value observed in source
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// `None`
    None,
    /// `True` / `False`
    Bool(bool),
    /// Integer literal (including negated)
    Int(i64),
    /// Float literal (including negated)
    Float(f64),
    /// Decoded string literal
    Str(String),
    /// Decoded bytes literal
    Bytes(Vec<u8>),
    /// `[...]`
    List(Vec<LiteralValue>),
    /// `(...)`
    Tuple(Vec<LiteralValue>),
    /// `{a, b}`
    Set(Vec<LiteralValue>),
    /// `{k: v}`
    Dict(Vec<(LiteralValue, LiteralValue)>),
}

/// Coarse kind of a literal, used to pick generators
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// `None`
    None,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Float
    Float,
    /// String
    Str,
    /// Bytes
    Bytes,
    /// List
    List,
    /// Tuple
    Tuple,
    /// Set
    Set,
    /// Dict
    Dict,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::Dict => "dict",
        };
        f.write_str(name)
    }
}

impl LiteralValue {
    /// Kind of this value
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::None => ValueKind::None,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::List(_) => ValueKind::List,
            Self::Tuple(_) => ValueKind::Tuple,
            Self::Set(_) => ValueKind::Set,
            Self::Dict(_) => ValueKind::Dict,
        }
    }

    /// Numeric view for range derivation
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Render as Python source that evaluates to this value
    #[must_use]
    pub fn to_python(&self) -> String {
        let mut out = String::new();
        self.write_python(&mut out);
        out
    }

    fn write_python(&self, out: &mut String) {
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => out.push_str(&python_float(*f)),
            Self::Str(s) => write_str_repr(s, out),
            Self::Bytes(b) => write_bytes_repr(b, out),
            Self::List(items) => write_items(items, "[", "]", out),
            Self::Tuple(items) => {
                if items.len() == 1 {
                    out.push('(');
                    items[0].write_python(out);
                    out.push_str(",)");
                } else {
                    write_items(items, "(", ")", out);
                }
            }
            Self::Set(items) => {
                if items.is_empty() {
                    out.push_str("set()");
                } else {
                    write_items(items, "{", "}", out);
                }
            }
            Self::Dict(pairs) => {
                out.push('{');
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.write_python(out);
                    out.push_str(": ");
                    v.write_python(out);
                }
                out.push('}');
            }
        }
    }
}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_python())
    }
}

impl Serialize for LiteralValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Bytes(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
            Self::List(items) | Self::Tuple(items) | Self::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Dict(pairs) => {
                let mut seq = serializer.serialize_seq(Some(pairs.len()))?;
                for pair in pairs {
                    seq.serialize_element(pair)?;
                }
                seq.end()
            }
        }
    }
}

/// Read a literal from an expression node, or `None` if it is not one
#[must_use]
pub fn extract_literal(node: Node<'_>, source: &[u8]) -> Option<LiteralValue> {
    match node.kind() {
        "integer" => parse_int(node.utf8_text(source).ok()?).map(LiteralValue::Int),
        "float" => parse_float(node.utf8_text(source).ok()?).map(LiteralValue::Float),
        "true" => Some(LiteralValue::Bool(true)),
        "false" => Some(LiteralValue::Bool(false)),
        "none" => Some(LiteralValue::None),
        "string" => extract_string(node, source),
        "unary_operator" => {
            let op = node.child_by_field_name("operator")?.utf8_text(source).ok()?;
            let operand = extract_literal(node.child_by_field_name("argument")?, source)?;
            match (op, operand) {
                ("-", LiteralValue::Int(i)) => i.checked_neg().map(LiteralValue::Int),
                ("-", LiteralValue::Float(f)) => Some(LiteralValue::Float(-f)),
                ("+", value @ (LiteralValue::Int(_) | LiteralValue::Float(_))) => Some(value),
                _ => None,
            }
        }
        "parenthesized_expression" => {
            let mut cursor = node.walk();
            let inner: Vec<Node<'_>> = node
                .named_children(&mut cursor)
                .filter(|n| n.kind() != "comment")
                .collect();
            match inner.as_slice() {
                [only] => extract_literal(*only, source),
                _ => None,
            }
        }
        "list" => extract_items(node, source).map(LiteralValue::List),
        "tuple" => extract_items(node, source).map(LiteralValue::Tuple),
        "set" => extract_items(node, source).map(LiteralValue::Set),
        "dictionary" => {
            let mut cursor = node.walk();
            let mut pairs = Vec::new();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "comment" => {}
                    "pair" => {
                        let key = extract_literal(child.child_by_field_name("key")?, source)?;
                        let value = extract_literal(child.child_by_field_name("value")?, source)?;
                        pairs.push((key, value));
                    }
                    _ => return None,
                }
            }
            Some(LiteralValue::Dict(pairs))
        }
        _ => None,
    }
}

fn extract_items(node: Node<'_>, source: &[u8]) -> Option<Vec<LiteralValue>> {
    let mut cursor = node.walk();
    let mut items = Vec::new();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "comment" {
            continue;
        }
        items.push(extract_literal(child, source)?);
    }
    Some(items)
}

fn extract_string(node: Node<'_>, source: &[u8]) -> Option<LiteralValue> {
    let mut cursor = node.walk();
    if node
        .named_children(&mut cursor)
        .any(|c| c.kind() == "interpolation")
    {
        return None;
    }

    let text = node.utf8_text(source).ok()?;
    let quote_at = text.find(['\'', '"'])?;
    let prefix = text[..quote_at].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('t') {
        return None;
    }

    let rest = &text[quote_at..];
    let quote = if rest.starts_with("\"\"\"") || rest.starts_with("'''") {
        &rest[..3]
    } else {
        &rest[..1]
    };
    if rest.len() < quote.len() * 2 || !rest.ends_with(quote) {
        return None;
    }
    let body = &rest[quote.len()..rest.len() - quote.len()];
    let raw = prefix.contains('r');

    if prefix.contains('b') {
        let decoded = if raw { Some(body.as_bytes().to_vec()) } else { decode_bytes(body) };
        decoded.map(LiteralValue::Bytes)
    } else {
        let decoded = if raw { Some(body.to_string()) } else { decode_str(body) };
        decoded.map(LiteralValue::Str)
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let cleaned = text.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();
    if lower.ends_with('j') || lower.ends_with('l') {
        return None;
    }
    if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else {
        lower.parse().ok()
    }
}

fn parse_float(text: &str) -> Option<f64> {
    let cleaned = text.replace('_', "");
    if cleaned.ends_with(['j', 'J']) {
        return None;
    }
    cleaned.parse().ok()
}

/// Decode the escape sequences Python accepts in a non-raw `str` literal
/// Decode a non-raw string body
///
/// `None` for escapes whose value cannot be reproduced exactly: `\N{...}`
/// names and malformed `\x`/`\u`/`\U` sequences.
fn decode_str(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push('\\');
            break;
        };
        match esc {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = esc.to_digit(8)?;
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value)?);
            }
            'x' | 'u' | 'U' => {
                let width = match esc {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.by_ref().take(width).collect();
                if digits.len() != width {
                    return None;
                }
                out.push(u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)?);
            }
            'N' => return None,
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

/// Decode a non-raw bytes body; `None` for malformed `\x` or octal overflow
fn decode_bytes(body: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len());
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' || i + 1 >= bytes.len() {
            out.push(b);
            i += 1;
            continue;
        }
        let esc = bytes[i + 1];
        i += 2;
        match esc {
            b'\n' => {}
            b'\\' => out.push(b'\\'),
            b'\'' => out.push(b'\''),
            b'"' => out.push(b'"'),
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'0'..=b'7' => {
                let mut value = u32::from(esc - b'0');
                let mut taken = 0;
                while taken < 2 && i < bytes.len() && (b'0'..=b'7').contains(&bytes[i]) {
                    value = value * 8 + u32::from(bytes[i] - b'0');
                    i += 1;
                    taken += 1;
                }
                out.push(u8::try_from(value).ok()?);
            }
            b'x' => {
                let value = body
                    .get(i..i + 2)
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())?;
                out.push(value);
                i += 2;
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

fn write_items(items: &[LiteralValue], open: &str, close: &str, out: &mut String) {
    out.push_str(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_python(out);
    }
    out.push_str(close);
}

fn write_str_repr(s: &str, out: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

fn write_bytes_repr(bytes: &[u8], out: &mut String) {
    out.push_str("b'");
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(char::from(b)),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out.push('\'');
}

fn python_float(f: f64) -> String {
    if f.is_nan() {
        "float('nan')".to_string()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "" } else { "-" };
        format!("float('{sign}inf')")
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f:?}")
    }
}
