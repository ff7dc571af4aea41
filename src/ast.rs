//! Core data model for the interpreter: lexer tokens, AST nodes and runtime
//! values. The main enum, [`Value`], covers every kind that flows through the
//! evaluator: numbers, strings, booleans, nil, absolute instants, arrays,
//! host callables and macros (special forms and user closures). `From`
//! conversions are provided for common Rust types so hosts can build binding
//! maps from plain literals, vectors and slices.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::Error;
use crate::evaluator::{Evaluator, Frame, Outcome};
use crate::hostfn::HostFnImpl;

/// A lexer token. `Space` is produced by the whitespace rule and discarded
/// before the stream reaches the parser; `Fn` is the reserved `fn` keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Var(String),
    Int(i64),
    Float(f64),
    Str(String),
    Time(DateTime<Utc>),
    Fn,
    Space,
}

/// An AST node: an atom in value position, or an ordered form. The parser
/// never emits explicit expression markers; a form is simply a list.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Var(String),
    Int(i64),
    Float(f64),
    Str(String),
    Time(DateTime<Utc>),
    Form(Vec<Node>),
}

/// A host-supplied callable. Receives already-evaluated argument values.
#[derive(Clone)]
pub struct HostFn {
    pub(crate) id: String,
    pub(crate) func: Arc<HostFnImpl>,
}

impl HostFn {
    pub(crate) fn new(id: impl Into<String>, func: Arc<HostFnImpl>) -> Self {
        HostFn {
            id: id.into(),
            func,
        }
    }
}

/// Signature of a built-in special form: the evaluator handle plus the
/// un-evaluated argument nodes.
pub(crate) type MacroFn = fn(&mut Evaluator, &[Node]) -> Result<Outcome, Error>;

/// A user closure created by `lambda`/`defn`: parameter names, body forms and
/// the frame chain captured at the definition site.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Closure {
    pub(crate) params: Vec<String>,
    pub(crate) body: Vec<Node>,
    pub(crate) frame: Frame,
}

#[derive(Clone)]
pub(crate) enum MacroKind {
    /// Built-in special form (`if`, `let`, ...). Receives raw AST.
    Builtin(MacroFn),
    /// User closure. Arguments are evaluated in the caller's frame, then
    /// bound in a fresh child of the captured frame.
    Closure(Arc<Closure>),
}

/// A callable that participates in macro dispatch: built-in special forms
/// receive un-evaluated sub-expressions, user closures evaluate their
/// arguments through the evaluator handle before entering the body.
#[derive(Clone)]
pub struct MacroValue {
    pub(crate) name: &'static str,
    pub(crate) kind: MacroKind,
}

impl MacroValue {
    pub(crate) fn builtin(name: &'static str, func: MacroFn) -> Self {
        MacroValue {
            name,
            kind: MacroKind::Builtin(func),
        }
    }

    pub(crate) fn closure(closure: Closure) -> Self {
        MacroValue {
            name: "lambda",
            kind: MacroKind::Closure(Arc::new(closure)),
        }
    }
}

/// Runtime value flowing through the interpreter.
///
/// Arrays have immutable handle semantics: operations return new arrays
/// rather than mutating in place.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Time(DateTime<Utc>),
    Array(Vec<Value>),
    HostFn(HostFn),
    Macro(MacroValue),
}

impl Value {
    /// `false` and `nil` are falsy; everything else, including `0`, `""` and
    /// empty arrays, is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Kind name used in argument-error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Time(_) => "time",
            Value::Array(_) => "array",
            Value::HostFn(_) => "hostfn",
            Value::Macro(_) => "macro",
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Time(t) => write!(f, "Time({})", t.to_rfc3339()),
            Value::Array(items) => {
                write!(f, "Array(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::HostFn(hf) => write!(f, "HostFn({})", hf.id),
            Value::Macro(m) => match &m.kind {
                MacroKind::Builtin(_) => write!(f, "Macro({})", m.name),
                MacroKind::Closure(c) => {
                    write!(f, "Closure(params={:?})", c.params)
                }
            },
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::HostFn(hf) => write!(f, "#<hostfn:{}>", hf.id),
            Value::Macro(m) => match &m.kind {
                MacroKind::Builtin(_) => write!(f, "#<macro:{}>", m.name),
                MacroKind::Closure(_) => write!(f, "#<lambda>"),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            // Host callables compare by id, not function pointer
            (Value::HostFn(a), Value::HostFn(b)) => a.id == b.id,
            (Value::Macro(a), Value::Macro(b)) => match (&a.kind, &b.kind) {
                (MacroKind::Builtin(f1), MacroKind::Builtin(f2)) => {
                    a.name == b.name && std::ptr::fn_addr_eq(*f1, *f2)
                }
                (MacroKind::Closure(c1), MacroKind::Closure(c2)) => c1 == c2,
                _ => false,
            },
            _ => false, // Different kinds are never equal
        }
    }
}

// From trait implementations for Value - enables .into() conversion in
// binding maps and host-callable return positions.

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Time(t)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Int(i64::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(i64);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::Array(arr.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::Array(slice.iter().cloned().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(x) => x.into(),
            None => Value::Nil,
        }
    }
}

/// Helper for building Values in tests and mixed arrays.
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Parse an absolute instant from ISO-like text. Accepts RFC 3339, a naive
/// datetime with `T` or space separator (interpreted as UTC), or a bare date
/// (midnight UTC). Used by `#t{...}` literals and the `time` builtin.
pub(crate) fn parse_instant(text: &str) -> Result<DateTime<Utc>, Error> {
    let text = text.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        && let Some(naive) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(naive.and_utc());
    }

    Err(Error::argument(format!(
        "cannot parse instant from '{text}'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions_data_driven() {
        let test_cases = vec![
            (val(42), Value::Int(42)),
            (val(-17), Value::Int(-17)),
            (val(255u8), Value::Int(255)),
            (val(i64::MAX), Value::Int(i64::MAX)),
            (val(2.5), Value::Float(2.5)),
            (val(true), Value::Bool(true)),
            (val("hello"), Value::Str("hello".to_owned())),
            (val(String::from("owned")), Value::Str("owned".to_owned())),
            (val(()), Value::Nil),
            (val(None::<i64>), Value::Nil),
            (val(Some(3)), Value::Int(3)),
            (
                val([1, 2, 3]),
                Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            ),
            (
                val(vec!["a", "b"]),
                Value::Array(vec![
                    Value::Str("a".to_owned()),
                    Value::Str("b".to_owned()),
                ]),
            ),
            (
                val(vec![val(1), val("x"), val(false)]),
                Value::Array(vec![
                    Value::Int(1),
                    Value::Str("x".to_owned()),
                    Value::Bool(false),
                ]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(
                actual,
                expected,
                "conversion case {} mismatch",
                i + 1
            );
        }
    }

    #[test]
    fn test_truthiness() {
        // Only false and nil are falsy
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());

        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::Float(0.0).is_truthy());
        assert!(Value::Str(String::new()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn test_display_forms() {
        let cases = vec![
            (Value::Nil, "nil"),
            (Value::Bool(true), "true"),
            (Value::Int(-3), "-3"),
            (Value::Float(1.5), "1.5"),
            (Value::Str("a\"b".to_owned()), "\"a\\\"b\""),
            (val([1, 2]), "[1 2]"),
        ];
        for (value, expected) in cases {
            assert_eq!(format!("{value}"), expected);
        }

        let t = parse_instant("2024-06-01T12:00:00Z").unwrap();
        assert_eq!(format!("{}", Value::Time(t)), "2024-06-01T12:00:00+00:00");
    }

    #[test]
    fn test_cross_kind_values_are_not_equal() {
        // Structural equality does not promote; the `=` builtin does.
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_ne!(Value::Str("1".to_owned()), Value::Int(1));
    }

    #[test]
    fn test_parse_instant_formats() {
        let rfc = parse_instant("2024-01-15T10:30:00+02:00").unwrap();
        assert_eq!(rfc.to_rfc3339(), "2024-01-15T08:30:00+00:00");

        let naive_t = parse_instant("2024-01-15T10:30:00").unwrap();
        let naive_space = parse_instant("2024-01-15 10:30:00").unwrap();
        assert_eq!(naive_t, naive_space);

        let date_only = parse_instant("2024-01-15").unwrap();
        assert_eq!(date_only.to_rfc3339(), "2024-01-15T00:00:00+00:00");

        assert!(parse_instant("not a time").is_err());
        assert!(parse_instant("").is_err());
    }
}
