//! The fixed set of names bound in every root frame.
//!
//! Operations come in two shapes:
//!
//! - **Callables** take evaluated arguments. Simple fixed-arity ones are
//!   wired through the same typed adapter layer hosts use for custom
//!   registration; variadic and multi-kind ones use the erased slice
//!   signature with an explicit [`Arity`].
//! - **Special forms** (`if`, `let`, `lambda`, ...) receive un-evaluated
//!   AST and live in the evaluator; this module only binds their names.
//!
//! Dispatch performs explicit kind checks producing *argument-error* on
//! mismatch; there is no implicit coercion apart from int→float promotion
//! in mixed arithmetic and comparisons.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::Error;
use crate::ast::{HostFn, MacroFn, MacroValue, Value};
use crate::evaluator::{
    eval_and, eval_apply, eval_cond, eval_defn, eval_expr, eval_if, eval_lambda, eval_let,
    eval_or, eval_setglobal,
};
use crate::hostfn::{HostFnImpl, IntoHostFn};

/// Argument-count constraint for builtins registered via the erased
/// signature. Typed registrations get arity checking from the adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    fn validate(self, name: &str, got: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(n) if got == n => Ok(()),
            Arity::AtLeast(n) if got >= n => Ok(()),
            Arity::Range(lo, hi) if got >= lo && got <= hi => Ok(()),
            Arity::Exact(n) => Err(Error::arity(name, n, got)),
            Arity::AtLeast(n) => Err(Error::arity(name, format!("at least {n}"), got)),
            Arity::Range(lo, hi) => Err(Error::arity(name, format!("{lo} to {hi}"), got)),
        }
    }
}

type RawFn = fn(&[Value]) -> Result<Value, Error>;

//
// Numeric helpers
//

/// A number in either representation. Arithmetic stays in integers until a
/// float operand promotes the whole reduction.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(name: &str, value: &Value) -> Result<Num, Error> {
        match value {
            Value::Int(n) => Ok(Num::Int(*n)),
            Value::Float(x) => Ok(Num::Float(*x)),
            other => Err(Error::argument(format!(
                "{name}: expected a number, got {}",
                other.kind_name()
            ))),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Int(n),
            Num::Float(x) => Value::Float(x),
        }
    }

    fn add(self, other: Num) -> Result<Num, Error> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a
                .checked_add(b)
                .map(Num::Int)
                .ok_or_else(|| Error::argument("+: integer overflow")),
            (a, b) => Ok(Num::Float(a.as_f64() + b.as_f64())),
        }
    }

    fn sub(self, other: Num) -> Result<Num, Error> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a
                .checked_sub(b)
                .map(Num::Int)
                .ok_or_else(|| Error::argument("-: integer overflow")),
            (a, b) => Ok(Num::Float(a.as_f64() - b.as_f64())),
        }
    }

    fn mul(self, other: Num) -> Result<Num, Error> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a
                .checked_mul(b)
                .map(Num::Int)
                .ok_or_else(|| Error::argument("*: integer overflow")),
            (a, b) => Ok(Num::Float(a.as_f64() * b.as_f64())),
        }
    }

    fn neg(self) -> Result<Num, Error> {
        match self {
            Num::Int(n) => n
                .checked_neg()
                .map(Num::Int)
                .ok_or_else(|| Error::argument("-: integer overflow")),
            Num::Float(x) => Ok(Num::Float(-x)),
        }
    }
}

//
// Arithmetic
//

/// `+` reduces numbers; a leading string or array switches to
/// concatenation over operands of that same kind.
fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    match args.first() {
        Some(Value::Str(_)) => {
            let mut out = String::new();
            for arg in args {
                match arg {
                    Value::Str(s) => out.push_str(s),
                    other => {
                        return Err(Error::argument(format!(
                            "+: cannot add {} to a string",
                            other.kind_name()
                        )));
                    }
                }
            }
            Ok(Value::Str(out))
        }
        Some(Value::Array(_)) => {
            let mut out = Vec::new();
            for arg in args {
                match arg {
                    Value::Array(items) => out.extend(items.iter().cloned()),
                    other => {
                        return Err(Error::argument(format!(
                            "+: cannot add {} to an array",
                            other.kind_name()
                        )));
                    }
                }
            }
            Ok(Value::Array(out))
        }
        _ => {
            let mut acc = Num::Int(0);
            for arg in args {
                acc = acc.add(Num::of("+", arg)?)?;
            }
            Ok(acc.to_value())
        }
    }
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    let [first, rest @ ..] = args else {
        return Err(Error::arity("-", "at least 1", 0));
    };

    let mut acc = Num::of("-", first)?;
    if rest.is_empty() {
        return Ok(acc.neg()?.to_value());
    }
    for arg in rest {
        acc = acc.sub(Num::of("-", arg)?)?;
    }
    Ok(acc.to_value())
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    let mut acc = Num::Int(1);
    for arg in args {
        acc = acc.mul(Num::of("*", arg)?)?;
    }
    Ok(acc.to_value())
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::arity("/", 2, args.len()));
    };
    match (Num::of("/", a)?, Num::of("/", b)?) {
        (Num::Int(x), Num::Int(y)) => {
            if y == 0 {
                return Err(Error::argument("/: division by zero"));
            }
            x.checked_div(y)
                .map(Value::Int)
                .ok_or_else(|| Error::argument("/: integer overflow"))
        }
        // Float division follows IEEE 754
        (x, y) => Ok(Value::Float(x.as_f64() / y.as_f64())),
    }
}

fn builtin_rem(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::arity("%", 2, args.len()));
    };
    match (Num::of("%", a)?, Num::of("%", b)?) {
        (Num::Int(x), Num::Int(y)) => {
            if y == 0 {
                return Err(Error::argument("%: division by zero"));
            }
            x.checked_rem(y)
                .map(Value::Int)
                .ok_or_else(|| Error::argument("%: integer overflow"))
        }
        (x, y) => Ok(Value::Float(x.as_f64() % y.as_f64())),
    }
}

//
// Comparison and equality
//

/// Total order over comparable pairs: numbers (with promotion), strings
/// (lexicographic) and times. Anything else cannot be ordered.
fn compare(name: &str, a: &Value, b: &Value) -> Result<Ordering, Error> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let x = Num::of(name, a)?.as_f64();
            let y = Num::of(name, b)?.as_f64();
            x.partial_cmp(&y)
                .ok_or_else(|| Error::argument(format!("{name}: cannot order NaN")))
        }
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Ok(x.cmp(y)),
        _ => Err(Error::argument(format!(
            "{name}: cannot order {} and {}",
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

/// Equality across kinds: numeric kinds compare with promotion, arrays
/// element-wise, everything else structurally. Values of different
/// non-numeric kinds are simply unequal, never an error.
pub(crate) fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| loose_eq(x, y))
        }
        _ => a == b,
    }
}

macro_rules! comparison_op {
    ($func:ident, $name:expr, $($ord:pat_param)|+) => {
        fn $func(args: &[Value]) -> Result<Value, Error> {
            let [a, b] = args else {
                return Err(Error::arity($name, 2, args.len()));
            };
            let ordering = compare($name, a, b)?;
            Ok(Value::Bool(matches!(ordering, $($ord)|+)))
        }
    };
}

comparison_op!(builtin_lt, "<", Ordering::Less);
comparison_op!(builtin_le, "<=", Ordering::Less | Ordering::Equal);
comparison_op!(builtin_gt, ">", Ordering::Greater);
comparison_op!(builtin_ge, ">=", Ordering::Greater | Ordering::Equal);

fn builtin_eq(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::arity("=", 2, args.len()));
    };
    Ok(Value::Bool(loose_eq(a, b)))
}

fn builtin_ne(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::arity("!=", 2, args.len()));
    };
    Ok(Value::Bool(!loose_eq(a, b)))
}

//
// Strings
//

/// `str` concatenates string representations: string contents raw, `nil`
/// as nothing, everything else via its display form.
fn builtin_str(args: &[Value]) -> Result<Value, Error> {
    let mut out = String::new();
    for arg in args {
        match arg {
            Value::Str(s) => out.push_str(s),
            Value::Nil => {}
            other => out.push_str(&other.to_string()),
        }
    }
    Ok(Value::Str(out))
}

//
// Conversions
//

fn builtin_int(args: &[Value]) -> Result<Value, Error> {
    let [value] = args else {
        return Err(Error::arity("int", 1, args.len()));
    };
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(x) if x.is_finite() => Ok(Value::Int(*x as i64)),
        Value::Float(_) => Err(Error::argument("int: cannot convert non-finite float")),
        Value::Str(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                return Ok(Value::Int(n));
            }
            match trimmed.parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(Value::Int(x as i64)),
                _ => Err(Error::argument(format!(
                    "int: cannot parse integer from '{s}'"
                ))),
            }
        }
        Value::Time(t) => Ok(Value::Int(t.timestamp())),
        other => Err(Error::argument(format!(
            "int: cannot convert {}",
            other.kind_name()
        ))),
    }
}

fn builtin_float(args: &[Value]) -> Result<Value, Error> {
    let [value] = args else {
        return Err(Error::arity("float", 1, args.len()));
    };
    match value {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Error::argument(format!("float: cannot parse number from '{s}'"))),
        Value::Time(t) => Ok(Value::Float(t.timestamp() as f64)),
        other => Err(Error::argument(format!(
            "float: cannot convert {}",
            other.kind_name()
        ))),
    }
}

fn builtin_time(args: &[Value]) -> Result<Value, Error> {
    let [value] = args else {
        return Err(Error::arity("time", 1, args.len()));
    };
    match value {
        Value::Str(s) => crate::ast::parse_instant(s).map(Value::Time),
        Value::Time(t) => Ok(Value::Time(*t)),
        other => Err(Error::argument(format!(
            "time: cannot convert {}",
            other.kind_name()
        ))),
    }
}

//
// Arrays
//

fn builtin_array(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Array(args.to_vec()))
}

/// `max`/`min` fold either the elements of a single array argument or the
/// arguments themselves, keeping the winning operand unpromoted.
fn fold_extremum(name: &str, args: &[Value], keep: Ordering) -> Result<Value, Error> {
    let items: &[Value] = match args {
        [Value::Array(items)] => items,
        other => other,
    };
    let [first, rest @ ..] = items else {
        return Err(Error::argument(format!("{name}: empty array")));
    };

    let mut best = first;
    for candidate in rest {
        if compare(name, candidate, best)? == keep {
            best = candidate;
        }
    }
    Ok(best.clone())
}

fn builtin_max(args: &[Value]) -> Result<Value, Error> {
    fold_extremum("max", args, Ordering::Greater)
}

fn builtin_min(args: &[Value]) -> Result<Value, Error> {
    fold_extremum("min", args, Ordering::Less)
}

//
// Random
//

/// `(rand)` → float in `[0, 1)`; `(rand n)` → value in `[0, n)` of the
/// bound's kind. The bound must be positive.
fn builtin_rand(args: &[Value]) -> Result<Value, Error> {
    let mut rng = rand::rng();
    match args {
        [] => Ok(Value::Float(rng.random::<f64>())),
        [Value::Int(n)] if *n > 0 => Ok(Value::Int(rng.random_range(0..*n))),
        [Value::Float(x)] if *x > 0.0 => Ok(Value::Float(rng.random_range(0.0..*x))),
        [Value::Int(_) | Value::Float(_)] => Err(Error::argument("rand: bound must be positive")),
        [other] => Err(Error::argument(format!(
            "rand: expected a numeric bound, got {}",
            other.kind_name()
        ))),
        _ => Err(Error::arity("rand", "0 or 1", args.len())),
    }
}

//
// Time
//

fn scale(name: &'static str, factor: i64) -> impl Fn(i64) -> Result<i64, String> {
    move |n| {
        n.checked_mul(factor)
            .ok_or_else(|| format!("{name}: integer overflow"))
    }
}

/// Shift the current instant by a signed number of seconds (`ago`,
/// `from-now`).
fn time_shift(name: &'static str, sign: i64) -> impl Fn(i64) -> Result<Value, String> {
    move |secs| {
        let delta = chrono::Duration::try_seconds(secs)
            .ok_or_else(|| format!("{name}: delta out of range"))?;
        let now = Utc::now();
        let shifted = if sign < 0 {
            now.checked_sub_signed(delta)
        } else {
            now.checked_add_signed(delta)
        };
        shifted
            .map(Value::Time)
            .ok_or_else(|| format!("{name}: result out of range"))
    }
}

//
// Registry
//

fn host(name: &'static str, arity: Arity, func: RawFn) -> Value {
    let wrapped: Arc<HostFnImpl> = Arc::new(move |args: &[Value]| {
        arity.validate(name, args.len())?;
        func(args)
    });
    Value::HostFn(HostFn::new(name, wrapped))
}

fn typed<F, Args, R>(bindings: &mut HashMap<String, Value>, name: &'static str, func: F)
where
    F: IntoHostFn<Args, R>,
{
    bindings.insert(
        name.to_owned(),
        Value::HostFn(HostFn::new(name, func.into_host_fn())),
    );
}

/// All default root bindings, built once. Cloning hands out cheap `Arc`
/// copies of the callables.
static DEFAULTS: LazyLock<HashMap<String, Value>> = LazyLock::new(|| {
    let mut bindings = HashMap::new();

    // Constants. There are no boolean literals in the language; these are
    // ordinary root bindings.
    bindings.insert("true".to_owned(), Value::Bool(true));
    bindings.insert("false".to_owned(), Value::Bool(false));
    bindings.insert("nil".to_owned(), Value::Nil);

    // Special forms
    let special_forms: [(&'static str, MacroFn); 10] = [
        ("if", eval_if),
        ("cond", eval_cond),
        ("and", eval_and),
        ("or", eval_or),
        ("let", eval_let),
        ("lambda", eval_lambda),
        ("defn", eval_defn),
        ("setglobal", eval_setglobal),
        ("expr", eval_expr),
        ("apply", eval_apply),
    ];
    for (name, func) in special_forms {
        bindings.insert(name.to_owned(), Value::Macro(MacroValue::builtin(name, func)));
    }

    // Variadic and multi-kind operations via the erased signature
    let operations: [(&'static str, Arity, RawFn); 19] = [
        ("+", Arity::AtLeast(0), builtin_add),
        ("-", Arity::AtLeast(1), builtin_sub),
        ("*", Arity::AtLeast(0), builtin_mul),
        ("/", Arity::Exact(2), builtin_div),
        ("%", Arity::Exact(2), builtin_rem),
        ("<", Arity::Exact(2), builtin_lt),
        ("<=", Arity::Exact(2), builtin_le),
        (">", Arity::Exact(2), builtin_gt),
        (">=", Arity::Exact(2), builtin_ge),
        ("=", Arity::Exact(2), builtin_eq),
        ("!=", Arity::Exact(2), builtin_ne),
        ("str", Arity::AtLeast(0), builtin_str),
        ("int", Arity::Exact(1), builtin_int),
        ("float", Arity::Exact(1), builtin_float),
        ("time", Arity::Exact(1), builtin_time),
        ("array", Arity::AtLeast(0), builtin_array),
        ("max", Arity::AtLeast(1), builtin_max),
        ("min", Arity::AtLeast(1), builtin_min),
        ("rand", Arity::Range(0, 1), builtin_rand),
    ];
    for (name, arity, func) in operations {
        bindings.insert(name.to_owned(), host(name, arity, func));
    }

    // Fixed-arity operations through the typed adapter layer, the same
    // machinery hosts use for custom registration.
    typed::<_, (Value,), bool>(&mut bindings, "not", |v: Value| !v.is_truthy());
    typed::<_, (Value,), bool>(&mut bindings, "!", |v: Value| !v.is_truthy());
    typed::<_, (Value,), Value>(&mut bindings, "identity", |v: Value| v);

    typed::<_, (String,), String>(&mut bindings, "upcase", |s: String| s.to_uppercase());
    typed::<_, (String,), String>(&mut bindings, "downcase", |s: String| s.to_lowercase());
    typed::<_, (String,), String>(&mut bindings, "strip", |s: String| s.trim().to_owned());

    typed::<_, (Vec<Value>,), Value>(&mut bindings, "first", |arr: Vec<Value>| {
        arr.first().cloned().unwrap_or(Value::Nil)
    });
    typed::<_, (Vec<Value>,), Value>(&mut bindings, "last", |arr: Vec<Value>| {
        arr.last().cloned().unwrap_or(Value::Nil)
    });
    // 0-indexed; out-of-range positions yield nil
    typed::<_, (i64, Vec<Value>), Value>(&mut bindings, "nth", |pos: i64, arr: Vec<Value>| {
        usize::try_from(pos)
            .ok()
            .and_then(|i| arr.get(i).cloned())
            .unwrap_or(Value::Nil)
    });
    typed::<_, (Vec<Value>,), i64>(&mut bindings, "length", |arr: Vec<Value>| arr.len() as i64);
    typed::<_, (Value, Vec<Value>), bool>(
        &mut bindings,
        "member?",
        |needle: Value, arr: Vec<Value>| arr.iter().any(|v| loose_eq(&needle, v)),
    );

    typed::<_, (), DateTime<Utc>>(&mut bindings, "now", Utc::now);
    typed::<_, (i64,), i64>(&mut bindings, "seconds", |n: i64| n);
    typed::<_, (i64,), i64>(&mut bindings, "minutes", scale("minutes", 60));
    typed::<_, (i64,), i64>(&mut bindings, "hours", scale("hours", 3_600));
    typed::<_, (i64,), i64>(&mut bindings, "days", scale("days", 86_400));
    // Months are approximated as 30 days
    typed::<_, (i64,), i64>(&mut bindings, "months", scale("months", 2_592_000));
    typed::<_, (i64,), Value>(&mut bindings, "ago", time_shift("ago", -1));
    typed::<_, (i64,), Value>(&mut bindings, "from-now", time_shift("from-now", 1));

    bindings
});

/// A fresh copy of the default root bindings for one evaluation.
pub(crate) fn default_bindings() -> HashMap<String, Value> {
    DEFAULTS.clone()
}
