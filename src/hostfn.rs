//! Typed host-callable registration adapters.
//!
//! Hosts can register plain Rust functions and closures as named callables;
//! the adapters here convert them to the canonical erased signature the
//! evaluator applies. Argument extraction, arity checking and result
//! conversion are automatic:
//!
//! ```
//! use rulisp::Interpreter;
//!
//! fn clamp(value: i64, limit: i64) -> i64 {
//!     value.min(limit)
//! }
//!
//! let mut interp = Interpreter::new();
//! interp.bind_op("clamp", clamp);
//! assert_eq!(interp.eval("(clamp 99 10)").unwrap(), rulisp::Value::Int(10));
//! ```
//!
//! Fallible callables return `Result<R, E>` for any `E: Display`; the error
//! text is surfaced as an *argument-error*:
//!
//! ```
//! use rulisp::Interpreter;
//!
//! fn safe_div(a: i64, b: i64) -> Result<i64, &'static str> {
//!     if b == 0 { Err("division by zero") } else { Ok(a / b) }
//! }
//!
//! let mut interp = Interpreter::new();
//! interp.bind_op("safe-div", safe_div);
//! assert!(interp.eval("(safe-div 1 0)").is_err());
//! ```
//!
//! Supported parameter types: `i64`, `f64` (accepts ints), `bool`,
//! `String`, `DateTime<Utc>`, `Vec<Value>` (an array argument) and `Value`
//! itself for untyped access. Supported return types: anything with
//! `Into<Value>`, or `Result` thereof. Callables needing full control over
//! the error kind, variable arity, or more than four parameters use the
//! erased slice signature directly (`bind_host_fn`).

use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::Error;
use crate::ast::Value;

/// Canonical erased host-callable signature used by the evaluator.
/// Callables receive already-evaluated argument values.
pub type HostFnImpl = dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync;

/// Conversion from a single evaluated argument into a typed parameter.
pub trait FromArg: Sized {
    fn from_arg(value: &Value) -> Result<Self, Error>;
}

impl FromArg for Value {
    fn from_arg(value: &Value) -> Result<Self, Error> {
        Ok(value.clone())
    }
}

impl FromArg for i64 {
    fn from_arg(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Int(n) => Ok(*n),
            other => Err(Error::argument(format!(
                "expected int, got {}",
                other.kind_name()
            ))),
        }
    }
}

impl FromArg for f64 {
    fn from_arg(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Int(n) => Ok(*n as f64),
            Value::Float(x) => Ok(*x),
            other => Err(Error::argument(format!(
                "expected number, got {}",
                other.kind_name()
            ))),
        }
    }
}

impl FromArg for bool {
    fn from_arg(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::argument(format!(
                "expected bool, got {}",
                other.kind_name()
            ))),
        }
    }
}

impl FromArg for String {
    fn from_arg(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(Error::argument(format!(
                "expected str, got {}",
                other.kind_name()
            ))),
        }
    }
}

impl FromArg for DateTime<Utc> {
    fn from_arg(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Time(t) => Ok(*t),
            other => Err(Error::argument(format!(
                "expected time, got {}",
                other.kind_name()
            ))),
        }
    }
}

impl FromArg for Vec<Value> {
    fn from_arg(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Array(items) => Ok(items.clone()),
            other => Err(Error::argument(format!(
                "expected array, got {}",
                other.kind_name()
            ))),
        }
    }
}

/// Normalize both plain and `Result`-returning callables into
/// `Result<T, Error>`. The two impls live on different trait
/// instantiations, so a function's return type selects exactly one.
pub trait IntoHostResult<T> {
    fn into_host_result(self) -> Result<T, Error>;
}

impl<T> IntoHostResult<T> for T
where
    T: Into<Value>,
{
    fn into_host_result(self) -> Result<T, Error> {
        Ok(self)
    }
}

impl<T, E> IntoHostResult<T> for Result<T, E>
where
    E: Display,
{
    fn into_host_result(self) -> Result<T, Error> {
        self.map_err(|e| Error::ArgumentError(e.to_string()))
    }
}

/// Convert a strongly-typed Rust function or closure into the erased
/// [`HostFnImpl`], parameterized by its argument tuple and return type.
pub trait IntoHostFn<Args, R> {
    fn into_host_fn(self) -> Arc<HostFnImpl>;
}

// 0-arg functions / closures
impl<F, FR, R> IntoHostFn<(), R> for F
where
    F: Fn() -> FR + Send + Sync + 'static,
    FR: IntoHostResult<R> + 'static,
    R: Into<Value> + 'static,
{
    fn into_host_fn(self) -> Arc<HostFnImpl> {
        Arc::new(move |args: &[Value]| {
            if !args.is_empty() {
                return Err(Error::arity("host callable", 0, args.len()));
            }
            let value: R = (self)().into_host_result()?;
            Ok(value.into())
        })
    }
}

/// Implement `IntoHostFn` for a fixed arity: arity checking and argument
/// destructuring happen in one slice pattern, then each argument is
/// converted via `FromArg` and the result normalized via `IntoHostResult`.
macro_rules! impl_into_host_fn_for_arity {
    ($arity:expr, $( $v:ident : $A:ident ),+ ) => {
        impl<F, FR, R, $( $A ),+> IntoHostFn<($( $A, )+), R> for F
        where
            F: Fn($( $A ),+) -> FR + Send + Sync + 'static,
            FR: IntoHostResult<R> + 'static,
            R: Into<Value> + 'static,
            $( $A: FromArg, )+
        {
            fn into_host_fn(self) -> Arc<HostFnImpl> {
                Arc::new(move |args: &[Value]| {
                    let [ $( $v ),+ ] = args else {
                        return Err(Error::arity("host callable", $arity, args.len()));
                    };
                    let value: R =
                        (self)($( <$A as FromArg>::from_arg($v)? ),+).into_host_result()?;
                    Ok(value.into())
                })
            }
        }
    };
}

impl_into_host_fn_for_arity!(1, v0: A1);
impl_into_host_fn_for_arity!(2, v0: A1, v1: A2);
impl_into_host_fn_for_arity!(3, v0: A1, v1: A2, v2: A3);
impl_into_host_fn_for_arity!(4, v0: A1, v1: A2, v2: A3, v3: A4);
