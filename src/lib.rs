//! Rulisp - sandboxed business-rules expression evaluator
//!
//! This crate provides a small, non-Turing-complete, Lisp-like expression
//! evaluator intended to host user-authored business rules inside a trusted
//! application. It replaces arbitrary evaluation with a sandboxed interpreter
//! whose operations are counted and capped.
//!
//! Programs are S-expressions composed from a fixed set of built-in
//! operations plus host-supplied named values:
//!
//! ```lisp
//! (+ (* 2 2) (% 5 4))                     ; arithmetic
//! (if (> total threshold) 'flag' 'pass')  ; conditionals with host bindings
//! (let (x 2 y 4) (* x y))                 ; lexical scoping
//! (ago (days 30))                         ; time arithmetic
//! ```
//!
//! ## Embedding
//!
//! ```
//! use rulisp::{Bindings, Interpreter};
//!
//! let mut interp = Interpreter::new().with_max_ops(10_000);
//! interp.bind("threshold", 100);
//! interp.bind_op("double", |n: i64| n * 2);
//!
//! let program = interp.compile("(< threshold (double 60))").unwrap();
//! let result = program.run(&Bindings::new(), None).unwrap();
//! assert_eq!(result, rulisp::Value::Bool(true));
//! ```
//!
//! ## Sandboxing guarantees
//!
//! - Every list-evaluation step is counted against a configurable cap;
//!   exceeding it aborts with [`Error::OpsThresholdExceeded`].
//! - Each evaluation runs against a freshly seeded frame chain; no state
//!   leaks between calls, and a compiled [`Program`] can be invoked from
//!   multiple threads concurrently.
//! - There is no user-visible I/O, no module system, and no recursion
//!   guarantee: the only way user code touches the outside world is through
//!   host callables the embedder registers explicitly.
//!
//! ## Modules
//!
//! - `lexer`: longest-prefix token scanner
//! - `parser`: recursive descent over tokens producing the AST
//! - `evaluator`: frame chain, special forms and the operation governor
//! - `builtins`: the fixed root-frame library
//! - `hostfn`: typed host-callable registration adapters
//! - `interp`: the embedding API (`Interpreter`, `Program`, `Bindings`)

use std::fmt;

/// Maximum nesting depth accepted by the parser. Deeper structures are
/// rejected at compile time to keep recursive descent off unbounded stacks.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Maximum evaluation depth. This limits nested form evaluation (including
/// closure calls via self-application tricks) independently of the op cap.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Failure categories surfaced to the embedding host.
///
/// Lexing and parsing failures (`InvalidToken`, `SyntaxError`) are raised at
/// compile time; the remaining kinds at evaluation time. All errors abort the
/// current evaluation immediately; no partial result is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The lexer could not match any rule at the current position.
    InvalidToken {
        message: String,
        /// Snippet of the input at the failure position (truncated).
        context: Option<String>,
    },
    /// Unbalanced parentheses or a malformed construct.
    SyntaxError(String),
    /// Symbol lookup found no binding in the frame chain.
    UndefinedVar(String),
    /// Arity mismatch, odd binding list, non-callable in head position, or
    /// wrong operand kind for an operation.
    ArgumentError(String),
    /// The operation counter exceeded the configured cap.
    OpsThresholdExceeded { max: usize },
}

impl Error {
    /// Shorthand for an [`Error::ArgumentError`].
    pub(crate) fn argument(message: impl Into<String>) -> Self {
        Error::ArgumentError(message.into())
    }

    /// Arity mismatch for a named operation.
    pub(crate) fn arity(name: &str, expected: impl fmt::Display, got: usize) -> Self {
        Error::ArgumentError(format!(
            "{name}: expected {expected} argument(s), got {got}"
        ))
    }

    /// Build an [`Error::InvalidToken`] citing the unconsumed input.
    pub(crate) fn invalid_token(message: impl Into<String>, remaining: &str) -> Self {
        const MAX_CONTEXT: usize = 40;

        let mut context: String = remaining.chars().take(MAX_CONTEXT).collect();
        if remaining.chars().count() > MAX_CONTEXT {
            context.push_str("[...]");
        }
        let context = context.replace('\n', "\\n").replace('\r', "");

        Error::InvalidToken {
            message: message.into(),
            context: Some(context),
        }
    }

    /// Symbolic kind for this failure, stable across releases. Hosts that
    /// route failures by category should match on this rather than on the
    /// human-readable message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidToken { .. } => "invalid-token",
            Error::SyntaxError(_) => "syntax-error",
            Error::UndefinedVar(_) => "undefined-var",
            Error::ArgumentError(_) => "argument-error",
            Error::OpsThresholdExceeded { .. } => "ops-threshold-exceeded",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidToken { message, context } => {
                write!(f, "invalid token: {message}")?;
                if let Some(context) = context {
                    write!(f, "\nAt: {context}")?;
                }
                Ok(())
            }
            Error::SyntaxError(msg) => write!(f, "syntax error: {msg}"),
            Error::UndefinedVar(name) => write!(f, "undefined variable: {name}"),
            Error::ArgumentError(msg) => write!(f, "argument error: {msg}"),
            Error::OpsThresholdExceeded { max } => {
                write!(f, "operation threshold exceeded (max: {max})")
            }
        }
    }
}

pub mod ast;
pub mod hostfn;
pub mod interp;

mod builtins;
mod evaluator;
mod lexer;
mod parser;

pub use ast::Value;
pub use hostfn::IntoHostFn;
pub use interp::{Bindings, Interpreter, Program};
