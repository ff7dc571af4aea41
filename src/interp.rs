//! Embedding API: [`Interpreter`] holds immutable configuration (default
//! bindings plus an optional operation maximum), [`Program`] is a compiled,
//! reusable handle, and [`Bindings`] carries host-supplied names.
//!
//! Compilation performs lexing and parsing eagerly, so lex/parse errors
//! surface at compile time. Every `run` seeds a fresh frame chain from the
//! built-ins, the interpreter's defaults and the per-call bindings (in that
//! order, later wins), and allocates a fresh operation counter; state never
//! leaks across calls, and a `Program` may be invoked from multiple threads
//! concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use crate::Error;
use crate::ast::{HostFn, Node, Value};
use crate::builtins::default_bindings;
use crate::evaluator::{Evaluator, Frame};
use crate::hostfn::{HostFnImpl, IntoHostFn};
use crate::parser::parse_source;

/// A symbol→value map of host-supplied names: literal values or callable
/// adapters receiving already-evaluated arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: HashMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Bindings::default()
    }

    /// Bind a literal value.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Chainable variant of [`Bindings::bind`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind(name, value);
        self
    }

    /// Register a callable on the erased slice signature. This is the
    /// low-level API; it gives full control over argument handling and the
    /// returned error kind.
    pub fn bind_host_fn(&mut self, name: &str, func: fn(&[Value]) -> Result<Value, Error>) {
        let wrapped: Arc<HostFnImpl> = Arc::new(move |args: &[Value]| func(args));
        self.entries
            .insert(name.to_owned(), Value::HostFn(HostFn::new(name, wrapped)));
    }

    /// Register a strongly-typed callable; argument extraction, arity
    /// checking and result conversion are automatic (see [`crate::hostfn`]).
    pub fn bind_op<F, Args, R>(&mut self, name: &str, func: F)
    where
        F: IntoHostFn<Args, R>,
    {
        self.entries.insert(
            name.to_owned(),
            Value::HostFn(HostFn::new(name, func.into_host_fn())),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &HashMap<String, Value> {
        &self.entries
    }
}

/// An interpreter instance: default bindings and the default operation
/// maximum. Construction is cheap; the instance itself is immutable during
/// calls and shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    defaults: Bindings,
    max_ops: Option<usize>,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::default()
    }

    /// Set the default operation maximum for programs run through this
    /// instance. Individual runs may override it.
    #[must_use]
    pub fn with_max_ops(mut self, max_ops: usize) -> Self {
        self.max_ops = Some(max_ops);
        self
    }

    /// Bind a default literal value, visible to every program unless
    /// shadowed per call.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.defaults.bind(name, value);
    }

    /// Register a default callable on the erased slice signature.
    pub fn bind_host_fn(&mut self, name: &str, func: fn(&[Value]) -> Result<Value, Error>) {
        self.defaults.bind_host_fn(name, func);
    }

    /// Register a default strongly-typed callable.
    pub fn bind_op<F, Args, R>(&mut self, name: &str, func: F)
    where
        F: IntoHostFn<Args, R>,
    {
        self.defaults.bind_op(name, func);
    }

    /// Compile a source string to a reusable program handle. Lex and parse
    /// errors are raised here, not at run time.
    pub fn compile(&self, source: &str) -> Result<Program, Error> {
        Ok(Program {
            forms: parse_source(source)?,
            defaults: self.defaults.clone(),
            max_ops: self.max_ops,
        })
    }

    /// One-shot convenience: compile and run once.
    pub fn run(
        &self,
        source: &str,
        bindings: &Bindings,
        max_ops: Option<usize>,
    ) -> Result<Value, Error> {
        self.compile(source)?.run(bindings, max_ops)
    }

    /// Run a source string with no extra bindings and the default cap.
    pub fn eval(&self, source: &str) -> Result<Value, Error> {
        self.run(source, &Bindings::new(), None)
    }
}

/// A compiled program: an immutable AST plus an immutable snapshot of the
/// interpreter's default bindings taken at compile time.
#[derive(Debug, Clone)]
pub struct Program {
    forms: Vec<Node>,
    defaults: Bindings,
    max_ops: Option<usize>,
}

impl Program {
    /// Run with per-call bindings and an optional operation-maximum
    /// override (`None` keeps the compile-time default). Returns the value
    /// of the last top-level form; an empty program yields `Nil`.
    pub fn run(&self, bindings: &Bindings, max_ops: Option<usize>) -> Result<Value, Error> {
        let mut root = default_bindings();
        for (name, value) in self.defaults.entries() {
            root.insert(name.clone(), value.clone());
        }
        for (name, value) in bindings.entries() {
            root.insert(name.clone(), value.clone());
        }

        let mut ev = Evaluator::new(Frame::root(root), max_ops.or(self.max_ops));
        ev.run_program(&self.forms)
    }
}
