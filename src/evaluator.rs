//! Tree-walking evaluator: frame chain, operation governor and the built-in
//! special forms.
//!
//! The evaluator distinguishes *macros* (special forms, which receive
//! un-evaluated sub-expressions plus an evaluator handle) from *callables*
//! (host functions, which receive evaluated arguments). A macro returns
//! either a finished [`Value`] or an AST node the evaluator re-enters on
//! exactly once.
//!
//! Every entry into list-evaluation increments the per-evaluation operation
//! counter before dispatch, so runaway macro expansion is capped along with
//! ordinary call chains. Atom evaluation and empty lists are free.

use std::collections::HashMap;

use crate::ast::{Closure, MacroKind, MacroValue, Node, Value};
use crate::{Error, MAX_EVAL_DEPTH};

/// One link of the frame chain: a name→value mapping with an optional
/// parent. Lookup walks from the current frame outward; the frame at the
/// chain's end is the root and owns all built-ins and host-registered names.
///
/// Frames have value semantics: a closure captures a clone of its defining
/// chain. Frames therefore only ever reference parents and the chain cannot
/// form reference cycles.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Box<Frame>>,
}

impl Frame {
    /// A root frame seeded with the given bindings.
    pub(crate) fn root(bindings: HashMap<String, Value>) -> Self {
        Frame {
            bindings,
            parent: None,
        }
    }

    pub(crate) fn with_parent(parent: Frame) -> Self {
        Frame {
            bindings: HashMap::new(),
            parent: Some(Box::new(parent)),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.get(name)))
    }

    /// Bind a name in this frame only.
    pub(crate) fn set_local(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Bind a name in the chain's root frame (`setglobal`, `defn`).
    pub(crate) fn set_root(&mut self, name: String, value: Value) {
        match &mut self.parent {
            Some(parent) => parent.set_root(name, value),
            None => {
                self.bindings.insert(name, value);
            }
        }
    }

    fn into_parent(self) -> Frame {
        self.parent.map(|parent| *parent).unwrap_or_default()
    }
}

/// What a macro hands back to the evaluator.
pub(crate) enum Outcome {
    /// A finished value, used as-is.
    Value(Value),
    /// An AST node the evaluator re-enters on exactly once.
    Reeval(Node),
}

/// Per-evaluation state: the live frame chain, the operation counter and the
/// recursion depth guard. One `Evaluator` is allocated per top-level call
/// and discarded afterwards; nothing here is shared between calls.
pub(crate) struct Evaluator {
    frame: Frame,
    ops: usize,
    max_ops: Option<usize>,
    depth: usize,
}

impl Evaluator {
    pub(crate) fn new(root: Frame, max_ops: Option<usize>) -> Self {
        Evaluator {
            frame: root,
            ops: 0,
            max_ops,
            depth: 0,
        }
    }

    /// Evaluate a program's top-level forms in order, returning the value of
    /// the last one (`Nil` for an empty program). Root bindings created by
    /// `setglobal`/`defn` persist across sibling forms.
    pub(crate) fn run_program(&mut self, forms: &[Node]) -> Result<Value, Error> {
        let mut last = Value::Nil;
        for form in forms {
            last = self.eval(form)?;
        }
        Ok(last)
    }

    pub(crate) fn eval(&mut self, node: &Node) -> Result<Value, Error> {
        if self.depth >= MAX_EVAL_DEPTH {
            return Err(Error::argument(format!(
                "evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
            )));
        }
        self.depth += 1;
        let result = self.eval_inner(node);
        self.depth -= 1;
        result
    }

    fn eval_inner(&mut self, node: &Node) -> Result<Value, Error> {
        match node {
            Node::Int(n) => Ok(Value::Int(*n)),
            Node::Float(x) => Ok(Value::Float(*x)),
            Node::Str(s) => Ok(Value::Str(s.clone())),
            Node::Time(t) => Ok(Value::Time(*t)),
            Node::Var(name) => self
                .frame
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UndefinedVar(name.clone())),
            Node::Form(items) => self.eval_form(items),
        }
    }

    fn eval_form(&mut self, items: &[Node]) -> Result<Value, Error> {
        let [head, args @ ..] = items else {
            return Ok(Value::Nil);
        };

        self.tick()?;

        let callee = self.eval(head)?;
        match callee {
            Value::Macro(m) => match &m.kind {
                MacroKind::Builtin(func) => match func(self, args)? {
                    Outcome::Value(value) => Ok(value),
                    Outcome::Reeval(node) => self.eval(&node),
                },
                MacroKind::Closure(closure) => {
                    let argv = self.eval_args(args)?;
                    self.call_closure(closure, argv)
                }
            },
            Value::HostFn(host_fn) => {
                let argv = self.eval_args(args)?;
                (host_fn.func)(&argv)
            }
            other => Err(Error::argument(format!(
                "non-callable in head position: {other}"
            ))),
        }
    }

    fn eval_args(&mut self, args: &[Node]) -> Result<Vec<Value>, Error> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    /// Evaluate a body sequence, returning the last value (`Nil` if empty).
    fn eval_body(&mut self, body: &[Node]) -> Result<Value, Error> {
        let mut last = Value::Nil;
        for node in body {
            last = self.eval(node)?;
        }
        Ok(last)
    }

    /// Apply a callable to already-evaluated arguments. Used by `apply` and
    /// by closure dispatch; built-in special forms cannot be applied this
    /// way because their arguments are no longer raw AST.
    pub(crate) fn call_values(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, Error> {
        match callee {
            Value::HostFn(host_fn) => (host_fn.func)(&args),
            Value::Macro(m) => match &m.kind {
                MacroKind::Closure(closure) => self.call_closure(closure, args),
                MacroKind::Builtin(_) => Err(Error::argument(format!(
                    "cannot apply special form '{}' to evaluated arguments",
                    m.name
                ))),
            },
            other => Err(Error::argument(format!(
                "non-callable in head position: {other}"
            ))),
        }
    }

    /// Invoke a user closure: bind arguments in a fresh child of the frame
    /// captured at the definition site (lexical scoping), evaluate the body
    /// there and restore the caller's chain afterwards.
    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value, Error> {
        if args.len() != closure.params.len() {
            return Err(Error::arity("lambda", closure.params.len(), args.len()));
        }

        let mut frame = Frame::with_parent(closure.frame.clone());
        for (param, arg) in closure.params.iter().zip(args) {
            frame.set_local(param.clone(), arg);
        }

        let saved = std::mem::replace(&mut self.frame, frame);
        let result = self.eval_body(&closure.body);
        self.frame = saved;
        result
    }

    /// Enter a fresh child of the current frame (`let`).
    fn push_frame(&mut self) {
        let parent = std::mem::take(&mut self.frame);
        self.frame = Frame::with_parent(parent);
    }

    fn pop_frame(&mut self) {
        let child = std::mem::take(&mut self.frame);
        self.frame = child.into_parent();
    }

    /// Count one operation. Increments before dispatch; fails once the
    /// counter exceeds the configured maximum.
    fn tick(&mut self) -> Result<(), Error> {
        self.ops += 1;
        if let Some(max) = self.max_ops
            && self.ops > max
        {
            return Err(Error::OpsThresholdExceeded { max });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn ops(&self) -> usize {
        self.ops
    }
}

//
// Built-in special forms. Each receives the evaluator handle and the
// un-evaluated argument nodes; registration happens in `builtins`.
//

/// `(if p t e)` - evaluate `p`; re-enter on `t` if truthy, else `e`.
/// The else branch may be omitted, in which case a falsy predicate yields
/// `Nil`.
pub(crate) fn eval_if(ev: &mut Evaluator, args: &[Node]) -> Result<Outcome, Error> {
    match args {
        [predicate, then_branch] => {
            if ev.eval(predicate)?.is_truthy() {
                Ok(Outcome::Reeval(then_branch.clone()))
            } else {
                Ok(Outcome::Value(Value::Nil))
            }
        }
        [predicate, then_branch, else_branch] => {
            let branch = if ev.eval(predicate)?.is_truthy() {
                then_branch
            } else {
                else_branch
            };
            Ok(Outcome::Reeval(branch.clone()))
        }
        _ => Err(Error::arity("if", "2 or 3", args.len())),
    }
}

/// `(cond p1 e1 p2 e2 ...)` - scan predicate/expression pairs in order;
/// re-enter on the expression of the first truthy predicate, `Nil` if none
/// match. An odd or empty argument list is an argument-error.
pub(crate) fn eval_cond(ev: &mut Evaluator, args: &[Node]) -> Result<Outcome, Error> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(Error::argument(format!(
            "cond: expected a non-empty, even number of arguments, got {}",
            args.len()
        )));
    }

    for pair in args.chunks_exact(2) {
        if ev.eval(&pair[0])?.is_truthy() {
            return Ok(Outcome::Reeval(pair[1].clone()));
        }
    }
    Ok(Outcome::Value(Value::Nil))
}

/// `(and x1 ... xn)` - evaluate left-to-right; `false` on the first falsy
/// result (later forms stay un-evaluated), otherwise the last result.
/// `(and)` is `true`.
pub(crate) fn eval_and(ev: &mut Evaluator, args: &[Node]) -> Result<Outcome, Error> {
    let mut last = Value::Bool(true);
    for arg in args {
        last = ev.eval(arg)?;
        if !last.is_truthy() {
            return Ok(Outcome::Value(Value::Bool(false)));
        }
    }
    Ok(Outcome::Value(last))
}

/// `(or x1 ... xn)` - evaluate left-to-right; the first truthy result wins,
/// `false` if none. `(or)` is `false`.
pub(crate) fn eval_or(ev: &mut Evaluator, args: &[Node]) -> Result<Outcome, Error> {
    for arg in args {
        let value = ev.eval(arg)?;
        if value.is_truthy() {
            return Ok(Outcome::Value(value));
        }
    }
    Ok(Outcome::Value(Value::Bool(false)))
}

/// `(let (n1 v1 n2 v2 ...) body...)` - bind name/value pairs in a fresh
/// child frame, each value evaluated in that frame so later bindings see
/// earlier ones, then evaluate the body there.
pub(crate) fn eval_let(ev: &mut Evaluator, args: &[Node]) -> Result<Outcome, Error> {
    let [Node::Form(bindings), body @ ..] = args else {
        return Err(Error::argument(
            "let: expected a binding list followed by body forms",
        ));
    };
    if bindings.len() % 2 != 0 {
        return Err(Error::argument(format!(
            "let: binding list must hold name/value pairs, got {} item(s)",
            bindings.len()
        )));
    }

    ev.push_frame();
    let result = eval_let_in_frame(ev, bindings, body);
    ev.pop_frame();
    result.map(Outcome::Value)
}

fn eval_let_in_frame(ev: &mut Evaluator, bindings: &[Node], body: &[Node]) -> Result<Value, Error> {
    for pair in bindings.chunks_exact(2) {
        let Node::Var(name) = &pair[0] else {
            return Err(Error::argument("let: binding names must be symbols"));
        };
        let value = ev.eval(&pair[1])?;
        ev.frame.set_local(name.clone(), value);
    }
    ev.eval_body(body)
}

/// `(lambda (p1 ... pk) body...)` - build a closure over the current frame.
pub(crate) fn eval_lambda(ev: &mut Evaluator, args: &[Node]) -> Result<Outcome, Error> {
    let [params_form, body @ ..] = args else {
        return Err(Error::argument("lambda: expected a parameter list"));
    };
    let closure = make_closure(ev, params_form, body)?;
    Ok(Outcome::Value(Value::Macro(MacroValue::closure(closure))))
}

fn make_closure(ev: &Evaluator, params_form: &Node, body: &[Node]) -> Result<Closure, Error> {
    let Node::Form(param_nodes) = params_form else {
        return Err(Error::argument(
            "lambda: parameters must be a list of symbols",
        ));
    };

    let mut params = Vec::with_capacity(param_nodes.len());
    for node in param_nodes {
        match node {
            Node::Var(name) => {
                if params.contains(name) {
                    return Err(Error::argument(format!(
                        "lambda: duplicate parameter name: {name}"
                    )));
                }
                params.push(name.clone());
            }
            _ => {
                return Err(Error::argument(
                    "lambda: parameters must be a list of symbols",
                ));
            }
        }
    }

    Ok(Closure {
        params,
        body: body.to_vec(),
        frame: ev.frame.clone(),
    })
}

/// `(defn name (p...) body...)` - `(setglobal name (lambda (p...) body...))`;
/// returns the created callable.
pub(crate) fn eval_defn(ev: &mut Evaluator, args: &[Node]) -> Result<Outcome, Error> {
    let [Node::Var(name), params_form, body @ ..] = args else {
        return Err(Error::argument(
            "defn: expected a name, a parameter list and body forms",
        ));
    };
    let closure = make_closure(ev, params_form, body)?;
    let value = Value::Macro(MacroValue::closure(closure));
    ev.frame.set_root(name.clone(), value.clone());
    Ok(Outcome::Value(value))
}

/// `(setglobal name value)` - evaluate `value`, bind `name` in the root
/// frame, return the bound value.
pub(crate) fn eval_setglobal(ev: &mut Evaluator, args: &[Node]) -> Result<Outcome, Error> {
    match args {
        [Node::Var(name), expr] => {
            let value = ev.eval(expr)?;
            ev.frame.set_root(name.clone(), value.clone());
            Ok(Outcome::Value(value))
        }
        [_, _] => Err(Error::argument("setglobal: name must be a symbol")),
        _ => Err(Error::arity("setglobal", 2, args.len())),
    }
}

/// `(expr e1 ... en)` - evaluate in order, return the last; no new frame.
pub(crate) fn eval_expr(ev: &mut Evaluator, args: &[Node]) -> Result<Outcome, Error> {
    ev.eval_body(args).map(Outcome::Value)
}

/// `(apply f v)` - splat an array into a call; a non-array becomes the
/// single argument.
pub(crate) fn eval_apply(ev: &mut Evaluator, args: &[Node]) -> Result<Outcome, Error> {
    match args {
        [callee_expr, args_expr] => {
            let callee = ev.eval(callee_expr)?;
            let argv = match ev.eval(args_expr)? {
                Value::Array(items) => items,
                single => vec![single],
            };
            ev.call_values(&callee, argv).map(Outcome::Value)
        }
        _ => Err(Error::arity("apply", 2, args.len())),
    }
}
