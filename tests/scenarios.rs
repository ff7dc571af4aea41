//! End-to-end scenarios and quantified invariants, exercised through the
//! public embedding API only.

use rulisp::{Bindings, Error, Interpreter, Value};

fn eval(source: &str) -> Result<Value, Error> {
    Interpreter::new().eval(source)
}

fn assert_value(source: &str, expected: Value) {
    match eval(source) {
        Ok(actual) => assert_eq!(actual, expected, "value mismatch for '{source}'"),
        Err(err) => panic!("'{source}' failed: {err}"),
    }
}

fn assert_error(source: &str, code: &str) {
    match eval(source) {
        Ok(actual) => panic!("'{source}': expected {code}, got {actual:?}"),
        Err(err) => assert_eq!(err.code(), code, "wrong error for '{source}': {err}"),
    }
}

#[test]
fn scenario_arithmetic() {
    assert_value("(+ (* 2 2) (% 5 4))", Value::Int(5));
}

#[test]
fn scenario_if_with_negative_literal() {
    assert_value("(if false (+ 4 -3) (- 10 (+ 2 (+ 1 1))))", Value::Int(6));
}

#[test]
fn scenario_cond() {
    assert_value(
        "(cond (> 1 2) (* 2 2) (< 5 10) 'ohai')",
        Value::Str("ohai".to_owned()),
    );
    // No truthy predicate yields nil
    assert_value("(cond (> 1 2) (* 2 2) false 'ohai')", Value::Nil);
}

#[test]
fn scenario_host_binding() {
    let interp = Interpreter::new();
    let bindings = Bindings::new().with("custom_var", 10);
    let result = interp.run("(> 51 custom_var)", &bindings, None).unwrap();
    assert_eq!(result, Value::Bool(true));
}

#[test]
fn scenario_let() {
    assert_value("(let (x 2 y 4) (* x y))", Value::Int(8));
    assert_error("(let (x 1 y) 1 2)", "argument-error");
}

#[test]
fn scenario_apply_lambda() {
    assert_value("(apply (lambda (x) (* x 2) (* x 3)) 2)", Value::Int(6));
}

#[test]
fn scenario_defn() {
    assert_value(
        "(defn say_hi (name) (+ 'hi there, ' name '!')) (say_hi 'Justin')",
        Value::Str("hi there, Justin!".to_owned()),
    );
}

#[test]
fn scenario_ops_threshold() {
    let interp = Interpreter::new();
    let source = "(str (+ 1 2) (+ 3 4) (+ 5 7))";

    let ok = interp.run(source, &Bindings::new(), Some(5)).unwrap();
    assert_eq!(ok, Value::Str("3712".to_owned()));

    let err = interp.run(source, &Bindings::new(), Some(3)).unwrap_err();
    assert_eq!(err, Error::OpsThresholdExceeded { max: 3 });
}

#[test]
fn scenario_empty_source() {
    assert_value("", Value::Nil);
}

#[test]
fn scenario_non_callable_head() {
    assert_error("(1)", "argument-error");
}

//
// Quantified invariants
//

#[test]
fn property_determinism() {
    // Without non-deterministic built-ins, the same source and bindings
    // yield the same value on every invocation.
    let sources = [
        "(+ (* 2 2) (% 5 4))",
        "(let (x 3) (cond (> x 2) (* x 7) true 0))",
        "(str (upcase 'a') (downcase 'B') (strip ' c '))",
        "(member? threshold (array 5 10 15))",
        "(apply max (array 3 1 4 1 5))",
    ];
    let interp = Interpreter::new();
    let bindings = Bindings::new().with("threshold", 10);

    for source in sources {
        let first = interp.run(source, &bindings, None).unwrap();
        for _ in 0..5 {
            let again = interp.run(source, &bindings, None).unwrap();
            assert_eq!(first, again, "'{source}' was not deterministic");
        }
    }
}

#[test]
fn property_compile_call_equivalence() {
    // run(S, B, M) behaves exactly like compile(S) followed by run(B, M),
    // including failures.
    let cases = [
        ("(+ 1 2)", None),
        ("(str (+ 1 2) (+ 3 4) (+ 5 7))", Some(3)),
        ("(+ 1 missing)", None),
        ("(let (x 10) (* x bound))", Some(100)),
    ];
    let interp = Interpreter::new();
    let bindings = Bindings::new().with("bound", 4);

    for (source, max_ops) in cases {
        let one_shot = interp.run(source, &bindings, max_ops);
        let compiled = interp.compile(source).unwrap().run(&bindings, max_ops);
        assert_eq!(one_shot, compiled, "divergence for '{source}'");
    }
}

#[test]
fn property_scope_isolation() {
    // Names bound inside let/lambda bodies are invisible afterwards.
    assert_error("(let (x 1) x) x", "undefined-var");
    assert_error("((lambda (p) p) 1) p", "undefined-var");

    // Sibling top-level forms share only setglobal/defn bindings.
    assert_value("(setglobal x 1) (+ x 1)", Value::Int(2));
    assert_value("(defn inc (n) (+ n 1)) (inc 41)", Value::Int(42));
}

#[test]
fn property_op_monotonicity() {
    // Decreasing the op maximum never increases the set of programs that
    // succeed.
    let sources = [
        "42",
        "(+ 1 2)",
        "(str (+ 1 2) (+ 3 4) (+ 5 7))",
        "(if (> 2 1) (+ 1 (+ 2 (+ 3 4))) 0)",
        "(let (x (+ 1 1)) (* x (+ x 1)))",
    ];
    let interp = Interpreter::new();

    for source in sources {
        let mut succeeded_at_smaller_max = false;
        for max_ops in 0..12 {
            let ok = interp
                .run(source, &Bindings::new(), Some(max_ops))
                .is_ok();
            if succeeded_at_smaller_max {
                assert!(
                    ok,
                    "'{source}' succeeded under a smaller cap but failed at {max_ops}"
                );
            }
            if ok {
                succeeded_at_smaller_max = true;
            }
        }
        assert!(
            succeeded_at_smaller_max,
            "'{source}' never succeeded within the tested caps"
        );
    }
}

#[test]
fn property_arithmetic_identities() {
    assert_value("(+ 7)", Value::Int(7));
    assert_value("(+)", Value::Int(0));
    assert_value("(*)", Value::Int(1));
}

#[test]
fn property_short_circuit() {
    // Evaluation past the first falsy operand is observably skipped: the
    // raising host callable is never invoked.
    fn boom(_args: &[Value]) -> Result<Value, Error> {
        Err(Error::ArgumentError("boom was evaluated".into()))
    }

    let mut interp = Interpreter::new();
    interp.bind_host_fn("boom", boom);

    assert_eq!(
        interp.eval("(and false (boom))").unwrap(),
        Value::Bool(false)
    );
    assert_eq!(interp.eval("(or true (boom))").unwrap(), Value::Bool(true));
    assert!(interp.eval("(and true (boom))").is_err());
    assert!(interp.eval("(or false (boom))").is_err());
}

//
// Language-surface details worth pinning end to end
//

#[test]
fn lone_atom_is_a_program() {
    assert_value("42", Value::Int(42));
    assert_value("'text'", Value::Str("text".to_owned()));
    assert_value("true", Value::Bool(true));
}

#[test]
fn time_literals_round_trip_through_conversions() {
    assert_value(
        "(= #t{2024-03-01T12:00:00Z} (time '2024-03-01T12:00:00Z'))",
        Value::Bool(true),
    );
    assert_value("(int #t{1970-01-01T00:00:30Z})", Value::Int(30));
    assert_value(
        "(< (ago (minutes 5)) (from-now (seconds 1)))",
        Value::Bool(true),
    );
}

#[test]
fn compile_time_versus_run_time_failures() {
    let interp = Interpreter::new();

    // Lex and parse errors are eager
    assert_eq!(interp.compile("(+ 1 ^)").unwrap_err().code(), "invalid-token");
    assert_eq!(interp.compile("((+ 1 2)").unwrap_err().code(), "syntax-error");
    assert_eq!(interp.compile("fn").unwrap_err().code(), "syntax-error");

    // Everything else waits for evaluation
    assert!(interp.compile("(undefined_fn 1)").is_ok());
    assert!(interp.compile("(cond true)").is_ok());
    assert_eq!(
        interp.eval("(undefined_fn 1)").unwrap_err().code(),
        "undefined-var"
    );
    assert_eq!(interp.eval("(cond true)").unwrap_err().code(), "argument-error");
}

#[test]
fn closures_escape_their_defining_form() {
    assert_value(
        "(setglobal add2 (let (n 2) (lambda (x) (+ x n)))) (add2 40)",
        Value::Int(42),
    );
}
