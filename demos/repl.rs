use rulisp::{Bindings, Interpreter, Value};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

fn main() {
    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("Rulisp sandboxed rules-expression evaluator");
    println!("Enter S-expressions like: (+ (* 2 2) (% 5 4))");
    println!("Type :help for commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let mut interp = Interpreter::new();

    // Demonstration host callable, callable from user expressions
    interp.bind_op("double", |n: i64| n * 2);
    interp.bind("answer", 42);

    let mut max_ops: Option<usize> = None;

    loop {
        match rl.readline("rulisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":quit" | ":exit" => break,
                    _ => {}
                }

                if let Some(rest) = line.strip_prefix(":maxops") {
                    match rest.trim().parse::<usize>() {
                        Ok(n) => {
                            max_ops = Some(n);
                            println!("Operation cap set to {n}");
                        }
                        Err(_) => {
                            max_ops = None;
                            println!("Operation cap cleared");
                        }
                    }
                    continue;
                }

                match interp.run(line, &Bindings::new(), max_ops) {
                    Ok(Value::Nil) => println!("nil"),
                    Ok(value) => println!("{value}"),
                    Err(err) => println!("Error [{}]: {err}", err.code()),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Input error: {err}");
                break;
            }
        }
    }

    println!("Goodbye!");
}

fn print_help() {
    println!("Commands:");
    println!("  :help        show this help");
    println!("  :maxops N    cap each evaluation at N operations (no value clears)");
    println!("  :quit        exit");
    println!();
    println!("Each line is a full program evaluated in a fresh scope; use");
    println!("multiple top-level forms with setglobal/defn on one line to");
    println!("share bindings, e.g.:");
    println!("  (defn twice (x) (* x 2)) (twice (double answer))");
    println!();
    println!("Host bindings available in this demo: answer, (double n)");
}
