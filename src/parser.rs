//! Recursive descent parser over the token stream.
//!
//! Grammar:
//!
//! ```text
//! Program := Form*
//! Form    := Atom | List
//! List    := '(' Form* ')'
//! Atom    := VAR | NUM | STR | TIME
//! ```
//!
//! A program is an ordered sequence of top-level forms; a source holding a
//! single atom is a valid program. Unbalanced parentheses fail with
//! *syntax-error*, as does the reserved `fn` keyword in any position.

use crate::ast::{Node, Token};
use crate::lexer::lex;
use crate::{Error, MAX_NESTING_DEPTH};

/// Lex and parse a source string into top-level forms. An empty source
/// yields an empty program.
pub(crate) fn parse_source(source: &str) -> Result<Vec<Node>, Error> {
    parse(&lex(source)?)
}

/// Parse a token stream into an ordered sequence of top-level forms.
pub(crate) fn parse(tokens: &[Token]) -> Result<Vec<Node>, Error> {
    let mut forms = Vec::new();
    let mut pos = 0;

    while pos < tokens.len() {
        let (node, next) = parse_form(tokens, pos, 0)?;
        forms.push(node);
        pos = next;
    }

    Ok(forms)
}

fn parse_form(tokens: &[Token], pos: usize, depth: usize) -> Result<(Node, usize), Error> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(Error::SyntaxError(format!(
            "form nesting exceeds maximum depth ({MAX_NESTING_DEPTH})"
        )));
    }

    match &tokens[pos] {
        Token::LParen => {
            let mut items = Vec::new();
            let mut pos = pos + 1;
            loop {
                match tokens.get(pos) {
                    None => {
                        return Err(Error::SyntaxError(
                            "unbalanced parentheses: missing ')'".to_owned(),
                        ));
                    }
                    Some(Token::RParen) => return Ok((Node::Form(items), pos + 1)),
                    Some(_) => {
                        let (node, next) = parse_form(tokens, pos, depth + 1)?;
                        items.push(node);
                        pos = next;
                    }
                }
            }
        }
        Token::RParen => Err(Error::SyntaxError(
            "unbalanced parentheses: unexpected ')'".to_owned(),
        )),
        Token::Fn => Err(Error::SyntaxError(
            "'fn' is a reserved keyword".to_owned(),
        )),
        Token::Var(name) => Ok((Node::Var(name.clone()), pos + 1)),
        Token::Int(n) => Ok((Node::Int(*n), pos + 1)),
        Token::Float(x) => Ok((Node::Float(*x), pos + 1)),
        Token::Str(s) => Ok((Node::Str(s.clone()), pos + 1)),
        Token::Time(t) => Ok((Node::Time(*t), pos + 1)),
        // The lexer discards whitespace before handing over the stream.
        Token::Space => Err(Error::SyntaxError(
            "whitespace token reached the parser".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Node {
        Node::Var(name.to_owned())
    }

    #[test]
    fn test_parse_structure() {
        let test_cases: Vec<(&str, Vec<Node>)> = vec![
            // Empty program
            ("", vec![]),
            ("   ", vec![]),
            // A lone atom is a valid program
            ("42", vec![Node::Int(42)]),
            ("foo", vec![var("foo")]),
            ("'hi'", vec![Node::Str("hi".to_owned())]),
            // Empty list
            ("()", vec![Node::Form(vec![])]),
            // Flat form
            (
                "(+ 1 2)",
                vec![Node::Form(vec![var("+"), Node::Int(1), Node::Int(2)])],
            ),
            // Nesting
            (
                "(* (+ 1 2) 3)",
                vec![Node::Form(vec![
                    var("*"),
                    Node::Form(vec![var("+"), Node::Int(1), Node::Int(2)]),
                    Node::Int(3),
                ])],
            ),
            ("(((1)))", {
                let inner = Node::Form(vec![Node::Int(1)]);
                vec![Node::Form(vec![Node::Form(vec![inner])])]
            }),
            // Multiple top-level forms
            (
                "(setglobal x 1) (+ x 1)",
                vec![
                    Node::Form(vec![var("setglobal"), var("x"), Node::Int(1)]),
                    Node::Form(vec![var("+"), var("x"), Node::Int(1)]),
                ],
            ),
            ("1 2 3", vec![Node::Int(1), Node::Int(2), Node::Int(3)]),
        ];

        for (input, expected) in test_cases {
            let forms = parse_source(input)
                .unwrap_or_else(|e| panic!("parse('{input}') failed: {e}"));
            assert_eq!(forms, expected, "AST mismatch for '{input}'");
        }
    }

    #[test]
    fn test_parse_failures() {
        let failing = vec![
            "(1 2 3",       // missing closing paren
            "((1 2)",       // nested missing closing paren
            "1 2 3)",       // extra closing paren
            ")",            // closing paren first
            "(1))",         // balanced then extra
            "fn",           // reserved keyword as atom
            "(fn (x) x)",   // reserved keyword in head position
        ];

        for input in failing {
            let err = parse_source(input).unwrap_err();
            assert_eq!(err.code(), "syntax-error", "expected failure for '{input}'");
        }
    }

    #[test]
    fn test_parse_depth_limit() {
        let under = format!(
            "{}1{}",
            "(".repeat(MAX_NESTING_DEPTH - 1),
            ")".repeat(MAX_NESTING_DEPTH - 1)
        );
        assert!(parse_source(&under).is_ok());

        let over = format!(
            "{}1{}",
            "(".repeat(MAX_NESTING_DEPTH + 1),
            ")".repeat(MAX_NESTING_DEPTH + 1)
        );
        let err = parse_source(&over).unwrap_err();
        assert_eq!(err.code(), "syntax-error");
        assert!(format!("{err}").contains("nesting"));
    }
}
