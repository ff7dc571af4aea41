//! Longest-prefix token scanner.
//!
//! Each token rule is a nom parser anchored at the current position. The
//! scanner applies every rule and keeps the longest match; declared order
//! breaks ties. This is what lets `-5` lex as a negative literal while a
//! bare `-` stays a symbol: the number rule consumes two characters, the
//! symbol rule one. Subtraction is therefore always written as a form,
//! `(- a b)`, never inferred from context.
//!
//! Whitespace is matched by its own rule and discarded. The reserved `fn`
//! keyword is a symbol-shaped lexeme remapped to its own token kind.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace1},
    combinator::{opt, recognize, value},
    sequence::pair,
};

use crate::Error;
use crate::ast::{Token, parse_instant};

/// Characters permitted in symbol names. Operator-looking names such as
/// `+`, `>=` and `member?` are ordinary symbols.
fn is_var_char(c: char) -> bool {
    c.is_ascii_alphabetic() || "_><+!=*/%?-".contains(c)
}

fn lex_lparen(input: &str) -> IResult<&str, Token> {
    value(Token::LParen, char('(')).parse(input)
}

fn lex_rparen(input: &str) -> IResult<&str, Token> {
    value(Token::RParen, char(')')).parse(input)
}

fn lex_var(input: &str) -> IResult<&str, Token> {
    let (rest, name) = take_while1(is_var_char).parse(input)?;
    if name == "fn" {
        // Reserved for future use; the parser rejects it.
        Ok((rest, Token::Fn))
    } else {
        Ok((rest, Token::Var(name.to_owned())))
    }
}

fn lex_num(input: &str) -> IResult<&str, Token> {
    let (rest, literal) = recognize(pair(
        opt(char('-')),
        pair(digit1, opt(pair(char('.'), digit1))),
    ))
    .parse(input)?;

    if literal.contains('.') {
        match literal.parse::<f64>() {
            Ok(x) => Ok((rest, Token::Float(x))),
            Err(_) => Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Float,
            ))),
        }
    } else {
        // An out-of-range integer literal fails the rule; no other rule
        // accepts digits, so lexing reports invalid-token.
        match literal.parse::<i64>() {
            Ok(n) => Ok((rest, Token::Int(n))),
            Err(_) => Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Digit,
            ))),
        }
    }
}

fn lex_time(input: &str) -> IResult<&str, Token> {
    let (rest, _) = tag("#t{").parse(input)?;
    let (rest, inner) = take_while1(|c| c != '}' && c != '{').parse(rest)?;
    let (rest, _) = char('}').parse(rest)?;

    match parse_instant(inner) {
        Ok(t) => Ok((rest, Token::Time(t))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        ))),
    }
}

fn lex_space(input: &str) -> IResult<&str, Token> {
    value(Token::Space, multispace1).parse(input)
}

/// String literal: double- or single-quoted, with backslash escapes.
/// Recognized escapes are `\n` `\t` `\r` `\\` `\"` `\'`; anything else
/// fails the rule, as does an unterminated literal.
fn lex_string(input: &str) -> IResult<&str, Token> {
    let (mut remaining, quote) = alt((char('"'), char('\''))).parse(input)?;
    let mut contents = String::new();

    loop {
        let mut chars = remaining.chars();
        match chars.next() {
            Some(c) if c == quote => {
                return Ok((chars.as_str(), Token::Str(contents)));
            }
            Some('\\') => {
                match chars.next() {
                    Some('n') => contents.push('\n'),
                    Some('t') => contents.push('\t'),
                    Some('r') => contents.push('\r'),
                    Some(c @ ('\\' | '"' | '\'')) => contents.push(c),
                    _ => {
                        return Err(nom::Err::Error(nom::error::Error::new(
                            remaining,
                            nom::error::ErrorKind::Char,
                        )));
                    }
                }
                remaining = chars.as_str();
            }
            Some(c) => {
                contents.push(c);
                remaining = chars.as_str();
            }
            None => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    nom::error::ErrorKind::Char,
                )));
            }
        }
    }
}

/// Token rules in declared order. Order matters only for equal-length
/// matches; the scanner otherwise keeps the longest match.
const RULES: [fn(&str) -> IResult<&str, Token>; 7] = [
    lex_lparen, lex_rparen, lex_var, lex_num, lex_time, lex_space, lex_string,
];

fn next_token(input: &str) -> Option<(&str, Token)> {
    let mut best: Option<(&str, Token)> = None;
    for rule in RULES {
        if let Ok((rest, token)) = rule(input) {
            let longer = match &best {
                None => true,
                Some((best_rest, _)) => rest.len() < best_rest.len(),
            };
            if longer {
                best = Some((rest, token));
            }
        }
    }
    best
}

/// Scan a source string into a flat token stream. Whitespace tokens are
/// discarded. Fails with *invalid-token* when no rule matches at the
/// current position, citing the remaining text.
pub(crate) fn lex(source: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut input = source;

    while !input.is_empty() {
        match next_token(input) {
            Some((rest, token)) => {
                input = rest;
                if token != Token::Space {
                    tokens.push(token);
                }
            }
            None => {
                return Err(Error::invalid_token("no lexer rule matches here", input));
            }
        }
    }

    Ok(tokens)
}
