//! Tokenizer: source text to a flat token sequence.
//!
//! Whitespace and `;` line comments separate tokens and are otherwise dropped.
//! Brackets, quote and string literals are self-delimiting; every other run of
//! non-delimiter characters is an atom, classified as integer, real, boolean or
//! symbol. Anything else is a syntax error reporting the offending text.

use std::fmt;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, digit0, digit1, multispace1, not_line_ending, one_of},
    combinator::{all_consuming, opt, recognize, value},
    error::ErrorKind,
    multi::many0_count,
    sequence::{pair, preceded},
};

use crate::ast::{NumberType, is_valid_symbol};
use crate::{Error, ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    /// The `'` shorthand
    Quote,
    Integer(NumberType),
    Real(f64),
    Text(String),
    Boolean(bool),
    Symbol(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::OpenParen => write!(f, "("),
            Token::CloseParen => write!(f, ")"),
            Token::OpenBracket => write!(f, "["),
            Token::CloseBracket => write!(f, "]"),
            Token::Quote => write!(f, "'"),
            Token::Integer(n) => write!(f, "{n}"),
            Token::Real(x) => write!(f, "{x:?}"),
            Token::Text(s) => write!(f, "{s:?}"),
            Token::Boolean(true) => write!(f, "#t"),
            Token::Boolean(false) => write!(f, "#f"),
            Token::Symbol(s) => write!(f, "{s}"),
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '"' | ';' | '\'')
}

/// Skip whitespace and comments
fn atmosphere(input: &str) -> IResult<&str, usize> {
    many0_count(alt((multispace1, preceded(char(';'), not_line_ending)))).parse(input)
}

fn punctuation(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::OpenParen, char('(')),
        value(Token::CloseParen, char(')')),
        value(Token::OpenBracket, char('[')),
        value(Token::CloseBracket, char(']')),
        value(Token::Quote, char('\'')),
    ))
    .parse(input)
}

/// Parse a string literal. Fails with `ErrorKind::Eof` when the closing quote is
/// missing and `ErrorKind::Escaped` on an unknown escape.
fn parse_string(input: &str) -> IResult<&str, Token> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), Token::Text(text))),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some(_) => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Escaped,
                        )));
                    }
                    None => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Eof,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    remaining,
                    ErrorKind::Eof,
                )));
            }
        }
    }
}

fn atom_text(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !is_delimiter(c)).parse(input)
}

fn integer_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(one_of("+-")), digit1)).parse(input)
}

fn real_literal(input: &str) -> IResult<&str, &str> {
    recognize((opt(one_of("+-")), digit1, char('.'), digit0)).parse(input)
}

/// Classify a delimited atom
fn classify_atom(atom: &str) -> Result<Token, (ParseErrorKind, &'static str)> {
    match atom {
        "#t" => return Ok(Token::Boolean(true)),
        "#f" => return Ok(Token::Boolean(false)),
        _ => {}
    }

    if all_consuming(integer_literal).parse(atom).is_ok() {
        return atom
            .parse::<NumberType>()
            .map(Token::Integer)
            .map_err(|_| (ParseErrorKind::InvalidToken, "integer literal out of range"));
    }

    if all_consuming(real_literal).parse(atom).is_ok() {
        return atom
            .parse::<f64>()
            .map(Token::Real)
            .map_err(|_| (ParseErrorKind::InvalidToken, "malformed real literal"));
    }

    if is_valid_symbol(atom) {
        return Ok(Token::Symbol(atom.into()));
    }

    Err((ParseErrorKind::InvalidToken, "invalid token"))
}

fn string_error(source: &str, offset: usize, error: nom::Err<nom::error::Error<&str>>) -> Error {
    let (kind, message, at) = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) if e.code == ErrorKind::Escaped => (
            ParseErrorKind::InvalidToken,
            "unknown escape sequence in string literal",
            source.len() - e.input.len(),
        ),
        _ => (
            ParseErrorKind::Unterminated,
            "unterminated string literal",
            offset,
        ),
    };
    Error::SyntaxError(ParseError::with_context(kind, message, source, at, None))
}

/// Split `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut remaining = source;

    loop {
        if let Ok((rest, _)) = atmosphere(remaining) {
            remaining = rest;
        }
        if remaining.is_empty() {
            break;
        }
        let offset = source.len() - remaining.len();

        if let Ok((rest, token)) = punctuation(remaining) {
            tokens.push(token);
            remaining = rest;
            continue;
        }

        if remaining.starts_with('"') {
            let (rest, token) =
                parse_string(remaining).map_err(|e| string_error(source, offset, e))?;
            tokens.push(token);
            remaining = rest;
            continue;
        }

        let (rest, atom) = atom_text(remaining).map_err(|_| {
            Error::SyntaxError(ParseError::with_context(
                ParseErrorKind::InvalidToken,
                "unexpected character",
                source,
                offset,
                remaining.chars().next().map(String::from),
            ))
        })?;
        let token = classify_atom(atom).map_err(|(kind, message)| {
            Error::SyntaxError(ParseError::with_context(
                kind,
                message,
                source,
                offset,
                Some(atom.into()),
            ))
        })?;
        tokens.push(token);
        remaining = rest;
    }

    log::trace!("tokenized {} bytes into {} tokens", source.len(), tokens.len());
    Ok(tokens)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Token {
        Token::Symbol(name.into())
    }

    #[test]
    fn test_tokenize_valid() {
        use Token::*;
        let cases: Vec<(&str, Vec<Token>)> = vec![
            ("", vec![]),
            ("   \n\t ", vec![]),
            ("; only a comment", vec![]),
            ("42", vec![Integer(42)]),
            ("-17 +3", vec![Integer(-17), Integer(3)]),
            ("3.5 -0.25 7.", vec![Real(3.5), Real(-0.25), Real(7.0)]),
            ("#t #f", vec![Boolean(true), Boolean(false)]),
            (
                "(+ 1 2)",
                vec![OpenParen, sym("+"), Integer(1), Integer(2), CloseParen],
            ),
            (
                "[a b]",
                vec![OpenBracket, sym("a"), sym("b"), CloseBracket],
            ),
            ("'x", vec![Quote, sym("x")]),
            ("'(1)", vec![Quote, OpenParen, Integer(1), CloseParen]),
            (
                "(f x) ; trailing comment\n(g)",
                vec![
                    OpenParen,
                    sym("f"),
                    sym("x"),
                    CloseParen,
                    OpenParen,
                    sym("g"),
                    CloseParen,
                ],
            ),
            ("\"hello world\"", vec![Text("hello world".into())]),
            (
                r#""a\n\t\"b\\""#,
                vec![Text("a\n\t\"b\\".into())],
            ),
            (
                "null? set-car! - ...",
                vec![sym("null?"), sym("set-car!"), sym("-"), sym("...")],
            ),
            ("(a\"s\")", vec![OpenParen, sym("a"), Text("s".into()), CloseParen]),
        ];

        for (input, expected) in cases {
            assert_eq!(tokenize(input).unwrap(), expected, "tokenizing {input:?}");
        }
    }

    #[test]
    fn test_tokenize_errors() {
        let cases = [
            ("#x", ParseErrorKind::InvalidToken),
            ("#true", ParseErrorKind::InvalidToken),
            ("1abc", ParseErrorKind::InvalidToken),
            ("-5x", ParseErrorKind::InvalidToken),
            ("a@b", ParseErrorKind::InvalidToken),
            (".", ParseErrorKind::InvalidToken),
            ("99999999999999999999", ParseErrorKind::InvalidToken),
            ("\"no end", ParseErrorKind::Unterminated),
            ("\"bad \\q escape\"", ParseErrorKind::InvalidToken),
        ];

        for (input, kind) in cases {
            match tokenize(input) {
                Err(Error::SyntaxError(e)) => assert_eq!(e.kind, kind, "input {input:?}"),
                other => panic!("expected syntax error for {input:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_error_reports_found_text() {
        let Err(Error::SyntaxError(e)) = tokenize("(foo 12ab)") else {
            panic!("expected syntax error");
        };
        assert_eq!(e.found.as_deref(), Some("12ab"));
        assert!(e.context.unwrap().contains("12ab"));
    }
}
