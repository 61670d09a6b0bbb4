//! Bracket-matching stack parser: tokens to values.
//!
//! Parsing is iterative. Open markers, pending quotes and finished datums are pushed
//! onto one explicit stack; a close marker pops back to the nearest open marker and
//! replaces everything above it with a single list. Nesting depth is bounded only by
//! memory, never by the host call stack.
//!
//! `'d` is read as `(quote d)`, and `lambda` directly followed by a quote is rejected.

use crate::arena::Arena;
use crate::ast::{Sym, Value};
use crate::scheme::{Token, tokenize};
use crate::{BracketMatching, Error, ParseError, ParseErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Paren,
    Square,
}

impl Bracket {
    fn open_token(self) -> Token {
        match self {
            Bracket::Paren => Token::OpenParen,
            Bracket::Square => Token::OpenBracket,
        }
    }

    fn close_token(self) -> Token {
        match self {
            Bracket::Paren => Token::CloseParen,
            Bracket::Square => Token::CloseBracket,
        }
    }
}

#[derive(Debug)]
enum StackItem {
    Open(Bracket),
    /// A `'` still waiting for its datum
    QuoteMarker,
    Datum(Value),
}

struct Parser<'a> {
    arena: &'a mut Arena,
    matching: BracketMatching,
    stack: Vec<StackItem>,
    open_count: usize,
    quote: Sym,
    after_lambda: bool,
}

impl<'a> Parser<'a> {
    fn new(arena: &'a mut Arena, matching: BracketMatching) -> Self {
        let quote = arena.intern("quote");
        Parser {
            arena,
            matching,
            stack: Vec::new(),
            open_count: 0,
            quote,
            after_lambda: false,
        }
    }

    fn feed(&mut self, token: Token) -> Result<(), Error> {
        let follows_lambda = std::mem::replace(&mut self.after_lambda, false);

        match token {
            Token::OpenParen => self.open(Bracket::Paren),
            Token::OpenBracket => self.open(Bracket::Square),
            Token::CloseParen => self.close(Bracket::Paren)?,
            Token::CloseBracket => self.close(Bracket::Square)?,
            Token::Quote => {
                if follows_lambda {
                    return Err(malformed_lambda(&Token::Quote));
                }
                self.stack.push(StackItem::QuoteMarker);
            }
            Token::Symbol(name) => {
                if follows_lambda && name == "quote" {
                    return Err(malformed_lambda(&Token::Symbol(name)));
                }
                self.after_lambda = name == "lambda";
                let value = self.arena.symbol(&name);
                self.push_datum(value);
            }
            Token::Integer(n) => self.push_datum(Value::Integer(n)),
            Token::Real(x) => self.push_datum(Value::Real(x)),
            Token::Boolean(b) => self.push_datum(Value::Boolean(b)),
            Token::Text(s) => {
                let value = self.arena.alloc_text(&s);
                self.push_datum(value);
            }
        }
        Ok(())
    }

    fn open(&mut self, bracket: Bracket) {
        self.open_count += 1;
        self.stack.push(StackItem::Open(bracket));
    }

    fn close(&mut self, bracket: Bracket) -> Result<(), Error> {
        if self.open_count == 0 {
            return Err(syntax_error(
                ParseErrorKind::UnmatchedClose,
                "too many close parentheses",
                &bracket.close_token(),
            ));
        }

        let mut items = Vec::new();
        let opener = loop {
            match self.stack.pop() {
                Some(StackItem::Datum(value)) => items.push(value),
                Some(StackItem::Open(opener)) => break opener,
                Some(StackItem::QuoteMarker) => return Err(malformed_quote()),
                None => {
                    return Err(Error::InternalError(
                        "parser stack exhausted with open markers outstanding".into(),
                    ));
                }
            }
        };
        self.open_count -= 1;

        if self.matching == BracketMatching::Strict && opener != bracket {
            let close = bracket.close_token();
            return Err(syntax_error(
                ParseErrorKind::MismatchedBracket,
                format!("'{close}' closes a list opened with '{}'", opener.open_token()),
                &close,
            ));
        }

        items.reverse();
        let list = self.arena.list(&items);
        self.push_datum(list);
        Ok(())
    }

    /// Push a finished datum, first wrapping it once per pending quote marker.
    fn push_datum(&mut self, mut value: Value) {
        while let Some(StackItem::QuoteMarker) = self.stack.last() {
            self.stack.pop();
            let quote = Value::Symbol(self.quote);
            value = self.arena.list(&[quote, value]);
        }
        self.stack.push(StackItem::Datum(value));
    }

    fn finish(self) -> Result<Vec<Value>, Error> {
        if self.open_count > 0 {
            return Err(Error::syntax(
                ParseErrorKind::Unterminated,
                "not enough close parentheses",
            ));
        }

        self.stack
            .into_iter()
            .map(|item| match item {
                StackItem::Datum(value) => Ok(value),
                StackItem::QuoteMarker => Err(malformed_quote()),
                StackItem::Open(_) => Err(Error::InternalError(
                    "open marker left on the parser stack".into(),
                )),
            })
            .collect()
    }
}

/// A syntax error pointing at the token that caused it
fn syntax_error(kind: ParseErrorKind, message: impl Into<String>, found: &Token) -> Error {
    Error::SyntaxError(ParseError::new(
        kind,
        message,
        None,
        Some(found.to_string()),
    ))
}

fn malformed_lambda(found: &Token) -> Error {
    syntax_error(
        ParseErrorKind::MalformedLambda,
        "lambda cannot be followed by a quote",
        found,
    )
}

fn malformed_quote() -> Error {
    Error::syntax(ParseErrorKind::MalformedQuote, "quote is missing its datum")
}

/// Parse every top-level form, in source order.
pub fn parse_forms(
    tokens: impl IntoIterator<Item = Token>,
    arena: &mut Arena,
    matching: BracketMatching,
) -> Result<Vec<Value>, Error> {
    let mut parser = Parser::new(arena, matching);
    for token in tokens {
        parser.feed(token)?;
    }
    let forms = parser.finish()?;
    log::debug!("parsed {} top-level forms", forms.len());
    Ok(forms)
}

/// Parse a token sequence into a single tree.
///
/// A single top-level form is returned as it is; otherwise the forms are gathered
/// into a list.
pub fn parse(
    tokens: impl IntoIterator<Item = Token>,
    arena: &mut Arena,
    matching: BracketMatching,
) -> Result<Value, Error> {
    let forms = parse_forms(tokens, arena, matching)?;
    match forms.as_slice() {
        [single] => Ok(*single),
        _ => Ok(arena.list(&forms)),
    }
}

/// Tokenize and parse `source` into its top-level forms.
pub fn parse_program(
    source: &str,
    arena: &mut Arena,
    matching: BracketMatching,
) -> Result<Vec<Value>, Error> {
    parse_forms(tokenize(source)?, arena, matching)
}
