//! minischeme - a small Scheme-like language front end and tree-walking evaluator
//!
//! The crate turns source text into a tree of [`ast::Value`]s and evaluates it:
//!
//! ```scheme
//! (define square (lambda (x) (* x x)))
//! (square 12)                      ; 144
//! (let ((a 1) (b 2.5)) (+ a b))    ; 3.500000
//! (letrec ((f (lambda (n) (if (= n 0) 1 (* n (f (- n 1))))))) (f 5))   ; 120
//! ```
//!
//! ## Strict Typing
//!
//! Conditionals never use "truthiness": `if`, `cond`, `and` and `or` require actual
//! booleans. Arithmetic promotes to reals only when a real operand is present and
//! reports integer overflow instead of wrapping.
//!
//! ## Memory
//!
//! Every pair, frame, closure and string lives in one [`arena::Arena`] owned by the
//! [`evaluator::Interpreter`]. Nothing is freed individually; the arena is released as a
//! whole when the interpreter goes away or through [`arena::Arena::fatal_exit`].
//!
//! ## Modules
//!
//! - `scheme`: tokenizer (text to tokens) built on `nom`
//! - `parser`: explicit-stack bracket matcher (tokens to values)
//! - `arena`: the single owner of all heap values
//! - `environment`: frames, bindings and lookup
//! - `evaluator`: `eval`/`apply` and the special forms
//! - `builtinops`: registry of primitives and special forms
//! - `printer`: textual rendering of values
//! - `repl`: interactive session (feature `repl`)

use std::fmt;
use std::thread;

/// Default bound on nested evaluation depth.
/// Deeper programs fail with an internal error instead of exhausting the host stack,
/// provided evaluation runs on a stack of [`EVAL_STACK_SIZE`] (see [`with_eval_stack`]).
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Stack size for evaluation threads, sized for [`MAX_EVAL_DEPTH`].
pub const EVAL_STACK_SIZE: usize = 512 * 1024 * 1024;

/// How close markers are matched against open markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BracketMatching {
    /// Any close marker closes the most recent open marker: `[a b)` is accepted.
    #[default]
    Permissive,
    /// `)` must close `(` and `]` must close `[`.
    Strict,
}

/// Interpreter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub bracket_matching: BracketMatching,
    pub max_eval_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            bracket_matching: BracketMatching::default(),
            max_eval_depth: MAX_EVAL_DEPTH,
        }
    }
}

/// Categorizes the different kinds of syntax errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// A character sequence that is not a valid token
    InvalidToken,
    /// Input ended inside a list or a string literal
    Unterminated,
    /// A close marker with no open marker left to match
    UnmatchedClose,
    /// `]` closing `(` or `)` closing `[` under strict bracket matching
    MismatchedBracket,
    /// `lambda` immediately followed by a quote
    MalformedLambda,
    /// A quote with no datum after it
    MalformedQuote,
}

/// A structured error providing detailed information about a syntax failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given byte offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let error_char = input
            .char_indices()
            .take_while(|(i, _)| *i < error_offset)
            .count();
        let context_start = error_char.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the interpreter.
///
/// `SyntaxError` is raised while reading source; every other variant is an
/// evaluation error. All of them are fatal for the program being run.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    SyntaxError(ParseError),
    UnboundSymbol(String),
    ArityError(String),
    TypeError(String),
    NotCallable(String),
    DivideByZero(String),
    DuplicateBinding(String),
    /// A `letrec` name read before its expression produced a value
    UninitializedBinding(String),
    Overflow(String),
    InternalError(String),
    Io(String),
}

impl Error {
    pub(crate) fn syntax(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Error::SyntaxError(ParseError::from_message(kind, message))
    }

    pub fn is_syntax_error(&self) -> bool {
        matches!(self, Error::SyntaxError(_))
    }

    /// The parse error kind, if this is a syntax error
    pub fn parse_error_kind(&self) -> Option<ParseErrorKind> {
        match self {
            Error::SyntaxError(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SyntaxError(e) => {
                write!(f, "Syntax error: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundSymbol(name) => write!(f, "Evaluation error: unbound symbol: {name}"),
            Error::ArityError(msg) => write!(f, "Evaluation error: arity: {msg}"),
            Error::TypeError(msg) => write!(f, "Evaluation error: type: {msg}"),
            Error::NotCallable(msg) => write!(f, "Evaluation error: not a procedure: {msg}"),
            Error::DivideByZero(msg) => write!(f, "Evaluation error: divide by zero: {msg}"),
            Error::DuplicateBinding(name) => {
                write!(f, "Evaluation error: duplicate binding: {name}")
            }
            Error::UninitializedBinding(name) => write!(
                f,
                "Evaluation error: {name} used before its letrec initialization"
            ),
            Error::Overflow(msg) => write!(f, "Evaluation error: integer overflow in {msg}"),
            Error::InternalError(msg) => write!(f, "Evaluation error: {msg}"),
            Error::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

pub mod arena;
pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod parser;
pub mod printer;
pub mod scheme;

#[cfg(feature = "repl")]
pub mod repl;

/// Run a whole program in a fresh interpreter with the default configuration.
///
/// Returns everything the program printed and the error that stopped it, if any.
/// Output produced before the failing form is kept.
pub fn run_program(source: &str) -> (String, Option<Error>) {
    run_program_with_config(source, InterpreterConfig::default())
}

/// Like [`run_program`], with an explicit configuration.
pub fn run_program_with_config(source: &str, config: InterpreterConfig) -> (String, Option<Error>) {
    with_eval_stack(|| {
        let mut interpreter = evaluator::Interpreter::new(config);
        let mut output = Vec::new();
        let result = interpreter.run_source(source, &mut output);
        (String::from_utf8_lossy(&output).into_owned(), result.err())
    })
    .unwrap_or_else(|e| (String::new(), Some(e)))
}

/// Run `f` to completion on a thread whose stack is [`EVAL_STACK_SIZE`].
///
/// Evaluation recurses on the host stack; this is what lets [`MAX_EVAL_DEPTH`] be
/// reached before the stack runs out. A thread that cannot be started is an
/// [`Error::Io`], and a panic on it is reported as an [`Error::InternalError`].
pub fn with_eval_stack<T: Send>(f: impl FnOnce() -> T + Send) -> Result<T, Error> {
    thread::scope(|scope| -> Result<T, Error> {
        let handle = thread::Builder::new()
            .name("evaluator".into())
            .stack_size(EVAL_STACK_SIZE)
            .spawn_scoped(scope, f)?;
        handle
            .join()
            .map_err(|_| Error::InternalError("evaluator thread panicked".into()))
    })
}
