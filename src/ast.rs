//! Core value types of the interpreter.
//!
//! A [`Value`] is a small `Copy` tagged union. Atoms (numbers, booleans, symbols)
//! are stored inline; everything with identity or heap storage (pairs, strings,
//! closures) is a typed handle into the [`Arena`](crate::arena::Arena). Source
//! trees produced by the parser and runtime data share this one representation.

use crate::builtinops::BuiltinOp;

/// Type alias for integer values in the interpreter
pub(crate) type NumberType = i64;

/// Interned symbol name
pub type Sym = string_interner::DefaultSymbol;

/// Allowed non-alphanumeric characters in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "!$%&*/:<=>?~_^+-.";

/// Check if a string is a valid symbol name
/// Valid: non-empty, no leading digit, no sign-digit or dot-digit prefix, not a lone dot,
/// alphanumeric + SYMBOL_SPECIAL_CHARS
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first_char) => {
            if first_char.is_ascii_digit() || name == "." {
                return false;
            }

            if matches!(first_char, '-' | '+' | '.')
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_handle!(
    /// Handle to a mutable cons cell
    PairId
);
arena_handle!(
    /// Handle to an environment frame
    FrameId
);
arena_handle!(
    /// Handle to a user-defined procedure
    ClosureId
);
arena_handle!(
    /// Handle to an immutable string literal
    TextId
);

/// A runtime or source value.
///
/// Equality is identity for handles: two pairs compare equal only if they are the
/// same cell. Use [`Arena::structurally_equal`](crate::arena::Arena::structurally_equal)
/// to compare trees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Integer(NumberType),
    Real(f64),
    /// String literal
    Text(TextId),
    Symbol(Sym),
    Boolean(bool),
    /// A cons cell; proper lists are chains of pairs ending in `Empty`
    Pair(PairId),
    /// The empty list
    Empty,
    /// Result of `define`, `set!` and friends. Never printed.
    Void,
    /// User-defined procedure (parameters, body, captured frame)
    Closure(ClosureId),
    /// Built-in procedure
    Primitive(&'static BuiltinOp),
}

impl Value {
    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Boolean(_) => "boolean",
            Value::Pair(_) => "pair",
            Value::Empty => "empty list",
            Value::Void => "void",
            Value::Closure(_) => "procedure",
            Value::Primitive(_) => "primitive",
        }
    }

    pub fn as_pair(&self) -> Option<PairId> {
        match self {
            Value::Pair(p) => Some(*p),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(n as NumberType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);
