//! Textual rendering of values.
//!
//! Output is readable back by the tokenizer for every value the parser can produce:
//! strings are re-escaped and reals keep their decimal point.

use std::fmt;

use crate::arena::Arena;
use crate::ast::Value;

/// `Display` adapter pairing a value with the arena that owns its storage.
pub struct DisplayValue<'a> {
    arena: &'a Arena,
    value: Value,
}

impl<'a> DisplayValue<'a> {
    pub fn new(arena: &'a Arena, value: Value) -> Self {
        DisplayValue { arena, value }
    }
}

impl Arena {
    pub fn display(&self, value: Value) -> DisplayValue<'_> {
        DisplayValue::new(self, value)
    }
}

fn write_text(f: &mut fmt::Formatter, text: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in text.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

fn write_value(f: &mut fmt::Formatter, arena: &Arena, value: Value) -> fmt::Result {
    match value {
        Value::Integer(n) => write!(f, "{n}"),
        Value::Real(x) => write!(f, "{x:.6}"),
        Value::Text(id) => write_text(f, arena.text(id)),
        Value::Symbol(sym) => write!(f, "{}", arena.symbol_name(sym)),
        Value::Boolean(true) => write!(f, "#t"),
        Value::Boolean(false) => write!(f, "#f"),
        Value::Empty => write!(f, "()"),
        Value::Void => Ok(()),
        Value::Closure(_) => write!(f, "#<procedure>"),
        Value::Primitive(op) => write!(f, "#<primitive:{}>", op.scheme_id),
        Value::Pair(mut id) => {
            write!(f, "(")?;
            loop {
                write_value(f, arena, arena.head(id))?;
                match arena.tail(id) {
                    Value::Empty => break,
                    Value::Pair(next) => {
                        write!(f, " ")?;
                        id = next;
                    }
                    tail => {
                        write!(f, " . ")?;
                        write_value(f, arena, tail)?;
                        break;
                    }
                }
            }
            write!(f, ")")
        }
    }
}

impl fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_value(f, self.arena, self.value)
    }
}
