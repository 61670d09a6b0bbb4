//! Built-in operations registry.
//!
//! Primitives and special forms are defined once, in [`BUILTIN_OPS`], each with its
//! Scheme name and arity.
//!
//! ## Functions vs Special Forms
//!
//! - **Primitives**: receive evaluated arguments (e.g. `+`, `car`, `cons`). They are bound
//!   in the global frame when an interpreter is created and can be passed around as values.
//! - **Special Forms**: receive their operands unevaluated together with the current frame
//!   (e.g. `if`, `let`, `lambda`). They are resolved by name before ordinary application
//!   and are never values.
//!
//! ## Arity
//!
//! Arities differ between operators: `+` takes any number of operands, `*` at least two,
//! and `-` and `/` exactly two. Argument counts are checked before an implementation runs.
//!
//! ## Error Handling
//!
//! - **Type Safety**: operations reject incorrect types (e.g. `(car 5)` errors)
//! - **Promotion**: arithmetic produces a real as soon as one operand is real
//! - **Overflow Detection**: integer arithmetic reports overflow instead of wrapping

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::Error;
use crate::arena::Arena;
use crate::ast::{FrameId, NumberType, Value};
use crate::evaluator::{
    Interpreter, eval_and, eval_cond, eval_define, eval_if, eval_lambda, eval_let, eval_let_star,
    eval_letrec, eval_or, eval_quote, eval_set, eval_set_car, eval_set_cdr,
};

/// Expected number of arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn accepts(&self, arg_count: usize) -> bool {
        match *self {
            Arity::Exact(n) => arg_count == n,
            Arity::AtLeast(n) => arg_count >= n,
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        match *self {
            Arity::Exact(n) => write!(f, "exactly {n} argument{}", plural(n)),
            Arity::AtLeast(n) => write!(f, "at least {n} argument{}", plural(n)),
            Arity::Any => write!(f, "any number of arguments"),
        }
    }
}

pub type PrimitiveFn = fn(&mut Arena, &[Value]) -> Result<Value, Error>;

/// Special form handler: unevaluated operands, current frame, current evaluation depth
pub type SpecialFormFn = fn(&mut Interpreter, &[Value], FrameId, usize) -> Result<Value, Error>;

#[derive(Clone, Copy)]
pub enum OpKind {
    Primitive(PrimitiveFn),
    SpecialForm(SpecialFormFn),
}

impl fmt::Debug for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OpKind::Primitive(_) => write!(f, "Primitive"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm"),
        }
    }
}

#[derive(Debug)]
pub struct BuiltinOp {
    /// The Scheme identifier for this operation
    pub scheme_id: &'static str,
    pub op_kind: OpKind,
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.scheme_id == other.scheme_id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// Check if the given number of arguments is valid for this operation
    pub fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        if self.arity.accepts(arg_count) {
            Ok(())
        } else {
            Err(Error::ArityError(format!(
                "{} expects {}, got {arg_count}",
                self.scheme_id, self.arity
            )))
        }
    }
}

//
// Numeric helpers
//

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(NumberType),
    Real(f64),
}

impl Number {
    fn from_value(op: &str, value: Value) -> Result<Number, Error> {
        match value {
            Value::Integer(n) => Ok(Number::Int(n)),
            Value::Real(x) => Ok(Number::Real(x)),
            other => Err(Error::TypeError(format!(
                "{op} expects numbers, got {}",
                other.type_name()
            ))),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Real(x) => x,
        }
    }

    /// Integer arithmetic while both sides are integers, real arithmetic otherwise
    fn combine(
        self,
        other: Number,
        op: &str,
        int_op: fn(NumberType, NumberType) -> Option<NumberType>,
        real_op: fn(f64, f64) -> f64,
    ) -> Result<Number, Error> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => int_op(a, b)
                .map(Number::Int)
                .ok_or_else(|| Error::Overflow(op.into())),
            _ => Ok(Number::Real(real_op(self.as_f64(), other.as_f64()))),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(n) => Value::Integer(n),
            Number::Real(x) => Value::Real(x),
        }
    }
}

fn two_args(op: &str, args: &[Value]) -> Result<(Value, Value), Error> {
    match *args {
        [a, b] => Ok((a, b)),
        _ => Err(Error::ArityError(format!(
            "{op} expects exactly 2 arguments, got {}",
            args.len()
        ))),
    }
}

fn one_arg(op: &str, args: &[Value]) -> Result<Value, Error> {
    match *args {
        [a] => Ok(a),
        _ => Err(Error::ArityError(format!(
            "{op} expects exactly 1 argument, got {}",
            args.len()
        ))),
    }
}

fn fold_numbers(
    op: &str,
    args: &[Value],
    identity: Number,
    int_op: fn(NumberType, NumberType) -> Option<NumberType>,
    real_op: fn(f64, f64) -> f64,
) -> Result<Value, Error> {
    let mut acc = identity;
    for &arg in args {
        acc = acc.combine(Number::from_value(op, arg)?, op, int_op, real_op)?;
    }
    Ok(acc.into())
}

//
// Builtin Function Implementations
//

fn builtin_add(_arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
    fold_numbers("+", args, Number::Int(0), NumberType::checked_add, |a, b| a + b)
}

fn builtin_mul(_arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
    fold_numbers("*", args, Number::Int(1), NumberType::checked_mul, |a, b| a * b)
}

fn builtin_sub(_arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
    let (a, b) = two_args("-", args)?;
    let result = Number::from_value("-", a)?.combine(
        Number::from_value("-", b)?,
        "-",
        NumberType::checked_sub,
        |a, b| a - b,
    )?;
    Ok(result.into())
}

fn builtin_div(_arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
    let (a, b) = two_args("/", args)?;
    let dividend = Number::from_value("/", a)?.as_f64();
    let divisor = Number::from_value("/", b)?.as_f64();
    if divisor == 0.0 {
        return Err(Error::DivideByZero("/".into()));
    }
    Ok(Value::Real(dividend / divisor))
}

fn builtin_modulo(_arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
    match two_args("modulo", args)? {
        (Value::Integer(_), Value::Integer(0)) => Err(Error::DivideByZero("modulo".into())),
        (Value::Integer(a), Value::Integer(b)) => a
            .checked_rem(b)
            .map(Value::Integer)
            .ok_or_else(|| Error::Overflow("modulo".into())),
        (a, b) => Err(Error::TypeError(format!(
            "modulo expects integers, got {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(_arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
            let (a, b) = two_args($op_str, args)?;
            let result = match (Number::from_value($op_str, a)?, Number::from_value($op_str, b)?) {
                (Number::Int(x), Number::Int(y)) => x $op y,
                (x, y) => x.as_f64() $op y.as_f64(),
            };
            Ok(Value::Boolean(result))
        }
    };
}

numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_gt, >, ">");
numeric_comparison!(builtin_eq, ==, "=");

fn builtin_null(_arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
    let value = one_arg("null?", args)?;
    Ok(Value::Boolean(!matches!(value, Value::Pair(_))))
}

fn builtin_car(arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
    match one_arg("car", args)? {
        Value::Pair(id) => Ok(arena.head(id)),
        other => Err(Error::TypeError(format!(
            "car expects a pair, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_cdr(arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
    match one_arg("cdr", args)? {
        Value::Pair(id) => Ok(arena.tail(id)),
        other => Err(Error::TypeError(format!(
            "cdr expects a pair, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_cons(arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
    let (head, tail) = two_args("cons", args)?;
    Ok(arena.cons(head, tail))
}

fn builtin_append(arena: &mut Arena, args: &[Value]) -> Result<Value, Error> {
    let (first, second) = two_args("append", args)?;
    let Some(items) = arena.list_to_vec(first) else {
        return Err(Error::TypeError(format!(
            "append expects a proper list as its first argument, got {}",
            first.type_name()
        )));
    };
    Ok(arena.list_onto(&items, second))
}

/// Global registry of all built-in operations.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    let special = |scheme_id: &'static str, handler: SpecialFormFn, arity: Arity| BuiltinOp {
        scheme_id,
        op_kind: OpKind::SpecialForm(handler),
        arity,
    };
    let primitive = |scheme_id: &'static str, func: PrimitiveFn, arity: Arity| BuiltinOp {
        scheme_id,
        op_kind: OpKind::Primitive(func),
        arity,
    };

    vec![
        // Special forms
        special("quote", eval_quote, Arity::Exact(1)),
        special("if", eval_if, Arity::Exact(3)),
        special("define", eval_define, Arity::Exact(2)),
        special("let", eval_let, Arity::AtLeast(2)),
        special("let*", eval_let_star, Arity::AtLeast(2)),
        special("letrec", eval_letrec, Arity::AtLeast(2)),
        special("set!", eval_set, Arity::Exact(2)),
        special("set-car!", eval_set_car, Arity::Exact(2)),
        special("set-cdr!", eval_set_cdr, Arity::Exact(2)),
        special("lambda", eval_lambda, Arity::AtLeast(2)),
        special("cond", eval_cond, Arity::Any),
        special("and", eval_and, Arity::Any),
        special("or", eval_or, Arity::Any),
        // Arithmetic
        primitive("+", builtin_add, Arity::Any),
        primitive("-", builtin_sub, Arity::Exact(2)),
        primitive("*", builtin_mul, Arity::AtLeast(2)),
        primitive("/", builtin_div, Arity::Exact(2)),
        primitive("modulo", builtin_modulo, Arity::Exact(2)),
        // Comparison
        primitive("<", builtin_lt, Arity::Exact(2)),
        primitive(">", builtin_gt, Arity::Exact(2)),
        primitive("=", builtin_eq, Arity::Exact(2)),
        // Lists
        primitive("null?", builtin_null, Arity::Exact(1)),
        primitive("car", builtin_car, Arity::Exact(1)),
        primitive("cdr", builtin_cdr, Arity::Exact(1)),
        primitive("cons", builtin_cons, Arity::Exact(2)),
        primitive("append", builtin_append, Arity::Exact(2)),
    ]
});

static BUILTIN_SCHEME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.scheme_id, op)).collect()
});

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its Scheme identifier
pub fn find_scheme_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_SCHEME.get(id).copied()
}

/// Invoke a primitive on already-evaluated arguments.
pub(crate) fn apply_primitive(
    op: &'static BuiltinOp,
    arena: &mut Arena,
    args: &[Value],
) -> Result<Value, Error> {
    match op.op_kind {
        OpKind::Primitive(func) => {
            op.validate_arity(args.len())?;
            func(arena, args)
        }
        OpKind::SpecialForm(_) => Err(Error::NotCallable(format!(
            "special form {} cannot be applied",
            op.scheme_id
        ))),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn call_builtin(arena: &mut Arena, name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_scheme_op(name).unwrap();
        apply_primitive(op, arena, args)
    }

    #[test]
    fn test_builtin_ops_registry() {
        let add_op = find_scheme_op("+").unwrap();
        assert_eq!(add_op.arity, Arity::Any);
        assert!(!add_op.is_special_form());

        let mul_op = find_scheme_op("*").unwrap();
        assert_eq!(mul_op.arity, Arity::AtLeast(2));

        let if_op = find_scheme_op("if").unwrap();
        assert!(if_op.is_special_form());
        assert_eq!(if_op.arity, Arity::Exact(3));

        let all_ops = get_builtin_ops();
        assert_eq!(all_ops.iter().filter(|op| op.is_special_form()).count(), 13);
        assert_eq!(all_ops.iter().filter(|op| !op.is_special_form()).count(), 13);

        assert!(find_scheme_op("unknown").is_none());
        assert!(std::ptr::eq(find_scheme_op("car").unwrap(), find_scheme_op("car").unwrap()));
    }

    #[test]
    fn test_arity_display_and_validation() {
        assert_eq!(Arity::Exact(1).to_string(), "exactly 1 argument");
        assert_eq!(Arity::AtLeast(2).to_string(), "at least 2 arguments");
        assert!(Arity::Any.accepts(0));
        assert!(!Arity::Exact(2).accepts(3));

        let op = find_scheme_op("-").unwrap();
        assert_eq!(
            op.validate_arity(3),
            Err(Error::ArityError("- expects exactly 2 arguments, got 3".into()))
        );
    }

    /// Macro to create test cases, invoking builtins via the registry.
    macro_rules! test {
        ($arena:expr, $name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($arena, $name, $args), $expected)
        };
    }

    #[test]
    fn test_numeric_builtins() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);
        let arena = &mut Arena::new();
        let int = Value::Integer;
        let real = Value::Real;
        let boolean = Value::Boolean;

        let test_cases: Vec<TestCase> = vec![
            test!(arena, "+", &[], Some(int(0))),
            test!(arena, "+", &[int(5)], Some(int(5))),
            test!(arena, "+", &[int(1), int(2), int(3)], Some(int(6))),
            test!(arena, "+", &[int(1), real(2.0)], Some(real(3.0))),
            test!(arena, "+", &[real(0.5), int(1), int(2)], Some(real(3.5))),
            test!(arena, "+", &[int(i64::MAX), int(1)], None),
            test!(arena, "+", &[int(1), boolean(true)], None),
            test!(arena, "-", &[int(10), int(3)], Some(int(7))),
            test!(arena, "-", &[int(1), real(0.5)], Some(real(0.5))),
            test!(arena, "-", &[int(5)], None),
            test!(arena, "-", &[int(5), int(1), int(1)], None),
            test!(arena, "-", &[int(i64::MIN), int(1)], None),
            test!(arena, "*", &[int(2), int(3), int(4)], Some(int(24))),
            test!(arena, "*", &[int(2), real(1.5)], Some(real(3.0))),
            test!(arena, "*", &[int(5)], None),
            test!(arena, "*", &[], None),
            test!(arena, "*", &[int(i64::MAX), int(2)], None),
            test!(arena, "/", &[int(7), int(2)], Some(real(3.5))),
            test!(arena, "/", &[int(6), int(3)], Some(real(2.0))),
            test!(arena, "/", &[int(1), int(0)], None),
            test!(arena, "/", &[real(1.0), real(0.0)], None),
            test!(arena, "/", &[int(1)], None),
            test!(arena, "modulo", &[int(17), int(5)], Some(int(2))),
            test!(arena, "modulo", &[int(-7), int(2)], Some(int(-1))),
            test!(arena, "modulo", &[int(7), int(0)], None),
            test!(arena, "modulo", &[real(7.0), int(2)], None),
            test!(arena, "<", &[int(1), int(2)], Some(boolean(true))),
            test!(arena, "<", &[int(2), real(1.5)], Some(boolean(false))),
            test!(arena, ">", &[real(2.5), int(2)], Some(boolean(true))),
            test!(arena, "=", &[int(2), real(2.0)], Some(boolean(true))),
            test!(arena, "=", &[int(2), int(3)], Some(boolean(false))),
            test!(arena, "=", &[int(1), int(2), int(3)], None),
            test!(arena, "<", &[int(1), Value::Empty], None),
        ];

        for (i, (name, result, expected)) in test_cases.into_iter().enumerate() {
            match expected {
                Some(value) => assert_eq!(result, Ok(value), "case {i}: {name}"),
                None => assert!(result.is_err(), "case {i}: {name} should fail, got {result:?}"),
            }
        }
    }

    #[test]
    fn test_specific_numeric_errors() {
        let arena = &mut Arena::new();
        assert_eq!(
            call_builtin(arena, "/", &[Value::Integer(1), Value::Integer(0)]),
            Err(Error::DivideByZero("/".into()))
        );
        assert_eq!(
            call_builtin(arena, "+", &[Value::Integer(i64::MAX), Value::Integer(1)]),
            Err(Error::Overflow("+".into()))
        );
        assert!(matches!(
            call_builtin(arena, "<", &[Value::Boolean(true), Value::Integer(1)]),
            Err(Error::TypeError(_))
        ));
        assert!(matches!(
            call_builtin(arena, "*", &[Value::Integer(1)]),
            Err(Error::ArityError(_))
        ));
    }

    #[test]
    fn test_list_builtins() {
        let mut arena = Arena::new();
        let list = arena.list(&[Value::Integer(1), Value::Integer(2)]);
        let other = arena.list(&[Value::Integer(3)]);

        assert_eq!(call_builtin(&mut arena, "car", &[list]), Ok(Value::Integer(1)));
        let rest = call_builtin(&mut arena, "cdr", &[list]).unwrap();
        assert_eq!(arena.display(rest).to_string(), "(2)");

        assert!(matches!(
            call_builtin(&mut arena, "car", &[Value::Empty]),
            Err(Error::TypeError(_))
        ));
        assert!(matches!(
            call_builtin(&mut arena, "cdr", &[Value::Integer(4)]),
            Err(Error::TypeError(_))
        ));

        let pair = call_builtin(&mut arena, "cons", &[Value::Integer(1), Value::Integer(2)]).unwrap();
        assert_eq!(arena.display(pair).to_string(), "(1 . 2)");

        let joined = call_builtin(&mut arena, "append", &[list, other]).unwrap();
        assert_eq!(arena.display(joined).to_string(), "(1 2 3)");
        // the first list is copied, not shared
        assert_eq!(arena.display(list).to_string(), "(1 2)");

        let onto_atom = call_builtin(&mut arena, "append", &[list, Value::Integer(9)]).unwrap();
        assert_eq!(arena.display(onto_atom).to_string(), "(1 2 . 9)");
        assert_eq!(
            call_builtin(&mut arena, "append", &[Value::Empty, other]),
            Ok(other)
        );
        assert!(matches!(
            call_builtin(&mut arena, "append", &[pair, other]),
            Err(Error::TypeError(_))
        ));

        let null_cases = [
            (Value::Empty, true),
            (Value::Integer(0), true),
            (Value::Boolean(false), true),
            (list, false),
            (pair, false),
        ];
        for (value, expected) in null_cases {
            assert_eq!(
                call_builtin(&mut arena, "null?", &[value]),
                Ok(Value::Boolean(expected))
            );
        }
    }

    #[test]
    fn test_special_forms_are_not_applicable() {
        let mut arena = Arena::new();
        let quote = find_scheme_op("quote").unwrap();
        assert!(matches!(
            apply_primitive(quote, &mut arena, &[Value::Integer(1)]),
            Err(Error::NotCallable(_))
        ));
    }
}
