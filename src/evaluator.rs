use std::collections::HashMap;
use std::io::Write;

use smallvec::SmallVec;

use crate::arena::{Arena, ClosureData};
use crate::ast::{FrameId, PairId, Sym, Value};
use crate::builtinops::{Arity, BuiltinOp, OpKind, apply_primitive, get_builtin_ops};
use crate::parser::parse_program;
use crate::printer::DisplayValue;
use crate::{Error, InterpreterConfig};

mod letforms;

pub(crate) use letforms::{eval_let, eval_let_star, eval_letrec};

/// Argument vectors are short; keep them off the heap.
pub(crate) type ArgVec = SmallVec<[Value; 4]>;

/// One entry of [`Interpreter::global_bindings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalBinding {
    pub name: String,
    pub rendered: String,
    /// The name is still bound to the primitive it was seeded with
    pub builtin: bool,
}

/// Owns everything needed to run programs: the arena, the global frame seeded with
/// primitives, and the special-form table.
pub struct Interpreter {
    arena: Arena,
    global: FrameId,
    special_forms: HashMap<Sym, &'static BuiltinOp>,
    else_symbol: Sym,
    config: InterpreterConfig,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        let mut arena = Arena::new();
        let global = arena.create_frame(None);
        let mut special_forms = HashMap::new();

        for builtin_op in get_builtin_ops() {
            let name = arena.intern(builtin_op.scheme_id);
            match builtin_op.op_kind {
                OpKind::SpecialForm(_) => {
                    special_forms.insert(name, builtin_op);
                }
                OpKind::Primitive(_) => arena.add_binding(global, name, Value::Primitive(builtin_op)),
            }
        }
        let else_symbol = arena.intern("else");

        log::debug!(
            "interpreter ready: {} special forms, {} global bindings, {config:?}",
            special_forms.len(),
            arena.frame_bindings(global).len()
        );

        Interpreter {
            arena,
            global,
            special_forms,
            else_symbol,
            config,
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn global_frame(&self) -> FrameId {
        self.global
    }

    pub fn display(&self, value: Value) -> DisplayValue<'_> {
        self.arena.display(value)
    }

    /// Tokenize and parse `source` into top-level forms, allocated in this interpreter's arena.
    pub fn parse(&mut self, source: &str) -> Result<Vec<Value>, Error> {
        parse_program(source, &mut self.arena, self.config.bracket_matching)
    }

    /// Evaluate an expression in `frame`
    pub fn eval(&mut self, expr: Value, frame: FrameId) -> Result<Value, Error> {
        self.eval_with_depth_tracking(expr, frame, 0)
    }

    /// Evaluate an expression in the global frame
    pub fn eval_global(&mut self, expr: Value) -> Result<Value, Error> {
        self.eval(expr, self.global)
    }

    /// Apply a procedure value to already-evaluated arguments
    pub fn apply(&mut self, operator: Value, args: &[Value]) -> Result<Value, Error> {
        self.apply_with_depth(operator, args, 0)
    }

    /// Parse all of `source`, then evaluate each form in order in the global frame,
    /// writing every non-void result to `out`. A syntax error means nothing is
    /// evaluated; an evaluation error stops at the failing form.
    pub fn run_source<W: Write>(&mut self, source: &str, out: &mut W) -> Result<(), Error> {
        let forms = self.parse(source)?;
        log::debug!("evaluating {} top-level forms", forms.len());

        for form in forms {
            let value = self.eval_global(form)?;
            if !matches!(value, Value::Void) {
                writeln!(out, "{}", self.arena.display(value))?;
            }
        }
        Ok(())
    }

    /// Release the arena and terminate the process.
    pub fn fatal_exit(&mut self, code: i32) -> ! {
        self.arena.fatal_exit(code)
    }

    /// Evaluate an expression with depth tracking to prevent stack overflow
    pub(crate) fn eval_with_depth_tracking(
        &mut self,
        expr: Value,
        frame: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        if depth >= self.config.max_eval_depth {
            return Err(Error::InternalError(format!(
                "evaluation depth limit exceeded (max: {})",
                self.config.max_eval_depth
            )));
        }

        match expr {
            Value::Integer(_) | Value::Real(_) | Value::Text(_) | Value::Boolean(_) => Ok(expr),

            Value::Symbol(name) => self.arena.lookup(frame, name),

            Value::Pair(id) => self.eval_combination(id, frame, depth),

            Value::Empty | Value::Void | Value::Closure(_) | Value::Primitive(_) => Err(
                Error::InternalError(format!("unknown type: cannot evaluate {}", expr.type_name())),
            ),
        }
    }

    /// Special form dispatch, or ordinary application
    fn eval_combination(&mut self, id: PairId, frame: FrameId, depth: usize) -> Result<Value, Error> {
        let head = self.arena.head(id);
        let tail = self.arena.tail(id);

        if let Value::Symbol(name) = head
            && let Some(builtin_op) = self.special_forms.get(&name).copied()
            && let OpKind::SpecialForm(special_form) = builtin_op.op_kind
        {
            let operands = self.operands(tail, builtin_op.scheme_id)?;
            builtin_op.validate_arity(operands.len())?;
            return special_form(self, &operands, frame, depth);
        }

        let operator = self.eval_with_depth_tracking(head, frame, depth + 1)?;
        let arg_exprs = self.operands(tail, "application")?;
        let mut args = ArgVec::with_capacity(arg_exprs.len());
        for arg_expr in arg_exprs {
            args.push(self.eval_with_depth_tracking(arg_expr, frame, depth + 1)?);
        }
        self.apply_with_depth(operator, &args, depth + 1)
    }

    /// Collect the elements of an operand list, which must be proper
    fn operands(&self, list: Value, context: &str) -> Result<ArgVec, Error> {
        let mut items = ArgVec::new();
        let mut current = list;
        loop {
            match current {
                Value::Empty => return Ok(items),
                Value::Pair(id) => {
                    items.push(self.arena.head(id));
                    current = self.arena.tail(id);
                }
                _ => {
                    return Err(Error::TypeError(format!(
                        "{context}: operands must form a proper list"
                    )));
                }
            }
        }
    }

    pub(crate) fn apply_with_depth(
        &mut self,
        operator: Value,
        args: &[Value],
        depth: usize,
    ) -> Result<Value, Error> {
        match operator {
            Value::Primitive(builtin_op) => apply_primitive(builtin_op, &mut self.arena, args),
            Value::Closure(id) => {
                let closure = self.arena.closure(id);
                let scope = self.arena.create_frame(Some(closure.env));
                self.bind_parameters(scope, closure.params, args)?;
                self.eval_body(closure.body, scope, depth)
            }
            other => Err(Error::NotCallable(format!(
                "{} ({})",
                self.arena.display(other),
                other.type_name()
            ))),
        }
    }

    fn bind_parameters(&mut self, scope: FrameId, params: Value, args: &[Value]) -> Result<(), Error> {
        if let Value::Symbol(rest) = params {
            let list = self.arena.list(args);
            self.arena.add_binding(scope, rest, list);
            return Ok(());
        }

        let mut remaining = args.iter();
        let mut current = params;
        while let Value::Pair(id) = current {
            let Some(&arg) = remaining.next() else {
                return Err(Error::ArityError("too few arguments".into()));
            };
            let Value::Symbol(name) = self.arena.head(id) else {
                return Err(Error::InternalError("parameter is not a symbol".into()));
            };
            self.arena.add_binding(scope, name, arg);
            current = self.arena.tail(id);
        }

        if remaining.next().is_some() {
            return Err(Error::ArityError("too many arguments".into()));
        }
        Ok(())
    }

    /// Evaluate a closure body (a proper list) in order; the last value is the result
    fn eval_body(&mut self, body: Value, scope: FrameId, depth: usize) -> Result<Value, Error> {
        let mut result = Value::Void;
        let mut current = body;
        while let Value::Pair(id) = current {
            result = self.eval_with_depth_tracking(self.arena.head(id), scope, depth + 1)?;
            current = self.arena.tail(id);
        }
        Ok(result)
    }

    /// Evaluate a sequence of expressions in order; the last value is the result
    pub(crate) fn eval_sequence(
        &mut self,
        exprs: &[Value],
        scope: FrameId,
        depth: usize,
    ) -> Result<Value, Error> {
        let mut result = Value::Void;
        for &expr in exprs {
            result = self.eval_with_depth_tracking(expr, scope, depth + 1)?;
        }
        Ok(result)
    }

    /// Visible global bindings, newest first, rendered for display
    pub fn global_bindings(&self) -> Vec<GlobalBinding> {
        self.arena
            .frame_bindings(self.global)
            .into_iter()
            .map(|(name, slot)| {
                let name = self.arena.symbol_name(name).to_owned();
                let builtin = matches!(slot, Some(Value::Primitive(op)) if op.scheme_id == name);
                let rendered = match slot {
                    Some(value) => self.arena.display(value).to_string(),
                    None => "#<uninitialized>".into(),
                };
                GlobalBinding {
                    name,
                    rendered,
                    builtin,
                }
            })
            .collect()
    }
}

pub(crate) fn form_arity_error(form: &str, arity: Arity, got: usize) -> Error {
    Error::ArityError(format!("{form} expects {arity}, got {got}"))
}

/// Evaluate quote special form
pub(crate) fn eval_quote(
    _interp: &mut Interpreter,
    args: &[Value],
    _frame: FrameId,
    _depth: usize,
) -> Result<Value, Error> {
    match args {
        [datum] => Ok(*datum),
        _ => Err(form_arity_error("quote", Arity::Exact(1), args.len())),
    }
}

/// Evaluate define special form
pub(crate) fn eval_define(
    interp: &mut Interpreter,
    args: &[Value],
    frame: FrameId,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = interp.eval_with_depth_tracking(*expr, frame, depth + 1)?;
            interp.arena.add_binding(frame, *name, value);
            Ok(Value::Void)
        }
        [_, _] => Err(Error::TypeError("define requires a symbol".to_owned())),
        _ => Err(form_arity_error("define", Arity::Exact(2), args.len())),
    }
}

/// Evaluate set! special form
pub(crate) fn eval_set(
    interp: &mut Interpreter,
    args: &[Value],
    frame: FrameId,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = interp.eval_with_depth_tracking(*expr, frame, depth + 1)?;
            interp.arena.assign(frame, *name, value)?;
            Ok(Value::Void)
        }
        [_, _] => Err(Error::TypeError("set! requires a symbol".to_owned())),
        _ => Err(form_arity_error("set!", Arity::Exact(2), args.len())),
    }
}

macro_rules! pair_mutator {
    ($name:ident, $op_name:expr, $setter:ident) => {
        pub(crate) fn $name(
            interp: &mut Interpreter,
            args: &[Value],
            frame: FrameId,
            depth: usize,
        ) -> Result<Value, Error> {
            let [pair_expr, value_expr] = args else {
                return Err(form_arity_error($op_name, Arity::Exact(2), args.len()));
            };
            match interp.eval_with_depth_tracking(*pair_expr, frame, depth + 1)? {
                Value::Pair(id) => {
                    let value = interp.eval_with_depth_tracking(*value_expr, frame, depth + 1)?;
                    interp.arena.$setter(id, value);
                    Ok(Value::Void)
                }
                other => Err(Error::TypeError(format!(
                    concat!($op_name, " expects a pair, got {}"),
                    other.type_name()
                ))),
            }
        }
    };
}

pair_mutator!(eval_set_car, "set-car!", set_head);
pair_mutator!(eval_set_cdr, "set-cdr!", set_tail);

/// Evaluate if special form
pub(crate) fn eval_if(
    interp: &mut Interpreter,
    args: &[Value],
    frame: FrameId,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [condition_expr, then_expr, else_expr] => {
            match interp.eval_with_depth_tracking(*condition_expr, frame, depth + 1)? {
                Value::Boolean(true) => interp.eval_with_depth_tracking(*then_expr, frame, depth + 1),
                Value::Boolean(false) => interp.eval_with_depth_tracking(*else_expr, frame, depth + 1),
                other => Err(Error::TypeError(format!(
                    "if condition must be a boolean, got {}",
                    other.type_name()
                ))),
            }
        }
        _ => Err(form_arity_error("if", Arity::Exact(3), args.len())),
    }
}

/// Evaluate lambda special form
pub(crate) fn eval_lambda(
    interp: &mut Interpreter,
    args: &[Value],
    frame: FrameId,
    _depth: usize,
) -> Result<Value, Error> {
    let [params, body @ ..] = args else {
        return Err(form_arity_error("lambda", Arity::AtLeast(2), args.len()));
    };
    if body.is_empty() {
        return Err(form_arity_error("lambda", Arity::AtLeast(2), args.len()));
    }

    match *params {
        Value::Empty | Value::Symbol(_) => {}
        Value::Pair(_) => {
            let Some(names) = interp.arena.list_to_vec(*params) else {
                return Err(Error::TypeError(
                    "lambda parameters must form a proper list".to_owned(),
                ));
            };
            let mut seen: Vec<Sym> = Vec::with_capacity(names.len());
            for param in names {
                let Value::Symbol(name) = param else {
                    return Err(Error::TypeError("lambda parameters must be symbols".to_owned()));
                };
                if seen.contains(&name) {
                    return Err(Error::DuplicateBinding(
                        interp.arena.symbol_name(name).to_owned(),
                    ));
                }
                seen.push(name);
            }
        }
        other => {
            return Err(Error::TypeError(format!(
                "lambda parameters must be a list or a symbol, got {}",
                other.type_name()
            )));
        }
    }

    let body = interp.arena.list(body);
    Ok(interp.arena.alloc_closure(ClosureData {
        params: *params,
        body,
        env: frame,
    }))
}

/// Evaluate cond special form
pub(crate) fn eval_cond(
    interp: &mut Interpreter,
    args: &[Value],
    frame: FrameId,
    depth: usize,
) -> Result<Value, Error> {
    for &clause in args {
        let parts = interp.arena.list_to_vec(clause).unwrap_or_default();
        let Some((&test, body)) = parts.split_first() else {
            return Err(Error::TypeError(
                "cond clause must be a non-empty list".to_owned(),
            ));
        };

        if test == Value::Symbol(interp.else_symbol) {
            return interp.eval_sequence(body, frame, depth);
        }

        match interp.eval_with_depth_tracking(test, frame, depth + 1)? {
            Value::Boolean(true) if body.is_empty() => return Ok(Value::Boolean(true)),
            Value::Boolean(true) => return interp.eval_sequence(body, frame, depth),
            Value::Boolean(false) => continue,
            other => {
                return Err(Error::TypeError(format!(
                    "cond test must be a boolean, got {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Value::Void)
}

macro_rules! boolean_logic_op {
    ($name:ident, $op_name:expr, $short_circuit:literal, $default:literal) => {
        pub(crate) fn $name(
            interp: &mut Interpreter,
            args: &[Value],
            frame: FrameId,
            depth: usize,
        ) -> Result<Value, Error> {
            for &arg in args {
                match interp.eval_with_depth_tracking(arg, frame, depth + 1)? {
                    Value::Boolean($short_circuit) => return Ok(Value::Boolean($short_circuit)),
                    Value::Boolean(_) => continue,
                    other => {
                        return Err(Error::TypeError(format!(
                            concat!("'", $op_name, "' requires boolean arguments, got {}"),
                            other.type_name()
                        )));
                    }
                }
            }

            Ok(Value::Boolean($default))
        }
    };
}

boolean_logic_op!(eval_and, "and", false, true);
boolean_logic_op!(eval_or, "or", true, false);
