//! `let`, `let*` and `letrec`.
//!
//! All three share the binding-list syntax `((name expr) ...)` followed by a body of
//! one or more expressions, and differ only in which frame each `expr` sees.

use super::{ArgVec, Interpreter, form_arity_error};
use crate::Error;
use crate::ast::{FrameId, Sym, Value};
use crate::builtinops::Arity;

/// Split a binding list into (name, unevaluated expression) pairs
fn binding_list(
    interp: &Interpreter,
    form: &str,
    bindings: Value,
) -> Result<Vec<(Sym, Value)>, Error> {
    let arena = &interp.arena;
    let Some(entries) = arena.list_to_vec(bindings) else {
        return Err(Error::TypeError(format!("{form}: bindings must be a list")));
    };

    entries
        .into_iter()
        .map(|entry| match arena.list_to_vec(entry).as_deref() {
            Some(&[Value::Symbol(name), expr]) => Ok((name, expr)),
            _ => Err(Error::TypeError(format!(
                "{form}: each binding must be a (name expression) list"
            ))),
        })
        .collect()
}

fn reject_duplicates(interp: &Interpreter, bindings: &[(Sym, Value)]) -> Result<(), Error> {
    for (i, (name, _)) in bindings.iter().enumerate() {
        if bindings[..i].iter().any(|(earlier, _)| earlier == name) {
            return Err(Error::DuplicateBinding(
                interp.arena.symbol_name(*name).to_owned(),
            ));
        }
    }
    Ok(())
}

fn split_form<'a>(form: &str, args: &'a [Value]) -> Result<(Value, &'a [Value]), Error> {
    match args {
        [bindings, body @ ..] if !body.is_empty() => Ok((*bindings, body)),
        _ => Err(form_arity_error(form, Arity::AtLeast(2), args.len())),
    }
}

/// Evaluate let special form: every expression sees only the outer frame
pub(crate) fn eval_let(
    interp: &mut Interpreter,
    args: &[Value],
    frame: FrameId,
    depth: usize,
) -> Result<Value, Error> {
    let (bindings, body) = split_form("let", args)?;
    let bindings = binding_list(interp, "let", bindings)?;
    reject_duplicates(interp, &bindings)?;

    let mut values = ArgVec::with_capacity(bindings.len());
    for &(_, expr) in &bindings {
        values.push(interp.eval_with_depth_tracking(expr, frame, depth + 1)?);
    }

    let scope = interp.arena.create_frame(Some(frame));
    for (&(name, _), value) in bindings.iter().zip(values) {
        interp.arena.add_binding(scope, name, value);
    }
    interp.eval_sequence(body, scope, depth)
}

/// Evaluate let* special form: each binding gets its own nested frame
pub(crate) fn eval_let_star(
    interp: &mut Interpreter,
    args: &[Value],
    frame: FrameId,
    depth: usize,
) -> Result<Value, Error> {
    let (bindings, body) = split_form("let*", args)?;
    let bindings = binding_list(interp, "let*", bindings)?;

    let mut scope = frame;
    for (name, expr) in bindings {
        let value = interp.eval_with_depth_tracking(expr, scope, depth + 1)?;
        scope = interp.arena.create_frame(Some(scope));
        interp.arena.add_binding(scope, name, value);
    }
    if scope == frame {
        scope = interp.arena.create_frame(Some(frame));
    }
    interp.eval_sequence(body, scope, depth)
}

/// Evaluate letrec special form: all names are in scope, unfilled, while the
/// expressions run
pub(crate) fn eval_letrec(
    interp: &mut Interpreter,
    args: &[Value],
    frame: FrameId,
    depth: usize,
) -> Result<Value, Error> {
    let (bindings, body) = split_form("letrec", args)?;
    let bindings = binding_list(interp, "letrec", bindings)?;
    reject_duplicates(interp, &bindings)?;

    let scope = interp.arena.create_frame(Some(frame));
    for &(name, _) in &bindings {
        interp.arena.add_placeholder(scope, name);
    }
    for (name, expr) in bindings {
        let value = interp.eval_with_depth_tracking(expr, scope, depth + 1)?;
        interp.arena.fill_placeholder(scope, name, value)?;
    }
    interp.eval_sequence(body, scope, depth)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn run(interp: &mut Interpreter, source: &str) -> Result<String, Error> {
        let forms = interp.parse(source)?;
        let mut result = Value::Void;
        for form in forms {
            result = interp.eval_global(form)?;
        }
        Ok(interp.display(result).to_string())
    }

    #[test]
    fn test_let_frames() {
        let mut interp = Interpreter::default();
        let frames_before = interp.arena().stats().frames;
        run(&mut interp, "(let ((a 1) (b 2)) a)").unwrap();
        assert_eq!(interp.arena().stats().frames, frames_before + 1);

        let frames_before = interp.arena().stats().frames;
        run(&mut interp, "(let* ((a 1) (b 2) (c 3)) a)").unwrap();
        assert_eq!(interp.arena().stats().frames, frames_before + 3);

        let frames_before = interp.arena().stats().frames;
        run(&mut interp, "(let* () 1)").unwrap();
        assert_eq!(interp.arena().stats().frames, frames_before + 1);
    }

    #[test]
    fn test_duplicates_rejected_before_evaluation() {
        let mut interp = Interpreter::default();
        run(&mut interp, "(define hits 0)").unwrap();

        for source in [
            "(let ((x (set! hits 1)) (x 2)) x)",
            "(letrec ((x (set! hits 1)) (x 2)) x)",
        ] {
            let err = run(&mut interp, source).unwrap_err();
            assert_eq!(err, Error::DuplicateBinding("x".into()), "{source}");
        }
        assert_eq!(run(&mut interp, "hits").unwrap(), "0");

        // let* allows a name to be rebound
        assert_eq!(run(&mut interp, "(let* ((x 1) (x 2)) x)").unwrap(), "2");
    }

    #[test]
    fn test_body_defines_stay_local() {
        let mut interp = Interpreter::default();
        assert_eq!(
            run(&mut interp, "(let ((a 1)) (define b 2) (+ a b))").unwrap(),
            "3"
        );
        assert_eq!(
            run(&mut interp, "b").unwrap_err(),
            Error::UnboundSymbol("b".into())
        );
    }

    #[test]
    fn test_malformed_bindings() {
        let mut interp = Interpreter::default();
        let cases = [
            "(let (x) x)",
            "(let ((x 1 2)) x)",
            "(let* ((\"x\" 1)) 1)",
            "(letrec (5) 1)",
        ];
        for source in cases {
            assert!(
                matches!(run(&mut interp, source), Err(Error::TypeError(_))),
                "{source}"
            );
        }
    }
}
