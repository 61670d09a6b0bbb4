//! Lexical environments.
//!
//! A frame is an ordered list of bindings plus an optional parent frame. Frames live
//! in the [`Arena`] like every other heap object, so closures can capture them by
//! handle. Within a frame the newest binding for a name shadows older ones; lookup
//! walks outward through parents only when the current frame has no binding at all.

use crate::Error;
use crate::arena::Arena;
use crate::ast::{FrameId, Sym, Value};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Binding {
    pub name: Sym,
    /// `None` while a `letrec` name is waiting for its value
    pub slot: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub(crate) bindings: Vec<Binding>,
    pub(crate) parent: Option<FrameId>,
}

impl Arena {
    pub fn create_frame(&mut self, parent: Option<FrameId>) -> FrameId {
        self.alloc_frame(Frame {
            bindings: Vec::new(),
            parent,
        })
    }

    pub fn frame_parent(&self, frame: FrameId) -> Option<FrameId> {
        self.frames[frame.index()].parent
    }

    /// Add a binding to `frame`. An existing binding for the same name is shadowed,
    /// not replaced.
    pub fn add_binding(&mut self, frame: FrameId, name: Sym, value: Value) {
        self.frames[frame.index()].bindings.push(Binding {
            name,
            slot: Some(value),
        });
    }

    /// Add a binding that has no value yet. Reading it is an error until
    /// [`Arena::fill_placeholder`] stores one.
    pub fn add_placeholder(&mut self, frame: FrameId, name: Sym) {
        self.frames[frame.index()]
            .bindings
            .push(Binding { name, slot: None });
    }

    pub fn fill_placeholder(&mut self, frame: FrameId, name: Sym, value: Value) -> Result<(), Error> {
        match self.local_binding_mut(frame, name) {
            Some(binding) => {
                binding.slot = Some(value);
                Ok(())
            }
            None => Err(Error::InternalError(format!(
                "no placeholder for {} in frame",
                self.symbol_name(name)
            ))),
        }
    }

    /// Resolve `name` starting at `frame` and walking outward.
    pub fn lookup(&self, frame: FrameId, name: Sym) -> Result<Value, Error> {
        let mut current = Some(frame);
        while let Some(id) = current {
            let frame = &self.frames[id.index()];
            if let Some(binding) = frame.bindings.iter().rev().find(|b| b.name == name) {
                return binding
                    .slot
                    .ok_or_else(|| Error::UninitializedBinding(self.symbol_name(name).into()));
            }
            current = frame.parent;
        }
        Err(Error::UnboundSymbol(self.symbol_name(name).into()))
    }

    /// Replace the value of the nearest existing binding for `name`.
    pub fn assign(&mut self, frame: FrameId, name: Sym, value: Value) -> Result<(), Error> {
        let mut current = Some(frame);
        while let Some(id) = current {
            if let Some(binding) = self.local_binding_mut(id, name) {
                binding.slot = Some(value);
                return Ok(());
            }
            current = self.frames[id.index()].parent;
        }
        Err(Error::UnboundSymbol(self.symbol_name(name).into()))
    }

    /// Visible bindings of a single frame, newest first, shadowed entries omitted.
    pub fn frame_bindings(&self, frame: FrameId) -> Vec<(Sym, Option<Value>)> {
        let mut seen = Vec::new();
        let mut result = Vec::new();
        for binding in self.frames[frame.index()].bindings.iter().rev() {
            if !seen.contains(&binding.name) {
                seen.push(binding.name);
                result.push((binding.name, binding.slot));
            }
        }
        result
    }

    fn local_binding_mut(&mut self, frame: FrameId, name: Sym) -> Option<&mut Binding> {
        self.frames[frame.index()]
            .bindings
            .iter_mut()
            .rev()
            .find(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let mut arena = Arena::new();
        let x = arena.intern("x");
        let y = arena.intern("y");
        let z = arena.intern("z");

        let global = arena.create_frame(None);
        arena.add_binding(global, x, Value::Integer(1));
        arena.add_binding(global, y, Value::Integer(2));
        let child = arena.create_frame(Some(global));
        arena.add_binding(child, x, Value::Integer(10));

        assert_eq!(arena.lookup(child, x), Ok(Value::Integer(10)));
        assert_eq!(arena.lookup(child, y), Ok(Value::Integer(2)));
        assert_eq!(arena.lookup(global, x), Ok(Value::Integer(1)));
        assert_eq!(arena.lookup(child, z), Err(Error::UnboundSymbol("z".into())));
        assert_eq!(arena.frame_parent(child), Some(global));
    }

    #[test]
    fn test_newest_binding_shadows() {
        let mut arena = Arena::new();
        let x = arena.intern("x");
        let frame = arena.create_frame(None);
        arena.add_binding(frame, x, Value::Integer(1));
        arena.add_binding(frame, x, Value::Integer(2));
        assert_eq!(arena.lookup(frame, x), Ok(Value::Integer(2)));
        assert_eq!(arena.frame_bindings(frame), vec![(x, Some(Value::Integer(2)))]);
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let mut arena = Arena::new();
        let x = arena.intern("x");
        let global = arena.create_frame(None);
        arena.add_binding(global, x, Value::Integer(1));
        let child = arena.create_frame(Some(global));

        assert_eq!(arena.assign(child, x, Value::Integer(5)), Ok(()));
        assert_eq!(arena.lookup(global, x), Ok(Value::Integer(5)));

        let missing = arena.intern("missing");
        assert_eq!(
            arena.assign(child, missing, Value::Integer(0)),
            Err(Error::UnboundSymbol("missing".into()))
        );
    }

    #[test]
    fn test_placeholders() {
        let mut arena = Arena::new();
        let f = arena.intern("f");
        let frame = arena.create_frame(None);
        arena.add_placeholder(frame, f);

        assert_eq!(
            arena.lookup(frame, f),
            Err(Error::UninitializedBinding("f".into()))
        );
        assert_eq!(arena.fill_placeholder(frame, f, Value::Boolean(true)), Ok(()));
        assert_eq!(arena.lookup(frame, f), Ok(Value::Boolean(true)));
    }
}
