//! Run-scoped storage for every heap value.
//!
//! The arena is append-only: pairs, frames, closures and string literals are pushed
//! onto typed vectors and addressed by index handles. Nothing is freed individually.
//! [`Arena::release_all`] drops everything at once, and [`Arena::fatal_exit`] does the
//! same before terminating the process.

use string_interner::{DefaultBackend, StringInterner};

use crate::ast::{ClosureId, FrameId, PairId, Sym, TextId, Value};
use crate::environment::Frame;

/// A single cons cell.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PairCell {
    pub head: Value,
    pub tail: Value,
}

/// A user-defined procedure.
#[derive(Debug, Clone, Copy)]
pub struct ClosureData {
    /// A proper list of symbols, a single symbol (variadic), or `Empty`
    pub params: Value,
    /// Proper list of body expressions, evaluated in order
    pub body: Value,
    /// Frame captured at creation
    pub env: FrameId,
}

/// Counts of live allocations, by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    pub pairs: usize,
    pub frames: usize,
    pub closures: usize,
    pub texts: usize,
    pub symbols: usize,
}

impl ArenaStats {
    pub fn total(&self) -> usize {
        self.pairs + self.frames + self.closures + self.texts
    }
}

pub struct Arena {
    pairs: Vec<PairCell>,
    pub(crate) frames: Vec<Frame>,
    closures: Vec<ClosureData>,
    texts: Vec<Box<str>>,
    symbols: StringInterner<DefaultBackend>,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    pub fn new() -> Self {
        Arena {
            pairs: Vec::with_capacity(1024),
            frames: Vec::with_capacity(64),
            closures: Vec::new(),
            texts: Vec::new(),
            symbols: StringInterner::new(),
        }
    }

    /// Allocate a new pair.
    pub fn cons(&mut self, head: Value, tail: Value) -> Value {
        let id = PairId(self.pairs.len() as u32);
        self.pairs.push(PairCell { head, tail });
        Value::Pair(id)
    }

    #[inline]
    pub fn head(&self, id: PairId) -> Value {
        self.pairs[id.index()].head
    }

    #[inline]
    pub fn tail(&self, id: PairId) -> Value {
        self.pairs[id.index()].tail
    }

    #[inline]
    pub fn set_head(&mut self, id: PairId, value: Value) {
        self.pairs[id.index()].head = value;
    }

    #[inline]
    pub fn set_tail(&mut self, id: PairId, value: Value) {
        self.pairs[id.index()].tail = value;
    }

    /// Build a proper list from a slice of values.
    pub fn list(&mut self, values: &[Value]) -> Value {
        self.list_onto(values, Value::Empty)
    }

    /// Build a list of `values` whose final tail is `tail`.
    pub fn list_onto(&mut self, values: &[Value], tail: Value) -> Value {
        values
            .iter()
            .rev()
            .fold(tail, |rest, &value| self.cons(value, rest))
    }

    /// Collect a proper list into a Vec. Returns None if not a proper list.
    pub fn list_to_vec(&self, list: Value) -> Option<Vec<Value>> {
        let mut result = Vec::new();
        let mut current = list;
        loop {
            match current {
                Value::Empty => return Some(result),
                Value::Pair(id) => {
                    result.push(self.head(id));
                    current = self.tail(id);
                }
                _ => return None,
            }
        }
    }

    /// Store a string literal.
    pub fn alloc_text(&mut self, text: &str) -> Value {
        let id = TextId(self.texts.len() as u32);
        self.texts.push(text.into());
        Value::Text(id)
    }

    pub fn text(&self, id: TextId) -> &str {
        &self.texts[id.index()]
    }

    pub fn intern(&mut self, name: &str) -> Sym {
        self.symbols.get_or_intern(name)
    }

    pub fn symbol(&mut self, name: &str) -> Value {
        Value::Symbol(self.intern(name))
    }

    pub fn symbol_name(&self, sym: Sym) -> &str {
        self.symbols.resolve(sym).unwrap_or("#<released-symbol>")
    }

    pub fn alloc_closure(&mut self, closure: ClosureData) -> Value {
        let id = ClosureId(self.closures.len() as u32);
        self.closures.push(closure);
        Value::Closure(id)
    }

    pub fn closure(&self, id: ClosureId) -> ClosureData {
        self.closures[id.index()]
    }

    pub(crate) fn alloc_frame(&mut self, frame: Frame) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(frame);
        id
    }

    /// Compare two trees by shape and content rather than identity.
    /// Closures, primitives and strings compare by content where they have one.
    pub fn structurally_equal(&self, a: Value, b: Value) -> bool {
        let mut pending = vec![(a, b)];
        while let Some((a, b)) = pending.pop() {
            let same = match (a, b) {
                (Value::Pair(x), Value::Pair(y)) => {
                    pending.push((self.tail(x), self.tail(y)));
                    pending.push((self.head(x), self.head(y)));
                    true
                }
                (Value::Text(x), Value::Text(y)) => self.text(x) == self.text(y),
                (Value::Real(x), Value::Real(y)) => x == y || (x.is_nan() && y.is_nan()),
                _ => a == b,
            };
            if !same {
                return false;
            }
        }
        true
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            pairs: self.pairs.len(),
            frames: self.frames.len(),
            closures: self.closures.len(),
            texts: self.texts.len(),
            symbols: self.symbols.len(),
        }
    }

    /// Number of live allocations across all kinds (symbols excluded).
    pub fn allocation_count(&self) -> usize {
        self.stats().total()
    }

    /// Free every allocation at once. All outstanding handles become invalid.
    pub fn release_all(&mut self) {
        let stats = self.stats();
        log::debug!(
            "releasing arena: {} pairs, {} frames, {} closures, {} strings, {} symbols",
            stats.pairs,
            stats.frames,
            stats.closures,
            stats.texts,
            stats.symbols
        );
        self.pairs = Vec::new();
        self.frames = Vec::new();
        self.closures = Vec::new();
        self.texts = Vec::new();
        self.symbols = StringInterner::new();
    }

    /// Release every allocation, then terminate the process with `code`.
    pub fn fatal_exit(&mut self, code: i32) -> ! {
        self.release_all();
        std::process::exit(code)
    }
}
