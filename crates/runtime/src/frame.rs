//! Call stack and local variable storage (spec.md §3 `StackFrame`, `CallStack`).

use snow_core::Value;

/// A dense, slot-indexed local variable store. Grows on first write to a
/// slot rather than being pre-sized from the allocator's slot count — the
/// VM never needs to know a callee's frame size up front, only that
/// `locals[slot]` is addressable once something has stored there.
#[derive(Debug, Default, Clone)]
pub struct LocalVariableStore {
    slots: Vec<Value>,
}

impl LocalVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_len(&mut self, len: usize) {
        if self.slots.len() < len {
            self.slots.resize(len, Value::Int(0));
        }
    }

    pub fn get(&self, slot: usize) -> Value {
        self.slots.get(slot).cloned().unwrap_or(Value::Int(0))
    }

    pub fn set(&mut self, slot: usize, value: Value) {
        self.ensure_len(slot + 1);
        self.slots[slot] = value;
    }
}

/// A single call-stack record: the instruction to resume the caller at, and
/// the callee's own local variable store (spec.md §3 `StackFrame`).
#[derive(Debug, Clone)]
pub struct StackFrame {
    /// `None` marks the outermost (entry-point) frame: `RET` here halts the
    /// VM rather than resuming a caller.
    pub return_pc: Option<usize>,
    pub locals: LocalVariableStore,
}

#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<StackFrame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
