//! VM runtime fault taxonomy (spec.md §7 "Runtime (VM)").
//!
//! Every runtime fault is fatal: the VM sets `PC = -1`, writes this error to
//! stderr, and exits non-zero (spec.md §4.7/§7). Faults are data, not Rust
//! panics — `?` propagates them out of the dispatch loop.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    StackUnderflow,
    DivisionByZero,
    InvalidOpcode(String),
    InvalidHandle(u64),
    UnsupportedSyscall(i64),
    InvalidType { expected: &'static str, found: String },
    InvalidJumpTarget(i64),
    InvalidFrame,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackUnderflow => write!(f, "operand stack underflow"),
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
            RuntimeError::InvalidOpcode(m) => write!(f, "invalid opcode: {m}"),
            RuntimeError::InvalidHandle(h) => write!(f, "invalid handle: {h}"),
            RuntimeError::UnsupportedSyscall(id) => write!(f, "unsupported syscall: {id}"),
            RuntimeError::InvalidType { expected, found } => {
                write!(f, "invalid type at opcode: expected {expected}, found {found}")
            }
            RuntimeError::InvalidJumpTarget(addr) => write!(f, "invalid jump target: {addr}"),
            RuntimeError::InvalidFrame => write!(f, "call stack underflow"),
        }
    }
}

impl std::error::Error for RuntimeError {}
