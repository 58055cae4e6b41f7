//! Snow Runtime: the typed stack virtual machine (spec.md §4.7/§5/§7 C7).
//!
//! # Modules
//!
//! - `vm`: the dispatch loop — PC, operand stack, call stack, globals.
//! - `frame`: call-stack frames and per-frame local variable storage.
//! - `handle`: the resource handle table backing file/socket/mutex/condvar
//!   syscalls.
//! - `syscalls`: the fixed syscall table, one module per domain.
//! - `error`: the runtime fault taxonomy.

pub mod error;
pub mod frame;
pub mod handle;
pub mod syscalls;
pub mod vm;

pub use error::RuntimeError;
pub use frame::{CallStack, LocalVariableStore, StackFrame};
pub use handle::{HandleTable, Resource};
pub use vm::{RunMode, Vm};
