//! Snow Core: shared value and bytecode types for the Snow toolchain
//!
//! This crate is the seam between the compiler backend (C6), which emits a
//! bytecode [`Program`], and the runtime (C7), which executes one. Keeping
//! `Value` and the opcode catalog here means both sides agree on a single
//! definition of "what a number/string/array looks like on the stack" and
//! "what the fixed opcode set is", without either crate depending on the
//! other's internals.
//!
//! # Modules
//!
//! - `value`: the boxed primitive value (`Value`) shared by IR constants and
//!   VM stack slots, plus the numeric widening/narrowing rules.
//! - `opcode`: the fixed opcode catalog, organized by primitive-type family.
//! - `program`: the decoded instruction stream (`Program`), its textual and
//!   binary encodings, and the builder used to patch forward label
//!   references.
//! - `error`: errors shared by the textual/binary (de)serializers.

pub mod error;
pub mod opcode;
pub mod program;
pub mod value;

pub use error::CoreError;
pub use opcode::Opcode;
pub use program::{Instruction, Operand, Program, ProgramBuilder};
pub use value::Value;
