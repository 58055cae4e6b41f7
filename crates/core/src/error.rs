//! Errors shared by the textual and binary bytecode (de)serializers.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A textual program line didn't parse (bad mnemonic, bad operand, ...).
    MalformedLine { line: usize, text: String },
    /// A `JUMP`/`CALL`/comparison referenced a label that was never defined.
    UnresolvedLabel(String),
    /// The binary encoding was truncated or otherwise invalid.
    Binary(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::MalformedLine { line, text } => {
                write!(f, "malformed bytecode at line {line}: {text:?}")
            }
            CoreError::UnresolvedLabel(name) => write!(f, "unresolved label: {name}"),
            CoreError::Binary(msg) => write!(f, "binary decode error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}
