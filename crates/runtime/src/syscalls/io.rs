//! Console I/O syscalls (`PRINT`, `PRINTLN`, `STDERR_WRITE`, `READ_LINE`).

use super::pop;
use crate::error::RuntimeError;
use snow_core::Value;
use std::io::Write;

pub fn print(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    print!("{v}");
    std::io::stdout().flush().ok();
    Ok(())
}

pub fn println(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let v = pop(stack)?;
    println!("{v}");
    Ok(())
}

/// Stub per spec.md §9 Open Questions.
pub fn stderr_write(_stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    Err(RuntimeError::UnsupportedSyscall(2))
}

pub fn read_line(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|_| RuntimeError::InvalidType {
            expected: "readable stdin",
            found: "io error".to_string(),
        })?;
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    stack.push(Value::Str(line));
    Ok(())
}
