//! Filesystem syscalls (`FILE_OPEN`, `FILE_READ`, `FILE_WRITE`, `FILE_CLOSE`).

use super::{pop_i64, pop_string};
use crate::error::RuntimeError;
use crate::handle::{HandleTable, Resource};
use snow_core::Value;
use std::fs::OpenOptions;
use std::io::{Read, Write};

fn io_err() -> RuntimeError {
    RuntimeError::InvalidType {
        expected: "accessible file",
        found: "io error".to_string(),
    }
}

/// `path mode file-open` — `mode` is popped first (rightmost argument).
pub fn open(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let mode = pop_string(stack)?;
    let path = pop_string(stack)?;
    let mut opts = OpenOptions::new();
    match mode.as_str() {
        "r" => {
            opts.read(true);
        }
        "w" => {
            opts.write(true).create(true).truncate(true);
        }
        "a" => {
            opts.append(true).create(true);
        }
        _ => {
            opts.read(true).write(true).create(true);
        }
    }
    let file = opts.open(&path).map_err(|_| io_err())?;
    let id = handles.register(Resource::File(file));
    stack.push(Value::Long(id as i64));
    Ok(())
}

/// `handle len file-read` — `len` is popped first.
pub fn read(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let len = pop_i64(stack)?.max(0) as usize;
    let handle = pop_i64(stack)? as u64;
    let Resource::File(file) = handles.get_mut(handle)? else {
        return Err(RuntimeError::InvalidHandle(handle));
    };
    let mut buf = vec![0u8; len];
    let n = file.read(&mut buf).map_err(|_| io_err())?;
    buf.truncate(n);
    stack.push(Value::Str(String::from_utf8_lossy(&buf).into_owned()));
    Ok(())
}

/// `handle value file-write` — `value` is popped first.
pub fn write(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let value = pop_string(stack)?;
    let handle = pop_i64(stack)? as u64;
    let Resource::File(file) = handles.get_mut(handle)? else {
        return Err(RuntimeError::InvalidHandle(handle));
    };
    file.write_all(value.as_bytes()).map_err(|_| io_err())?;
    stack.push(Value::Long(value.len() as i64));
    Ok(())
}

pub fn close(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let handle = pop_i64(stack)? as u64;
    handles.release(handle)
}
