//! TCP socket syscalls (`TCP_CONNECT`, `TCP_SEND`, `TCP_RECV`, `TCP_CLOSE`).

use super::{pop_i64, pop_string};
use crate::error::RuntimeError;
use crate::handle::{HandleTable, Resource};
use snow_core::Value;
use std::io::{Read, Write};
use std::net::TcpStream;

fn io_err() -> RuntimeError {
    RuntimeError::InvalidType {
        expected: "connected socket",
        found: "io error".to_string(),
    }
}

/// `host port tcp-connect` — `port` is popped first.
pub fn connect(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let port = pop_i64(stack)?;
    let host = pop_string(stack)?;
    let stream = TcpStream::connect((host.as_str(), port as u16)).map_err(|_| io_err())?;
    let id = handles.register(Resource::Tcp(stream));
    stack.push(Value::Long(id as i64));
    Ok(())
}

/// `handle value tcp-send` — `value` is popped first.
pub fn send(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let value = pop_string(stack)?;
    let handle = pop_i64(stack)? as u64;
    let Resource::Tcp(stream) = handles.get_mut(handle)? else {
        return Err(RuntimeError::InvalidHandle(handle));
    };
    stream.write_all(value.as_bytes()).map_err(|_| io_err())?;
    stack.push(Value::Long(value.len() as i64));
    Ok(())
}

/// `handle len tcp-recv` — `len` is popped first.
pub fn recv(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let len = pop_i64(stack)?.max(0) as usize;
    let handle = pop_i64(stack)? as u64;
    let Resource::Tcp(stream) = handles.get_mut(handle)? else {
        return Err(RuntimeError::InvalidHandle(handle));
    };
    let mut buf = vec![0u8; len];
    let n = stream.read(&mut buf).map_err(|_| io_err())?;
    buf.truncate(n);
    stack.push(Value::Str(String::from_utf8_lossy(&buf).into_owned()));
    Ok(())
}

pub fn close(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let handle = pop_i64(stack)? as u64;
    handles.release(handle)
}
