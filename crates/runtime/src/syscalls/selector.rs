//! Selector/epoll-like multiplexing syscalls (`EPOLL_CREATE`, `EPOLL_WAIT`).

use super::pop_i64;
use crate::error::RuntimeError;
use crate::handle::{HandleTable, Resource};
use snow_core::Value;

pub fn epoll_create(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let id = handles.register(Resource::Selector);
    stack.push(Value::Long(id as i64));
    Ok(())
}

/// Stub per spec.md §9 Open Questions.
pub fn epoll_wait(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let _timeout_ms = pop_i64(stack)?;
    let handle = pop_i64(stack)? as u64;
    match handles.get(handle)? {
        Resource::Selector => Err(RuntimeError::UnsupportedSyscall(51)),
        _ => Err(RuntimeError::InvalidHandle(handle)),
    }
}
