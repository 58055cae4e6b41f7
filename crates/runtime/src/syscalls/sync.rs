//! Synchronization syscalls (`MUTEX_*`, `COND_*`).
//!
//! `COND_WAIT`/blocking `MUTEX_LOCK` are suspension points (spec.md §5):
//! they block the interpreter's host thread, but never touch interpreter
//! state (PC, stacks) beyond the arguments/result they were handed.

use super::pop_i64;
use crate::error::RuntimeError;
use crate::handle::{HandleTable, LockBox, Resource};
use snow_core::Value;
use std::sync::Arc;

fn lock_box(handles: &HandleTable, id: u64, is_mutex: bool) -> Result<Arc<LockBox>, RuntimeError> {
    match handles.get(id)? {
        Resource::Mutex(b) if is_mutex => Ok(b.clone()),
        Resource::Cond(b) if !is_mutex => Ok(b.clone()),
        _ => Err(RuntimeError::InvalidHandle(id)),
    }
}

fn do_lock(b: &LockBox) {
    let mut locked = b.state.lock().expect("lock poisoned");
    while *locked {
        locked = b.cond.wait(locked).expect("lock poisoned");
    }
    *locked = true;
}

fn do_unlock(b: &LockBox) {
    let mut locked = b.state.lock().expect("lock poisoned");
    *locked = false;
    b.cond.notify_one();
}

pub fn mutex_new(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let id = handles.register(Resource::Mutex(LockBox::new(false)));
    stack.push(Value::Long(id as i64));
    Ok(())
}

pub fn mutex_lock(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let id = pop_i64(stack)? as u64;
    let b = lock_box(handles, id, true)?;
    do_lock(&b);
    Ok(())
}

pub fn mutex_unlock(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let id = pop_i64(stack)? as u64;
    let b = lock_box(handles, id, true)?;
    do_unlock(&b);
    Ok(())
}

pub fn cond_new(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let id = handles.register(Resource::Cond(LockBox::new(false)));
    stack.push(Value::Long(id as i64));
    Ok(())
}

/// `cond mutex cond-wait` — `mutex` is popped first: release it, block until
/// signaled, then reacquire it before returning.
pub fn cond_wait(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let mutex_id = pop_i64(stack)? as u64;
    let cond_id = pop_i64(stack)? as u64;
    let mutex_box = lock_box(handles, mutex_id, true)?;
    let cond_box = lock_box(handles, cond_id, false)?;

    do_unlock(&mutex_box);

    let mut signaled = cond_box.state.lock().expect("lock poisoned");
    while !*signaled {
        signaled = cond_box.cond.wait(signaled).expect("lock poisoned");
    }
    *signaled = false;
    drop(signaled);

    do_lock(&mutex_box);
    Ok(())
}

pub fn cond_signal(stack: &mut Vec<Value>, handles: &mut HandleTable) -> Result<(), RuntimeError> {
    let id = pop_i64(stack)? as u64;
    let b = lock_box(handles, id, false)?;
    let mut signaled = b.state.lock().expect("lock poisoned");
    *signaled = true;
    b.cond.notify_one();
    Ok(())
}
