//! Syscall table (spec.md §4.7 "System calls", §5 resource lifetimes).
//!
//! `SYSCALL <id>` dispatches to a small per-domain handler, one module per
//! domain (mirroring the teacher's per-concern runtime modules:
//! `io`/`file`/`tcp`/`time_ops`). Each handler pops its arguments off the
//! operand stack in right-to-left source order and may push a result.
//! `StderrWrite`/`TickMs`/`EpollWait` are left as unsupported-syscall stubs
//! per spec.md §9's Open Questions.

mod file;
mod io;
mod selector;
mod sync;
mod tcp;
mod time_ops;

use crate::error::RuntimeError;
use crate::handle::HandleTable;
use snow_core::Value;

fn pop(stack: &mut Vec<Value>) -> Result<Value, RuntimeError> {
    stack.pop().ok_or(RuntimeError::StackUnderflow)
}

fn pop_i64(stack: &mut Vec<Value>) -> Result<i64, RuntimeError> {
    let v = pop(stack)?;
    v.as_i64().ok_or(RuntimeError::InvalidType {
        expected: "numeric",
        found: v.type_name().to_string(),
    })
}

fn pop_string(stack: &mut Vec<Value>) -> Result<String, RuntimeError> {
    match pop(stack)? {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::InvalidType {
            expected: "string",
            found: other.type_name().to_string(),
        }),
    }
}

pub fn dispatch(
    id: i64,
    stack: &mut Vec<Value>,
    handles: &mut HandleTable,
) -> Result<(), RuntimeError> {
    match id {
        0 => io::print(stack),
        1 => io::println(stack),
        2 => io::stderr_write(stack),
        3 => io::read_line(stack),
        10 => time_ops::time_now_ms(stack),
        11 => time_ops::sleep_ms(stack),
        12 => time_ops::tick_ms(stack),
        20 => file::open(stack, handles),
        21 => file::read(stack, handles),
        22 => file::write(stack, handles),
        23 => file::close(stack, handles),
        30 => tcp::connect(stack, handles),
        31 => tcp::send(stack, handles),
        32 => tcp::recv(stack, handles),
        33 => tcp::close(stack, handles),
        40 => sync::mutex_new(stack, handles),
        41 => sync::mutex_lock(stack, handles),
        42 => sync::mutex_unlock(stack, handles),
        43 => sync::cond_new(stack, handles),
        44 => sync::cond_wait(stack, handles),
        45 => sync::cond_signal(stack, handles),
        50 => selector::epoll_create(stack, handles),
        51 => selector::epoll_wait(stack, handles),
        other => Err(RuntimeError::UnsupportedSyscall(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_syscall_is_unsupported() {
        let mut stack = Vec::new();
        let mut handles = HandleTable::new();
        assert_eq!(
            dispatch(999, &mut stack, &mut handles),
            Err(RuntimeError::UnsupportedSyscall(999))
        );
    }

    #[test]
    fn stub_syscalls_report_unsupported() {
        let mut stack = Vec::new();
        let mut handles = HandleTable::new();
        assert!(matches!(
            dispatch(2, &mut stack, &mut handles),
            Err(RuntimeError::UnsupportedSyscall(2))
        ));
        assert!(matches!(
            dispatch(12, &mut stack, &mut handles),
            Err(RuntimeError::UnsupportedSyscall(12))
        ));
    }
}
