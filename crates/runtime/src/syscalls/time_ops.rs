//! Time syscalls (`TIME_NOW_MS`, `SLEEP_MS`, `TICK_MS`).

use super::pop_i64;
use crate::error::RuntimeError;
use snow_core::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn time_now_ms(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    stack.push(Value::Long(now.as_millis() as i64));
    Ok(())
}

/// A suspension point (spec.md §5): blocks the interpreter thread for the
/// requested duration.
pub fn sleep_ms(stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    let ms = pop_i64(stack)?;
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
    Ok(())
}

/// Stub per spec.md §9 Open Questions.
pub fn tick_ms(_stack: &mut Vec<Value>) -> Result<(), RuntimeError> {
    Err(RuntimeError::UnsupportedSyscall(12))
}
