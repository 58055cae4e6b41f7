//! The typed stack virtual machine (spec.md §4.7 C7).
//!
//! A single `match` over [`Opcode`] drives the hot loop — the enum-dispatch
//! core design note from spec.md §9 ("a single enum with a match-per-opcode
//! dispatch loop... enables the hot path to stay branch-predictor-friendly").

use crate::error::RuntimeError;
use crate::frame::{CallStack, LocalVariableStore, StackFrame};
use crate::handle::HandleTable;
use crate::syscalls;
use snow_core::opcode::{NumOp, ROp};
use snow_core::program::{Operand, Program};
use snow_core::value::NumKind;
use snow_core::{Opcode, Value};

/// In `Debug` mode `DEBUG_TRAP` surrenders control to an inspector hook
/// instead of being a no-op (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Run,
    Debug,
}

pub struct Vm {
    handles: HandleTable,
    mode: RunMode,
}

/// Splits an absolute slot number into (is_global, index-within-its-store),
/// per the allocator's global-skipping scheme (spec.md §4.5): globals occupy
/// the contiguous prefix `0..global_slot_count`, so any slot at or above that
/// belongs to the current frame's locals, offset back down to a dense index.
fn route_slot(slot: usize, global_slot_count: usize) -> (bool, usize) {
    if slot < global_slot_count {
        (true, slot)
    } else {
        (false, slot - global_slot_count)
    }
}

impl Vm {
    pub fn new(mode: RunMode) -> Self {
        Vm {
            handles: HandleTable::new(),
            mode,
        }
    }

    fn load_slot(
        &self,
        slot: usize,
        globals: &LocalVariableStore,
        locals: &LocalVariableStore,
        global_slot_count: usize,
    ) -> Value {
        let (is_global, idx) = route_slot(slot, global_slot_count);
        if is_global {
            globals.get(idx)
        } else {
            locals.get(idx)
        }
    }

    fn store_slot(
        &self,
        slot: usize,
        value: Value,
        globals: &mut LocalVariableStore,
        locals: &mut LocalVariableStore,
        global_slot_count: usize,
    ) {
        let (is_global, idx) = route_slot(slot, global_slot_count);
        if is_global {
            globals.set(idx, value);
        } else {
            locals.set(idx, value);
        }
    }

    /// Runs `program` to completion, returning the operand stack at halt
    /// (spec.md §8 scenario 1 observes the return value "at the top of the
    /// operand stack at halt").
    pub fn run(&mut self, program: &Program) -> Result<Vec<Value>, RuntimeError> {
        let result = self.run_inner(program);
        self.handles.shutdown();
        result
    }

    fn run_inner(&mut self, program: &Program) -> Result<Vec<Value>, RuntimeError> {
        let global_slot_count = program.global_slot_count;
        let mut globals = LocalVariableStore::new();
        let mut operand_stack: Vec<Value> = Vec::new();
        let mut call_stack = CallStack::new();
        call_stack.push(StackFrame {
            return_pc: None,
            locals: LocalVariableStore::new(),
        });

        let mut pc: i64 = program.entry as i64;

        loop {
            if pc < 0 {
                break;
            }
            let idx = pc as usize;
            let instr = program
                .instructions
                .get(idx)
                .ok_or(RuntimeError::InvalidJumpTarget(pc))?;

            pc = self.step(
                instr.opcode,
                &instr.operands,
                pc,
                &mut operand_stack,
                &mut globals,
                &mut call_stack,
                global_slot_count,
            )?;
        }

        Ok(operand_stack)
    }

    #[allow(clippy::too_many_arguments)]
    fn step(
        &mut self,
        opcode: Opcode,
        operands: &[Operand],
        pc: i64,
        stack: &mut Vec<Value>,
        globals: &mut LocalVariableStore,
        call_stack: &mut CallStack,
        global_slot_count: usize,
    ) -> Result<i64, RuntimeError> {
        match opcode {
            Opcode::Num(kind, op) => {
                self.step_num(kind, op, operands, pc, stack, globals, call_stack, global_slot_count)
            }
            Opcode::Convert { from, to } => {
                let v = pop(stack)?;
                let converted = v.convert(to).ok_or(RuntimeError::InvalidType {
                    expected: "numeric",
                    found: v.type_name().to_string(),
                })?;
                let _ = from;
                stack.push(converted);
                Ok(pc + 1)
            }
            Opcode::R(op) => {
                self.step_ref(op, operands, pc, stack, globals, call_stack, global_slot_count)
            }
            Opcode::Pop => {
                pop(stack)?;
                Ok(pc + 1)
            }
            Opcode::Dup => {
                let top = stack.last().cloned().ok_or(RuntimeError::StackUnderflow)?;
                stack.push(top);
                Ok(pc + 1)
            }
            Opcode::Swap => {
                let b = pop(stack)?;
                let a = pop(stack)?;
                stack.push(b);
                stack.push(a);
                Ok(pc + 1)
            }
            Opcode::Jump => {
                let target = addr_operand(operands, 0)?;
                Ok(target as i64)
            }
            Opcode::Call => {
                let target = addr_operand(operands, 0)?;
                let nargs = int_operand(operands, 1)?;
                let mut args = Vec::with_capacity(nargs as usize);
                for _ in 0..nargs {
                    args.push(pop(stack)?);
                }
                args.reverse();
                let mut callee_locals = LocalVariableStore::new();
                for (i, v) in args.into_iter().enumerate() {
                    callee_locals.set(i, v);
                }
                call_stack.push(StackFrame {
                    return_pc: Some((pc + 1) as usize),
                    locals: callee_locals,
                });
                Ok(target as i64)
            }
            Opcode::Ret => {
                let finished = call_stack.pop().ok_or(RuntimeError::InvalidFrame)?;
                match finished.return_pc {
                    Some(return_pc) => Ok(return_pc as i64),
                    None => Ok(-1),
                }
            }
            Opcode::Mov => {
                let dst = slot_operand(operands, 0)?;
                let src = slot_operand(operands, 1)?;
                let frame = call_stack.current_mut().ok_or(RuntimeError::InvalidFrame)?;
                let v = self.load_slot(src, globals, &frame.locals, global_slot_count);
                self.store_slot(dst, v, globals, &mut frame.locals, global_slot_count);
                Ok(pc + 1)
            }
            Opcode::Halt => Ok(-1),
            Opcode::Syscall => {
                let id = int_operand(operands, 0)?;
                syscalls::dispatch(id, stack, &mut self.handles)?;
                Ok(pc + 1)
            }
            Opcode::DebugTrap => {
                if self.mode == RunMode::Debug {
                    eprintln!("snow: DEBUG_TRAP at pc={pc}, stack={stack:?}");
                }
                Ok(pc + 1)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn step_num(
        &self,
        kind: NumKind,
        op: NumOp,
        operands: &[Operand],
        pc: i64,
        stack: &mut Vec<Value>,
        globals: &mut LocalVariableStore,
        call_stack: &mut CallStack,
        global_slot_count: usize,
    ) -> Result<i64, RuntimeError> {
        match op {
            NumOp::Push => {
                let v = const_operand(operands, 0)?;
                stack.push(v);
                Ok(pc + 1)
            }
            NumOp::Load => {
                let slot = slot_operand(operands, 0)?;
                let frame = call_stack.current_mut().ok_or(RuntimeError::InvalidFrame)?;
                let v = self.load_slot(slot, globals, &frame.locals, global_slot_count);
                stack.push(v);
                Ok(pc + 1)
            }
            NumOp::Store => {
                let slot = slot_operand(operands, 0)?;
                let v = pop(stack)?;
                let frame = call_stack.current_mut().ok_or(RuntimeError::InvalidFrame)?;
                self.store_slot(slot, v, globals, &mut frame.locals, global_slot_count);
                Ok(pc + 1)
            }
            NumOp::Inc => {
                let slot = slot_operand(operands, 0)?;
                let delta = int_operand(operands, 1)?;
                let frame = call_stack.current_mut().ok_or(RuntimeError::InvalidFrame)?;
                let cur = self.load_slot(slot, globals, &frame.locals, global_slot_count);
                let next = Value::Long(cur.as_i64().unwrap_or(0) + delta)
                    .convert(kind)
                    .expect("numeric conversion");
                self.store_slot(slot, next, globals, &mut frame.locals, global_slot_count);
                Ok(pc + 1)
            }
            NumOp::Neg => {
                let a = pop(stack)?;
                stack.push(numeric_neg(kind, a)?);
                Ok(pc + 1)
            }
            NumOp::Add | NumOp::Sub | NumOp::Mul | NumOp::Div | NumOp::Mod | NumOp::And
            | NumOp::Or | NumOp::Xor => {
                let b = pop(stack)?;
                let a = pop(stack)?;
                stack.push(numeric_binop(kind, op, a, b)?);
                Ok(pc + 1)
            }
            NumOp::Ce | NumOp::Cne | NumOp::Cg | NumOp::Cge | NumOp::Cl | NumOp::Cle => {
                let target = addr_operand(operands, 0)?;
                let b = pop(stack)?;
                let a = pop(stack)?;
                if numeric_compare(kind, op, a, b)? {
                    Ok(target as i64)
                } else {
                    Ok(pc + 1)
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn step_ref(
        &self,
        op: ROp,
        operands: &[Operand],
        pc: i64,
        stack: &mut Vec<Value>,
        globals: &mut LocalVariableStore,
        call_stack: &mut CallStack,
        global_slot_count: usize,
    ) -> Result<i64, RuntimeError> {
        match op {
            ROp::Push => {
                let v = const_operand(operands, 0)?;
                stack.push(v);
                Ok(pc + 1)
            }
            ROp::Load => {
                let slot = slot_operand(operands, 0)?;
                let frame = call_stack.current_mut().ok_or(RuntimeError::InvalidFrame)?;
                stack.push(self.load_slot(slot, globals, &frame.locals, global_slot_count));
                Ok(pc + 1)
            }
            ROp::Store => {
                let slot = slot_operand(operands, 0)?;
                let v = pop(stack)?;
                let frame = call_stack.current_mut().ok_or(RuntimeError::InvalidFrame)?;
                self.store_slot(slot, v, globals, &mut frame.locals, global_slot_count);
                Ok(pc + 1)
            }
            ROp::Ce | ROp::Cne => {
                let target = addr_operand(operands, 0)?;
                let b = pop(stack)?;
                let a = pop(stack)?;
                let eq = a == b;
                let hit = if op == ROp::Ce { eq } else { !eq };
                if hit {
                    Ok(target as i64)
                } else {
                    Ok(pc + 1)
                }
            }
            ROp::And | ROp::Or => {
                let b = as_bool(pop(stack)?)?;
                let a = as_bool(pop(stack)?)?;
                let result = if op == ROp::And { a && b } else { a || b };
                stack.push(Value::Bool(result));
                Ok(pc + 1)
            }
            ROp::Not => {
                let a = as_bool(pop(stack)?)?;
                stack.push(Value::Bool(!a));
                Ok(pc + 1)
            }
            ROp::Concat => {
                let b = as_string(pop(stack)?)?;
                let a = as_string(pop(stack)?)?;
                stack.push(Value::Str(a + &b));
                Ok(pc + 1)
            }
            ROp::NewArray => {
                let count = int_operand(operands, 0)? as usize;
                let mut elems = Vec::with_capacity(count);
                for _ in 0..count {
                    elems.push(pop(stack)?);
                }
                elems.reverse();
                stack.push(Value::new_array(elems));
                Ok(pc + 1)
            }
            ROp::NewStruct => {
                let type_name = match const_operand(operands, 0)? {
                    Value::Str(s) => s,
                    other => {
                        return Err(RuntimeError::InvalidType {
                            expected: "string",
                            found: other.type_name().to_string(),
                        })
                    }
                };
                let count = int_operand(operands, 1)? as usize;
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    fields.push(pop(stack)?);
                }
                fields.reverse();
                stack.push(Value::new_struct(type_name, fields));
                Ok(pc + 1)
            }
            ROp::LoadIdx => {
                let index = int_operand_from_stack(pop(stack)?)?;
                let array = pop(stack)?;
                let Value::Array(cell) = array else {
                    return Err(RuntimeError::InvalidType {
                        expected: "array",
                        found: array.type_name().to_string(),
                    });
                };
                let elems = cell.borrow();
                let v = elems
                    .get(index as usize)
                    .cloned()
                    .ok_or(RuntimeError::InvalidJumpTarget(index))?;
                stack.push(v);
                Ok(pc + 1)
            }
            ROp::StoreIdx => {
                let value = pop(stack)?;
                let index = int_operand_from_stack(pop(stack)?)?;
                let array = pop(stack)?;
                let Value::Array(cell) = array else {
                    return Err(RuntimeError::InvalidType {
                        expected: "array",
                        found: array.type_name().to_string(),
                    });
                };
                let mut elems = cell.borrow_mut();
                let slot = elems
                    .get_mut(index as usize)
                    .ok_or(RuntimeError::InvalidJumpTarget(index))?;
                *slot = value;
                Ok(pc + 1)
            }
            ROp::LoadFld => {
                let field_idx = int_operand(operands, 0)? as usize;
                let s = pop(stack)?;
                let Value::Struct(cell) = s else {
                    return Err(RuntimeError::InvalidType {
                        expected: "struct",
                        found: s.type_name().to_string(),
                    });
                };
                let v = cell
                    .borrow()
                    .fields
                    .get(field_idx)
                    .cloned()
                    .ok_or(RuntimeError::InvalidJumpTarget(field_idx as i64))?;
                stack.push(v);
                Ok(pc + 1)
            }
            ROp::StoreFld => {
                let field_idx = int_operand(operands, 0)? as usize;
                let value = pop(stack)?;
                let s = pop(stack)?;
                let Value::Struct(cell) = s else {
                    return Err(RuntimeError::InvalidType {
                        expected: "struct",
                        found: s.type_name().to_string(),
                    });
                };
                let mut inst = cell.borrow_mut();
                let slot = inst
                    .fields
                    .get_mut(field_idx)
                    .ok_or(RuntimeError::InvalidJumpTarget(field_idx as i64))?;
                *slot = value;
                Ok(pc + 1)
            }
        }
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, RuntimeError> {
    stack.pop().ok_or(RuntimeError::StackUnderflow)
}

fn as_bool(v: Value) -> Result<bool, RuntimeError> {
    match v {
        Value::Bool(b) => Ok(b),
        other => Err(RuntimeError::InvalidType {
            expected: "boolean",
            found: other.type_name().to_string(),
        }),
    }
}

fn as_string(v: Value) -> Result<String, RuntimeError> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::InvalidType {
            expected: "string",
            found: other.type_name().to_string(),
        }),
    }
}

fn int_operand_from_stack(v: Value) -> Result<i64, RuntimeError> {
    v.as_i64().ok_or(RuntimeError::InvalidType {
        expected: "numeric index",
        found: v.type_name().to_string(),
    })
}

fn slot_operand(operands: &[Operand], i: usize) -> Result<usize, RuntimeError> {
    match operands.get(i) {
        Some(Operand::Slot(n)) => Ok(*n),
        other => Err(RuntimeError::InvalidOpcode(format!(
            "expected slot operand, found {other:?}"
        ))),
    }
}

fn addr_operand(operands: &[Operand], i: usize) -> Result<usize, RuntimeError> {
    match operands.get(i) {
        Some(Operand::Addr(n)) => Ok(*n),
        other => Err(RuntimeError::InvalidOpcode(format!(
            "expected address operand, found {other:?}"
        ))),
    }
}

fn int_operand(operands: &[Operand], i: usize) -> Result<i64, RuntimeError> {
    match operands.get(i) {
        Some(Operand::Int(n)) => Ok(*n),
        other => Err(RuntimeError::InvalidOpcode(format!(
            "expected integer operand, found {other:?}"
        ))),
    }
}

fn const_operand(operands: &[Operand], i: usize) -> Result<Value, RuntimeError> {
    match operands.get(i) {
        Some(Operand::Const(v)) => Ok(v.clone()),
        other => Err(RuntimeError::InvalidOpcode(format!(
            "expected constant operand, found {other:?}"
        ))),
    }
}

fn numeric_binop(kind: NumKind, op: NumOp, a: Value, b: Value) -> Result<Value, RuntimeError> {
    if kind.is_floating() {
        let af = a.as_f64().ok_or(type_err(&a))?;
        let bf = b.as_f64().ok_or(type_err(&b))?;
        let result = match op {
            NumOp::Add => af + bf,
            NumOp::Sub => af - bf,
            NumOp::Mul => af * bf,
            NumOp::Div => af / bf, // IEEE-754: division by zero yields inf/NaN, not an error.
            NumOp::Mod => af % bf,
            _ => unreachable!("bitwise ops are never emitted for floating kinds"),
        };
        return Ok(Value::Double(result).convert(kind).expect("numeric"));
    }
    let ai = a.as_i64().ok_or(type_err(&a))?;
    let bi = b.as_i64().ok_or(type_err(&b))?;
    let result = match op {
        NumOp::Add => ai.wrapping_add(bi),
        NumOp::Sub => ai.wrapping_sub(bi),
        NumOp::Mul => ai.wrapping_mul(bi),
        NumOp::Div => {
            if bi == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            ai.wrapping_div(bi)
        }
        NumOp::Mod => {
            if bi == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            ai.wrapping_rem(bi)
        }
        NumOp::And => ai & bi,
        NumOp::Or => ai | bi,
        NumOp::Xor => ai ^ bi,
        _ => unreachable!(),
    };
    Ok(Value::Long(result).convert(kind).expect("numeric"))
}

fn numeric_neg(kind: NumKind, a: Value) -> Result<Value, RuntimeError> {
    if kind.is_floating() {
        let af = a.as_f64().ok_or(type_err(&a))?;
        Ok(Value::Double(-af).convert(kind).expect("numeric"))
    } else {
        let ai = a.as_i64().ok_or(type_err(&a))?;
        Ok(Value::Long(ai.wrapping_neg()).convert(kind).expect("numeric"))
    }
}

fn numeric_compare(kind: NumKind, op: NumOp, a: Value, b: Value) -> Result<bool, RuntimeError> {
    if kind.is_floating() {
        let af = a.as_f64().ok_or(type_err(&a))?;
        let bf = b.as_f64().ok_or(type_err(&b))?;
        return Ok(match op {
            NumOp::Ce => af == bf,
            NumOp::Cne => af != bf,
            NumOp::Cg => af > bf,
            NumOp::Cge => af >= bf,
            NumOp::Cl => af < bf,
            NumOp::Cle => af <= bf,
            _ => unreachable!(),
        });
    }
    let ai = a.as_i64().ok_or(type_err(&a))?;
    let bi = b.as_i64().ok_or(type_err(&b))?;
    Ok(match op {
        NumOp::Ce => ai == bi,
        NumOp::Cne => ai != bi,
        NumOp::Cg => ai > bi,
        NumOp::Cge => ai >= bi,
        NumOp::Cl => ai < bi,
        NumOp::Cle => ai <= bi,
        _ => unreachable!(),
    })
}

fn type_err(v: &Value) -> RuntimeError {
    RuntimeError::InvalidType {
        expected: "numeric",
        found: v.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snow_core::opcode::NumOp;
    use snow_core::program::{Operand, ProgramBuilder};
    use snow_core::Value;

    fn push_const(b: &mut ProgramBuilder, kind: NumKind, v: Value) {
        b.emit(Opcode::Num(kind, NumOp::Push), vec![Operand::Const(v)]);
    }

    #[test]
    fn arithmetic_scenario() {
        // 2 + 3 * 4 == 14
        let mut b = ProgramBuilder::new();
        push_const(&mut b, NumKind::Int, Value::Int(3));
        push_const(&mut b, NumKind::Int, Value::Int(4));
        b.emit(Opcode::Num(NumKind::Int, NumOp::Mul), vec![]);
        push_const(&mut b, NumKind::Int, Value::Int(2));
        // stack is now [12, 2]; swap so 2 is first operand like the source expr.
        b.emit(Opcode::Swap, vec![]);
        b.emit(Opcode::Num(NumKind::Int, NumOp::Add), vec![]);
        b.emit(Opcode::Halt, vec![]);
        let program = b.finish().unwrap();

        let mut vm = Vm::new(RunMode::Run);
        let result = vm.run(&program).unwrap();
        assert_eq!(result, vec![Value::Int(14)]);
    }

    #[test]
    fn integer_division_by_zero_is_fatal() {
        let mut b = ProgramBuilder::new();
        push_const(&mut b, NumKind::Int, Value::Int(1));
        push_const(&mut b, NumKind::Int, Value::Int(0));
        b.emit(Opcode::Num(NumKind::Int, NumOp::Div), vec![]);
        b.emit(Opcode::Halt, vec![]);
        let program = b.finish().unwrap();

        let mut vm = Vm::new(RunMode::Run);
        assert_eq!(vm.run(&program), Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn float_division_by_zero_is_ieee_not_fatal() {
        let mut b = ProgramBuilder::new();
        push_const(&mut b, NumKind::Double, Value::Double(1.0));
        push_const(&mut b, NumKind::Double, Value::Double(0.0));
        b.emit(Opcode::Num(NumKind::Double, NumOp::Div), vec![]);
        b.emit(Opcode::Halt, vec![]);
        let program = b.finish().unwrap();

        let mut vm = Vm::new(RunMode::Run);
        let result = vm.run(&program).unwrap();
        assert_eq!(result, vec![Value::Double(f64::INFINITY)]);
    }

    #[test]
    fn call_and_return_hand_off_value() {
        // fn double(n) -> n + n; call double(21)
        let mut b = ProgramBuilder::new();
        b.emit_with_label(Opcode::Jump, "main", vec![], 0);
        b.mark_label("double");
        b.emit(
            Opcode::Num(NumKind::Int, NumOp::Load),
            vec![Operand::Slot(0)],
        );
        b.emit(
            Opcode::Num(NumKind::Int, NumOp::Load),
            vec![Operand::Slot(0)],
        );
        b.emit(Opcode::Num(NumKind::Int, NumOp::Add), vec![]);
        b.emit(Opcode::Ret, vec![]);
        b.mark_label("main");
        push_const(&mut b, NumKind::Int, Value::Int(21));
        b.emit_with_label(Opcode::Call, "double", vec![Operand::Int(1)], 0);
        b.emit(Opcode::Halt, vec![]);
        let program = b.finish().unwrap();

        let mut vm = Vm::new(RunMode::Run);
        let result = vm.run(&program).unwrap();
        assert_eq!(result, vec![Value::Int(42)]);
    }
}
