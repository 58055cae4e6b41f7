//! C6: lowers IR to the bytecode `Program` the VM executes (spec.md §4.6).
//!
//! `ProgramBuilder` owns label patching; this module only decides which
//! opcode family (`Num(kind, ..)` vs `R(..)`) each instruction needs and in
//! what order operands hit the stack.

use crate::ast::BinaryOp;
use crate::config::CompilerConfig;
use crate::ir::{IrFunction, IrInstr, IrModule, VReg};
use crate::regalloc::SlotMap;
use crate::types::{Builtin, Type};
use snow_core::opcode::{NumOp, ROp};
use snow_core::program::Operand;
use snow_core::value::NumKind;
use snow_core::{Opcode, Program, ProgramBuilder, Value};
use std::collections::HashMap;

#[derive(Clone, Copy)]
enum Family {
    Num(NumKind),
    Ref,
}

fn num_kind(b: Builtin) -> NumKind {
    match b {
        Builtin::Byte => NumKind::Byte,
        Builtin::Short => NumKind::Short,
        Builtin::Int => NumKind::Int,
        Builtin::Long => NumKind::Long,
        Builtin::Float => NumKind::Float,
        Builtin::Double => NumKind::Double,
        _ => unreachable!("non-numeric builtin reached num_kind"),
    }
}

fn family_of(ty: &Type) -> Family {
    match ty {
        Type::Builtin(b) if b.is_numeric() => Family::Num(num_kind(*b)),
        _ => Family::Ref,
    }
}

fn push_opcode(family: Family) -> Opcode {
    match family {
        Family::Num(k) => Opcode::Num(k, NumOp::Push),
        Family::Ref => Opcode::R(ROp::Push),
    }
}

fn load_opcode(family: Family) -> Opcode {
    match family {
        Family::Num(k) => Opcode::Num(k, NumOp::Load),
        Family::Ref => Opcode::R(ROp::Load),
    }
}

fn store_opcode(family: Family) -> Opcode {
    match family {
        Family::Num(k) => Opcode::Num(k, NumOp::Store),
        Family::Ref => Opcode::R(ROp::Store),
    }
}

fn cmp_opcode_numeric(op: BinaryOp, kind: NumKind) -> Opcode {
    let num_op = match op {
        BinaryOp::Eq => NumOp::Ce,
        BinaryOp::Ne => NumOp::Cne,
        BinaryOp::Gt => NumOp::Cg,
        BinaryOp::Ge => NumOp::Cge,
        BinaryOp::Lt => NumOp::Cl,
        BinaryOp::Le => NumOp::Cle,
        _ => unreachable!("non-comparison BinaryOp reached cmp_opcode_numeric"),
    };
    Opcode::Num(kind, num_op)
}

/// `R` only carries equality; ordering on non-numeric operands (legal per the
/// type checker's bidirectional `is_compatible`, though no source construct
/// in practice produces it) falls back to equality.
fn cmp_opcode_ref(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Ne => Opcode::R(ROp::Cne),
        _ => Opcode::R(ROp::Ce),
    }
}

fn arith_opcode(op: BinaryOp, kind: NumKind) -> Opcode {
    let num_op = match op {
        BinaryOp::Add => NumOp::Add,
        BinaryOp::Sub => NumOp::Sub,
        BinaryOp::Mul => NumOp::Mul,
        BinaryOp::Div => NumOp::Div,
        BinaryOp::Mod => NumOp::Mod,
        BinaryOp::And => NumOp::And,
        BinaryOp::Or => NumOp::Or,
        BinaryOp::Xor => NumOp::Xor,
        _ => unreachable!("non-arithmetic BinaryOp reached arith_opcode"),
    };
    Opcode::Num(kind, num_op)
}

struct BackendCtx<'a> {
    builder: ProgramBuilder,
    slots: &'a SlotMap,
    label_seq: u32,
    debug_trap: bool,
}

impl<'a> BackendCtx<'a> {
    fn fresh_label(&mut self, hint: &str) -> String {
        self.label_seq += 1;
        format!("__be_{hint}_{}", self.label_seq)
    }

    fn slot(&self, reg: VReg) -> usize {
        *self.slots.get(&reg).expect("every vreg used in the body was allocated a slot")
    }

    fn push_slot(&mut self, reg: VReg, family: Family) {
        self.builder.emit(load_opcode(family), vec![Operand::Slot(self.slot(reg))]);
    }

    fn store_slot(&mut self, reg: VReg, family: Family) {
        self.builder.emit(store_opcode(family), vec![Operand::Slot(self.slot(reg))]);
    }

    fn translate(&mut self, instr: &IrInstr) {
        match instr {
            IrInstr::LoadConst { dst, value, ty } => {
                let family = family_of(ty);
                self.builder.emit(push_opcode(family), vec![Operand::Const(value.clone())]);
                self.store_slot(*dst, family);
            }
            IrInstr::BinaryOp { dst, op, lhs, rhs, operand_ty } => {
                self.translate_binary(*dst, *op, *lhs, *rhs, operand_ty);
            }
            IrInstr::UnaryOp { dst, op, operand, ty } => {
                use crate::ast::UnaryOp;
                let family = family_of(ty);
                self.push_slot(*operand, family);
                match op {
                    UnaryOp::Neg => {
                        let Family::Num(kind) = family else {
                            unreachable!("negation of a non-numeric value")
                        };
                        self.builder.emit(Opcode::Num(kind, NumOp::Neg), vec![]);
                    }
                    UnaryOp::Not => {
                        self.builder.emit(Opcode::R(ROp::Not), vec![]);
                    }
                }
                self.store_slot(*dst, family);
            }
            IrInstr::Convert { dst, src, from, to } => {
                self.push_slot(*src, Family::Num(num_kind(*from)));
                self.builder.emit(Opcode::Convert { from: num_kind(*from), to: num_kind(*to) }, vec![]);
                self.store_slot(*dst, Family::Num(num_kind(*to)));
            }
            IrInstr::Call { dst, callee, args } => {
                for a in args {
                    self.push_slot(*a, Family::Ref);
                }
                self.builder.emit_with_label(Opcode::Call, callee, vec![Operand::Int(args.len() as i64)], 0);
                if let Some(dst) = dst {
                    self.store_slot(*dst, Family::Ref);
                }
            }
            IrInstr::Return { value, ty } => {
                if let Some(v) = value {
                    self.push_slot(*v, family_of(ty));
                }
                if self.debug_trap {
                    self.builder.emit(Opcode::DebugTrap, vec![]);
                }
                self.builder.emit(Opcode::Ret, vec![]);
            }
            IrInstr::Label(name) => {
                self.builder.mark_label(name);
            }
            IrInstr::Jump(name) => {
                self.builder.emit_with_label(Opcode::Jump, name, vec![], 0);
            }
            IrInstr::CmpJump { op, lhs, rhs, target, operand_ty } => {
                let family = family_of(operand_ty);
                self.push_slot(*lhs, family);
                self.push_slot(*rhs, family);
                let opcode = match family {
                    Family::Num(kind) => cmp_opcode_numeric(*op, kind),
                    Family::Ref => cmp_opcode_ref(*op),
                };
                self.builder.emit_with_label(opcode, target, vec![], 0);
            }
            IrInstr::Move { dst, src, .. } => {
                self.builder.emit(Opcode::Mov, vec![Operand::Slot(self.slot(*dst)), Operand::Slot(self.slot(*src))]);
            }
            IrInstr::NewArray { dst, elems, .. } => {
                for e in elems {
                    self.push_slot(*e, Family::Ref);
                }
                self.builder.emit(Opcode::R(ROp::NewArray), vec![Operand::Int(elems.len() as i64)]);
                self.store_slot(*dst, Family::Ref);
            }
            IrInstr::NewStruct { dst, type_name, args } => {
                for a in args {
                    self.push_slot(*a, Family::Ref);
                }
                self.builder.emit(
                    Opcode::R(ROp::NewStruct),
                    vec![Operand::Const(Value::Str(type_name.clone())), Operand::Int(args.len() as i64)],
                );
                self.store_slot(*dst, Family::Ref);
            }
            IrInstr::LoadIndex { dst, array, index, ty } => {
                self.push_slot(*array, Family::Ref);
                self.push_slot(*index, Family::Ref);
                self.builder.emit(Opcode::R(ROp::LoadIdx), vec![]);
                self.store_slot(*dst, family_of(ty));
            }
            IrInstr::StoreIndex { array, index, value } => {
                self.push_slot(*array, Family::Ref);
                self.push_slot(*index, Family::Ref);
                self.push_slot(*value, Family::Ref);
                self.builder.emit(Opcode::R(ROp::StoreIdx), vec![]);
            }
            IrInstr::LoadField { dst, object, field_index, ty } => {
                self.push_slot(*object, Family::Ref);
                self.builder.emit(Opcode::R(ROp::LoadFld), vec![Operand::Int(*field_index as i64)]);
                self.store_slot(*dst, family_of(ty));
            }
            IrInstr::StoreField { object, field_index, value } => {
                self.push_slot(*object, Family::Ref);
                self.push_slot(*value, Family::Ref);
                self.builder.emit(Opcode::R(ROp::StoreFld), vec![Operand::Int(*field_index as i64)]);
            }
            IrInstr::Syscall { dst, id, args } => {
                for a in args {
                    self.push_slot(*a, Family::Ref);
                }
                self.builder.emit(Opcode::Syscall, vec![Operand::Int(*id)]);
                if let Some(dst) = dst {
                    self.store_slot(*dst, Family::Ref);
                }
            }
        }
    }

    /// `==`/`<`/etc used as a *value* (not an `if`/`loop` condition) have no
    /// direct opcode — the ISA only offers jump-if-true comparisons — so the
    /// boolean result is materialized via a branch: push `true`, jump past a
    /// `push false` on a hit, otherwise fall into it.
    fn translate_binary(&mut self, dst: VReg, op: BinaryOp, lhs: VReg, rhs: VReg, operand_ty: &Type) {
        use BinaryOp::*;
        let family = family_of(operand_ty);
        match op {
            Add if matches!(family, Family::Ref) => {
                self.push_slot(lhs, Family::Ref);
                self.push_slot(rhs, Family::Ref);
                self.builder.emit(Opcode::R(ROp::Concat), vec![]);
                self.store_slot(dst, Family::Ref);
            }
            Add | Sub | Mul | Div | Mod | And | Or | Xor => {
                self.push_slot(lhs, family);
                self.push_slot(rhs, family);
                let Family::Num(kind) = family else {
                    unreachable!("arithmetic on a non-numeric operand type")
                };
                self.builder.emit(arith_opcode(op, kind), vec![]);
                self.store_slot(dst, family);
            }
            LogicalAnd | LogicalOr => {
                self.push_slot(lhs, Family::Ref);
                self.push_slot(rhs, Family::Ref);
                let rop = if op == LogicalAnd { ROp::And } else { ROp::Or };
                self.builder.emit(Opcode::R(rop), vec![]);
                self.store_slot(dst, Family::Ref);
            }
            Eq | Ne | Lt | Le | Gt | Ge => {
                self.push_slot(lhs, family);
                self.push_slot(rhs, family);
                let opcode = match family {
                    Family::Num(kind) => cmp_opcode_numeric(op, kind),
                    Family::Ref => cmp_opcode_ref(op),
                };
                let l_true = self.fresh_label("cmp_true");
                let l_end = self.fresh_label("cmp_end");
                self.builder.emit_with_label(opcode, &l_true, vec![], 0);
                self.builder.emit(Opcode::R(ROp::Push), vec![Operand::Const(Value::Bool(false))]);
                self.builder.emit_with_label(Opcode::Jump, &l_end, vec![], 0);
                self.builder.mark_label(&l_true);
                self.builder.emit(Opcode::R(ROp::Push), vec![Operand::Const(Value::Bool(true))]);
                self.builder.mark_label(&l_end);
                self.store_slot(dst, Family::Ref);
            }
        }
    }
}

/// Picks the program's entry function: the script wrapper `_start` when any
/// loose top-level statements were parsed, otherwise `main`.
fn entry_function_name(module: &IrModule) -> Option<&str> {
    module
        .functions
        .iter()
        .find(|f| f.name == "_start")
        .or_else(|| module.functions.iter().find(|f| f.name == "main"))
        .map(|f| f.name.as_str())
}

fn synthetic_init_function(module: &IrModule) -> IrFunction {
    IrFunction {
        name: "__init__".to_string(),
        params: Vec::new(),
        return_type: Type::void(),
        body: module.global_init.clone(),
    }
}

/// Emits one `Program` for the whole module: global initializers run first,
/// then control transfers to the entry function, then every function body
/// follows (each addressable by its own name as a label, for `CALL`).
pub fn emit(module: &IrModule, slots: &HashMap<String, SlotMap>, config: &CompilerConfig) -> Program {
    let global_count = module.globals.len();
    let init_fn = synthetic_init_function(module);
    let init_slots = crate::regalloc::allocate_function(&init_fn, global_count);

    let mut builder = ProgramBuilder::new();
    {
        let mut ctx = BackendCtx { builder, slots: &init_slots, label_seq: 0, debug_trap: config.debug_trap };
        for instr in &init_fn.body {
            ctx.translate(instr);
        }
        builder = ctx.builder;
    }

    if let Some(entry_name) = entry_function_name(module) {
        builder.emit_with_label(Opcode::Call, entry_name, vec![Operand::Int(0)], 0);
    }
    builder.emit(Opcode::Halt, vec![]);

    for func in &module.functions {
        let empty = SlotMap::new();
        let func_slots = slots.get(&func.name).unwrap_or(&empty);
        builder.mark_label(&func.name);
        let mut ctx = BackendCtx { builder, slots: func_slots, label_seq: 0, debug_trap: config.debug_trap };
        for instr in &func.body {
            ctx.translate(instr);
        }
        builder = ctx.builder;
    }

    builder.finish_with(0, global_count).expect("backend: every label reachable at lowering time resolves")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic;
    use crate::{ir, regalloc};
    use snow_runtime::vm::{RunMode, Vm};

    fn compile_and_run(src: &str) -> Vec<Value> {
        let (tokens, diags) = Lexer::new(src, "t").scan();
        assert!(diags.is_empty(), "{diags:?}");
        let (items, diags) = Parser::new(&tokens, "t").parse();
        assert!(diags.is_empty(), "{diags:?}");
        let (checked, diags) = semantic::analyze(&items);
        assert!(diags.is_empty(), "{diags:?}");
        let ir_module = ir::lower(&checked);
        let slot_maps = regalloc::allocate(&ir_module);
        let program = emit(&ir_module, &slot_maps, &CompilerConfig::default());
        let mut vm = Vm::new(RunMode::Run);
        vm.run(&program).expect("vm run")
    }

    #[test]
    fn arithmetic_runs_end_to_end() {
        let stack = compile_and_run(
            "function: main returns: int body: return 2 + 3 * 4 end body end function",
        );
        assert_eq!(stack.last(), Some(&Value::Int(14)));
    }

    #[test]
    fn loop_sums_one_to_ten() {
        let stack = compile_and_run(
            "function: main returns: int body: \
               declare s:int = 0 \
               loop init declare i:int = 1 cond i <= 10 step i = i + 1 s = s + i end loop \
               return s \
             end body end function",
        );
        assert_eq!(stack.last(), Some(&Value::Int(55)));
    }

    #[test]
    fn recursive_factorial() {
        let stack = compile_and_run(
            "module: M \
             function: factorial params: n:int returns: int body: \
               if n <= 1 then return 1 end if \
               return n * factorial(n - 1) \
             end body end function \
             function: main returns: int body: return factorial(5) end body end function \
             end module",
        );
        assert_eq!(stack.last(), Some(&Value::Int(120)));
    }

    #[test]
    fn boolean_comparison_materializes_a_value() {
        let stack = compile_and_run(
            "function: main returns: boolean body: declare ok:boolean = 3 < 5 return ok end body end function",
        );
        assert_eq!(stack.last(), Some(&Value::Bool(true)));
    }

    #[test]
    fn float_division_follows_ieee_int_division_truncates() {
        let stack = compile_and_run(
            "function: main returns: double body: return 1.0 / 2.0 end body end function",
        );
        assert_eq!(stack.last(), Some(&Value::Double(0.5)));

        let stack = compile_and_run(
            "function: main returns: int body: return 1 / 2 end body end function",
        );
        assert_eq!(stack.last(), Some(&Value::Int(0)));
    }

    #[test]
    fn string_concat_syscall_runs_without_error() {
        let stack = compile_and_run(
            "function: main returns: int body: \
               declare greeting:string = \"Hello\" + \" \" + \"World!\" \
               println(greeting) \
               return 0 \
             end body end function",
        );
        assert_eq!(stack.last(), Some(&Value::Int(0)));
    }

    #[test]
    fn break_then_print_exits_loop_early() {
        let stack = compile_and_run(
            "function: main returns: int body: \
               declare s:int = 0 \
               loop init declare i:int = 1 cond i <= 10 step i = i + 1 \
                 if i == 4 then break end if \
                 s = s + i \
               end loop \
               println(s) \
               return s \
             end body end function",
        );
        assert_eq!(stack.last(), Some(&Value::Int(6)));
    }
}
