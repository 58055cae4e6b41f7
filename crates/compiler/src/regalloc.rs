//! C5: maps virtual registers to dense, non-negative integer slots via a
//! deterministic linear scan (spec.md §4.5).

use crate::ir::{IrFunction, IrModule, VReg};
use std::collections::HashMap;

pub type SlotMap = HashMap<VReg, usize>;

/// Global registers (`id < global_count`) are pre-populated to their own
/// reserved slot; parameters then take `0..arity-1` among the slots that
/// remain, matching the VM's `CALL` convention; everything else is assigned
/// the next free slot in first-use order.
pub(crate) fn allocate_function(func: &IrFunction, global_count: usize) -> SlotMap {
    let mut map = SlotMap::new();
    for reg in 0..global_count as u32 {
        map.insert(VReg(reg), reg as usize);
    }

    let mut next = global_count;
    for p in &func.params {
        reserve(&mut map, &mut next, *p);
    }
    for instr in &func.body {
        if let Some(dst) = instr.dest() {
            reserve(&mut map, &mut next, dst);
        }
        for op in instr.operands() {
            reserve(&mut map, &mut next, op);
        }
    }
    map
}

fn reserve(map: &mut SlotMap, next: &mut usize, reg: VReg) {
    if map.contains_key(&reg) {
        return;
    }
    map.insert(reg, *next);
    *next += 1;
}

/// Runs linear-scan allocation for every function in `module`, keyed by
/// function name.
pub fn allocate(module: &IrModule) -> HashMap<String, SlotMap> {
    let global_count = module.globals.len();
    module.functions.iter().map(|f| (f.name.clone(), allocate_function(f, global_count))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrInstr;
    use crate::types::{Builtin, Type};
    use snow_core::Value;

    fn int_ty() -> Type {
        Type::Builtin(Builtin::Int)
    }

    #[test]
    fn params_occupy_leading_slots() {
        let func = IrFunction {
            name: "add".into(),
            params: vec![VReg(0), VReg(1)],
            return_type: int_ty(),
            body: vec![IrInstr::Return { value: Some(VReg(0)), ty: int_ty() }],
        };
        let map = allocate_function(&func, 0);
        assert_eq!(map[&VReg(0)], 0);
        assert_eq!(map[&VReg(1)], 1);
    }

    #[test]
    fn globals_are_pre_populated_and_locals_skip_past_them() {
        let func = IrFunction {
            name: "main".into(),
            params: vec![],
            return_type: int_ty(),
            body: vec![
                IrInstr::LoadConst { dst: VReg(5), value: Value::Int(1), ty: int_ty() },
                IrInstr::Return { value: Some(VReg(5)), ty: int_ty() },
            ],
        };
        // global_count = 2 means VReg(0), VReg(1) are reserved for globals.
        let map = allocate_function(&func, 2);
        assert_eq!(map[&VReg(0)], 0);
        assert_eq!(map[&VReg(1)], 1);
        assert_eq!(map[&VReg(5)], 2);
    }

    #[test]
    fn slots_are_dense_and_first_use_ordered() {
        let func = IrFunction {
            name: "f".into(),
            params: vec![VReg(0)],
            return_type: int_ty(),
            body: vec![
                IrInstr::LoadConst { dst: VReg(3), value: Value::Int(7), ty: int_ty() },
                IrInstr::BinaryOp {
                    dst: VReg(4),
                    op: crate::ast::BinaryOp::Add,
                    lhs: VReg(0),
                    rhs: VReg(3),
                    operand_ty: int_ty(),
                },
                IrInstr::Return { value: Some(VReg(4)), ty: int_ty() },
            ],
        };
        let map = allocate_function(&func, 0);
        let mut slots: Vec<usize> = map.values().copied().collect();
        slots.sort_unstable();
        assert_eq!(slots, vec![0, 1, 2]);
    }
}
