//! The fixed Snow bytecode opcode catalog (spec.md §4.6/§6).
//!
//! Opcodes are grouped into families by primitive type prefix (`B_` byte8,
//! `S_` short16, `I_` int32, `L_` long64, `F_` float32, `D_` double64),
//! reference (`R_`, covering string/boolean/array/struct values), numeric
//! conversion (`X2Y`), stack (`POP`/`DUP`/`SWAP`), flow
//! (`JUMP`/`CALL`/`RET`), register (`MOV`), and system
//! (`HALT`/`SYSCALL`/`DEBUG_TRAP`). The type-to-opcode mapping is centralized
//! here, in one place, per spec.md §4.6's "Type selection for ops" note.

use crate::value::NumKind;
use std::fmt;

/// The operation within a numeric family. Bitwise ops (`And`/`Or`/`Xor`) are
/// only meaningful for the integral kinds (byte/short/int/long); the backend
/// never emits them for float/double (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Inc,
    And,
    Or,
    Xor,
    Push,
    Load,
    Store,
    Ce,
    Cne,
    Cg,
    Cge,
    Cl,
    Cle,
}

impl NumOp {
    const ALL: [NumOp; 19] = [
        NumOp::Add,
        NumOp::Sub,
        NumOp::Mul,
        NumOp::Div,
        NumOp::Mod,
        NumOp::Neg,
        NumOp::Inc,
        NumOp::And,
        NumOp::Or,
        NumOp::Xor,
        NumOp::Push,
        NumOp::Load,
        NumOp::Store,
        NumOp::Ce,
        NumOp::Cne,
        NumOp::Cg,
        NumOp::Cge,
        NumOp::Cl,
        NumOp::Cle,
    ];

    fn name(self) -> &'static str {
        match self {
            NumOp::Add => "ADD",
            NumOp::Sub => "SUB",
            NumOp::Mul => "MUL",
            NumOp::Div => "DIV",
            NumOp::Mod => "MOD",
            NumOp::Neg => "NEG",
            NumOp::Inc => "INC",
            NumOp::And => "AND",
            NumOp::Or => "OR",
            NumOp::Xor => "XOR",
            NumOp::Push => "PUSH",
            NumOp::Load => "LOAD",
            NumOp::Store => "STORE",
            NumOp::Ce => "CE",
            NumOp::Cne => "CNE",
            NumOp::Cg => "CG",
            NumOp::Cge => "CGE",
            NumOp::Cl => "CL",
            NumOp::Cle => "CLE",
        }
    }

    fn from_name(s: &str) -> Option<NumOp> {
        NumOp::ALL.into_iter().find(|op| op.name() == s)
    }

    /// True for the three bitwise ops, which float/double kinds omit.
    pub fn is_bitwise(self) -> bool {
        matches!(self, NumOp::And | NumOp::Or | NumOp::Xor)
    }
}

/// Operations in the reference (`R_`) family, covering string, boolean,
/// array and struct values (spec.md §4.6/§4.7; arrays/structs per §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ROp {
    Push,
    Load,
    Store,
    Ce,
    Cne,
    And,
    Or,
    Not,
    Concat,
    NewArray,
    NewStruct,
    LoadIdx,
    StoreIdx,
    LoadFld,
    StoreFld,
}

impl ROp {
    const ALL: [ROp; 15] = [
        ROp::Push,
        ROp::Load,
        ROp::Store,
        ROp::Ce,
        ROp::Cne,
        ROp::And,
        ROp::Or,
        ROp::Not,
        ROp::Concat,
        ROp::NewArray,
        ROp::NewStruct,
        ROp::LoadIdx,
        ROp::StoreIdx,
        ROp::LoadFld,
        ROp::StoreFld,
    ];

    fn name(self) -> &'static str {
        match self {
            ROp::Push => "PUSH",
            ROp::Load => "LOAD",
            ROp::Store => "STORE",
            ROp::Ce => "CE",
            ROp::Cne => "CNE",
            ROp::And => "AND",
            ROp::Or => "OR",
            ROp::Not => "NOT",
            ROp::Concat => "CONCAT",
            ROp::NewArray => "NEWARRAY",
            ROp::NewStruct => "NEWSTRUCT",
            ROp::LoadIdx => "LOADIDX",
            ROp::StoreIdx => "STOREIDX",
            ROp::LoadFld => "LOADFLD",
            ROp::StoreFld => "STOREFLD",
        }
    }

    fn from_name(s: &str) -> Option<ROp> {
        ROp::ALL.into_iter().find(|op| op.name() == s)
    }
}

/// A single opcode. `Num`/`Convert`/`R` carry their type tag inline so the
/// dispatch loop (spec.md §4.7) can match on one discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Num(NumKind, NumOp),
    /// `X2Y`: pop a value typed `from`, convert to `to`, push.
    Convert { from: NumKind, to: NumKind },
    R(ROp),
    Pop,
    Dup,
    Swap,
    Jump,
    Call,
    Ret,
    Mov,
    Halt,
    Syscall,
    DebugTrap,
}

impl Opcode {
    pub fn mnemonic(self) -> String {
        match self {
            Opcode::Num(kind, op) => format!("{}_{}", kind.mnemonic_prefix(), op.name()),
            Opcode::Convert { from, to } => {
                format!("{}2{}", from.mnemonic_prefix(), to.mnemonic_prefix())
            }
            Opcode::R(op) => format!("R_{}", op.name()),
            Opcode::Pop => "POP".to_string(),
            Opcode::Dup => "DUP".to_string(),
            Opcode::Swap => "SWAP".to_string(),
            Opcode::Jump => "JUMP".to_string(),
            Opcode::Call => "CALL".to_string(),
            Opcode::Ret => "RET".to_string(),
            Opcode::Mov => "MOV".to_string(),
            Opcode::Halt => "HALT".to_string(),
            Opcode::Syscall => "SYSCALL".to_string(),
            Opcode::DebugTrap => "DEBUG_TRAP".to_string(),
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Opcode> {
        match s {
            "POP" => return Some(Opcode::Pop),
            "DUP" => return Some(Opcode::Dup),
            "SWAP" => return Some(Opcode::Swap),
            "JUMP" => return Some(Opcode::Jump),
            "CALL" => return Some(Opcode::Call),
            "RET" => return Some(Opcode::Ret),
            "MOV" => return Some(Opcode::Mov),
            "HALT" => return Some(Opcode::Halt),
            "SYSCALL" => return Some(Opcode::Syscall),
            "DEBUG_TRAP" => return Some(Opcode::DebugTrap),
            _ => {}
        }
        if let Some(rest) = s.strip_prefix("R_") {
            return ROp::from_name(rest).map(Opcode::R);
        }
        if let Some((prefix, rest)) = s.split_once('_')
            && let Some(kind) = NumKind::from_mnemonic_prefix(prefix)
        {
            return NumOp::from_name(rest).map(|op| Opcode::Num(kind, op));
        }
        if s.len() >= 3 {
            // X2Y conversion: two single-letter prefixes joined by '2'.
            let (from, to) = s.split_once('2')?;
            let from = NumKind::from_mnemonic_prefix(from)?;
            let to = NumKind::from_mnemonic_prefix(to)?;
            return Some(Opcode::Convert { from, to });
        }
        None
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_round_trips_for_every_family() {
        for kind in NumKind::ALL {
            for op in NumOp::ALL {
                if op.is_bitwise() && kind.is_floating() {
                    continue;
                }
                let opcode = Opcode::Num(kind, op);
                assert_eq!(Opcode::from_mnemonic(&opcode.mnemonic()), Some(opcode));
            }
        }
        for op in ROp::ALL {
            let opcode = Opcode::R(op);
            assert_eq!(Opcode::from_mnemonic(&opcode.mnemonic()), Some(opcode));
        }
        for misc in [
            Opcode::Pop,
            Opcode::Dup,
            Opcode::Swap,
            Opcode::Jump,
            Opcode::Call,
            Opcode::Ret,
            Opcode::Mov,
            Opcode::Halt,
            Opcode::Syscall,
            Opcode::DebugTrap,
        ] {
            assert_eq!(Opcode::from_mnemonic(&misc.mnemonic()), Some(misc));
        }
    }

    #[test]
    fn conversion_mnemonics_round_trip() {
        let op = Opcode::Convert {
            from: NumKind::Int,
            to: NumKind::Double,
        };
        assert_eq!(op.mnemonic(), "I2D");
        assert_eq!(Opcode::from_mnemonic("I2D"), Some(op));
    }
}
