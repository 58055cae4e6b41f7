//! The decoded bytecode program (spec.md §3 `Program`, §6 external format).
//!
//! A [`Program`] is the ordered instruction stream the backend (C6) emits
//! and the VM (C7) executes. Both a newline-separated textual form
//! (`MNEMONIC arg ...` per line, per spec.md §6) and a length-prefixed binary
//! form are supported; the textual form is canonical for the determinism and
//! round-trip properties in spec.md §8, the binary form is a convenience for
//! persisting a compiled image.

use crate::error::CoreError;
use crate::opcode::Opcode;
use crate::value::{NumKind, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// An instruction operand. Addresses (`Addr`) are always absolute instruction
/// indices by the time a [`Program`] is finalized (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Slot(usize),
    Addr(usize),
    Int(i64),
    Const(Value),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Slot(n) => write!(f, "%{n}"),
            Operand::Addr(n) => write!(f, "@{n}"),
            Operand::Int(n) => write!(f, "#{n}"),
            Operand::Const(v) => write!(f, "{}", format_const(v)),
        }
    }
}

fn format_const(v: &Value) -> String {
    match v {
        Value::Byte(x) => format!("{x}b"),
        Value::Short(x) => format!("{x}s"),
        Value::Int(x) => format!("{x}"),
        Value::Long(x) => format!("{x}l"),
        Value::Float(x) => format!("{x}f"),
        Value::Double(x) => format!("{x}d"),
        Value::Bool(x) => x.to_string(),
        Value::Str(s) => format!("{:?}", s),
        Value::Array(_) | Value::Struct(_) => {
            unreachable!("arrays/structs are never program constants")
        }
    }
}

fn parse_operand(tok: &str) -> Option<Operand> {
    if let Some(rest) = tok.strip_prefix('%') {
        return rest.parse().ok().map(Operand::Slot);
    }
    if let Some(rest) = tok.strip_prefix('@') {
        return rest.parse().ok().map(Operand::Addr);
    }
    if let Some(rest) = tok.strip_prefix('#') {
        return rest.parse().ok().map(Operand::Int);
    }
    if tok == "true" {
        return Some(Operand::Const(Value::Bool(true)));
    }
    if tok == "false" {
        return Some(Operand::Const(Value::Bool(false)));
    }
    if tok.starts_with('"') && tok.ends_with('"') && tok.len() >= 2 {
        // Round-trips through Rust's debug string escaping.
        let unescaped: String = serde_json_lite_unescape(tok)?;
        return Some(Operand::Const(Value::Str(unescaped)));
    }
    let (digits, suffix) = tok.split_at(
        tok.find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(tok.len()),
    );
    let parsed = match suffix {
        "b" => digits.parse::<i8>().ok().map(Value::Byte),
        "s" => digits.parse::<i16>().ok().map(Value::Short),
        "l" => digits.parse::<i64>().ok().map(Value::Long),
        "f" => digits.parse::<f32>().ok().map(Value::Float),
        "d" => digits.parse::<f64>().ok().map(Value::Double),
        "" if digits.contains('.') => digits.parse::<f64>().ok().map(Value::Double),
        "" => digits.parse::<i32>().ok().map(Value::Int),
        _ => None,
    };
    parsed.map(Operand::Const)
}

/// Minimal unescape for the debug-quoted strings `format_const` produces.
fn serde_json_lite_unescape(tok: &str) -> Option<String> {
    let inner = &tok[1..tok.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                other => out.push(other),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        for op in &self.operands {
            write!(f, " {op}")?;
        }
        Ok(())
    }
}

/// Wire-safe instruction representation for binary (de)serialization; avoids
/// requiring `serde` on [`crate::opcode::Opcode`] itself by round-tripping
/// through the same textual mnemonics the program format uses.
#[derive(Serialize, Deserialize)]
struct WireInstruction {
    text: String,
}

/// A fully linked bytecode program. `global_slot_count` is the size of the
/// reserved global-slot prefix (spec.md §3 `GlobalVariableTable`): a
/// `T_LOAD`/`T_STORE slot` with `slot < global_slot_count` addresses the
/// process-wide global store, otherwise the current frame's locals. `entry`
/// is the instruction index where execution begins (the synthesized
/// `_start` function, or `main` when there is no script-level code).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub global_slot_count: usize,
    pub entry: usize,
}

impl Program {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn to_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.instructions.len() + 2);
        lines.push(format!(".entry {}", self.entry));
        lines.push(format!(".globals {}", self.global_slot_count));
        lines.extend(self.instructions.iter().map(|i| i.to_string()));
        lines.join("\n")
    }

    pub fn from_text(text: &str) -> Result<Program, CoreError> {
        let mut instructions = Vec::new();
        let mut entry = 0;
        let mut global_slot_count = 0;
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix(".entry ") {
                entry = rest.trim().parse().map_err(|_| CoreError::MalformedLine {
                    line: line_no + 1,
                    text: line.to_string(),
                })?;
                continue;
            }
            if let Some(rest) = line.strip_prefix(".globals ") {
                global_slot_count =
                    rest.trim().parse().map_err(|_| CoreError::MalformedLine {
                        line: line_no + 1,
                        text: line.to_string(),
                    })?;
                continue;
            }
            instructions.push(parse_instruction_line(line_no + 1, line)?);
        }
        Ok(Program {
            instructions,
            global_slot_count,
            entry,
        })
    }

    pub fn to_binary(&self) -> Vec<u8> {
        let wire: Vec<WireInstruction> = self
            .instructions
            .iter()
            .map(|i| WireInstruction { text: i.to_string() })
            .collect();
        let envelope = WireProgram {
            entry: self.entry,
            global_slot_count: self.global_slot_count,
            instructions: wire,
        };
        bincode::serialize(&envelope).expect("in-memory program always serializes")
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Program, CoreError> {
        let envelope: WireProgram =
            bincode::deserialize(bytes).map_err(|e| CoreError::Binary(e.to_string()))?;
        let mut instructions = Vec::with_capacity(envelope.instructions.len());
        for (idx, w) in envelope.instructions.into_iter().enumerate() {
            instructions.push(parse_instruction_line(idx + 1, &w.text)?);
        }
        Ok(Program {
            instructions,
            global_slot_count: envelope.global_slot_count,
            entry: envelope.entry,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct WireProgram {
    entry: usize,
    global_slot_count: usize,
    instructions: Vec<WireInstruction>,
}

fn parse_instruction_line(line_no: usize, line: &str) -> Result<Instruction, CoreError> {
    let mut parts = line.split_whitespace();
    let mnemonic = parts.next().ok_or_else(|| CoreError::MalformedLine {
        line: line_no,
        text: line.to_string(),
    })?;
    let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| CoreError::MalformedLine {
        line: line_no,
        text: line.to_string(),
    })?;
    let mut operands = Vec::new();
    for tok in parts {
        let operand = parse_operand(tok).ok_or_else(|| CoreError::MalformedLine {
            line: line_no,
            text: line.to_string(),
        })?;
        operands.push(operand);
    }
    Ok(Instruction { opcode, operands })
}

/// Builds a [`Program`] while resolving forward label references, mirroring
/// the backend's "record the numeric address of each emitted opcode... patch
/// forward references" contract from spec.md §4.6.
#[derive(Default)]
pub struct ProgramBuilder {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
    /// (instruction index, operand index, label name) pending resolution.
    patches: Vec<(usize, usize, String)>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn here(&self) -> usize {
        self.instructions.len()
    }

    pub fn mark_label(&mut self, name: &str) {
        self.labels.insert(name.to_string(), self.here());
    }

    /// Emit an instruction whose operands are already resolved.
    pub fn emit(&mut self, opcode: Opcode, operands: Vec<Operand>) -> usize {
        let idx = self.instructions.len();
        self.instructions.push(Instruction { opcode, operands });
        idx
    }

    /// Emit an instruction with one operand that is an address, to be
    /// patched once `label` is known (forward references allowed).
    pub fn emit_with_label(
        &mut self,
        opcode: Opcode,
        label: &str,
        mut operands: Vec<Operand>,
        addr_operand_index: usize,
    ) -> usize {
        operands.insert(addr_operand_index, Operand::Addr(usize::MAX));
        let idx = self.emit(opcode, operands);
        self.patches
            .push((idx, addr_operand_index, label.to_string()));
        idx
    }

    pub fn label_addr(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    pub fn finish(self) -> Result<Program, CoreError> {
        self.finish_with(0, 0)
    }

    pub fn finish_with(
        mut self,
        entry: usize,
        global_slot_count: usize,
    ) -> Result<Program, CoreError> {
        for (instr_idx, operand_idx, label) in &self.patches {
            let addr = *self
                .labels
                .get(label)
                .ok_or_else(|| CoreError::UnresolvedLabel(label.clone()))?;
            self.instructions[*instr_idx].operands[*operand_idx] = Operand::Addr(addr);
        }
        Ok(Program {
            instructions: self.instructions,
            global_slot_count,
            entry,
        })
    }
}

/// Chooses the opcode-family type tag for a numeric [`NumKind`]; the single
/// centralized helper spec.md §4.6 asks for ("new types/ops add in one
/// place").
pub fn num_family(kind: NumKind) -> NumKind {
    kind
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::NumOp;

    #[test]
    fn text_round_trips() {
        let mut b = ProgramBuilder::new();
        b.emit(
            Opcode::Num(NumKind::Int, NumOp::Push),
            vec![Operand::Const(Value::Int(42))],
        );
        b.emit(
            Opcode::Num(NumKind::Int, NumOp::Store),
            vec![Operand::Slot(0)],
        );
        b.emit_with_label(Opcode::Jump, "end", vec![], 0);
        b.mark_label("end");
        b.emit(Opcode::Halt, vec![]);
        let program = b.finish().unwrap();

        let text = program.to_text();
        let reparsed = Program::from_text(&text).unwrap();
        assert_eq!(program, reparsed);
    }

    #[test]
    fn binary_round_trips() {
        let mut b = ProgramBuilder::new();
        b.emit(
            Opcode::Num(NumKind::Double, NumOp::Push),
            vec![Operand::Const(Value::Double(0.5))],
        );
        b.emit(Opcode::Ret, vec![]);
        let program = b.finish().unwrap();
        let bytes = program.to_binary();
        let decoded = Program::from_binary(&bytes).unwrap();
        assert_eq!(program, decoded);
    }

    #[test]
    fn whole_valued_double_const_round_trips_as_text() {
        let mut b = ProgramBuilder::new();
        b.emit(
            Opcode::Num(NumKind::Double, NumOp::Push),
            vec![Operand::Const(Value::Double(1.0))],
        );
        b.emit(Opcode::Ret, vec![]);
        let program = b.finish().unwrap();

        let text = program.to_text();
        let reparsed = Program::from_text(&text).unwrap();
        assert_eq!(program, reparsed);
    }

    #[test]
    fn unresolved_label_is_an_error() {
        let mut b = ProgramBuilder::new();
        b.emit_with_label(Opcode::Jump, "nowhere", vec![], 0);
        assert!(b.finish().is_err());
    }
}
