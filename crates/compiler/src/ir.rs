//! C4: lowers the annotated AST to a three-address linear IR with virtual
//! registers, constants, and labels (spec.md §4.4).

use crate::ast::*;
use crate::semantic::{CheckedFunction, CheckedModule, CheckedProgram, ModuleInfo};
use crate::types::{Builtin, Type};
use snow_core::Value;
use std::collections::HashMap;

/// Unique within a function, except for the reserved range `0..global_count`
/// which is shared identically across every function's IR (spec.md §3/§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VReg(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum IrInstr {
    LoadConst { dst: VReg, value: Value, ty: Type },
    BinaryOp { dst: VReg, op: BinaryOp, lhs: VReg, rhs: VReg, operand_ty: Type },
    UnaryOp { dst: VReg, op: UnaryOp, operand: VReg, ty: Type },
    Convert { dst: VReg, src: VReg, from: Builtin, to: Builtin },
    Call { dst: Option<VReg>, callee: String, args: Vec<VReg> },
    Return { value: Option<VReg>, ty: Type },
    Label(String),
    Jump(String),
    CmpJump { op: BinaryOp, lhs: VReg, rhs: VReg, target: String, operand_ty: Type },
    Move { dst: VReg, src: VReg, ty: Type },
    NewArray { dst: VReg, elems: Vec<VReg>, ty: Type },
    NewStruct { dst: VReg, type_name: String, args: Vec<VReg> },
    LoadIndex { dst: VReg, array: VReg, index: VReg, ty: Type },
    StoreIndex { array: VReg, index: VReg, value: VReg },
    LoadField { dst: VReg, object: VReg, field_index: usize, ty: Type },
    StoreField { object: VReg, field_index: usize, value: VReg },
    Syscall { dst: Option<VReg>, id: i64, args: Vec<VReg> },
}

impl IrInstr {
    pub fn dest(&self) -> Option<VReg> {
        match self {
            IrInstr::LoadConst { dst, .. }
            | IrInstr::BinaryOp { dst, .. }
            | IrInstr::UnaryOp { dst, .. }
            | IrInstr::Convert { dst, .. }
            | IrInstr::Move { dst, .. }
            | IrInstr::NewArray { dst, .. }
            | IrInstr::NewStruct { dst, .. }
            | IrInstr::LoadIndex { dst, .. }
            | IrInstr::LoadField { dst, .. } => Some(*dst),
            IrInstr::Call { dst, .. } | IrInstr::Syscall { dst, .. } => *dst,
            _ => None,
        }
    }

    pub fn operands(&self) -> Vec<VReg> {
        match self {
            IrInstr::LoadConst { .. } | IrInstr::Label(_) | IrInstr::Jump(_) => Vec::new(),
            IrInstr::BinaryOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            IrInstr::UnaryOp { operand, .. } => vec![*operand],
            IrInstr::Convert { src, .. } => vec![*src],
            IrInstr::Call { args, .. } => args.clone(),
            IrInstr::Return { value, .. } => value.iter().copied().collect(),
            IrInstr::CmpJump { lhs, rhs, .. } => vec![*lhs, *rhs],
            IrInstr::Move { src, .. } => vec![*src],
            IrInstr::NewArray { elems, .. } => elems.clone(),
            IrInstr::NewStruct { args, .. } => args.clone(),
            IrInstr::LoadIndex { array, index, .. } => vec![*array, *index],
            IrInstr::StoreIndex { array, index, value } => vec![*array, *index, *value],
            IrInstr::LoadField { object, .. } => vec![*object],
            IrInstr::StoreField { object, value, .. } => vec![*object, *value],
            IrInstr::Syscall { args, .. } => args.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<VReg>,
    pub return_type: Type,
    pub body: Vec<IrInstr>,
}

#[derive(Debug, Clone)]
pub struct GlobalDef {
    pub name: String,
    pub reg: VReg,
    pub ty: Type,
}

#[derive(Debug, Clone, Default)]
pub struct IrModule {
    pub globals: Vec<GlobalDef>,
    pub global_init: Vec<IrInstr>,
    pub functions: Vec<IrFunction>,
}

struct LowerCtx<'a> {
    next_reg: u32,
    instrs: Vec<IrInstr>,
    scopes: Vec<HashMap<String, VReg>>,
    globals: &'a HashMap<String, (VReg, Type)>,
    info: &'a ModuleInfo,
    expr_types: &'a HashMap<NodeId, Type>,
    decl_types: &'a HashMap<NodeId, Type>,
    label_seq: u32,
    loop_labels: Vec<(String, String)>,
    false_reg: Option<VReg>,
}

impl<'a> LowerCtx<'a> {
    fn fresh_reg(&mut self) -> VReg {
        let r = VReg(self.next_reg);
        self.next_reg += 1;
        r
    }

    fn fresh_label(&mut self, hint: &str) -> String {
        self.label_seq += 1;
        format!("{hint}_{}", self.label_seq)
    }

    fn bind(&mut self, name: &str, reg: VReg) {
        self.scopes.last_mut().expect("at least one scope").insert(name.to_string(), reg);
    }

    fn resolve(&self, name: &str) -> VReg {
        for scope in self.scopes.iter().rev() {
            if let Some(r) = scope.get(name) {
                return *r;
            }
        }
        if let Some((r, _)) = self.globals.get(name) {
            return *r;
        }
        panic!("unresolved name '{name}' reached IR lowering (semantic pass should have caught this)");
    }

    fn false_const(&mut self) -> VReg {
        if let Some(r) = self.false_reg {
            return r;
        }
        let r = self.fresh_reg();
        self.instrs.push(IrInstr::LoadConst {
            dst: r,
            value: Value::Bool(false),
            ty: Type::Builtin(Builtin::Boolean),
        });
        self.false_reg = Some(r);
        r
    }

    /// Emits an `X2Y` conversion when `from` and `to` are different numeric
    /// builtins; otherwise returns `reg` unchanged (spec.md §4.7 `X2Y`).
    fn coerce(&mut self, reg: VReg, from: &Type, to: &Type) -> VReg {
        let (Type::Builtin(f), Type::Builtin(t)) = (from, to) else {
            return reg;
        };
        if f == t || !f.is_numeric() || !t.is_numeric() {
            return reg;
        }
        let dst = self.fresh_reg();
        self.instrs.push(IrInstr::Convert { dst, src: reg, from: *f, to: *t });
        dst
    }

    fn expr_ty(&self, expr: &Expr) -> Type {
        self.expr_types.get(&expr.id).cloned().unwrap_or(Type::Builtin(Builtin::Any))
    }

    /// The bytecode `R_LOADFLD`/`R_STOREFLD` opcodes address a field by its
    /// declaration-order position, not by name, so the lowering stage resolves
    /// the name against the object's static struct type here.
    fn field_index(&self, object: &Expr, field: &str) -> usize {
        match self.expr_ty(object) {
            Type::Struct { fields, .. } => fields.iter().position(|(n, _)| n == field).unwrap_or(0),
            _ => 0,
        }
    }
}

fn default_value_for(ty: &Type) -> Value {
    match ty {
        Type::Builtin(Builtin::Byte) => Value::Byte(0),
        Type::Builtin(Builtin::Short) => Value::Short(0),
        Type::Builtin(Builtin::Int) => Value::Int(0),
        Type::Builtin(Builtin::Long) => Value::Long(0),
        Type::Builtin(Builtin::Float) => Value::Float(0.0),
        Type::Builtin(Builtin::Double) => Value::Double(0.0),
        Type::Builtin(Builtin::Boolean) => Value::Bool(false),
        Type::Builtin(Builtin::String) => Value::Str(String::new()),
        Type::Array(_) => Value::new_array(Vec::new()),
        Type::Struct { name, fields, .. } => Value::new_struct(name.clone(), fields.iter().map(|(_, t)| default_value_for(t)).collect()),
        _ => Value::Bool(false),
    }
}

/// Suffix `b|s|l|f` selects width; a `.`/exponent with no suffix selects
/// `double`; otherwise `int`. Underscores are stripped; hex uses unsigned
/// parsing at the selected width; parse failure falls back to a string
/// constant (spec.md §4.4).
fn parse_numeric_literal(text: &str) -> Value {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let (body, suffix) = match cleaned.chars().last() {
        Some(c @ ('b' | 's' | 'l' | 'f' | 'B' | 'S' | 'L' | 'F')) if !cleaned.starts_with("0x") && !cleaned.starts_with("0X") => {
            (&cleaned[..cleaned.len() - 1], Some(c.to_ascii_lowercase()))
        }
        _ => (cleaned.as_str(), None),
    };
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        return match u64::from_str_radix(hex, 16) {
            Ok(n) => match suffix {
                Some('b') => Value::Byte(n as i8),
                Some('s') => Value::Short(n as i16),
                Some('l') => Value::Long(n as i64),
                Some('f') => Value::Float(n as f32),
                _ => Value::Int(n as i32),
            },
            Err(_) => Value::Str(text.to_string()),
        };
    }
    match suffix {
        Some('b') => body.parse::<i8>().map(Value::Byte).ok(),
        Some('s') => body.parse::<i16>().map(Value::Short).ok(),
        Some('l') => body.parse::<i64>().map(Value::Long).ok(),
        Some('f') => body.parse::<f32>().map(Value::Float).ok(),
        _ if body.contains('.') || body.contains('e') || body.contains('E') => body.parse::<f64>().map(Value::Double).ok(),
        _ => body.parse::<i32>().map(Value::Int).ok(),
    }
    .unwrap_or_else(|| Value::Str(text.to_string()))
}

fn lower_expr(expr: &Expr, ctx: &mut LowerCtx) -> VReg {
    match &expr.kind {
        ExprKind::Identifier(name) => ctx.resolve(name),
        ExprKind::NumberLiteral(text) => {
            let dst = ctx.fresh_reg();
            let value = parse_numeric_literal(text);
            let ty = ctx.expr_ty(expr);
            ctx.instrs.push(IrInstr::LoadConst { dst, value, ty });
            dst
        }
        ExprKind::StringLiteral(s) => {
            let dst = ctx.fresh_reg();
            ctx.instrs.push(IrInstr::LoadConst {
                dst,
                value: Value::Str(s.clone()),
                ty: Type::Builtin(Builtin::String),
            });
            dst
        }
        ExprKind::BoolLiteral(b) => {
            let dst = ctx.fresh_reg();
            ctx.instrs.push(IrInstr::LoadConst {
                dst,
                value: Value::Bool(*b),
                ty: Type::Builtin(Builtin::Boolean),
            });
            dst
        }
        ExprKind::ArrayLiteral(elems) => {
            let regs: Vec<VReg> = elems.iter().map(|e| lower_expr(e, ctx)).collect();
            let dst = ctx.fresh_reg();
            let ty = ctx.expr_ty(expr);
            ctx.instrs.push(IrInstr::NewArray { dst, elems: regs, ty });
            dst
        }
        ExprKind::Unary(op, operand) => {
            let r = lower_expr(operand, ctx);
            let dst = ctx.fresh_reg();
            let ty = ctx.expr_ty(expr);
            ctx.instrs.push(IrInstr::UnaryOp { dst, op: *op, operand: r, ty });
            dst
        }
        ExprKind::Binary(op, lhs, rhs) => {
            let l = lower_expr(lhs, ctx);
            let r = lower_expr(rhs, ctx);
            let lt = ctx.expr_ty(lhs);
            let rt = ctx.expr_ty(rhs);
            let operand_ty = match op {
                BinaryOp::LogicalAnd | BinaryOp::LogicalOr => Type::Builtin(Builtin::Boolean),
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                    widen_operand_ty(&lt, &rt)
                }
                BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                    if lt.is_numeric() && rt.is_numeric() {
                        widen_operand_ty(&lt, &rt)
                    } else {
                        lt.clone()
                    }
                }
            };
            let l = ctx.coerce(l, &lt, &operand_ty);
            let r = ctx.coerce(r, &rt, &operand_ty);
            let dst = ctx.fresh_reg();
            ctx.instrs.push(IrInstr::BinaryOp { dst, op: *op, lhs: l, rhs: r, operand_ty });
            dst
        }
        ExprKind::Call(callee, args) => lower_call(callee, args, expr, ctx),
        ExprKind::Index(arr, idx) => {
            let a = lower_expr(arr, ctx);
            let i = lower_expr(idx, ctx);
            let dst = ctx.fresh_reg();
            let ty = ctx.expr_ty(expr);
            ctx.instrs.push(IrInstr::LoadIndex { dst, array: a, index: i, ty });
            dst
        }
        ExprKind::Member(obj, field) => {
            let field_index = ctx.field_index(obj, field);
            let o = lower_expr(obj, ctx);
            let dst = ctx.fresh_reg();
            let ty = ctx.expr_ty(expr);
            ctx.instrs.push(IrInstr::LoadField { dst, object: o, field_index, ty });
            dst
        }
        ExprKind::New(type_name, args) => {
            let regs: Vec<VReg> = args.iter().map(|a| lower_expr(a, ctx)).collect();
            let dst = ctx.fresh_reg();
            ctx.instrs.push(IrInstr::NewStruct { dst, type_name: type_name.clone(), args: regs });
            dst
        }
    }
}

fn widen_operand_ty(lt: &Type, rt: &Type) -> Type {
    match (lt, rt) {
        (Type::Builtin(a), Type::Builtin(b)) if a.is_numeric() && b.is_numeric() => Type::Builtin(Builtin::widen(*a, *b)),
        _ => lt.clone(),
    }
}

fn lower_call(callee: &Expr, args: &[Expr], call_expr: &Expr, ctx: &mut LowerCtx) -> VReg {
    let ret_ty = ctx.expr_ty(call_expr);
    let is_void = ret_ty == Type::Builtin(Builtin::Void);

    if let ExprKind::Identifier(name) = &callee.kind
        && let Some(id) = crate::semantic::builtin_syscall_id(name)
    {
        let arg_regs: Vec<VReg> = args.iter().map(|a| lower_expr(a, ctx)).collect();
        let dst = if is_void { None } else { Some(ctx.fresh_reg()) };
        ctx.instrs.push(IrInstr::Syscall { dst, id, args: arg_regs });
        return dst.unwrap_or_else(|| ctx.fresh_reg());
    }

    let (name, mut arg_regs) = if let ExprKind::Member(obj, method) = &callee.kind {
        let obj_ty = ctx.expr_ty(obj);
        let struct_name = match &obj_ty {
            Type::Struct { name, .. } => name.clone(),
            _ => String::new(),
        };
        let obj_reg = lower_expr(obj, ctx);
        (format!("{struct_name}_{method}"), vec![obj_reg])
    } else if let ExprKind::Identifier(name) = &callee.kind {
        (name.clone(), Vec::new())
    } else {
        (String::new(), Vec::new())
    };

    let param_types = ctx.info.functions.get(&name).map(|f| f.params.clone());
    let implicit_self = arg_regs.len();
    for (i, a) in args.iter().enumerate() {
        let r = lower_expr(a, ctx);
        let at = ctx.expr_ty(a);
        let r = match &param_types {
            Some(params) => match params.get(implicit_self + i) {
                Some(pt) => ctx.coerce(r, &at, pt),
                None => r,
            },
            None => r,
        };
        arg_regs.push(r);
    }

    let dst = if is_void { None } else { Some(ctx.fresh_reg()) };
    ctx.instrs.push(IrInstr::Call { dst, callee: name, args: arg_regs });
    dst.unwrap_or_else(|| ctx.fresh_reg())
}

fn lower_stmt(stmt: &Stmt, ctx: &mut LowerCtx, return_type: &Type) {
    match &stmt.kind {
        StmtKind::Declaration { name, init, .. } => {
            let declared_ty = ctx.decl_types.get(&stmt.id).cloned().unwrap_or(Type::Builtin(Builtin::Any));
            let reg = ctx.fresh_reg();
            match init {
                Some(e) => {
                    let r = lower_expr(e, ctx);
                    let init_ty = ctx.expr_ty(e);
                    let r = ctx.coerce(r, &init_ty, &declared_ty);
                    ctx.instrs.push(IrInstr::Move { dst: reg, src: r, ty: declared_ty.clone() });
                }
                None => {
                    ctx.instrs.push(IrInstr::LoadConst {
                        dst: reg,
                        value: default_value_for(&declared_ty),
                        ty: declared_ty.clone(),
                    });
                }
            }
            ctx.bind(name, reg);
        }
        StmtKind::Assignment { target, value } => {
            let v = lower_expr(value, ctx);
            let value_ty = ctx.expr_ty(value);
            match &target.kind {
                ExprKind::Identifier(name) => {
                    let dst = ctx.resolve(name);
                    let target_ty = ctx.expr_ty(target);
                    let v = ctx.coerce(v, &value_ty, &target_ty);
                    ctx.instrs.push(IrInstr::Move { dst, src: v, ty: target_ty });
                }
                ExprKind::Member(obj, field) => {
                    let field_index = ctx.field_index(obj, field);
                    let o = lower_expr(obj, ctx);
                    ctx.instrs.push(IrInstr::StoreField { object: o, field_index, value: v });
                }
                _ => {}
            }
        }
        StmtKind::IndexAssignment { array, index, value } => {
            let a = lower_expr(array, ctx);
            let i = lower_expr(index, ctx);
            let v = lower_expr(value, ctx);
            ctx.instrs.push(IrInstr::StoreIndex { array: a, index: i, value: v });
        }
        StmtKind::If { cond, then_branch, else_branch } => {
            let cond_reg = lower_expr(cond, ctx);
            let false_reg = ctx.false_const();
            let l_else = ctx.fresh_label("else");
            let l_end = ctx.fresh_label("endif");
            ctx.instrs.push(IrInstr::CmpJump {
                op: BinaryOp::Eq,
                lhs: cond_reg,
                rhs: false_reg,
                target: l_else.clone(),
                operand_ty: Type::Builtin(Builtin::Boolean),
            });
            ctx.scopes.push(HashMap::new());
            for s in then_branch {
                lower_stmt(s, ctx, return_type);
            }
            ctx.scopes.pop();
            ctx.instrs.push(IrInstr::Jump(l_end.clone()));
            ctx.instrs.push(IrInstr::Label(l_else));
            if let Some(stmts) = else_branch {
                ctx.scopes.push(HashMap::new());
                for s in stmts {
                    lower_stmt(s, ctx, return_type);
                }
                ctx.scopes.pop();
            }
            ctx.instrs.push(IrInstr::Label(l_end));
        }
        StmtKind::Loop { init, cond, step, body } => {
            ctx.scopes.push(HashMap::new());
            if let Some(s) = init {
                lower_stmt(s, ctx, return_type);
            }
            let l_top = ctx.fresh_label("looptop");
            let l_cont = ctx.fresh_label("loopcont");
            let l_end = ctx.fresh_label("loopend");
            ctx.instrs.push(IrInstr::Label(l_top.clone()));
            if let Some(c) = cond {
                let cr = lower_expr(c, ctx);
                let false_reg = ctx.false_const();
                ctx.instrs.push(IrInstr::CmpJump {
                    op: BinaryOp::Eq,
                    lhs: cr,
                    rhs: false_reg,
                    target: l_end.clone(),
                    operand_ty: Type::Builtin(Builtin::Boolean),
                });
            }
            ctx.loop_labels.push((l_cont.clone(), l_end.clone()));
            for s in body {
                lower_stmt(s, ctx, return_type);
            }
            ctx.loop_labels.pop();
            ctx.instrs.push(IrInstr::Label(l_cont));
            if let Some(s) = step {
                lower_stmt(s, ctx, return_type);
            }
            ctx.instrs.push(IrInstr::Jump(l_top));
            ctx.instrs.push(IrInstr::Label(l_end));
            ctx.scopes.pop();
        }
        StmtKind::Return(value) => {
            let reg = value.as_ref().map(|e| {
                let r = lower_expr(e, ctx);
                let ty = ctx.expr_ty(e);
                ctx.coerce(r, &ty, return_type)
            });
            ctx.instrs.push(IrInstr::Return { value: reg, ty: return_type.clone() });
        }
        StmtKind::Break => {
            if let Some((_, end)) = ctx.loop_labels.last().cloned() {
                ctx.instrs.push(IrInstr::Jump(end));
            }
        }
        StmtKind::Continue => {
            if let Some((cont, _)) = ctx.loop_labels.last().cloned() {
                ctx.instrs.push(IrInstr::Jump(cont));
            }
        }
        StmtKind::ExpressionStmt(e) => {
            lower_expr(e, ctx);
        }
    }
}

fn lower_function(f: &CheckedFunction, globals: &HashMap<String, (VReg, Type)>, info: &ModuleInfo, global_count: u32) -> IrFunction {
    let mut ctx = LowerCtx {
        next_reg: global_count,
        instrs: Vec::new(),
        scopes: vec![HashMap::new()],
        globals,
        info,
        expr_types: &f.expr_types,
        decl_types: &f.decl_types,
        label_seq: 0,
        loop_labels: Vec::new(),
        false_reg: None,
    };
    let params: Vec<VReg> = f
        .def
        .params
        .iter()
        .zip(&f.param_types)
        .map(|(p, _ty)| {
            let r = ctx.fresh_reg();
            ctx.bind(&p.name, r);
            r
        })
        .collect();
    for stmt in &f.def.body {
        lower_stmt(stmt, &mut ctx, &f.return_type);
    }
    IrFunction {
        name: f.def.name.clone(),
        params,
        return_type: f.return_type.clone(),
        body: ctx.instrs,
    }
}

fn lower_module_globals(module: &CheckedModule, globals: &mut HashMap<String, (VReg, Type)>, global_defs: &mut Vec<GlobalDef>, global_init: &mut Vec<IrInstr>, next_global: &mut u32) {
    for g in &module.globals {
        let StmtKind::Declaration { name, init, .. } = &g.kind else {
            continue;
        };
        let ty = module.global_decl_types.get(&g.id).cloned().unwrap_or(Type::Builtin(Builtin::Any));
        let reg = VReg(*next_global);
        *next_global += 1;
        globals.insert(name.clone(), (reg, ty.clone()));
        global_defs.push(GlobalDef { name: name.clone(), reg, ty: ty.clone() });

        // Scratch temporaries for initializer expressions live far above any
        // real global or local register so they never collide with the next
        // global's reserved id.
        let mut ctx = LowerCtx {
            next_reg: 1_000_000 + *next_global,
            instrs: Vec::new(),
            scopes: vec![HashMap::new()],
            globals,
            info: &module.info,
            expr_types: &module.global_expr_types,
            decl_types: &module.global_decl_types,
            label_seq: 0,
            loop_labels: Vec::new(),
            false_reg: None,
        };
        match init {
            Some(e) => {
                let r = lower_expr(e, &mut ctx);
                let init_ty = ctx.expr_ty(e);
                let r = ctx.coerce(r, &init_ty, &ty);
                ctx.instrs.push(IrInstr::Move { dst: reg, src: r, ty: ty.clone() });
            }
            None => {
                ctx.instrs.push(IrInstr::LoadConst { dst: reg, value: default_value_for(&ty), ty: ty.clone() });
            }
        }
        global_init.append(&mut ctx.instrs);
    }
}

/// Consumes an annotated program; produces one [`IrFunction`] per function
/// (including a synthesized `_start` wrapping any script-level statements,
/// already folded in as a regular function by [`crate::parser`]).
pub fn lower(checked: &CheckedProgram) -> IrModule {
    let mut globals = HashMap::new();
    let mut global_defs = Vec::new();
    let mut global_init = Vec::new();
    let mut next_global = 0u32;
    for module in &checked.modules {
        lower_module_globals(module, &mut globals, &mut global_defs, &mut global_init, &mut next_global);
    }

    let mut functions = Vec::new();
    for module in &checked.modules {
        for f in &module.functions {
            functions.push(lower_function(f, &globals, &module.info, next_global));
        }
    }

    IrModule {
        globals: global_defs,
        global_init,
        functions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic;

    fn lower_src(src: &str) -> IrModule {
        let (tokens, _) = Lexer::new(src, "t").scan();
        let (items, diags) = Parser::new(&tokens, "t").parse();
        assert!(diags.is_empty(), "{diags:?}");
        let (checked, diags) = semantic::analyze(&items);
        assert!(diags.is_empty(), "{diags:?}");
        lower(&checked)
    }

    #[test]
    fn arithmetic_lowers_to_binary_ops_and_return() {
        let m = lower_src(
            "module: M function: main returns: int body: declare x:int = 2+3*4 return x end body end function end module",
        );
        let f = &m.functions[0];
        assert!(f.body.iter().any(|i| matches!(i, IrInstr::BinaryOp { op: BinaryOp::Mul, .. })));
        assert!(f.body.iter().any(|i| matches!(i, IrInstr::BinaryOp { op: BinaryOp::Add, .. })));
        assert!(matches!(f.body.last(), Some(IrInstr::Return { value: Some(_), .. })));
    }

    #[test]
    fn loop_emits_three_labels() {
        let m = lower_src(
            "function: main returns: int body: declare s:int = 0 \
             loop init declare i:int = 1 cond i <= 10 step i = i + 1 s = s + i end loop \
             return s end body end function",
        );
        let f = &m.functions[0];
        let labels: Vec<_> = f.body.iter().filter(|i| matches!(i, IrInstr::Label(_))).collect();
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn call_lowers_with_callee_name() {
        let m = lower_src(
            "module: M \
             function: factorial params: n:int returns: int body: \
               if n <= 1 then return 1 end if \
               return n * factorial(n - 1) \
             end body end function \
             function: main returns: int body: return factorial(5) end body end function \
             end module",
        );
        let main = m.functions.iter().find(|f| f.name == "main").unwrap();
        assert!(main.body.iter().any(|i| matches!(i, IrInstr::Call { callee, .. } if callee == "factorial")));
    }
}
