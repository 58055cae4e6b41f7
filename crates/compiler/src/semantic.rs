//! C3: symbol tables, type inference/compatibility, module/function
//! resolution (spec.md §4.3).
//!
//! Two passes per module: a declaration pass enters every top-level name so
//! forward references resolve, then a body pass walks statements/expressions
//! dispatching by kind, accumulating diagnostics rather than aborting.

use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::symbol::{Symbol, SymbolKind, SymbolTable};
use crate::types::{Builtin, Type};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub return_type: Type,
}

#[derive(Debug, Clone)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, Type)>,
    pub parent: Option<String>,
}

/// Per-module registry of forward-resolvable names (spec.md §4.3).
#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    pub name: String,
    pub functions: HashMap<String, FunctionType>,
    pub structs: HashMap<String, StructType>,
    pub globals: HashMap<String, Type>,
}

impl ModuleInfo {
    /// Parent chain for `name`, nearest first.
    fn ancestors(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.structs.get(name).and_then(|s| s.parent.clone());
        while let Some(parent) = current {
            let next = self.structs.get(&parent).and_then(|s| s.parent.clone());
            chain.push(parent);
            current = next;
        }
        chain
    }

    fn field_type(&self, struct_name: &str, field: &str) -> Option<Type> {
        let mut name = struct_name.to_string();
        loop {
            let s = self.structs.get(&name)?;
            if let Some((_, ty)) = s.fields.iter().find(|(n, _)| n == field) {
                return Some(ty.clone());
            }
            name = s.parent.clone()?;
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckedFunction {
    pub def: FunctionDef,
    pub param_types: Vec<Type>,
    pub return_type: Type,
    /// Declaration statement id -> the declared (or inferred) type.
    pub decl_types: HashMap<NodeId, Type>,
    /// Every expression node's resolved type.
    pub expr_types: HashMap<NodeId, Type>,
}

#[derive(Debug, Clone)]
pub struct CheckedModule {
    pub info: ModuleInfo,
    pub functions: Vec<CheckedFunction>,
    pub globals: Vec<Stmt>,
    pub global_decl_types: HashMap<NodeId, Type>,
    pub global_expr_types: HashMap<NodeId, Type>,
}

#[derive(Debug, Clone, Default)]
pub struct CheckedProgram {
    pub modules: Vec<CheckedModule>,
}

fn resolve_type_ref(ty: &TypeRef, ctx: &NodeContext, structs: &HashMap<String, StructType>, diags: &mut Vec<Diagnostic>) -> Type {
    match ty {
        TypeRef::Array(inner) => Type::Array(Box::new(resolve_type_ref(inner, ctx, structs, diags))),
        TypeRef::Named(name) => {
            if let Some(b) = Builtin::from_name(name) {
                Type::Builtin(b)
            } else if let Some(s) = structs.get(name) {
                Type::Struct {
                    name: s.name.clone(),
                    fields: s.fields.clone(),
                    parent: s.parent.clone(),
                }
            } else {
                diags.push(Diagnostic::error(&ctx.file, ctx.line, ctx.column, format!("unknown type '{name}'")));
                Type::Builtin(Builtin::Any)
            }
        }
    }
}

fn numeric_literal_type(text: &str) -> Builtin {
    let body = text.trim_end_matches(['b', 's', 'l', 'f', 'B', 'S', 'L', 'F']);
    match text.chars().last() {
        Some('b') | Some('B') => Builtin::Byte,
        Some('s') | Some('S') => Builtin::Short,
        Some('l') | Some('L') => Builtin::Long,
        Some('f') | Some('F') => Builtin::Float,
        _ if body.contains('.') || body.contains('e') || body.contains('E') => Builtin::Double,
        _ => Builtin::Int,
    }
}

/// Spec §4.3: an integer literal may narrow to a smaller integral type when
/// its value fits, even though its own inferred type would not otherwise be
/// compatible (e.g. `declare x: byte = 5` initializes from an `int` literal).
fn integer_literal_fits(expr: &Expr, target: Builtin) -> bool {
    let ExprKind::NumberLiteral(text) = &expr.kind else {
        return false;
    };
    if !matches!(numeric_literal_type(text), Builtin::Byte | Builtin::Short | Builtin::Int | Builtin::Long) {
        return false;
    }
    let body = text.trim_end_matches(['b', 's', 'l', 'B', 'S', 'L']);
    let Ok(value) = body.parse::<i64>() else {
        return false;
    };
    match target {
        Builtin::Byte => i8::try_from(value).is_ok(),
        Builtin::Short => i16::try_from(value).is_ok(),
        Builtin::Int => i32::try_from(value).is_ok(),
        Builtin::Long => true,
        _ => false,
    }
}

struct ModuleChecker<'a> {
    info: &'a ModuleInfo,
    diags: Vec<Diagnostic>,
    expr_types: HashMap<NodeId, Type>,
    loop_depth: u32,
}

impl<'a> ModuleChecker<'a> {
    fn err(&mut self, ctx: &NodeContext, msg: impl Into<String>) {
        self.diags.push(Diagnostic::error(&ctx.file, ctx.line, ctx.column, msg));
    }

    fn ancestors_fn(&self) -> impl Fn(&str) -> Vec<String> + '_ {
        move |n: &str| self.info.ancestors(n)
    }

    fn analyze_expr(&mut self, expr: &Expr, symtab: &SymbolTable) -> Type {
        let ty = match &expr.kind {
            ExprKind::Identifier(name) => {
                if let Some(sym) = symtab.lookup(name) {
                    sym.ty.clone()
                } else if let Some(g) = self.info.globals.get(name) {
                    g.clone()
                } else if let Some(f) = self.info.functions.get(name) {
                    Type::Function(f.params.clone(), Box::new(f.return_type.clone()))
                } else {
                    self.err(&expr.ctx, format!("undefined symbol '{name}'"));
                    Type::Builtin(Builtin::Any)
                }
            }
            ExprKind::NumberLiteral(text) => Type::Builtin(numeric_literal_type(text)),
            ExprKind::StringLiteral(_) => Type::Builtin(Builtin::String),
            ExprKind::BoolLiteral(_) => Type::Builtin(Builtin::Boolean),
            ExprKind::ArrayLiteral(elems) => {
                if elems.is_empty() {
                    Type::Array(Box::new(Type::Builtin(Builtin::Any)))
                } else {
                    let first = self.analyze_expr(&elems[0], symtab);
                    for e in &elems[1..] {
                        let t = self.analyze_expr(e, symtab);
                        if !t.is_compatible(&first, &self.ancestors_fn()) {
                            self.err(&e.ctx, "array literal elements must share a type");
                        }
                    }
                    Type::Array(Box::new(first))
                }
            }
            ExprKind::Unary(op, operand) => {
                let t = self.analyze_expr(operand, symtab);
                match op {
                    UnaryOp::Neg => {
                        if !t.is_numeric() {
                            self.err(&expr.ctx, format!("cannot negate a {t}"));
                        }
                        t
                    }
                    UnaryOp::Not => {
                        if t != Type::Builtin(Builtin::Boolean) {
                            self.err(&expr.ctx, format!("cannot apply '!' to a {t}"));
                        }
                        Type::Builtin(Builtin::Boolean)
                    }
                }
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let lt = self.analyze_expr(lhs, symtab);
                let rt = self.analyze_expr(rhs, symtab);
                self.binary_result_type(*op, &lt, &rt, &expr.ctx)
            }
            ExprKind::Call(callee, args) => self.analyze_call(callee, args, symtab, &expr.ctx),
            ExprKind::Index(arr, idx) => {
                let at = self.analyze_expr(arr, symtab);
                let it = self.analyze_expr(idx, symtab);
                if !it.is_numeric() {
                    self.err(&idx.ctx, "index expression must be numeric");
                }
                match at {
                    Type::Array(elem) => *elem,
                    _ => {
                        self.err(&arr.ctx, format!("cannot index a {at}"));
                        Type::Builtin(Builtin::Any)
                    }
                }
            }
            ExprKind::Member(obj, field) => {
                let ot = self.analyze_expr(obj, symtab);
                match &ot {
                    Type::Struct { name, .. } => match self.info.field_type(name, field) {
                        Some(t) => t,
                        None => {
                            self.err(&expr.ctx, format!("struct '{name}' has no field '{field}'"));
                            Type::Builtin(Builtin::Any)
                        }
                    },
                    _ => {
                        self.err(&obj.ctx, format!("cannot access field of a {ot}"));
                        Type::Builtin(Builtin::Any)
                    }
                }
            }
            ExprKind::New(type_name, args) => {
                for a in args {
                    self.analyze_expr(a, symtab);
                }
                match self.info.structs.get(type_name) {
                    Some(s) => Type::Struct {
                        name: s.name.clone(),
                        fields: s.fields.clone(),
                        parent: s.parent.clone(),
                    },
                    None => {
                        self.err(&expr.ctx, format!("unknown struct type '{type_name}'"));
                        Type::Builtin(Builtin::Any)
                    }
                }
            }
        };
        self.expr_types.insert(expr.id, ty.clone());
        ty
    }

    fn binary_result_type(&mut self, op: BinaryOp, lt: &Type, rt: &Type, ctx: &NodeContext) -> Type {
        use BinaryOp::*;
        match op {
            Add if *lt == Type::Builtin(Builtin::String) && *rt == Type::Builtin(Builtin::String) => {
                Type::Builtin(Builtin::String)
            }
            Add | Sub | Mul | Div | Mod | And | Or | Xor => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    self.err(ctx, format!("arithmetic requires numeric operands, got {lt} and {rt}"));
                    return Type::Builtin(Builtin::Int);
                }
                let (Type::Builtin(a), Type::Builtin(b)) = (lt, rt) else {
                    unreachable!("is_numeric implies Builtin")
                };
                Type::Builtin(Builtin::widen(*a, *b))
            }
            Eq | Ne | Lt | Le | Gt | Ge => {
                if !lt.is_compatible(rt, &self.ancestors_fn()) && !rt.is_compatible(lt, &self.ancestors_fn()) {
                    self.err(ctx, format!("cannot compare {lt} with {rt}"));
                }
                Type::Builtin(Builtin::Boolean)
            }
            LogicalAnd | LogicalOr => {
                if *lt != Type::Builtin(Builtin::Boolean) || *rt != Type::Builtin(Builtin::Boolean) {
                    self.err(ctx, "logical operators require boolean operands");
                }
                Type::Builtin(Builtin::Boolean)
            }
        }
    }

    fn analyze_call(&mut self, callee: &Expr, args: &[Expr], symtab: &SymbolTable, ctx: &NodeContext) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|a| self.analyze_expr(a, symtab)).collect();
        if let ExprKind::Member(obj, method) = &callee.kind {
            let ot = self.analyze_expr(obj, symtab);
            let Type::Struct { name, .. } = &ot else {
                self.err(&obj.ctx, format!("cannot call method on a {ot}"));
                return Type::Builtin(Builtin::Any);
            };
            let mangled = format!("{name}_{method}");
            return self.check_call_against(&mangled, &arg_types, ctx).unwrap_or(Type::Builtin(Builtin::Any));
        }
        if let ExprKind::Identifier(name) = &callee.kind {
            if let Some(ty) = self.check_call_against(name, &arg_types, ctx) {
                return ty;
            }
            self.err(ctx, format!("call to undefined function '{name}'"));
            return Type::Builtin(Builtin::Any);
        }
        self.err(ctx, "call target must be a function or method name");
        Type::Builtin(Builtin::Any)
    }

    fn check_call_against(&mut self, name: &str, arg_types: &[Type], ctx: &NodeContext) -> Option<Type> {
        let f = self.info.functions.get(name)?.clone();
        if f.params.len() != arg_types.len() {
            self.err(ctx, format!("'{name}' expects {} argument(s), got {}", f.params.len(), arg_types.len()));
        } else {
            for (i, (expected, actual)) in f.params.iter().zip(arg_types).enumerate() {
                if !actual.is_compatible(expected, &self.ancestors_fn()) {
                    self.err(ctx, format!("argument {} to '{name}' expects {expected}, got {actual}", i + 1));
                }
            }
        }
        Some(f.return_type)
    }

    fn analyze_stmt(&mut self, stmt: &Stmt, symtab: &mut SymbolTable, return_type: &Type, decl_types: &mut HashMap<NodeId, Type>) {
        match &stmt.kind {
            StmtKind::Declaration { name, ty, init, is_const } => {
                let declared = ty.as_ref().map(|t| resolve_type_ref(t, &stmt.ctx, &self.info.structs, &mut self.diags));
                let init_ty = init.as_ref().map(|e| self.analyze_expr(e, symtab));
                let resolved = match (&declared, &init_ty) {
                    (Some(d), Some(i)) => {
                        let narrows = matches!(d, Type::Builtin(b) if init.as_ref().is_some_and(|e| integer_literal_fits(e, *b)));
                        if !i.is_compatible(d, &self.ancestors_fn()) && !narrows {
                            self.err(&stmt.ctx, format!("cannot initialize {name}: {d} from {i}"));
                        }
                        d.clone()
                    }
                    (Some(d), None) => d.clone(),
                    (None, Some(i)) => i.clone(),
                    (None, None) => {
                        self.err(&stmt.ctx, format!("declaration of '{name}' needs a type or initializer"));
                        Type::Builtin(Builtin::Any)
                    }
                };
                decl_types.insert(stmt.id, resolved.clone());
                symtab.declare(Symbol {
                    name: name.clone(),
                    ty: resolved,
                    kind: SymbolKind::Variable,
                    is_const: *is_const,
                });
            }
            StmtKind::Assignment { target, value } => {
                let value_ty = self.analyze_expr(value, symtab);
                match &target.kind {
                    ExprKind::Identifier(name) => match symtab.lookup(name) {
                        Some(sym) if sym.is_const => {
                            self.err(&target.ctx, format!("cannot assign to const '{name}'"));
                        }
                        Some(sym) => {
                            let narrows = matches!(&sym.ty, Type::Builtin(b) if integer_literal_fits(value, *b));
                            if !value_ty.is_compatible(&sym.ty, &self.ancestors_fn()) && !narrows {
                                self.err(&stmt.ctx, format!("cannot assign {value_ty} to {name}: {}", sym.ty));
                            }
                        }
                        None => self.err(&target.ctx, format!("undefined symbol '{name}'")),
                    },
                    _ => {
                        self.analyze_expr(target, symtab);
                    }
                }
            }
            StmtKind::IndexAssignment { array, index, value } => {
                let at = self.analyze_expr(array, symtab);
                let it = self.analyze_expr(index, symtab);
                let vt = self.analyze_expr(value, symtab);
                if !it.is_numeric() {
                    self.err(&index.ctx, "index expression must be numeric");
                }
                match at {
                    Type::Array(elem) if !vt.is_compatible(&elem, &self.ancestors_fn()) => {
                        self.err(&stmt.ctx, format!("cannot store {vt} into array of {elem}"));
                    }
                    Type::Array(_) => {}
                    other => self.err(&array.ctx, format!("cannot index a {other}")),
                }
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                let ct = self.analyze_expr(cond, symtab);
                if ct != Type::Builtin(Builtin::Boolean) {
                    self.err(&cond.ctx, format!("if condition must be boolean, got {ct}"));
                }
                symtab.push_scope();
                for s in then_branch {
                    self.analyze_stmt(s, symtab, return_type, decl_types);
                }
                symtab.pop_scope();
                if let Some(stmts) = else_branch {
                    symtab.push_scope();
                    for s in stmts {
                        self.analyze_stmt(s, symtab, return_type, decl_types);
                    }
                    symtab.pop_scope();
                }
            }
            StmtKind::Loop { init, cond, step, body } => {
                symtab.push_scope();
                if let Some(s) = init {
                    self.analyze_stmt(s, symtab, return_type, decl_types);
                }
                if let Some(c) = cond {
                    let ct = self.analyze_expr(c, symtab);
                    if ct != Type::Builtin(Builtin::Boolean) {
                        self.err(&c.ctx, format!("loop condition must be boolean, got {ct}"));
                    }
                }
                self.loop_depth += 1;
                for s in body {
                    self.analyze_stmt(s, symtab, return_type, decl_types);
                }
                self.loop_depth -= 1;
                if let Some(s) = step {
                    self.analyze_stmt(s, symtab, return_type, decl_types);
                }
                symtab.pop_scope();
            }
            StmtKind::Return(value) => {
                let vt = value.as_ref().map(|e| self.analyze_expr(e, symtab));
                match (&vt, return_type) {
                    (None, Type::Builtin(Builtin::Void)) => {}
                    (None, _) => self.err(&stmt.ctx, "non-void function must return a value"),
                    (Some(_), Type::Builtin(Builtin::Void)) => self.err(&stmt.ctx, "void function must not return a value"),
                    (Some(t), expected) => {
                        if !t.is_compatible(expected, &self.ancestors_fn()) {
                            self.err(&stmt.ctx, format!("return type mismatch: expected {expected}, got {t}"));
                        }
                    }
                }
            }
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    let what = if matches!(stmt.kind, StmtKind::Break) { "break" } else { "continue" };
                    self.err(&stmt.ctx, format!("'{what}' outside a loop"));
                }
            }
            StmtKind::ExpressionStmt(e) => {
                self.analyze_expr(e, symtab);
            }
        }
    }
}

fn struct_type_of(def: &StructDef, structs: &HashMap<String, StructType>, diags: &mut Vec<Diagnostic>) -> StructType {
    StructType {
        name: def.name.clone(),
        fields: def
            .fields
            .iter()
            .map(|p| (p.name.clone(), resolve_type_ref(&p.ty, &def.ctx, structs, diags)))
            .collect(),
        parent: def.parent.clone(),
    }
}

fn function_type_of(def: &FunctionDef, structs: &HashMap<String, StructType>, diags: &mut Vec<Diagnostic>) -> FunctionType {
    FunctionType {
        params: def.params.iter().map(|p| resolve_type_ref(&p.ty, &def.ctx, structs, diags)).collect(),
        return_type: resolve_type_ref(&def.return_type, &def.ctx, structs, diags),
    }
}

/// Names resolved to a `SYSCALL <id>` instead of a user `Call` at lowering
/// time (spec.md §4.7's `PRINT`/`PRINTLN`/`READ_LINE` io syscalls).
pub fn builtin_syscall_id(name: &str) -> Option<i64> {
    match name {
        "print" => Some(0),
        "println" => Some(1),
        "read_line" => Some(3),
        _ => None,
    }
}

fn register_builtins(info: &mut ModuleInfo) {
    let any = Type::Builtin(Builtin::Any);
    let void = Type::Builtin(Builtin::Void);
    info.functions.insert("print".to_string(), FunctionType { params: vec![any.clone()], return_type: void.clone() });
    info.functions.insert("println".to_string(), FunctionType { params: vec![any], return_type: void });
    info.functions.insert(
        "read_line".to_string(),
        FunctionType { params: vec![], return_type: Type::Builtin(Builtin::String) },
    );
}

fn check_module(module: &Module, diags: &mut Vec<Diagnostic>) -> CheckedModule {
    let mut info = ModuleInfo {
        name: module.name.clone(),
        ..Default::default()
    };
    register_builtins(&mut info);
    for s in &module.structs {
        let st = struct_type_of(s, &info.structs, diags);
        info.structs.insert(s.name.clone(), st);
    }
    for f in &module.functions {
        let ft = function_type_of(f, &info.structs, diags);
        info.functions.insert(f.name.clone(), ft);
    }
    for s in &module.structs {
        for m in &s.methods {
            let ft = function_type_of(m, &info.structs, diags);
            info.functions.insert(format!("{}_{}", s.name, m.name), ft);
        }
    }
    for g in &module.globals {
        if let StmtKind::Declaration { name, ty, .. } = &g.kind {
            let declared = ty
                .as_ref()
                .map(|t| resolve_type_ref(t, &g.ctx, &info.structs, diags))
                .unwrap_or(Type::Builtin(Builtin::Any));
            info.globals.insert(name.clone(), declared);
        }
    }

    let mut global_decl_types = HashMap::new();
    let global_expr_types;
    {
        let mut checker = ModuleChecker {
            info: &info,
            diags: Vec::new(),
            expr_types: HashMap::new(),
            loop_depth: 0,
        };
        let mut symtab = SymbolTable::new();
        for g in &module.globals {
            checker.analyze_stmt(g, &mut symtab, &Type::Builtin(Builtin::Void), &mut global_decl_types);
        }
        diags.append(&mut checker.diags);
        global_expr_types = checker.expr_types;
        for (name, ty) in global_decl_types.iter().filter_map(|(id, ty)| {
            module.globals.iter().find(|g| g.id == *id).and_then(|g| match &g.kind {
                StmtKind::Declaration { name, .. } => Some((name.clone(), ty.clone())),
                _ => None,
            })
        }) {
            info.globals.insert(name, ty);
        }
    }

    let mut functions = Vec::new();
    for f in &module.functions {
        functions.push(check_function(f, &info, diags));
    }
    for s in &module.structs {
        for m in &s.methods {
            let mangled = FunctionDef {
                name: format!("{}_{}", s.name, m.name),
                params: {
                    let mut p = vec![Param {
                        name: "self".to_string(),
                        ty: TypeRef::Named(s.name.clone()),
                    }];
                    p.extend(m.params.clone());
                    p
                },
                return_type: m.return_type.clone(),
                body: m.body.clone(),
                ctx: m.ctx.clone(),
            };
            functions.push(check_function(&mangled, &info, diags));
        }
    }

    CheckedModule {
        info,
        functions,
        globals: module.globals.clone(),
        global_decl_types,
        global_expr_types,
    }
}

fn check_function(def: &FunctionDef, info: &ModuleInfo, diags: &mut Vec<Diagnostic>) -> CheckedFunction {
    let param_types: Vec<Type> = def.params.iter().map(|p| resolve_type_ref(&p.ty, &def.ctx, &info.structs, diags)).collect();
    let return_type = resolve_type_ref(&def.return_type, &def.ctx, &info.structs, diags);

    let mut checker = ModuleChecker {
        info,
        diags: Vec::new(),
        expr_types: HashMap::new(),
        loop_depth: 0,
    };
    let mut symtab = SymbolTable::new();
    for (p, ty) in def.params.iter().zip(&param_types) {
        symtab.declare(Symbol {
            name: p.name.clone(),
            ty: ty.clone(),
            kind: SymbolKind::Parameter,
            is_const: false,
        });
    }
    let mut decl_types = HashMap::new();
    for stmt in &def.body {
        checker.analyze_stmt(stmt, &mut symtab, &return_type, &mut decl_types);
    }
    diags.append(&mut checker.diags);

    CheckedFunction {
        def: def.clone(),
        param_types,
        return_type,
        decl_types,
        expr_types: checker.expr_types,
    }
}

pub fn analyze(items: &[TopLevel]) -> (CheckedProgram, Vec<Diagnostic>) {
    let mut diags = Vec::new();
    let mut modules = Vec::new();
    let mut loose_functions = Vec::new();
    for item in items {
        match item {
            TopLevel::Module(m) => modules.push(check_module(m, &mut diags)),
            TopLevel::Function(f) => loose_functions.push(f.clone()),
            TopLevel::Import(_) => {}
        }
    }
    if !loose_functions.is_empty() {
        let synthetic = Module {
            name: "__toplevel__".to_string(),
            imports: Vec::new(),
            globals: Vec::new(),
            structs: Vec::new(),
            functions: loose_functions,
        };
        modules.push(check_module(&synthetic, &mut diags));
    }
    (CheckedProgram { modules }, diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn check(src: &str) -> (CheckedProgram, Vec<Diagnostic>) {
        let (tokens, _) = Lexer::new(src, "t").scan();
        let (items, parse_diags) = Parser::new(&tokens, "t").parse();
        assert!(parse_diags.is_empty(), "{parse_diags:?}");
        analyze(&items)
    }

    #[test]
    fn arithmetic_declaration_is_well_typed() {
        let (_, diags) = check(
            "module: M function: main returns: int body: declare x:int = 2+3*4 return x end body end function end module",
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn return_type_mismatch_is_reported() {
        let (_, diags) = check("function: f returns: int body: return \"oops\" end body end function");
        assert!(!diags.is_empty());
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let (_, diags) = check("function: f returns: void body: break end body end function");
        assert!(diags.iter().any(|d| d.message.contains("outside a loop")));
    }

    #[test]
    fn undefined_symbol_is_reported() {
        let (_, diags) = check("function: f returns: int body: return y end body end function");
        assert!(diags.iter().any(|d| d.message.contains("undefined symbol")));
    }

    #[test]
    fn narrowing_return_double_to_int_is_rejected() {
        let (_, diags) = check("function: f returns: int body: declare x:double = 1.0 return x end body end function");
        assert!(!diags.is_empty());
    }

    #[test]
    fn int_literal_that_fits_narrows_to_byte() {
        let (_, diags) = check("function: f returns: void body: declare x:byte = 5 end body end function");
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn int_literal_out_of_byte_range_is_rejected() {
        let (_, diags) = check("function: f returns: void body: declare x:byte = 200 end body end function");
        assert!(!diags.is_empty());
    }

    #[test]
    fn non_literal_int_does_not_narrow_to_byte() {
        let (_, diags) = check(
            "function: f returns: void body: declare y:int = 5 declare x:byte = y end body end function",
        );
        assert!(!diags.is_empty());
    }
}
