//! C2: Pratt-style expression parser plus statement/top-level factory
//! dispatch, producing a typed AST (spec.md §4.2).

use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::token::{Token, TokenKind};

/// The three parse error kinds named by spec.md §4.2, each carrying a
/// source position.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    MissingToken { expected: String, line: usize, column: usize },
    UnexpectedToken { found: String, line: usize, column: usize },
    UnsupportedFeature { name: String, line: usize, column: usize },
}

impl ParseError {
    fn into_diagnostic(self, file: &str) -> Diagnostic {
        match self {
            ParseError::MissingToken { expected, line, column } => {
                Diagnostic::error(file, line, column, format!("expected {expected}"))
            }
            ParseError::UnexpectedToken { found, line, column } => {
                Diagnostic::error(file, line, column, format!("unexpected token '{found}'"))
            }
            ParseError::UnsupportedFeature { name, line, column } => {
                Diagnostic::error(file, line, column, format!("unsupported feature: {name}"))
            }
        }
    }
}

/// Token stream facade: `peek`/`advance` skip comments and newlines
/// transparently (the surface grammar is newline-insensitive), while
/// `synchronize_*` walks the raw stream — including newlines — to find a
/// resync point after an error (spec.md §4.2).
struct TokenStream<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenStream<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        TokenStream { tokens, pos: 0 }
    }

    fn skip_noise(&mut self) {
        while matches!(self.tokens[self.pos].kind, TokenKind::Comment | TokenKind::Newline) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> &Token {
        self.skip_noise();
        &self.tokens[self.pos]
    }

    fn peek_is(&mut self, lexeme: &str) -> bool {
        self.peek().lexeme == lexeme
    }

    fn advance(&mut self) -> Token {
        self.skip_noise();
        let t = self.tokens[self.pos].clone();
        if t.kind != TokenKind::Eof {
            self.pos += 1;
        }
        t
    }

    fn at_end(&mut self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn expect_lexeme(&mut self, lexeme: &str) -> Result<Token, ParseError> {
        if self.peek_is(lexeme) {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            Err(ParseError::MissingToken {
                expected: format!("'{lexeme}'"),
                line: found.line,
                column: found.column,
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<Token, ParseError> {
        let t = self.peek().clone();
        if t.kind == TokenKind::Identifier {
            Ok(self.advance())
        } else {
            Err(ParseError::MissingToken {
                expected: "identifier".to_string(),
                line: t.line,
                column: t.column,
            })
        }
    }

    /// Skip raw tokens (including newlines) until just past the next
    /// newline, or end of input.
    fn synchronize_statement(&mut self) {
        while self.tokens[self.pos].kind != TokenKind::Eof {
            let was_newline = self.tokens[self.pos].kind == TokenKind::Newline;
            self.pos += 1;
            if was_newline {
                break;
            }
        }
    }

    /// Skip raw tokens until the next `module`/`function` keyword or EOF.
    fn synchronize_top_level(&mut self) {
        while self.tokens[self.pos].kind != TokenKind::Eof {
            let t = &self.tokens[self.pos];
            if t.kind == TokenKind::Keyword && (t.lexeme == "module" || t.lexeme == "function") {
                break;
            }
            self.pos += 1;
        }
    }
}

pub struct Parser<'a> {
    stream: TokenStream<'a>,
    ids: NodeIdAllocator,
    file: String,
    errors: Vec<Diagnostic>,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], file: impl Into<String>) -> Self {
        Parser {
            stream: TokenStream::new(tokens),
            ids: NodeIdAllocator::new(),
            file: file.into(),
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, err: ParseError) {
        self.errors.push(err.into_diagnostic(&self.file));
    }

    fn ctx(&self, tok: &Token) -> NodeContext {
        NodeContext {
            file: self.file.clone(),
            line: tok.line,
            column: tok.column,
        }
    }

    pub fn parse(mut self) -> (Vec<TopLevel>, Vec<Diagnostic>) {
        let mut items = Vec::new();
        let mut loose_stmts = Vec::new();
        while !self.stream.at_end() {
            let peeked = self.stream.peek().clone();
            if peeked.kind == TokenKind::Keyword && peeked.lexeme == "module" {
                match self.parse_module() {
                    Ok(m) => items.push(TopLevel::Module(m)),
                    Err(e) => {
                        self.fail(e);
                        self.stream.synchronize_top_level();
                    }
                }
            } else if peeked.kind == TokenKind::Keyword && peeked.lexeme == "function" {
                match self.parse_function() {
                    Ok(f) => items.push(TopLevel::Function(f)),
                    Err(e) => {
                        self.fail(e);
                        self.stream.synchronize_top_level();
                    }
                }
            } else if peeked.kind == TokenKind::Keyword && peeked.lexeme == "import" {
                match self.parse_import() {
                    Ok(name) => items.push(TopLevel::Import(name)),
                    Err(e) => {
                        self.fail(e);
                        self.stream.synchronize_statement();
                    }
                }
            } else {
                match self.parse_statement() {
                    Ok(s) => loose_stmts.push(s),
                    Err(e) => {
                        self.fail(e);
                        self.stream.synchronize_statement();
                    }
                }
            }
        }
        if !loose_stmts.is_empty() {
            let ctx = loose_stmts[0].ctx.clone();
            items.push(TopLevel::Module(Module {
                name: "__script__".to_string(),
                imports: Vec::new(),
                globals: Vec::new(),
                structs: Vec::new(),
                functions: vec![FunctionDef {
                    name: "_start".to_string(),
                    params: Vec::new(),
                    return_type: TypeRef::Named("void".to_string()),
                    body: loose_stmts,
                    ctx,
                }],
            }));
        }
        (items, self.errors)
    }

    fn parse_import(&mut self) -> PResult<String> {
        self.stream.expect_lexeme("import")?;
        let mut parts = vec![self.stream.expect_identifier()?.lexeme];
        while self.stream.peek_is(".") {
            self.stream.advance();
            parts.push(self.stream.expect_identifier()?.lexeme);
        }
        Ok(parts.join("."))
    }

    fn parse_module(&mut self) -> PResult<Module> {
        self.stream.expect_lexeme("module")?;
        self.stream.expect_lexeme(":")?;
        let name = self.stream.expect_identifier()?.lexeme;
        let mut imports = Vec::new();
        let mut globals = Vec::new();
        let mut structs = Vec::new();
        let mut functions = Vec::new();
        loop {
            let t = self.stream.peek().clone();
            if t.kind == TokenKind::Keyword && t.lexeme == "end" {
                self.stream.advance();
                self.stream.expect_lexeme("module")?;
                break;
            }
            if t.kind == TokenKind::Eof {
                return Err(ParseError::MissingToken {
                    expected: "'end module'".to_string(),
                    line: t.line,
                    column: t.column,
                });
            }
            match t.lexeme.as_str() {
                "import" => imports.push(self.parse_import()?),
                "globals" => {
                    self.stream.advance();
                    self.stream.expect_lexeme(":")?;
                    while !(self.stream.peek_is("end")) {
                        globals.push(self.parse_statement()?);
                    }
                    self.stream.advance();
                    self.stream.expect_lexeme("globals")?;
                }
                "struct" => structs.push(self.parse_struct()?),
                "function" => functions.push(self.parse_function()?),
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        found: t.lexeme,
                        line: t.line,
                        column: t.column,
                    })
                }
            }
        }
        Ok(Module {
            name,
            imports,
            globals,
            structs,
            functions,
        })
    }

    fn parse_type_ref(&mut self) -> PResult<TypeRef> {
        let base_tok = self.stream.advance();
        if base_tok.kind != TokenKind::TypeName && base_tok.kind != TokenKind::Identifier {
            return Err(ParseError::MissingToken {
                expected: "type name".to_string(),
                line: base_tok.line,
                column: base_tok.column,
            });
        }
        let mut ty = TypeRef::Named(base_tok.lexeme);
        while self.stream.peek_is("[") {
            self.stream.advance();
            self.stream.expect_lexeme("]")?;
            ty = TypeRef::Array(Box::new(ty));
        }
        Ok(ty)
    }

    fn parse_param_list(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.stream.peek_is("returns") || self.stream.peek_is("body") || self.stream.peek_is("end") {
            return Ok(params);
        }
        loop {
            let name = self.stream.expect_identifier()?.lexeme;
            self.stream.expect_lexeme(":")?;
            let ty = self.parse_type_ref()?;
            params.push(Param { name, ty });
            if self.stream.peek_is(",") {
                self.stream.advance();
            } else {
                break;
            }
        }
        Ok(params)
    }

    /// Flexible-section function body: `params`/`returns`/`body` may appear
    /// in any order, each at most once (spec.md §4.2).
    fn parse_function(&mut self) -> PResult<FunctionDef> {
        let start = self.stream.expect_lexeme("function")?;
        self.stream.expect_lexeme(":")?;
        let name = self.stream.expect_identifier()?.lexeme;

        let mut params = None;
        let mut return_type = None;
        let mut body = None;

        loop {
            let t = self.stream.peek().clone();
            if t.kind == TokenKind::Keyword && t.lexeme == "end" {
                self.stream.advance();
                self.stream.expect_lexeme("function")?;
                break;
            }
            match t.lexeme.as_str() {
                "params" if params.is_none() => {
                    self.stream.advance();
                    self.stream.expect_lexeme(":")?;
                    params = Some(self.parse_param_list()?);
                }
                "returns" if return_type.is_none() => {
                    self.stream.advance();
                    self.stream.expect_lexeme(":")?;
                    return_type = Some(self.parse_type_ref()?);
                }
                "body" if body.is_none() => {
                    self.stream.advance();
                    self.stream.expect_lexeme(":")?;
                    let mut stmts = Vec::new();
                    while !(self.stream.peek_is("end")) {
                        stmts.push(self.parse_statement()?);
                    }
                    self.stream.advance();
                    self.stream.expect_lexeme("body")?;
                    body = Some(stmts);
                }
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        found: t.lexeme,
                        line: t.line,
                        column: t.column,
                    })
                }
            }
        }

        Ok(FunctionDef {
            name,
            params: params.unwrap_or_default(),
            return_type: return_type.unwrap_or(TypeRef::Named("void".to_string())),
            body: body.unwrap_or_default(),
            ctx: self.ctx(&start),
        })
    }

    fn parse_struct(&mut self) -> PResult<StructDef> {
        let start = self.stream.expect_lexeme("struct")?;
        self.stream.expect_lexeme(":")?;
        let name = self.stream.expect_identifier()?.lexeme;
        let parent = if self.stream.peek_is("extends") {
            self.stream.advance();
            Some(self.stream.expect_identifier()?.lexeme)
        } else {
            None
        };

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut init = None;
        loop {
            let t = self.stream.peek().clone();
            if t.kind == TokenKind::Keyword && t.lexeme == "end" {
                self.stream.advance();
                self.stream.expect_lexeme("struct")?;
                break;
            }
            match t.lexeme.as_str() {
                "init" => {
                    self.stream.advance();
                    self.stream.expect_lexeme(":")?;
                    let mut stmts = Vec::new();
                    while !self.stream.peek_is("end") {
                        stmts.push(self.parse_statement()?);
                    }
                    self.stream.advance();
                    self.stream.expect_lexeme("init")?;
                    init = Some(FunctionDef {
                        name: "init".to_string(),
                        params: Vec::new(),
                        return_type: TypeRef::Named("void".to_string()),
                        body: stmts,
                        ctx: self.ctx(&t),
                    });
                }
                "method" => {
                    self.stream.advance();
                    methods.push(self.parse_function()?);
                }
                _ if t.kind == TokenKind::Identifier => {
                    let fname = self.stream.advance().lexeme;
                    self.stream.expect_lexeme(":")?;
                    let fty = self.parse_type_ref()?;
                    fields.push(Param { name: fname, ty: fty });
                }
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        found: t.lexeme,
                        line: t.line,
                        column: t.column,
                    })
                }
            }
        }
        Ok(StructDef {
            name,
            parent,
            fields,
            methods,
            init,
            ctx: self.ctx(&start),
        })
    }

    // ---- statements ----

    fn next_expr_id(&mut self) -> NodeId {
        self.ids.alloc()
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        let t = self.stream.peek().clone();
        match t.lexeme.as_str() {
            "declare" => self.parse_declaration(),
            "if" => self.parse_if(),
            "loop" => self.parse_loop(),
            "return" => self.parse_return(),
            "break" => {
                self.stream.advance();
                Ok(Stmt {
                    id: self.ids.alloc(),
                    ctx: self.ctx(&t),
                    kind: StmtKind::Break,
                })
            }
            "continue" => {
                self.stream.advance();
                Ok(Stmt {
                    id: self.ids.alloc(),
                    ctx: self.ctx(&t),
                    kind: StmtKind::Continue,
                })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_declaration(&mut self) -> PResult<Stmt> {
        let start = self.stream.expect_lexeme("declare")?;
        let is_const = if self.stream.peek_is("const") {
            self.stream.advance();
            true
        } else {
            false
        };
        let name = self.stream.expect_identifier()?.lexeme;
        let ty = if self.stream.peek_is(":") {
            self.stream.advance();
            Some(self.parse_type_ref()?)
        } else {
            None
        };
        let init = if self.stream.peek_is("=") {
            self.stream.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };
        Ok(Stmt {
            id: self.ids.alloc(),
            ctx: self.ctx(&start),
            kind: StmtKind::Declaration { name, ty, init, is_const },
        })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let start = self.stream.expect_lexeme("if")?;
        let cond = self.parse_expression(0)?;
        self.stream.expect_lexeme("then")?;
        let mut then_branch = Vec::new();
        while !(self.stream.peek_is("else") || self.stream.peek_is("end")) {
            then_branch.push(self.parse_statement()?);
        }
        let else_branch = if self.stream.peek_is("else") {
            self.stream.advance();
            let mut stmts = Vec::new();
            while !self.stream.peek_is("end") {
                stmts.push(self.parse_statement()?);
            }
            Some(stmts)
        } else {
            None
        };
        self.stream.expect_lexeme("end")?;
        self.stream.expect_lexeme("if")?;
        Ok(Stmt {
            id: self.ids.alloc(),
            ctx: self.ctx(&start),
            kind: StmtKind::If { cond, then_branch, else_branch },
        })
    }

    /// `loop init S cond E step S body... end loop` — `init`/`cond`/`step`
    /// are optional flexible sub-keywords, any order, each at most once,
    /// followed directly by the loop body (spec.md §4.2/§4.4).
    fn parse_loop(&mut self) -> PResult<Stmt> {
        let start = self.stream.expect_lexeme("loop")?;
        let mut init = None;
        let mut cond = None;
        let mut step = None;
        loop {
            let t = self.stream.peek().clone();
            match t.lexeme.as_str() {
                "init" if init.is_none() => {
                    self.stream.advance();
                    init = Some(Box::new(self.parse_statement()?));
                }
                "cond" if cond.is_none() => {
                    self.stream.advance();
                    cond = Some(self.parse_expression(0)?);
                }
                "step" if step.is_none() => {
                    self.stream.advance();
                    step = Some(Box::new(self.parse_statement()?));
                }
                _ => break,
            }
        }
        let mut body = Vec::new();
        while !self.stream.peek_is("end") {
            body.push(self.parse_statement()?);
        }
        self.stream.advance();
        self.stream.expect_lexeme("loop")?;
        Ok(Stmt {
            id: self.ids.alloc(),
            ctx: self.ctx(&start),
            kind: StmtKind::Loop { init, cond, step, body },
        })
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        let start = self.stream.expect_lexeme("return")?;
        let next = self.stream.peek().clone();
        const STMT_STARTERS: &[&str] = &["end", "declare", "if", "loop", "return", "break", "continue", "else"];
        let value = if next.kind == TokenKind::Eof || STMT_STARTERS.contains(&next.lexeme.as_str()) {
            None
        } else {
            Some(self.parse_expression(0)?)
        };
        Ok(Stmt {
            id: self.ids.alloc(),
            ctx: self.ctx(&start),
            kind: StmtKind::Return(value),
        })
    }

    fn parse_expression_statement(&mut self) -> PResult<Stmt> {
        let start = self.stream.peek().clone();
        let lhs = self.parse_expression(0)?;
        if self.stream.peek_is("=") {
            self.stream.advance();
            let value = self.parse_expression(0)?;
            let kind = match lhs.kind {
                ExprKind::Index(array, index) => StmtKind::IndexAssignment {
                    array: *array,
                    index: *index,
                    value,
                },
                _ => StmtKind::Assignment { target: lhs, value },
            };
            Ok(Stmt { id: self.ids.alloc(), ctx: self.ctx(&start), kind })
        } else {
            Ok(Stmt {
                id: self.ids.alloc(),
                ctx: self.ctx(&start),
                kind: StmtKind::ExpressionStmt(lhs),
            })
        }
    }

    // ---- expressions (Pratt) ----
    // Precedence ladder (low to high): LOWEST, OR, AND, EQUALITY, COMPARISON,
    // SUM, PRODUCT, UNARY, CALL.

    fn binary_op_and_prec(lexeme: &str) -> Option<(BinaryOp, u8)> {
        Some(match lexeme {
            "||" => (BinaryOp::LogicalOr, 1),
            "&&" => (BinaryOp::LogicalAnd, 2),
            "==" => (BinaryOp::Eq, 3),
            "!=" => (BinaryOp::Ne, 3),
            ">" => (BinaryOp::Gt, 4),
            ">=" => (BinaryOp::Ge, 4),
            "<" => (BinaryOp::Lt, 4),
            "<=" => (BinaryOp::Le, 4),
            "+" => (BinaryOp::Add, 5),
            "-" => (BinaryOp::Sub, 5),
            "*" => (BinaryOp::Mul, 6),
            "/" => (BinaryOp::Div, 6),
            "%" => (BinaryOp::Mod, 6),
            _ => return None,
        })
    }

    const CALL_PREC: u8 = 8;

    fn parse_expression(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.parse_prefix()?;
        loop {
            let t = self.stream.peek().clone();
            if t.lexeme == "(" && Self::CALL_PREC > min_prec {
                self.stream.advance();
                let mut args = Vec::new();
                if !self.stream.peek_is(")") {
                    loop {
                        args.push(self.parse_expression(0)?);
                        if self.stream.peek_is(",") {
                            self.stream.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.stream.expect_lexeme(")")?;
                let ctx = lhs.ctx.clone();
                lhs = Expr {
                    id: self.next_expr_id(),
                    ctx,
                    kind: ExprKind::Call(Box::new(lhs), args),
                };
                continue;
            }
            if t.lexeme == "[" && Self::CALL_PREC > min_prec {
                self.stream.advance();
                let index = self.parse_expression(0)?;
                self.stream.expect_lexeme("]")?;
                let ctx = lhs.ctx.clone();
                lhs = Expr {
                    id: self.next_expr_id(),
                    ctx,
                    kind: ExprKind::Index(Box::new(lhs), Box::new(index)),
                };
                continue;
            }
            if t.lexeme == "." && Self::CALL_PREC > min_prec {
                self.stream.advance();
                let name = self.stream.expect_identifier()?.lexeme;
                let ctx = lhs.ctx.clone();
                lhs = Expr {
                    id: self.next_expr_id(),
                    ctx,
                    kind: ExprKind::Member(Box::new(lhs), name),
                };
                continue;
            }
            if let Some((op, prec)) = Self::binary_op_and_prec(&t.lexeme) {
                if prec <= min_prec {
                    break;
                }
                self.stream.advance();
                let rhs = self.parse_expression(prec)?;
                let ctx = lhs.ctx.clone();
                lhs = Expr {
                    id: self.next_expr_id(),
                    ctx,
                    kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
                };
                continue;
            }
            break;
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> PResult<Expr> {
        let t = self.stream.peek().clone();
        let ctx = self.ctx(&t);
        match t.kind {
            TokenKind::NumberLiteral => {
                self.stream.advance();
                Ok(Expr { id: self.next_expr_id(), ctx, kind: ExprKind::NumberLiteral(t.lexeme) })
            }
            TokenKind::StringLiteral => {
                self.stream.advance();
                Ok(Expr { id: self.next_expr_id(), ctx, kind: ExprKind::StringLiteral(t.lexeme) })
            }
            TokenKind::BoolLiteral => {
                self.stream.advance();
                Ok(Expr { id: self.next_expr_id(), ctx, kind: ExprKind::BoolLiteral(t.lexeme == "true") })
            }
            TokenKind::Identifier => {
                self.stream.advance();
                Ok(Expr { id: self.next_expr_id(), ctx, kind: ExprKind::Identifier(t.lexeme) })
            }
            TokenKind::Keyword if t.lexeme == "new" => {
                self.stream.advance();
                let type_name = self.stream.expect_identifier()?.lexeme;
                self.stream.expect_lexeme("(")?;
                let mut args = Vec::new();
                if !self.stream.peek_is(")") {
                    loop {
                        args.push(self.parse_expression(0)?);
                        if self.stream.peek_is(",") {
                            self.stream.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.stream.expect_lexeme(")")?;
                Ok(Expr { id: self.next_expr_id(), ctx, kind: ExprKind::New(type_name, args) })
            }
            TokenKind::Operator if t.lexeme == "-" => {
                self.stream.advance();
                let operand = self.parse_expression(7)?;
                Ok(Expr { id: self.next_expr_id(), ctx, kind: ExprKind::Unary(UnaryOp::Neg, Box::new(operand)) })
            }
            TokenKind::Operator if t.lexeme == "!" => {
                self.stream.advance();
                let operand = self.parse_expression(7)?;
                Ok(Expr { id: self.next_expr_id(), ctx, kind: ExprKind::Unary(UnaryOp::Not, Box::new(operand)) })
            }
            TokenKind::Punct if t.lexeme == "(" => {
                self.stream.advance();
                let inner = self.parse_expression(0)?;
                self.stream.expect_lexeme(")")?;
                Ok(inner)
            }
            TokenKind::Punct if t.lexeme == "[" => {
                self.stream.advance();
                let mut elems = Vec::new();
                if !self.stream.peek_is("]") {
                    loop {
                        elems.push(self.parse_expression(0)?);
                        if self.stream.peek_is(",") {
                            self.stream.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.stream.expect_lexeme("]")?;
                Ok(Expr { id: self.next_expr_id(), ctx, kind: ExprKind::ArrayLiteral(elems) })
            }
            _ => Err(ParseError::UnexpectedToken {
                found: t.lexeme,
                line: t.line,
                column: t.column,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> (Vec<TopLevel>, Vec<Diagnostic>) {
        let (tokens, lex_diags) = Lexer::new(src, "t").scan();
        assert!(lex_diags.is_empty(), "lex errors: {lex_diags:?}");
        Parser::new(&tokens, "t").parse()
    }

    #[test]
    fn arithmetic_precedence() {
        let (items, errs) = parse(
            "module: M function: main returns: int body: declare x:int = 2+3*4 return x end body end function end module",
        );
        assert!(errs.is_empty(), "{errs:?}");
        let TopLevel::Module(m) = &items[0] else { panic!() };
        let f = &m.functions[0];
        let StmtKind::Declaration { init: Some(init), .. } = &f.body[0].kind else { panic!() };
        let ExprKind::Binary(BinaryOp::Add, _, rhs) = &init.kind else { panic!("expected +") };
        assert!(matches!(rhs.kind, ExprKind::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn loop_with_init_cond_step() {
        let (items, errs) = parse(
            "function: main returns: int body: \
             declare s:int = 0 \
             loop init declare i:int = 1 cond i <= 10 step i = i + 1 s = s + i end loop \
             return s end body end function",
        );
        assert!(errs.is_empty(), "{errs:?}");
        let TopLevel::Function(f) = &items[0] else { panic!() };
        assert!(matches!(f.body[1].kind, StmtKind::Loop { .. }));
    }

    #[test]
    fn assignment_detected_by_lookahead() {
        let (items, errs) = parse("function: f returns: void body: x = 1 + 2 end body end function");
        assert!(errs.is_empty(), "{errs:?}");
        let TopLevel::Function(f) = &items[0] else { panic!() };
        assert!(matches!(f.body[0].kind, StmtKind::Assignment { .. }));
    }

    #[test]
    fn loose_statements_become_script_module() {
        let (items, errs) = parse("declare x:int = 1 return x");
        assert!(errs.is_empty(), "{errs:?}");
        let TopLevel::Module(m) = &items[0] else { panic!() };
        assert_eq!(m.name, "__script__");
        assert_eq!(m.functions[0].name, "_start");
        assert_eq!(m.functions[0].body.len(), 2);
    }

    #[test]
    fn missing_end_function_is_reported() {
        let (_items, errs) = parse("function: f returns: void body: return end body");
        assert!(!errs.is_empty());
    }
}
