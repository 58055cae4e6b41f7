//! Snow compiler front/mid-end: C1 lexer, C2 parser, C3 semantic analysis,
//! C4 IR construction, C5 register allocation, C6 bytecode emission.
//!
//! # Modules
//! - [`diagnostic`]: the shared error/warning shape every stage reports.
//! - [`token`]/[`lexer`]: C1, source text to token stream.
//! - [`ast`]/[`parser`]: C2, token stream to typed AST.
//! - [`types`]/[`symbol`]/[`semantic`]: C3, scope/type checking over the AST.
//! - [`ir`]: C4, AST to three-address IR.
//! - [`regalloc`]: C5, virtual register to slot assignment.
//! - [`backend`]: C6, IR to `snow_core::Program` bytecode.
//! - [`config`]: pipeline-wide knobs shared across stages.

pub mod ast;
pub mod backend;
pub mod config;
pub mod diagnostic;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod regalloc;
pub mod semantic;
pub mod symbol;
pub mod token;
pub mod types;

pub use config::CompilerConfig;
pub use diagnostic::{Diagnostic, Severity};

use snow_core::Program;

/// Errors that can end the pipeline before bytecode is produced. Each stage
/// folds its own error type into a shared diagnostic list; this variant
/// carries just enough to tell the caller which stage gave up.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    Lexical(Vec<Diagnostic>),
    Syntax(Vec<Diagnostic>),
    Semantic(Vec<Diagnostic>),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (stage, diags) = match self {
            CompileError::Lexical(d) => ("lexical", d),
            CompileError::Syntax(d) => ("syntax", d),
            CompileError::Semantic(d) => ("semantic", d),
        };
        writeln!(f, "{stage} errors:")?;
        for d in diags {
            writeln!(f, "  {d}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Runs the full C1-C6 pipeline over `source`, producing a loadable
/// [`Program`]. Each stage's diagnostics are checked before the next stage
/// runs; the first stage to report an error halts the pipeline.
pub fn compile(source: &str, file: &str, config: &CompilerConfig) -> Result<Program, CompileError> {
    let (tokens, lex_diags) = lexer::Lexer::new(source, file).scan();
    if lex_diags.iter().any(|d| d.severity == Severity::Error) {
        return Err(CompileError::Lexical(lex_diags));
    }

    let (items, parse_diags) = parser::Parser::new(&tokens, file).parse();
    if parse_diags.iter().any(|d| d.severity == Severity::Error) {
        return Err(CompileError::Syntax(parse_diags));
    }

    let (checked, sem_diags) = semantic::analyze(&items);
    if sem_diags.iter().any(|d| d.severity == Severity::Error) {
        return Err(CompileError::Semantic(sem_diags));
    }

    let ir_module = ir::lower(&checked);
    let slots = regalloc::allocate(&ir_module);
    let program = backend::emit(&ir_module, &slots, config);
    Ok(program)
}
