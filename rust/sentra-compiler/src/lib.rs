//! The compiler crate: source text → checked, lowered IR program (§4).
//!
//! Re-exports the pipeline stages individually (`lex`, `parse`, `check`,
//! `lower`) for callers that want to stop partway (e.g. the CLI's `parse`
//! and `check` subcommands), plus [`compile`], which runs the full
//! pipeline and aggregates every stage's error type into one
//! [`CompileError`].

pub mod compiler;

use compiler::checker::CheckError;
use compiler::ir::{ErrorPolicy, IrProgram};
use compiler::keywords::keyword_table;
use compiler::lexer::LexError;
use compiler::lower::LowerError;
use compiler::parser::ParseError;
use compiler::tokens::Token;
use std::path::Path;
use thiserror::Error;

pub use compiler::ast::Program;

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error(transparent)]
    Lower(#[from] LowerError),
}

/// Stage 1: source text → tokens (§4.1).
pub fn lex(source: &str, keyword_config: Option<&Path>) -> Result<Vec<Token>, LexError> {
    compiler::lexer::tokenize(source, keyword_table(keyword_config))
}

/// Stage 2: tokens → AST (§4.2).
pub fn parse(tokens: &[Token]) -> Result<Program, ParseError> {
    compiler::parser::parse(tokens)
}

/// Stage 3: static name/scope check over the AST (§4.3). Does not mutate or
/// return a new tree; a non-error result means the program is well-formed.
pub fn check(program: &Program) -> Result<(), CheckError> {
    compiler::checker::check(program)
}

/// Stage 4: checked AST → IR program (§4.4).
pub fn lower(program: &Program, error_policy: ErrorPolicy) -> Result<IrProgram, LowerError> {
    compiler::lower::lower(program, error_policy)
}

/// Runs the full pipeline: lex, parse, check, lower. This is what
/// `sentra run`/`sentra lower` drive (§7 "CLI").
pub fn compile(source: &str, keyword_config: Option<&Path>) -> Result<IrProgram, CompileError> {
    let span = tracing::info_span!("compile", len = source.len());
    let _enter = span.enter();
    let tokens = lex(source, keyword_config)?;
    let program = parse(&tokens)?;
    check(&program)?;
    let ir = lower(&program, ErrorPolicy::default())?;
    Ok(ir)
}
