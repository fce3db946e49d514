//! Static name/scope checker (§4.3). Walks the AST once, tracking which
//! names are in scope and what kind of thing each is, without executing
//! anything, using the same scoped-symbol-table idiom a block-structured
//! language's name resolver needs regardless of what it's checking.

use crate::compiler::ast::{Expr, Program, Stmt};
use sentra_core::Span;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CheckError {
    #[error("'{name}' is not defined at line {line}, col {col}")]
    UndefinedName { name: String, line: usize, col: usize },
    #[error("'{name}' is already defined at line {line}, col {col}")]
    Redefined { name: String, line: usize, col: usize },
    #[error("'row' is only in scope inside a 'for each row' body (line {line}, col {col})")]
    RowOutsideLoop { line: usize, col: usize },
    #[error("'{name}' is a {kind}, which cannot be exported as a table (line {line}, col {col})")]
    NotATable { name: String, kind: &'static str, line: usize, col: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Workbook,
    Table,
    Scalar,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Kind::Workbook => "workbook handle",
            Kind::Table => "table",
            Kind::Scalar => "scalar",
        }
    }
}

/// A stack of scopes, innermost last, mirroring how `for each` bodies
/// introduce a nested scope for `row` without hiding outer tables/vars.
struct SymbolTable {
    scopes: Vec<HashMap<String, Kind>>,
}

impl SymbolTable {
    fn new() -> Self {
        Self { scopes: vec![HashMap::new()] }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn define(&mut self, name: &str, kind: Kind, span: Span) -> Result<(), CheckError> {
        if let Some(existing) = self.lookup(name) {
            if existing == kind {
                return Ok(());
            }
            return Err(CheckError::Redefined { name: name.to_string(), line: span.line, col: span.col });
        }
        self.scopes.last_mut().unwrap().insert(name.to_string(), kind);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<Kind> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }
}

pub struct Checker {
    symbols: SymbolTable,
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker {
    pub fn new() -> Self {
        Self { symbols: SymbolTable::new() }
    }

    pub fn check(&mut self, program: &Program) -> Result<(), CheckError> {
        self.check_block(&program.statements)
    }

    fn check_block(&mut self, statements: &[Stmt]) -> Result<(), CheckError> {
        for stmt in statements {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<(), CheckError> {
        match stmt {
            Stmt::OpenWorkbook { path: _, span } => {
                self.symbols.define("__workbook", Kind::Workbook, *span)?;
                Ok(())
            }
            Stmt::TreatRangeAsTable { table_name, span, .. } => {
                self.symbols.define(table_name, Kind::Table, *span)
            }
            Stmt::SetVar { name, value, span } => {
                self.check_expr(value)?;
                self.symbols.define(name, Kind::Scalar, *span)
            }
            Stmt::AddColumn { table, value, span, .. } => {
                self.require_table(table, *span)?;
                self.check_expr(value)
            }
            Stmt::FilterTable { table, condition, span } => {
                self.require_table(table, *span)?;
                self.check_expr(condition)
            }
            Stmt::SortTable { table, by, span, .. } => {
                self.require_table(table, *span)?;
                self.check_expr(by)
            }
            Stmt::GroupTable { table, by, span, .. } => {
                self.require_table(table, *span)?;
                self.check_expr(by)
            }
            Stmt::ExportTable { source, span: _, .. } => self.check_expr(source),
            Stmt::CallResult { name, span } => self.require_defined(name, *span),
            Stmt::UseSystem { .. } | Stmt::LogIn { .. } | Stmt::LogOut { .. } | Stmt::GoToPage { .. } => Ok(()),
            Stmt::EnterField { value, .. } => self.check_expr(value),
            Stmt::ClickElement { .. } => Ok(()),
            Stmt::ExtractField { var, span, .. } => self.symbols.define(var, Kind::Scalar, *span),
            Stmt::ForEach { var, collection, body, span: _ } => {
                self.check_expr(collection)?;
                self.symbols.push_scope();
                let row_span = Span::dummy();
                let define_result =
                    self.symbols.define(var, Kind::Scalar, row_span).and_then(|_| self.check_block(body));
                self.symbols.pop_scope();
                define_result
            }
            Stmt::IfElse { condition, then_body, else_body, span: _ } => {
                self.check_expr(condition)?;
                self.symbols.push_scope();
                let then_result = self.check_block(then_body);
                self.symbols.pop_scope();
                then_result?;
                self.symbols.push_scope();
                let else_result = self.check_block(else_body);
                self.symbols.pop_scope();
                else_result
            }
            Stmt::OnError { .. } => Ok(()),
            Stmt::Comment { .. } => Ok(()),
        }
    }

    fn require_table(&self, name: &str, span: Span) -> Result<(), CheckError> {
        match self.symbols.lookup(name) {
            Some(Kind::Table) => Ok(()),
            Some(other) => {
                Err(CheckError::NotATable { name: name.to_string(), kind: other.label(), line: span.line, col: span.col })
            }
            None => Err(CheckError::UndefinedName { name: name.to_string(), line: span.line, col: span.col }),
        }
    }

    fn require_defined(&self, name: &str, span: Span) -> Result<(), CheckError> {
        if self.symbols.lookup(name).is_some() {
            Ok(())
        } else {
            Err(CheckError::UndefinedName { name: name.to_string(), line: span.line, col: span.col })
        }
    }

    fn check_expr(&self, expr: &Expr) -> Result<(), CheckError> {
        match expr {
            Expr::NumberLit { .. } | Expr::StringLit { .. } | Expr::MoneyLit { .. } | Expr::DateLit { .. } => Ok(()),
            Expr::Identifier { name, span } => self.require_defined(name, *span),
            Expr::QualifiedRef { base, span, .. } => {
                if base == "row" {
                    if self.symbols.lookup("row").is_some() {
                        Ok(())
                    } else {
                        Err(CheckError::RowOutsideLoop { line: span.line, col: span.col })
                    }
                } else {
                    self.require_defined(base, *span)
                }
            }
            Expr::Comparison { left, right, .. } => {
                self.check_expr(left)?;
                self.check_expr(right)
            }
            Expr::BinaryExpr { left, right, .. } => {
                self.check_expr(left)?;
                self.check_expr(right)
            }
            Expr::NotExpr { inner, .. } => self.check_expr(inner),
        }
    }
}

/// Runs the checker over a whole program (§4.3 entry point).
pub fn check(program: &Program) -> Result<(), CheckError> {
    let span = tracing::debug_span!("check", statements = program.statements.len());
    let _enter = span.enter();
    Checker::new().check(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::keywords::keyword_table;
    use crate::compiler::lexer::tokenize;
    use crate::compiler::parser::parse;

    fn check_src(src: &str) -> Result<(), CheckError> {
        let tokens = tokenize(src, keyword_table(None)).unwrap();
        let program = parse(&tokens).unwrap();
        check(&program)
    }

    #[test]
    fn well_formed_program_checks_clean() {
        let src = "Open workbook \"a.xlsx\".\n\
                   In sheet \"S\", treat range A1B2 as table T.\n\
                   Filter T where T.Balance > 0.\n\
                   Export T to \"out.csv\".\n";
        assert!(check_src(src).is_ok());
    }

    #[test]
    fn undefined_table_is_rejected() {
        let err = check_src("Filter Ghost where Ghost.Balance > 0.\n").unwrap_err();
        assert!(matches!(err, CheckError::UndefinedName { .. }));
    }

    #[test]
    fn row_outside_for_each_is_rejected() {
        let err = check_src("Set v to row.Amount.\n").unwrap_err();
        assert!(matches!(err, CheckError::RowOutsideLoop { .. }));
    }

    #[test]
    fn row_inside_for_each_is_accepted() {
        let src = "In sheet \"S\", treat range A1B2 as table T.\n\
                   For each row in T:\n    Set v to row.Amount.\n";
        assert!(check_src(src).is_ok());
    }

    #[test]
    fn scalar_used_as_table_is_rejected() {
        let src = "Set x to 1.\nFilter x where x.Balance > 0.\n";
        let err = check_src(src).unwrap_err();
        assert!(matches!(err, CheckError::NotATable { .. }));
    }

    #[test]
    fn if_else_branches_have_independent_scopes() {
        let src = "If 1 = 1:\n    Set a to 1.\nElse:\n    Set b to 2.\n";
        assert!(check_src(src).is_ok());
    }
}
