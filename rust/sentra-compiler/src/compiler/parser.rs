//! Recursive-descent parser: tokens → `Program` (§4.2). One production per
//! sentence pattern; statements are dispatched by the leading KEYWORD.

use crate::compiler::ast::*;
use crate::compiler::tokens::{Token, TokenKind};
use sentra_core::Span;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("{message} at line {line}, col {col}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

const CURRENCIES: &[&str] = &["USD", "EUR", "GBP"];

pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn at_kw(&self, word: &str) -> bool {
        self.peek().is_keyword(word)
    }

    fn at(&self, matches_kind: impl Fn(&TokenKind) -> bool) -> bool {
        matches_kind(&self.peek().kind)
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        let t = self.peek();
        ParseError { message: message.into(), line: t.line(), col: t.col() }
    }

    fn expect_kw(&mut self, word: &str) -> Result<Token, ParseError> {
        if self.at_kw(word) {
            Ok(self.advance())
        } else {
            Err(self.err(format!("expected keyword '{word}', got {}", self.peek().kind)))
        }
    }

    fn expect_dot(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek().kind, TokenKind::Dot) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected '.', got {}", self.peek().kind)))
        }
    }

    fn expect_colon(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek().kind, TokenKind::Colon) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected ':', got {}", self.peek().kind)))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            let span = self.peek().span;
            self.advance();
            Ok((name, span))
        } else {
            Err(self.err(format!("expected identifier, got {}", self.peek().kind)))
        }
    }

    fn expect_string(&mut self) -> Result<(String, Span), ParseError> {
        if let TokenKind::String(s) = &self.peek().kind {
            let s = s.clone();
            let span = self.peek().span;
            self.advance();
            Ok((s, span))
        } else {
            Err(self.err(format!("expected string literal, got {}", self.peek().kind)))
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.advance();
        }
    }

    /// `range` token is an IDENT like `A1B2`, or the colon form tokenizes as
    /// `IDENT COLON IDENT` (`A1` `:` `G999`); either is accepted and the
    /// colon form is canonicalized back into one string (§4.2, §9, REDESIGN
    /// FLAG / Open Question 3).
    fn parse_range_spec(&mut self) -> Result<String, ParseError> {
        let (head, _) = self.expect_ident()?;
        if matches!(self.peek().kind, TokenKind::Colon) {
            self.advance();
            let (tail, _) = self.expect_ident()?;
            Ok(format!("{head}:{tail}"))
        } else {
            Ok(head)
        }
    }

    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            if matches!(self.peek().kind, TokenKind::Eof) {
                break;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements, source_path: None })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect_colon()?;
        self.skip_newlines();
        let mut body = Vec::new();
        if matches!(self.peek().kind, TokenKind::Indent) {
            self.advance();
            while !matches!(self.peek().kind, TokenKind::Dedent | TokenKind::Eof) {
                body.push(self.parse_statement()?);
                self.skip_newlines();
            }
            if matches!(self.peek().kind, TokenKind::Dedent) {
                self.advance();
            }
        }
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let t = self.peek().clone();
        match &t.kind {
            TokenKind::Keyword(k) => match k.as_str() {
                "For" => self.parse_for_each(),
                "If" => self.parse_if_else(),
                "On" => self.parse_on_error(),
                "Open" => self.parse_open_workbook(),
                "In" => self.parse_treat_range_as_table(),
                "Set" => self.parse_set_var(),
                "Call" => self.parse_call_result(),
                "Add" => self.parse_add_column(),
                "Filter" => self.parse_filter_table(),
                "Sort" => self.parse_sort_table(),
                "Group" => self.parse_group_table(),
                "Export" => self.parse_export(),
                "Use" => self.parse_use_system(),
                "Log" => self.parse_log_in_out(),
                "Go" => self.parse_go_to_page(),
                "Enter" => self.parse_enter_field(),
                "Click" => self.parse_click(),
                "Extract" => self.parse_extract(),
                _ => Err(self.err(format!("unexpected keyword '{k}' at statement position"))),
            },
            other => Err(self.err(format!("unexpected token {other}; expected a statement"))),
        }
    }

    fn parse_for_each(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // For
        self.expect_kw("each")?;
        let var = if self.at_kw("row") {
            self.advance();
            "row".to_string()
        } else {
            self.expect_ident()?.0
        };
        self.expect_kw("in")?;
        let collection = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::ForEach { var, collection, body, span: start.span })
    }

    fn parse_if_else(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // If
        let condition = self.parse_expr()?;
        let then_body = self.parse_block()?;
        let else_body = if self.at_kw("Else") {
            self.advance();
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::IfElse { condition, then_body, else_body, span: start.span })
    }

    fn parse_on_error(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // On
        self.expect_kw("error")?;
        let action_tok = self.advance();
        let action = match &action_tok.kind {
            TokenKind::Keyword(k) => match k.as_str() {
                "retry" => ErrorAction::Retry,
                "skip" => ErrorAction::Skip,
                "stop" => ErrorAction::Stop,
                "continue" => ErrorAction::Continue,
                "escalate" => ErrorAction::Escalate,
                other => return Err(self.err(format!("unknown error action '{other}'"))),
            },
            other => return Err(self.err(format!("expected an error action, got {other}"))),
        };
        self.expect_dot()?;
        Ok(Stmt::OnError { action, arg: None, span: start.span })
    }

    fn parse_open_workbook(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Open
        self.expect_kw("workbook")?;
        let (path, _) = self.expect_string()?;
        self.expect_dot()?;
        Ok(Stmt::OpenWorkbook { path, span: start.span })
    }

    fn parse_treat_range_as_table(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // In
        self.expect_kw("sheet")?;
        let (sheet, _) = self.expect_string()?;
        if !matches!(self.peek().kind, TokenKind::Comma) {
            return Err(self.err(format!("expected ',', got {}", self.peek().kind)));
        }
        self.advance();
        self.expect_kw("treat")?;
        self.expect_kw("range")?;
        let range = self.parse_range_spec()?;
        self.expect_kw("as")?;
        self.expect_kw("table")?;
        let (table_name, _) = self.expect_ident()?;
        self.expect_dot()?;
        Ok(Stmt::TreatRangeAsTable { sheet, range, table_name, span: start.span })
    }

    fn parse_set_var(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Set
        let (name, _) = self.expect_ident()?;
        self.expect_kw("to")?;
        let value = self.parse_expr()?;
        self.expect_dot()?;
        Ok(Stmt::SetVar { name, value, span: start.span })
    }

    fn parse_call_result(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Call
        self.expect_kw("result")?;
        let (name, _) = self.expect_ident()?;
        self.expect_dot()?;
        Ok(Stmt::CallResult { name, span: start.span })
    }

    fn parse_add_column(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Add
        self.expect_kw("column")?;
        let (column_name, _) = self.expect_ident()?;
        self.expect_kw("to")?;
        let (table, _) = self.expect_ident()?;
        self.expect_kw("as")?;
        let value = self.parse_expr()?;
        self.expect_dot()?;
        Ok(Stmt::AddColumn { table, column_name, value, span: start.span })
    }

    fn parse_filter_table(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Filter
        let (table, _) = self.expect_ident()?;
        self.expect_kw("where")?;
        let condition = self.parse_expr()?;
        self.expect_dot()?;
        Ok(Stmt::FilterTable { table, condition, span: start.span })
    }

    fn parse_sort_table(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Sort
        let (table, _) = self.expect_ident()?;
        self.expect_kw("by")?;
        let by = self.parse_expr()?;
        let ascending = if self.at_kw("ascending") {
            self.advance();
            true
        } else if self.at_kw("descending") {
            self.advance();
            false
        } else {
            return Err(self.err("expected 'ascending' or 'descending'"));
        };
        self.expect_dot()?;
        Ok(Stmt::SortTable { table, by, ascending, span: start.span })
    }

    fn parse_group_table(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Group
        let (table, _) = self.expect_ident()?;
        self.expect_kw("by")?;
        let by = self.parse_expr()?;
        self.expect_dot()?;
        Ok(Stmt::GroupTable { table, by, aggregates: Vec::new(), span: start.span })
    }

    fn parse_export(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Export
        let source = self.parse_expr()?;
        self.expect_kw("to")?;
        let (path, _) = self.expect_string()?;
        self.expect_dot()?;
        Ok(Stmt::ExportTable { source, path, span: start.span })
    }

    fn parse_use_system(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Use
        self.expect_kw("system")?;
        let (name, _) = self.expect_string()?;
        self.expect_kw("version")?;
        let (version, _) = self.expect_string()?;
        self.expect_dot()?;
        Ok(Stmt::UseSystem { name, version, span: start.span })
    }

    fn parse_log_in_out(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Log
        if self.at_kw("out") {
            self.advance();
            self.expect_dot()?;
            return Ok(Stmt::LogOut { span: start.span });
        }
        self.expect_kw("in")?;
        self.expect_kw("as")?;
        self.expect_kw("credential")?;
        let (credential, _) = self.expect_string()?;
        self.expect_dot()?;
        Ok(Stmt::LogIn { credential, span: start.span })
    }

    fn parse_go_to_page(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Go
        self.expect_kw("to")?;
        self.expect_kw("page")?;
        let (page, _) = self.expect_string()?;
        self.expect_dot()?;
        Ok(Stmt::GoToPage { page, span: start.span })
    }

    fn parse_enter_field(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Enter
        let (selector, _) = self.expect_string()?;
        if !matches!(self.peek().kind, TokenKind::Eq) {
            return Err(self.err(format!("expected '=', got {}", self.peek().kind)));
        }
        self.advance();
        let value = self.parse_expr()?;
        self.expect_dot()?;
        Ok(Stmt::EnterField { selector, value, span: start.span })
    }

    fn parse_click(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Click
        let (selector, _) = self.expect_string()?;
        self.expect_dot()?;
        Ok(Stmt::ClickElement { selector, span: start.span })
    }

    fn parse_extract(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance(); // Extract
        let (var, _) = self.expect_ident()?;
        self.expect_kw("from")?;
        let kind_tok = self.advance();
        let selector_kind = match &kind_tok.kind {
            TokenKind::Keyword(k) if k == "field" => SelectorKind::Field,
            TokenKind::Keyword(k) if k == "element" => SelectorKind::Element,
            other => return Err(self.err(format!("expected 'field' or 'element', got {other}"))),
        };
        let (selector, _) = self.expect_string()?;
        self.expect_dot()?;
        Ok(Stmt::ExtractField { var, selector_kind, selector, span: start.span })
    }

    // ── Expressions (§4.2, precedence low → high: or, and, comparison, primary) ──

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.at_kw("or") {
            self.advance();
            let right = self.parse_and()?;
            let span = left.span().merge(right.span());
            left = Expr::BinaryExpr { left: Box::new(left), op: BoolOp::Or, right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.at_kw("and") {
            self.advance();
            let right = self.parse_comparison()?;
            let span = left.span().merge(right.span());
            left = Expr::BinaryExpr { left: Box::new(left), op: BoolOp::And, right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_unary()?;
        let op = match self.peek().kind {
            TokenKind::Eq => Some(CompareOp::Eq),
            TokenKind::Ne => Some(CompareOp::Ne),
            TokenKind::Lt => Some(CompareOp::Lt),
            TokenKind::Lte => Some(CompareOp::Le),
            TokenKind::Gt => Some(CompareOp::Gt),
            TokenKind::Gte => Some(CompareOp::Ge),
            _ => None,
        };
        let Some(op) = op else { return Ok(left) };
        self.advance();
        let right = self.parse_unary()?;
        let span = left.span().merge(right.span());
        Ok(Expr::Comparison { left: Box::new(left), op, right: Box::new(right), span })
    }

    /// `not` is a prefix operator at primary position (§4.2 primary rule 4).
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.at_kw("not") {
            let start = self.advance();
            let inner = self.parse_unary()?;
            let span = start.span.merge(inner.span());
            return Ok(Expr::NotExpr { inner: Box::new(inner), span });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let t = self.peek().clone();
        match &t.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::NumberLit { value: *n, span: t.span })
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::StringLit { value: s.clone(), span: t.span })
            }
            TokenKind::Keyword(k) if k == "date" => {
                self.advance();
                let (iso, s2) = self.expect_string()?;
                Ok(Expr::DateLit { iso, span: t.span.merge(s2) })
            }
            TokenKind::Keyword(k) if k == "row" => {
                // `row` is only a QualifiedRef base when immediately followed
                // by `.IDENT`; otherwise it is an unexpected primary.
                if matches!(self.peek_at(1).kind, TokenKind::Dot)
                    && matches!(self.peek_at(2).kind, TokenKind::Ident(_))
                {
                    self.advance(); // row
                    self.advance(); // .
                    let (field, fs) = self.expect_ident()?;
                    Ok(Expr::QualifiedRef { base: "row".to_string(), field, span: t.span.merge(fs) })
                } else {
                    Err(self.err("expected 'row.<field>'"))
                }
            }
            TokenKind::Keyword(k) if CURRENCIES.contains(&k.as_str()) => {
                if matches!(self.peek_at(1).kind, TokenKind::Number(_)) {
                    let currency = k.clone();
                    self.advance();
                    let amount_tok = self.advance();
                    let TokenKind::Number(amount) = amount_tok.kind else { unreachable!() };
                    Ok(Expr::MoneyLit { currency, amount, span: t.span.merge(amount_tok.span) })
                } else {
                    Err(self.err(format!("expected a numeric amount after currency '{k}'")))
                }
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                if matches!(self.peek().kind, TokenKind::Dot) && matches!(self.peek_at(1).kind, TokenKind::Ident(_)) {
                    self.advance(); // .
                    let (field, fs) = self.expect_ident()?;
                    Ok(Expr::QualifiedRef { base: name, field, span: t.span.merge(fs) })
                } else {
                    Ok(Expr::Identifier { name, span: t.span })
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                if !matches!(self.peek().kind, TokenKind::RParen) {
                    return Err(self.err(format!("expected ')', got {}", self.peek().kind)));
                }
                self.advance();
                Ok(inner)
            }
            other => Err(self.err(format!("expected expression, got {other}"))),
        }
    }
}

pub fn parse(tokens: &[Token]) -> Result<Program, ParseError> {
    let span = tracing::debug_span!("parse", tokens = tokens.len());
    let _enter = span.enter();
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::keywords::keyword_table;
    use crate::compiler::lexer::tokenize;

    fn parse_src(src: &str) -> Program {
        let tokens = tokenize(src, keyword_table(None)).unwrap();
        parse(&tokens).unwrap()
    }

    #[test]
    fn s2_filter_with_money_comparison() {
        // S2: Filter OpenItems where OpenItems.Balance > USD 0.00.
        let program = parse_src("Filter OpenItems where OpenItems.Balance > USD 0.00.\n");
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0] {
            Stmt::FilterTable { table, condition, .. } => {
                assert_eq!(table, "OpenItems");
                match condition {
                    Expr::Comparison { left, op, right, .. } => {
                        assert_eq!(*op, CompareOp::Gt);
                        assert!(matches!(**left, Expr::QualifiedRef { ref base, ref field, .. } if base == "OpenItems" && field == "Balance"));
                        assert!(matches!(**right, Expr::MoneyLit { ref currency, amount, .. } if currency == "USD" && amount == 0.0));
                    }
                    other => panic!("expected comparison, got {other:?}"),
                }
            }
            other => panic!("expected FilterTable, got {other:?}"),
        }
    }

    #[test]
    fn open_workbook_and_export() {
        let program = parse_src("Open workbook \"data.xlsx\".\nExport T to \"out.csv\".\n");
        assert!(matches!(program.statements[0], Stmt::OpenWorkbook { .. }));
        assert!(matches!(program.statements[1], Stmt::ExportTable { .. }));
    }

    #[test]
    fn range_colon_form_is_canonicalized() {
        let program = parse_src("In sheet \"Data\", treat range A1:G999 as table T.\n");
        match &program.statements[0] {
            Stmt::TreatRangeAsTable { range, .. } => assert_eq!(range, "A1:G999"),
            other => panic!("expected TreatRangeAsTable, got {other:?}"),
        }
    }

    #[test]
    fn range_colonless_form_is_kept_verbatim() {
        let program = parse_src("In sheet \"Data\", treat range A1G999 as table T.\n");
        match &program.statements[0] {
            Stmt::TreatRangeAsTable { range, .. } => assert_eq!(range, "A1G999"),
            other => panic!("expected TreatRangeAsTable, got {other:?}"),
        }
    }

    #[test]
    fn for_each_row_scope() {
        let src = "In sheet \"S\", treat range A1B3 as table Invoices.\nFor each row in Invoices:\n    Set v to row.Amount.\n";
        let program = parse_src(src);
        match &program.statements[1] {
            Stmt::ForEach { var, body, .. } => {
                assert_eq!(var, "row");
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected ForEach, got {other:?}"),
        }
    }

    #[test]
    fn if_else_both_branches() {
        let src = "Set flag to 1.\nIf flag = 1:\n    Set msg to \"yes\".\nElse:\n    Set msg to \"no\".\n";
        let program = parse_src(src);
        match &program.statements[1] {
            Stmt::IfElse { then_body, else_body, .. } => {
                assert_eq!(then_body.len(), 1);
                assert_eq!(else_body.len(), 1);
            }
            other => panic!("expected IfElse, got {other:?}"),
        }
    }

    #[test]
    fn if_without_else() {
        let program = parse_src("If flag = 1:\n    Set msg to \"yes\".\n");
        match &program.statements[0] {
            Stmt::IfElse { else_body, .. } => assert!(else_body.is_empty()),
            other => panic!("expected IfElse, got {other:?}"),
        }
    }

    #[test]
    fn on_error_skip() {
        let program = parse_src("On error skip.\n");
        assert!(matches!(program.statements[0], Stmt::OnError { action: ErrorAction::Skip, .. }));
    }

    #[test]
    fn boolean_algebra_and_not() {
        let program = parse_src("Filter T where not T.Flag and T.Balance > 0.\n");
        match &program.statements[0] {
            Stmt::FilterTable { condition, .. } => {
                assert!(matches!(condition, Expr::BinaryExpr { op: BoolOp::And, .. }));
            }
            other => panic!("expected FilterTable, got {other:?}"),
        }
    }

    #[test]
    fn sort_descending() {
        let program = parse_src("Sort T by T.Balance descending.\n");
        match &program.statements[0] {
            Stmt::SortTable { ascending, .. } => assert!(!ascending),
            other => panic!("expected SortTable, got {other:?}"),
        }
    }

    #[test]
    fn undeclared_keyword_at_statement_position_is_a_parse_error() {
        let tokens = tokenize("Balance > 0.\n", keyword_table(None)).unwrap();
        assert!(parse(&tokens).is_err());
    }
}
