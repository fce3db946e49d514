//! End-to-end frontend scenarios from the sentence-language pipeline design
//! (lexer comment handling, money-literal parsing, and undeclared-name
//! rejection), exercised against the public compiler API rather than a
//! module-local fixture.

use sentra_compiler::compiler::ast::{CompareOp, Expr, Stmt};
use sentra_compiler::compiler::checker::{check, CheckError};
use sentra_compiler::compiler::keywords::keyword_table;
use sentra_compiler::compiler::lexer::tokenize;
use sentra_compiler::compiler::parser::parse;
use sentra_compiler::compiler::tokens::TokenKind;

fn kinds(src: &str) -> Vec<TokenKind> {
    tokenize(src, keyword_table(None)).unwrap().into_iter().map(|t| t.kind).collect()
}

#[test]
fn s1_comment_terminator_yields_no_extra_tokens() {
    let got = kinds("Set x to 1. -- trailing\n");
    assert_eq!(
        got,
        vec![
            TokenKind::Keyword("Set".into()),
            TokenKind::Ident("x".into()),
            TokenKind::Keyword("to".into()),
            TokenKind::Number(1.0),
            TokenKind::Dot,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn s2_filter_sentence_with_currency_comparison() {
    let tokens = tokenize("Filter OpenItems where OpenItems.Balance > USD 0.00.\n", keyword_table(None)).unwrap();
    let program = parse(&tokens).unwrap();
    assert_eq!(program.statements.len(), 1);
    let Stmt::FilterTable { table, condition, .. } = &program.statements[0] else {
        panic!("expected FilterTable, got {:?}", program.statements[0]);
    };
    assert_eq!(table, "OpenItems");
    let Expr::Comparison { left, op, right, .. } = condition else {
        panic!("expected a Comparison, got {condition:?}");
    };
    assert_eq!(*op, CompareOp::Gt);
    assert!(matches!(**left, Expr::QualifiedRef { ref base, ref field, .. } if base == "OpenItems" && field == "Balance"));
    assert!(matches!(**right, Expr::MoneyLit { ref currency, amount, .. } if currency == "USD" && amount == 0.0));
}

#[test]
fn s3_checker_rejects_a_table_that_was_never_declared() {
    let tokens = tokenize("Filter MissingTable where MissingTable.x > 0.\n", keyword_table(None)).unwrap();
    let program = parse(&tokens).unwrap();
    let err = check(&program).unwrap_err();
    let CheckError::UndefinedName { name, .. } = &err else {
        panic!("expected UndefinedName, got {err:?}");
    };
    assert_eq!(name, "MissingTable");
}
