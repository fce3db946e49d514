//! Token kinds for the sentence language.

use sentra_core::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Ident(String),
    Keyword(String),
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
    Ne,
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "NUMBER({n})"),
            TokenKind::String(s) => write!(f, "STRING({s:?})"),
            TokenKind::Ident(s) => write!(f, "IDENT({s})"),
            TokenKind::Keyword(s) => write!(f, "KEYWORD({s})"),
            TokenKind::Dot => write!(f, "DOT"),
            TokenKind::Comma => write!(f, "COMMA"),
            TokenKind::Colon => write!(f, "COLON"),
            TokenKind::LParen => write!(f, "LPAREN"),
            TokenKind::RParen => write!(f, "RPAREN"),
            TokenKind::Eq => write!(f, "EQ"),
            TokenKind::Gt => write!(f, "GT"),
            TokenKind::Lt => write!(f, "LT"),
            TokenKind::Gte => write!(f, "GTE"),
            TokenKind::Lte => write!(f, "LTE"),
            TokenKind::Ne => write!(f, "NE"),
            TokenKind::Newline => write!(f, "NEWLINE"),
            TokenKind::Indent => write!(f, "INDENT"),
            TokenKind::Dedent => write!(f, "DEDENT"),
            TokenKind::Eof => write!(f, "EOF"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn line(&self) -> usize {
        self.span.line
    }

    pub fn col(&self) -> usize {
        self.span.col
    }

    /// `true` for keyword tokens whose spelling matches `word`.
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Keyword(k) if k == word)
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(s) => Some(s.as_str()),
            _ => None,
        }
    }
}
