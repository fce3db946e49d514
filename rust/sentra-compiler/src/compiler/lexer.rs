//! Indentation-aware lexer for the sentence language (§4.1).

use crate::compiler::tokens::{Token, TokenKind};
use sentra_core::Span;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, col {col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },
    #[error("inconsistent indentation at line {line}")]
    InconsistentIndent { line: usize },
    #[error("invalid number at line {line}, col {col}")]
    InvalidNumber { line: usize, col: usize },
}

pub struct Lexer<'kw> {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    byte_offset: usize,
    indent_stack: Vec<usize>,
    keywords: &'kw HashSet<String>,
}

const TAB_WIDTH: usize = 4;

impl<'kw> Lexer<'kw> {
    pub fn new(source: &str, keywords: &'kw HashSet<String>) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            byte_offset: 0,
            indent_stack: vec![0],
            keywords,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        self.byte_offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn span_from(&self, start_byte: usize, start_line: usize, start_col: usize) -> Span {
        Span::new(start_byte, self.byte_offset, start_line, start_col)
    }

    /// Consumes leading whitespace on a fresh line, reporting its column
    /// width (tabs count as four columns, §4.1).
    fn consume_indent_width(&mut self) -> usize {
        let mut width = 0;
        loop {
            match self.current() {
                Some(' ') => {
                    width += 1;
                    self.advance();
                }
                Some('\t') => {
                    width += TAB_WIDTH;
                    self.advance();
                }
                _ => break,
            }
        }
        width
    }

    fn is_comment_start(&self) -> bool {
        self.current() == Some('-') && self.peek() == Some('-')
    }

    /// Consumes a `--` comment through (and including) its trailing
    /// newline, if present. No token is produced for the comment or its
    /// terminator.
    fn consume_comment(&mut self) {
        self.advance(); // first '-'
        self.advance(); // second '-'
        while let Some(ch) = self.current() {
            if ch == '\n' {
                self.advance();
                break;
            }
            self.advance();
        }
    }

    /// Handles the start-of-line indentation bookkeeping. Blank and
    /// comment-only lines never touch the indent stack (§4.1). Returns
    /// the tokens produced (zero or more INDENT/DEDENT, at most one
    /// NEWLINE for a blank line).
    fn handle_line_start(&mut self, tokens: &mut Vec<Token>) -> Result<(), LexError> {
        loop {
            let width = self.consume_indent_width();
            match self.current() {
                None => return Ok(()),
                Some('\n') => {
                    let span = self.span_from(self.byte_offset, self.line, self.col);
                    self.advance();
                    tokens.push(Token::new(TokenKind::Newline, span));
                    continue;
                }
                _ if self.is_comment_start() => {
                    self.consume_comment();
                    continue;
                }
                _ => {
                    self.apply_indent(width, tokens)?;
                    return Ok(());
                }
            }
        }
    }

    fn apply_indent(&mut self, width: usize, tokens: &mut Vec<Token>) -> Result<(), LexError> {
        let top = *self.indent_stack.last().unwrap();
        if width > top {
            self.indent_stack.push(width);
            tokens.push(Token::new(TokenKind::Indent, self.span_from(self.byte_offset, self.line, self.col)));
        } else if width < top {
            while width < *self.indent_stack.last().unwrap() {
                self.indent_stack.pop();
                tokens.push(Token::new(TokenKind::Dedent, self.span_from(self.byte_offset, self.line, self.col)));
            }
            if *self.indent_stack.last().unwrap() != width {
                return Err(LexError::InconsistentIndent { line: self.line });
            }
        }
        Ok(())
    }

    fn lex_string(&mut self) -> Token {
        let (start_byte, start_line, start_col) = (self.byte_offset, self.line, self.col);
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.current() {
                None => break,
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if let Some(escaped) = self.advance() {
                        value.push(escaped);
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
        Token::new(TokenKind::String(value), self.span_from(start_byte, start_line, start_col))
    }

    fn lex_number(&mut self) -> Result<Token, LexError> {
        let (start_byte, start_line, start_col) = (self.byte_offset, self.line, self.col);
        let mut text = String::new();
        while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }
        // A trailing dot is only consumed when followed by another digit;
        // otherwise it is left for the statement/qualified-ref grammar (§4.1).
        if self.current() == Some('.') && matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
            while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
        }
        let value: f64 = text
            .parse()
            .map_err(|_| LexError::InvalidNumber { line: start_line, col: start_col })?;
        Ok(Token::new(TokenKind::Number(value), self.span_from(start_byte, start_line, start_col)))
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let (start_byte, start_line, start_col) = (self.byte_offset, self.line, self.col);
        let mut text = String::new();
        while matches!(self.current(), Some(c) if c.is_alphanumeric() || c == '_') {
            text.push(self.advance().unwrap());
        }
        let span = self.span_from(start_byte, start_line, start_col);
        if self.keywords.contains(&text) {
            Token::new(TokenKind::Keyword(text), span)
        } else {
            Token::new(TokenKind::Ident(text), span)
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        self.handle_line_start(&mut tokens)?;

        loop {
            let Some(ch) = self.current() else { break };

            if ch == ' ' || ch == '\t' {
                self.advance();
                continue;
            }

            if ch == '\n' {
                let span = self.span_from(self.byte_offset, self.line, self.col);
                self.advance();
                tokens.push(Token::new(TokenKind::Newline, span));
                self.handle_line_start(&mut tokens)?;
                continue;
            }

            if self.is_comment_start() {
                self.consume_comment();
                self.handle_line_start(&mut tokens)?;
                continue;
            }

            let (start_byte, start_line, start_col) = (self.byte_offset, self.line, self.col);
            let token = match ch {
                '.' => {
                    self.advance();
                    Token::new(TokenKind::Dot, self.span_from(start_byte, start_line, start_col))
                }
                ',' => {
                    self.advance();
                    Token::new(TokenKind::Comma, self.span_from(start_byte, start_line, start_col))
                }
                ':' => {
                    self.advance();
                    Token::new(TokenKind::Colon, self.span_from(start_byte, start_line, start_col))
                }
                '(' => {
                    self.advance();
                    Token::new(TokenKind::LParen, self.span_from(start_byte, start_line, start_col))
                }
                ')' => {
                    self.advance();
                    Token::new(TokenKind::RParen, self.span_from(start_byte, start_line, start_col))
                }
                '=' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                    }
                    Token::new(TokenKind::Eq, self.span_from(start_byte, start_line, start_col))
                }
                '!' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        Token::new(TokenKind::Ne, self.span_from(start_byte, start_line, start_col))
                    } else {
                        return Err(LexError::UnexpectedChar { ch: '!', line: start_line, col: start_col });
                    }
                }
                '>' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        Token::new(TokenKind::Gte, self.span_from(start_byte, start_line, start_col))
                    } else {
                        Token::new(TokenKind::Gt, self.span_from(start_byte, start_line, start_col))
                    }
                }
                '<' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        Token::new(TokenKind::Lte, self.span_from(start_byte, start_line, start_col))
                    } else {
                        Token::new(TokenKind::Lt, self.span_from(start_byte, start_line, start_col))
                    }
                }
                '"' => self.lex_string(),
                c if c.is_ascii_digit() => self.lex_number()?,
                c if c.is_alphabetic() || c == '_' => self.lex_ident_or_keyword(),
                other => return Err(LexError::UnexpectedChar { ch: other, line: start_line, col: start_col }),
            };
            tokens.push(token);
        }

        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            tokens.push(Token::new(TokenKind::Dedent, self.span_from(self.byte_offset, self.line, self.col)));
        }
        tokens.push(Token::new(TokenKind::Eof, self.span_from(self.byte_offset, self.line, self.col)));
        Ok(tokens)
    }
}

pub fn tokenize(source: &str, keywords: &HashSet<String>) -> Result<Vec<Token>, LexError> {
    let span = tracing::debug_span!("lex", len = source.len());
    let _enter = span.enter();
    Lexer::new(source, keywords).tokenize()
}
