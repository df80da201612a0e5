//! Lexical analysis: source text to positioned tokens.
//!
//! Most of the scanner is a plain left-to-right character walk. The one
//! subtle part is line structure: newlines are invisible inside parentheses,
//! and outside them the leading spaces of the next line are measured against
//! an indentation stack to decide between `Newline`, `Indent` and `Dedent`
//! tokens. An `if` that is still waiting for its `then` when the line ends
//! gets a synthetic `Then` right before the boundary, which is what makes
//! the `if EXPR <newline> block` surface form work.

use thiserror::Error;

use crate::core::{Span, Token, TokenKind};

/// Characters that accumulate into operator runs.
const SYMBOL_CHARS: &str = "!@#$%^&*-+=:|<>./?\\";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("unknown character {ch:?} at line {line}, column {col}")]
    UnknownCharacter { ch: char, line: u32, col: u32 },

    #[error("unpaired closing parenthesis at line {line}, column {col}")]
    UnpairedClose { line: u32, col: u32 },

    #[error("line {line} returns to indentation column {col}, which no enclosing block uses")]
    UnmatchedIndent { line: u32, col: u32 },

    #[error("number literal too large at line {line}, column {col}")]
    NumberTooLarge { line: u32, col: u32 },
}

/// Scan a whole source text into tokens. The result always ends with
/// dedents for every block still open, followed by the `End` token.
pub fn scan(source: &str) -> Result<Vec<Token>, ScanError> {
    Scanner::new(source).run()
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
    /// parenthesis nesting depth; newlines are structural only at zero
    open_level: usize,
    /// open indentation columns, innermost last
    indents: Vec<u32>,
    /// an `if` was scanned and its `then` has not appeared yet
    pending_if: bool,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Scanner {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            tokens: Vec::new(),
            open_level: 0,
            indents: vec![0],
            pending_if: false,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ScanError> {
        while self.pos < self.chars.len() {
            match self.chars[self.pos] {
                ';' => self.skip_comment(),
                '\n' => self.newline()?,
                ' ' => self.advance(),
                '(' => {
                    self.punctuation(TokenKind::Open);
                    self.open_level += 1;
                }
                ')' => {
                    if self.open_level == 0 {
                        return Err(ScanError::UnpairedClose {
                            line: self.line,
                            col: self.col,
                        });
                    }
                    self.punctuation(TokenKind::Close);
                    self.open_level -= 1;
                }
                ',' => self.punctuation(TokenKind::Comma),
                '0'..='9' => self.number()?,
                c if c == '_' || c.is_ascii_alphabetic() => self.identifier(),
                c if SYMBOL_CHARS.contains(c) => self.operator(),
                c => {
                    return Err(ScanError::UnknownCharacter {
                        ch: c,
                        line: self.line,
                        col: self.col,
                    })
                }
            }
        }
        if self.pending_if {
            self.emit_here(TokenKind::Then);
        }
        for _ in 1..self.indents.len() {
            self.emit_here(TokenKind::Dedent);
        }
        self.emit_here(TokenKind::End);
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
        self.col += 1;
    }

    fn advance_line(&mut self) {
        self.pos += 1;
        self.line += 1;
        self.col = 1;
    }

    /// Emit a single-character token and consume the character.
    fn punctuation(&mut self, kind: TokenKind) {
        let span = Span {
            start_line: self.line,
            start_col: self.col,
            end_line: self.line,
            end_col: self.col + 1,
        };
        self.tokens.push(Token { kind, span });
        self.advance();
    }

    /// Emit a zero-width token at the current position.
    fn emit_here(&mut self, kind: TokenKind) {
        let span = Span::point(self.line, self.col);
        self.tokens.push(Token { kind, span });
    }

    fn skip_comment(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
            self.advance();
        }
    }

    fn number(&mut self) -> Result<(), ScanError> {
        let (start_line, start_col) = (self.line, self.col);
        let mut literal = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            literal.push(self.chars[self.pos]);
            self.advance();
        }
        let value = literal.parse::<i64>().map_err(|_| ScanError::NumberTooLarge {
            line: start_line,
            col: start_col,
        })?;
        self.tokens.push(Token {
            kind: TokenKind::Number(value),
            span: Span {
                start_line,
                start_col,
                end_line: self.line,
                end_col: self.col,
            },
        });
        Ok(())
    }

    fn identifier(&mut self) {
        let (start_line, start_col) = (self.line, self.col);
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c == '_' || c.is_ascii_alphanumeric()) {
            text.push(self.chars[self.pos]);
            self.advance();
        }
        let kind = match text.as_str() {
            "if" => {
                self.pending_if = true;
                TokenKind::If
            }
            "then" => {
                self.pending_if = false;
                TokenKind::Then
            }
            "else" => TokenKind::Else,
            _ => TokenKind::Identifier(text),
        };
        self.tokens.push(Token {
            kind,
            span: Span {
                start_line,
                start_col,
                end_line: self.line,
                end_col: self.col,
            },
        });
    }

    fn operator(&mut self) {
        let (start_line, start_col) = (self.line, self.col);
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if SYMBOL_CHARS.contains(c)) {
            text.push(self.chars[self.pos]);
            self.advance();
        }
        let kind = match text.as_str() {
            "<-" => TokenKind::Assign,
            "->" => TokenKind::RAssign,
            "\\" => TokenKind::Func,
            _ => TokenKind::Operator(text),
        };
        self.tokens.push(Token {
            kind,
            span: Span {
                start_line,
                start_col,
                end_line: self.line,
                end_col: self.col,
            },
        });
    }

    /// Handle a structural newline: measure the indentation of the next
    /// non-blank line and emit the matching boundary tokens.
    fn newline(&mut self) -> Result<(), ScanError> {
        self.advance_line();
        if self.open_level > 0 {
            return Ok(());
        }
        // blank and comment-only lines collapse into a single boundary and
        // never count as an indentation level of their own
        let width = loop {
            let mut width = 0u32;
            while self.peek() == Some(' ') {
                self.advance();
                width += 1;
            }
            match self.peek() {
                Some('\n') => self.advance_line(),
                Some(';') => {
                    self.skip_comment();
                    if self.peek() == Some('\n') {
                        self.advance_line();
                    }
                }
                // trailing whitespace; the end of the run emits the dedents
                None => return Ok(()),
                Some(_) => break width,
            }
        };
        if self.pending_if {
            self.pending_if = false;
            self.emit_here(TokenKind::Then);
        }
        let current = *self.indents.last().unwrap();
        if width > current {
            self.indents.push(width);
            self.emit_here(TokenKind::Indent);
        } else if width == current {
            if !self.tokens.is_empty() {
                self.emit_here(TokenKind::Newline);
            }
        } else {
            while *self.indents.last().unwrap() > width {
                self.indents.pop();
                self.emit_here(TokenKind::Dedent);
            }
            if *self.indents.last().unwrap() != width {
                return Err(ScanError::UnmatchedIndent {
                    line: self.line,
                    col: width,
                });
            }
        }
        Ok(())
    }
}
