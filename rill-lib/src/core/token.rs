//! Tokens and their source positions

use serde::{Deserialize, Serialize};

use std::fmt;

/// Where a token sits in the source text. Lines and columns are 1-based,
/// `end_col` points one past the last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    /// A zero-width span, used for tokens the scanner synthesizes.
    pub fn point(line: u32, col: u32) -> Self {
        Span {
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col,
        }
    }
}

/// One word of the source text. Immutable once produced; the `End` token is
/// always the last of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    Number(i64),
    Identifier(String),
    /// a maximal run of symbol characters that is neither `<-`, `->` nor `\`
    Operator(String),
    Open,
    Close,
    Comma,
    /// `<-`
    Assign,
    /// `->`, introduces a function body
    RAssign,
    /// `\`, introduces a function literal
    Func,
    If,
    Then,
    Else,
    /// statement separator at an unchanged indentation level
    Newline,
    Indent,
    Dedent,
    End,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        match self {
            Number(value) => write!(f, "number {}", value),
            Identifier(name) => write!(f, "identifier {}", name),
            Operator(op) => write!(f, "operator {}", op),
            Open => write!(f, "("),
            Close => write!(f, ")"),
            Comma => write!(f, ","),
            Assign => write!(f, "<-"),
            RAssign => write!(f, "->"),
            Func => write!(f, "\\"),
            If => write!(f, "if"),
            Then => write!(f, "then"),
            Else => write!(f, "else"),
            Newline => write!(f, "newline"),
            Indent => write!(f, "indent"),
            Dedent => write!(f, "dedent"),
            End => write!(f, "end of input"),
        }
    }
}
