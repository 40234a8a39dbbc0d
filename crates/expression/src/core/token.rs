//! Token types produced by the lexer

use std::fmt;

/// Byte range of a token in the normalized expression text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A token with position information
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The kind of token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Unsigned or negative decimal number
    Number(f64),
    /// Run of word characters: identifiers, dotted paths, reserved words
    Word(String),
    /// Single- or double-quoted string with escapes resolved
    Quoted { quote: char, text: String },
    /// Any other single character, including `( ) [ ] ; ,`
    Char(char),
    /// Carriage return
    Eol,
    /// End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Word(word) => f.write_str(word),
            Self::Quoted { text, .. } => f.write_str(text),
            Self::Char(c) => write!(f, "{c}"),
            Self::Eol => f.write_str("EOL"),
            Self::Eof => f.write_str("EOF"),
        }
    }
}
