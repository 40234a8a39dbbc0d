//! Lexer for expression text
//!
//! Character classes:
//! - whitespace: every char up to and including `' '`; `'\r'` yields [`TokenKind::Eol`]
//! - numbers: start with a digit, or `-` followed by a digit or `.`; consume
//!   digits and at most one `.`
//! - words: start with an ASCII letter, `_`, `.`, `!` or a char at or above
//!   U+00A0; continue with those plus digits and `-`
//! - quotes: `"` or `'` up to the matching quote or end of line, with
//!   backslash escapes
//! - `/` starts a comment running to end of line
//! - everything else is a single [`TokenKind::Char`]
//!
//! The lexer never fails; running out of input is end of stream.

use crate::core::token::{Span, Token, TokenKind};

/// Lexer for tokenizing expression strings
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer from an input string
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    /// Tokenize the entire input string, ending with [`TokenKind::Eof`]
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::with_capacity((self.input.len() / 4).max(8));

        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        tokens
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Token {
        loop {
            let start = self.position;
            let Some(ch) = self.current_char() else {
                return Token::new(TokenKind::Eof, Span::new(start, start));
            };

            let kind = match ch {
                '\r' => {
                    self.advance();
                    TokenKind::Eol
                }
                c if c <= ' ' => {
                    self.advance();
                    continue;
                }
                '/' => {
                    self.skip_comment();
                    continue;
                }
                '-' if !matches!(self.peek(), Some(c) if c == '.' || c.is_ascii_digit()) => {
                    self.advance();
                    TokenKind::Char('-')
                }
                c if c == '-' || c.is_ascii_digit() => self.read_number(),
                c if is_word_start(c) => self.read_word(),
                '"' | '\'' => self.read_quoted(ch),
                c => {
                    self.advance();
                    TokenKind::Char(c)
                }
            };

            return Token::new(kind, Span::new(start, self.position));
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.input[self.position..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += ch.len_utf8();
        }
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch == '\r' || ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn read_number(&mut self) -> TokenKind {
        let negative = self.current_char() == Some('-');
        if negative {
            self.advance();
        }

        let mut value = 0.0_f64;
        let mut decimals = 0_i32;
        let mut seen_dot = false;

        while let Some(ch) = self.current_char() {
            match ch {
                '.' if !seen_dot => seen_dot = true,
                '0'..='9' => {
                    value = value * 10.0 + f64::from(ch as u8 - b'0');
                    if seen_dot {
                        decimals += 1;
                    }
                }
                _ => break,
            }
            self.advance();
        }

        if decimals > 0 {
            value /= 10_f64.powi(decimals);
        }

        TokenKind::Number(if negative { -value } else { value })
    }

    fn read_word(&mut self) -> TokenKind {
        let start = self.position;
        while let Some(ch) = self.current_char() {
            if is_word_start(ch) || ch.is_ascii_digit() || ch == '-' {
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Word(self.input[start..self.position].to_string())
    }

    fn read_quoted(&mut self, quote: char) -> TokenKind {
        self.advance();
        let mut text = String::new();

        while let Some(ch) = self.current_char() {
            if ch == quote {
                self.advance();
                break;
            }
            if ch == '\n' || ch == '\r' {
                break;
            }
            self.advance();

            if ch != '\\' {
                text.push(ch);
                continue;
            }

            let Some(escaped) = self.current_char() else {
                text.push('\\');
                break;
            };
            self.advance();

            let resolved = match escaped {
                '0'..='7' => self.read_octal(escaped),
                'a' => '\u{7}',
                'b' => '\u{8}',
                'f' => '\u{c}',
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                'v' => '\u{b}',
                other => other,
            };
            text.push(resolved);
        }

        TokenKind::Quoted { quote, text }
    }

    /// Up to three octal digits; three only when the first is at most `3`
    fn read_octal(&mut self, first: char) -> char {
        let digit = |c: Option<char>| c.and_then(|c| c.to_digit(8));
        let mut code = first.to_digit(8).unwrap_or(0);

        if let Some(second) = digit(self.current_char()) {
            self.advance();
            code = (code << 3) + second;
            if first <= '3' {
                if let Some(third) = digit(self.current_char()) {
                    self.advance();
                    code = (code << 3) + third;
                }
            }
        }

        char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

fn is_word_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || matches!(ch, '_' | '.' | '!') || u32::from(ch) >= 160
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn word(text: &str) -> TokenKind {
        TokenKind::Word(text.to_string())
    }

    fn quoted(text: &str) -> TokenKind {
        TokenKind::Quoted {
            quote: '"',
            text: text.to_string(),
        }
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            kinds(r#"concat("a", this.name)"#),
            vec![
                word("concat"),
                TokenKind::Char('('),
                quoted("a"),
                TokenKind::Char(','),
                word("this.name"),
                TokenKind::Char(')'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("2.345678 -3 10"),
            vec![
                TokenKind::Number(2.345678),
                TokenKind::Number(-3.0),
                TokenKind::Number(10.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_minus_without_digit_is_char() {
        assert_eq!(
            kinds("- x"),
            vec![TokenKind::Char('-'), word("x"), TokenKind::Eof]
        );
    }

    #[test]
    fn test_word_characters() {
        assert_eq!(
            kinds("data.children _x !y a-b2 .5"),
            vec![
                word("data.children"),
                word("_x"),
                word("!y"),
                word("a-b2"),
                word(".5"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(
            kinds(r#""a\tb\"c\101" 'single'"#),
            vec![
                quoted("a\tb\"cA"),
                TokenKind::Quoted {
                    quote: '\'',
                    text: "single".to_string()
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_quote_stops_at_end() {
        assert_eq!(kinds("\"abc"), vec![quoted("abc"), TokenKind::Eof]);
    }

    #[test]
    fn test_comment_and_eol() {
        assert_eq!(
            kinds("a / comment\rb"),
            vec![word("a"), TokenKind::Eol, word("b"), TokenKind::Eof]
        );
    }

    #[test]
    fn test_ordinary_chars() {
        assert_eq!(
            kinds("[;+]"),
            vec![
                TokenKind::Char('['),
                TokenKind::Char(';'),
                TokenKind::Char('+'),
                TokenKind::Char(']'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = Lexer::new("ab (").tokenize();
        assert_eq!(tokens[0].span, Span::new(0, 2));
        assert_eq!(tokens[1].span, Span::new(3, 4));
    }
}
