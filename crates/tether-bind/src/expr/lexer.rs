//! Binding string lexer

use super::token::{keyword_from_str, Span, Token, TokenKind};
use std::iter::Peekable;
use std::str::Chars;

/// Binding string lexer
pub struct Lexer<'src> {
    source: &'src str,
    chars: Peekable<Chars<'src>>,
    pos: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            pos: 0,
        }
    }

    /// Get current position
    pub fn position(&self) -> u32 {
        self.pos
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos;
        let Some(c) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start));
        };

        let kind = match c {
            'a'..='z' | 'A'..='Z' | '_' | '$' => self.scan_identifier(start),
            '0'..='9' => self.scan_number(start),
            '"' | '\'' | '`' => self.scan_string(c),

            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '|' => TokenKind::Pipe,

            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }

            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    TokenKind::Error("unexpected \"=\", did you mean \"==\"?".into())
                }
            }

            '-' => match self.peek() {
                Some('>') => {
                    self.advance();
                    TokenKind::Arrow
                }
                Some('0'..='9') => self.scan_number(start),
                _ => TokenKind::Error("unexpected \"-\"".into()),
            },

            other => TokenKind::Error(format!("unexpected character {other:?}").into()),
        };

        Token::new(kind, Span::new(start, self.pos))
    }

    fn scan_identifier(&mut self, start: u32) -> TokenKind {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[start as usize..self.pos as usize];
        keyword_from_str(text).unwrap_or_else(|| TokenKind::Identifier(text.into()))
    }

    fn scan_number(&mut self, start: u32) -> TokenKind {
        while matches!(self.peek(), Some('0'..='9')) {
            self.advance();
        }

        // Fractional part; a dot not followed by a digit is member access
        let source = self.source;
        let rest = &source[self.pos as usize..];
        if rest.starts_with('.') && rest[1..].starts_with(|c: char| c.is_ascii_digit()) {
            self.advance();
            while matches!(self.peek(), Some('0'..='9')) {
                self.advance();
            }
        }

        let text = &self.source[start as usize..self.pos as usize];
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(format!("invalid number {text:?}").into()),
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        while let Some(c) = self.advance() {
            if c == quote {
                return TokenKind::String(value.into());
            }
            if c == '\\' {
                match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => value.push(other),
                    None => break,
                }
            } else {
                value.push(c);
            }
        }

        TokenKind::Error("unterminated string".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                return out;
            }
            out.push(token.kind);
        }
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("!a == b != c + d -> k, v"),
            vec![
                TokenKind::Bang,
                TokenKind::Identifier("a".into()),
                TokenKind::EqEq,
                TokenKind::Identifier("b".into()),
                TokenKind::NotEq,
                TokenKind::Identifier("c".into()),
                TokenKind::Plus,
                TokenKind::Identifier("d".into()),
                TokenKind::Arrow,
                TokenKind::Identifier("k".into()),
                TokenKind::Comma,
                TokenKind::Identifier("v".into()),
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds("'a' \"b\" `c` 1.5 -2 true null"),
            vec![
                TokenKind::String("a".into()),
                TokenKind::String("b".into()),
                TokenKind::String("c".into()),
                TokenKind::Number(1.5),
                TokenKind::Number(-2.0),
                TokenKind::Boolean(true),
                TokenKind::Null,
            ]
        );
    }

    #[test]
    fn test_spans_and_errors() {
        let mut lexer = Lexer::new("  name 'open");
        assert_eq!(lexer.next_token().span, Span::new(2, 6));
        let bad = lexer.next_token();
        assert!(matches!(bad.kind, TokenKind::Error(_)));
        assert_eq!(bad.span, Span::new(7, 12));
    }
}
