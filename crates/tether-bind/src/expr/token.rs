//! Token Types

/// Source span (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Token with kind and span
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

/// Token kinds of the binding language
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(Box<str>),
    Boolean(bool),
    Null,

    Identifier(Box<str>),

    // Punctuators
    LParen,
    RParen,
    Comma,
    Dot,
    /// `!`
    Bang,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `+`
    Plus,
    /// `->`
    Arrow,
    /// `|` (one-shot marker)
    Pipe,

    Eof,
    Error(Box<str>),
}

impl TokenKind {
    /// Human readable form for error messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::String(s) => format!("string \"{s}\""),
            TokenKind::Boolean(b) => b.to_string(),
            TokenKind::Null => "null".into(),
            TokenKind::Identifier(name) => format!("name \"{name}\""),
            TokenKind::LParen => "\"(\"".into(),
            TokenKind::RParen => "\")\"".into(),
            TokenKind::Comma => "\",\"".into(),
            TokenKind::Dot => "\".\"".into(),
            TokenKind::Bang => "\"!\"".into(),
            TokenKind::EqEq => "\"==\"".into(),
            TokenKind::NotEq => "\"!=\"".into(),
            TokenKind::Plus => "\"+\"".into(),
            TokenKind::Arrow => "\"->\"".into(),
            TokenKind::Pipe => "\"|\"".into(),
            TokenKind::Eof => "end of input".into(),
            TokenKind::Error(msg) => msg.to_string(),
        }
    }
}

/// Keyword lookup
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "true" => Some(TokenKind::Boolean(true)),
        "false" => Some(TokenKind::Boolean(false)),
        "null" => Some(TokenKind::Null),
        _ => None,
    }
}
