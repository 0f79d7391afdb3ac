//! Binding string parser
//!
//! ```text
//! binding  := ['|'] expr ['->' ident {',' ident}]
//! expr     := equality
//! equality := concat {('==' | '!=') concat}
//! concat   := unary {'+' unary}
//! unary    := '!' unary | postfix
//! postfix  := primary {'.' ident}
//! primary  := literal | ident ['(' [expr {',' expr}] ')'] | '(' expr ')'
//! ```

use super::ast::{Ast, BinaryOp, ExprId, ExprKind, ExprNode, Literal};
use super::lexer::Lexer;
use super::token::{Span, Token, TokenKind};
use crate::error::{BindingExpressionError, ExpressionErrorKind};

/// A parsed bind string
#[derive(Debug, Clone)]
pub struct ParsedBinding {
    /// Original text, kept for error messages
    pub source: String,
    pub ast: Ast,
    /// Leading `|`: evaluate once, never watch
    pub one_shot: bool,
    /// Names after `->`
    pub outputs: Vec<String>,
}

/// Parse a bind string
pub fn parse_binding(source: &str) -> Result<ParsedBinding, BindingExpressionError> {
    let (ast, one_shot, outputs) = Parser::new(source).parse().map_err(|e| {
        BindingExpressionError::new(source, e.span, ExpressionErrorKind::Syntax(e.message))
    })?;

    Ok(ParsedBinding {
        source: source.to_string(),
        ast,
        one_shot,
        outputs,
    })
}

/// Parser error
#[derive(Debug)]
struct ParseError {
    message: String,
    span: Span,
}

struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    previous: Token,
    ast: Ast,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current: current.clone(),
            previous: current,
            ast: Ast::new(),
        }
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn error(&self, expected: &str) -> ParseError {
        let message = match &self.current.kind {
            TokenKind::Error(msg) => msg.to_string(),
            other => format!("expected {}, found {}", expected, other.describe()),
        };
        ParseError { message, span: self.current.span }
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn identifier(&mut self) -> Result<Box<str>, ParseError> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error("a name"))
        }
    }

    fn span_of(&self, id: ExprId) -> Span {
        self.ast.get(id).map(|n| n.span).unwrap_or_default()
    }

    fn add(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.ast.add_node(ExprNode::new(kind, span))
    }

    fn parse(mut self) -> Result<(Ast, bool, Vec<String>), ParseError> {
        let one_shot = self.check(&TokenKind::Pipe);
        if one_shot {
            self.advance();
        }

        let root = self.parse_expression()?;
        self.ast.set_root(root);

        let mut outputs = Vec::new();
        if self.check(&TokenKind::Arrow) {
            self.advance();
            loop {
                outputs.push(self.identifier()?.into_string());
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        if !self.check(&TokenKind::Eof) {
            return Err(self.error("end of binding"));
        }
        Ok((self.ast, one_shot, outputs))
    }

    fn parse_expression(&mut self) -> Result<ExprId, ParseError> {
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.current.kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_concat()?;
            let span = self.span_of(left).merge(self.span_of(right));
            left = self.add(ExprKind::Binary { op, left, right }, span);
        }
    }

    fn parse_concat(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_unary()?;
        while self.check(&TokenKind::Plus) {
            self.advance();
            let right = self.parse_unary()?;
            let span = self.span_of(left).merge(self.span_of(right));
            left = self.add(ExprKind::Binary { op: BinaryOp::Concat, left, right }, span);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ExprId, ParseError> {
        if self.check(&TokenKind::Bang) {
            let start = self.current.span;
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(self.span_of(operand));
            return Ok(self.add(ExprKind::Not(operand), span));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.check(&TokenKind::Dot) {
            self.advance();
            let field = self.identifier()?;
            let span = self.span_of(expr).merge(self.previous.span);
            expr = self.add(ExprKind::Member { object: expr, field }, span);
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<ExprId, ParseError> {
        let start = self.current.span;
        let literal = match &self.current.kind {
            TokenKind::Number(n) => Some(Literal::Number(*n)),
            TokenKind::String(s) => Some(Literal::String(s.clone())),
            TokenKind::Boolean(b) => Some(Literal::Boolean(*b)),
            TokenKind::Null => Some(Literal::Null),
            _ => None,
        };
        if let Some(literal) = literal {
            self.advance();
            return Ok(self.add(ExprKind::Literal(literal), start));
        }

        match &self.current.kind {
            TokenKind::Identifier(_) => {
                let name = self.identifier()?;
                if !self.check(&TokenKind::LParen) {
                    return Ok(self.add(ExprKind::Name(name), start));
                }

                self.advance(); // (
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.check(&TokenKind::Comma) {
                            break;
                        }
                        self.advance();
                    }
                }
                self.consume(TokenKind::RParen, "\")\"")?;
                let span = start.merge(self.previous.span);
                Ok(self.add(ExprKind::Call { callee: name, args }, span))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen, "\")\"")?;
                Ok(inner)
            }
            _ => Err(self.error("an expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_kind(parsed: &ParsedBinding) -> &ExprKind {
        &parsed.ast.get(parsed.ast.root().unwrap()).unwrap().kind
    }

    #[test]
    fn test_outputs_and_one_shot() {
        let parsed = parse_binding("| Items -> key, item").unwrap();
        assert!(parsed.one_shot);
        assert_eq!(parsed.outputs, vec!["key", "item"]);
        assert!(matches!(root_kind(&parsed), ExprKind::Name(n) if &**n == "Items"));
    }

    #[test]
    fn test_call_and_member_chain() {
        let parsed = parse_binding("concat(user.name, 'x')").unwrap();
        match root_kind(&parsed) {
            ExprKind::Call { callee, args } => {
                assert_eq!(&**callee, "concat");
                assert_eq!(args.len(), 2);
                let first = &parsed.ast.get(args[0]).unwrap().kind;
                assert!(matches!(first, ExprKind::Member { field, .. } if &**field == "name"));
            }
            other => panic!("unexpected root {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        // `+` binds tighter than `==`, `!` tighter than both
        let parsed = parse_binding("!a + b == c").unwrap();
        match root_kind(&parsed) {
            ExprKind::Binary { op: BinaryOp::Eq, left, .. } => {
                let left = &parsed.ast.get(*left).unwrap().kind;
                assert!(matches!(left, ExprKind::Binary { op: BinaryOp::Concat, .. }));
            }
            other => panic!("unexpected root {other:?}"),
        }
    }

    #[test]
    fn test_syntax_errors_carry_span() {
        let err = parse_binding("name(a,").unwrap_err();
        assert!(matches!(err.kind, ExpressionErrorKind::Syntax(_)));
        assert_eq!(err.span, Span::new(7, 7));

        let err = parse_binding("a b").unwrap_err();
        assert_eq!(err.span, Span::new(2, 3));

        assert!(parse_binding("").is_err());
        assert!(parse_binding("x ->").is_err());
    }
}
