//! Binding expressions
//!
//! `parse_binding` turns a bind string into an arena AST; `evaluate` runs it
//! against a [`Scope`](crate::Scope) and reports the addressable model
//! locations it read.

mod token;
mod lexer;
mod ast;
mod parser;
mod eval;

pub use token::{Span, Token, TokenKind};
pub use lexer::Lexer;
pub use ast::{Ast, BinaryOp, ExprId, ExprKind, ExprNode, Literal};
pub use parser::{ParsedBinding, parse_binding};
pub use eval::{Evaluation, evaluate};
