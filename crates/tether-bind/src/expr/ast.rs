//! Expression tree

use super::token::Span;

/// Expression node ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// Arena holding the nodes of one binding expression
#[derive(Debug, Default, Clone)]
pub struct Ast {
    nodes: Vec<ExprNode>,
    root: Option<ExprId>,
}

impl Ast {
    pub fn new() -> Self { Self::default() }

    pub fn add_node(&mut self, node: ExprNode) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: ExprId) -> Option<&ExprNode> { self.nodes.get(id.0 as usize) }
    pub fn set_root(&mut self, id: ExprId) { self.root = Some(id); }
    pub fn root(&self) -> Option<ExprId> { self.root }
    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }
}

/// Expression node
#[derive(Debug, Clone)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub span: Span,
}

impl ExprNode {
    pub fn new(kind: ExprKind, span: Span) -> Self { Self { kind, span } }
}

/// Expression node kinds
#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    /// Bare identifier, resolved through the scope
    Name(Box<str>),
    /// `object.field`
    Member { object: ExprId, field: Box<str> },
    /// `callee(args...)`
    Call { callee: Box<str>, args: Vec<ExprId> },
    /// `!operand`, sugar for `not(operand)`
    Not(ExprId),
    Binary { op: BinaryOp, left: ExprId, right: ExprId },
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(Box<str>),
    Boolean(bool),
    Null,
}

/// Binary operators; each is sugar over a helper call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `+`
    Concat,
}

impl BinaryOp {
    /// Helper the operator dispatches to
    pub fn helper(self) -> &'static str {
        match self {
            BinaryOp::Eq | BinaryOp::NotEq => "isEqual",
            BinaryOp::Concat => "concat",
        }
    }
}
