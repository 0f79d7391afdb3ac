//! DOM operation errors

use crate::NodeId;

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Node {0} not found")]
    NotFound(NodeId),

    #[error("Hierarchy request error: {0} cannot be inserted here")]
    HierarchyRequest(NodeId),

    #[error("Node {0} has no parent")]
    NotAChild(NodeId),

    #[error("Invalid node type for {0}")]
    InvalidNodeType(NodeId),

    #[error("Markup parse error: {0}")]
    Parse(String),
}
