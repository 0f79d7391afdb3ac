//! Binding errors
//!
//! Configuration and structural errors are fatal at setup time. Expression
//! errors fail the initial bind but are routed to an [`ErrorSink`] once a
//! subtree is live.

use std::cell::RefCell;

use tether_dom::DomError;

use crate::expr::Span;
use crate::value::{Arity, ValueKind, ValueShape};
use crate::watch::WatchError;

/// Result type for binding operations
pub type BindResult<T> = Result<T, BindError>;

/// Registration and directive syntax mistakes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Helper \"{0}\" is already registered")]
    DuplicateHelper(String),

    #[error("Binder \"{0}\" is already registered")]
    DuplicateBinder(String),

    #[error("Component \"{0}\" is already registered")]
    DuplicateComponent(String),

    #[error("Page \"{0}\" is already registered")]
    DuplicatePage(String),

    #[error("Malformed directive \"{directive}\": {reason}")]
    MalformedDirective { directive: String, reason: String },

    #[error("Binder \"{0}\" does not exist")]
    UnknownBinder(String),

    #[error("Binder \"{binder}\" takes {expected} argument(s), got {found}")]
    BinderArity { binder: String, expected: usize, found: usize },

    #[error("Binder \"{binder}\" cannot be used on <{tag}>, {requirement}")]
    UnsupportedElement { binder: String, tag: String, requirement: &'static str },

    #[error("Invalid root element for bind: {0}")]
    InvalidRoot(String),
}

/// Failure to parse or evaluate a binding string
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}. While processing bind string \"{expression}\" ({}..{})", span.start, span.end)]
pub struct BindingExpressionError {
    pub expression: String,
    pub span: Span,
    pub kind: ExpressionErrorKind,
}

impl BindingExpressionError {
    pub fn new(expression: &str, span: Span, kind: ExpressionErrorKind) -> Self {
        Self { expression: expression.to_string(), span, kind }
    }

    /// Error covering the whole binding string
    pub fn whole(expression: &str, kind: ExpressionErrorKind) -> Self {
        Self::new(expression, Span::new(0, expression.len() as u32), kind)
    }
}

/// What went wrong inside a binding expression
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionErrorKind {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unresolved name \"{0}\"")]
    UnresolvedName(String),

    #[error("\"{name}\" takes {expected} argument(s), got {found}")]
    Arity { name: String, expected: Arity, found: usize },

    #[error("Cannot access \"{field}\" on a {shape:?} value")]
    IncompatibleShape { field: String, shape: ValueShape },

    #[error("\"{0}\" is not callable")]
    NotCallable(String),

    #[error("Cannot watch a value that is not an addressable model field. Use a leading \"|\" for a one-shot binding")]
    NotAddressable,

    #[error("Expected a {expected:?} value, got {found:?}")]
    TypeMismatch { expected: ValueKind, found: ValueKind },

    #[error("Field \"{0}\" is read-only")]
    ReadOnlyField(String),

    #[error("Helper \"{name}\" failed: {message}")]
    Helper { name: String, message: String },
}

/// Tree shape the binder refuses to expand
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("Infinite loop detected. Usage of custom tag \"{0}\" inside its own definition")]
    RecursiveComponent(String),
}

/// Any failure of the binding engine
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Expression(#[from] BindingExpressionError),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Component <{tag}>: {message}")]
    Component { tag: String, message: String },

    #[error("Page controller failed: {0}")]
    Controller(String),

    #[error("Binding engine has been dropped")]
    Detached,

    #[error("{source}\nElement: {element}")]
    Element { element: String, source: Box<BindError> },
}

impl BindError {
    /// Attach element context, keeping the innermost one
    pub fn at(self, element: String) -> Self {
        match self {
            BindError::Element { .. } => self,
            other => BindError::Element { element, source: Box::new(other) },
        }
    }

    /// The error without element context
    pub fn root_cause(&self) -> &BindError {
        let mut current = self;
        while let BindError::Element { source, .. } = current {
            current = source;
        }
        current
    }

    /// Element description, if attached
    pub fn element(&self) -> Option<&str> {
        match self {
            BindError::Element { element, .. } => Some(element),
            _ => None,
        }
    }
}

/// Channel for errors raised by live (post initial bind) updates
pub trait ErrorSink {
    fn report(&self, error: BindError);
}

/// Logs errors through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, error: BindError) {
        tracing::error!("Binding update failed: {}", error);
    }
}

/// Keeps errors for later inspection
#[derive(Debug, Default)]
pub struct CollectingSink {
    errors: RefCell<Vec<BindError>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.errors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }

    /// Drain the collected errors
    pub fn take(&self) -> Vec<BindError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, error: BindError) {
        self.errors.borrow_mut().push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_context() {
        let err = BindError::from(StructuralError::RecursiveComponent("menu".into()))
            .at("menu (wroot>)".into())
            .at("outer".into());

        assert_eq!(err.element(), Some("menu (wroot>)"));
        assert!(matches!(
            err.root_cause(),
            BindError::Structural(StructuralError::RecursiveComponent(tag)) if tag == "menu"
        ));
    }

    #[test]
    fn test_expression_message_names_binding() {
        let err = BindingExpressionError::whole("Nope", ExpressionErrorKind::UnresolvedName("Nope".into()));
        let message = err.to_string();
        assert!(message.contains("Unresolved name \"Nope\""));
        assert!(message.contains("\"Nope\" (0..4)"));
    }
}
