//! Expression evaluation
//!
//! Evaluation is bottom-up. Every model field read records its location in
//! the dependency set, the object fields of a member chain included, so
//! replacing `User` re-renders `User.Name`. Fields without a location are
//! kept apart: a live binding that read one cannot be watched. Helper calls
//! record nothing themselves: a helper is a pure function of its evaluated
//! arguments.

use super::ast::{Ast, BinaryOp, ExprId, ExprKind, Literal};
use super::parser::ParsedBinding;
use super::token::Span;
use crate::error::{BindingExpressionError, ExpressionErrorKind};
use crate::model::{FieldHandle, Location};
use crate::scope::{Scope, Symbol};
use crate::value::Value;

/// Result of one evaluation
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub value: Value,
    /// Addressable fields read, in first-read order, without duplicates
    pub deps: Vec<FieldHandle>,
    /// Field the whole expression designates, when it is a bare name or chain
    pub target: Option<FieldHandle>,
    /// Spans of the fields read that have no location (computed fields)
    pub unaddressable: Vec<Span>,
}

impl Evaluation {
    /// Locations of the dependency set
    pub fn locations(&self) -> Vec<Location> {
        self.deps.iter().filter_map(FieldHandle::location).collect()
    }

    /// Fail when a live binding read something the watch table cannot track
    pub fn check_watchable(&self, source: &str) -> Result<(), BindingExpressionError> {
        match self.unaddressable.first() {
            Some(span) => Err(BindingExpressionError::new(source, *span, ExpressionErrorKind::NotAddressable)),
            None => Ok(()),
        }
    }
}

/// Evaluate a parsed binding against a scope
pub fn evaluate(binding: &ParsedBinding, scope: &Scope) -> Result<Evaluation, BindingExpressionError> {
    let Some(root) = binding.ast.root() else {
        return Err(BindingExpressionError::whole(
            &binding.source,
            ExpressionErrorKind::Syntax("empty binding".into()),
        ));
    };

    let mut evaluator = Evaluator {
        ast: &binding.ast,
        scope,
        source: &binding.source,
        deps: Vec::new(),
        unaddressable: Vec::new(),
    };
    let operand = evaluator.eval(root)?;
    let target = match &operand {
        Operand::Field(handle, _) => Some(handle.clone()),
        Operand::Value(_) => None,
    };
    let value = evaluator.take(operand);

    Ok(Evaluation { value, deps: evaluator.deps, target, unaddressable: evaluator.unaddressable })
}

/// Intermediate result: a field can still be used as a chain object
enum Operand {
    Field(FieldHandle, Span),
    Value(Value),
}

struct Evaluator<'a> {
    ast: &'a Ast,
    scope: &'a Scope,
    source: &'a str,
    deps: Vec<FieldHandle>,
    unaddressable: Vec<Span>,
}

impl Evaluator<'_> {
    fn error(&self, span: Span, kind: ExpressionErrorKind) -> BindingExpressionError {
        BindingExpressionError::new(self.source, span, kind)
    }

    /// Use an operand as a value, recording it as a dependency
    fn take(&mut self, operand: Operand) -> Value {
        match operand {
            Operand::Value(v) => v,
            Operand::Field(handle, span) => {
                let value = handle.get();
                match handle.location() {
                    Some(location) => {
                        if !self.deps.iter().any(|d| d.location() == Some(location)) {
                            self.deps.push(handle);
                        }
                    }
                    None => self.unaddressable.push(span),
                }
                value
            }
        }
    }

    fn eval_value(&mut self, id: ExprId) -> Result<Value, BindingExpressionError> {
        let operand = self.eval(id)?;
        Ok(self.take(operand))
    }

    fn eval(&mut self, id: ExprId) -> Result<Operand, BindingExpressionError> {
        let ast = self.ast;
        let Some(node) = ast.get(id) else {
            return Err(BindingExpressionError::whole(
                self.source,
                ExpressionErrorKind::Syntax("dangling expression node".into()),
            ));
        };
        let span = node.span;

        match &node.kind {
            ExprKind::Literal(lit) => Ok(Operand::Value(match lit {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::Str(s.to_string()),
                Literal::Boolean(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
            })),

            ExprKind::Name(name) => match self.scope.resolve(name) {
                Some(Symbol::Field(handle)) => Ok(Operand::Field(handle, span)),
                Some(symbol) => Ok(Operand::Value(symbol.value())),
                None => Err(self.error(span, ExpressionErrorKind::UnresolvedName(name.to_string()))),
            },

            ExprKind::Member { object, field } => {
                let object = self.eval_value(*object)?;
                match object {
                    Value::Record(model) => model
                        .handle(field)
                        .map(|handle| Operand::Field(handle, span))
                        .ok_or_else(|| self.error(span, ExpressionErrorKind::UnresolvedName(field.to_string()))),
                    Value::Map(map) => map
                        .get(&**field)
                        .cloned()
                        .map(Operand::Value)
                        .ok_or_else(|| self.error(span, ExpressionErrorKind::UnresolvedName(field.to_string()))),
                    other => Err(self.error(
                        span,
                        ExpressionErrorKind::IncompatibleShape { field: field.to_string(), shape: other.shape() },
                    )),
                }
            }

            ExprKind::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_value(*arg)?);
                }
                self.call(callee, &values, span).map(Operand::Value)
            }

            ExprKind::Not(operand) => {
                let value = self.eval_value(*operand)?;
                self.call("not", &[value], span).map(Operand::Value)
            }

            ExprKind::Binary { op, left, right } => {
                let left = self.eval_value(*left)?;
                let right = self.eval_value(*right)?;
                let result = self.call(op.helper(), &[left, right], span)?;
                if *op == BinaryOp::NotEq {
                    return self.call("not", &[result], span).map(Operand::Value);
                }
                Ok(Operand::Value(result))
            }
        }
    }

    fn call(&self, name: &str, args: &[Value], span: Span) -> Result<Value, BindingExpressionError> {
        let func = match self.scope.resolve(name).map(|s| s.value()) {
            Some(Value::Func(func)) => func,
            Some(_) => return Err(self.error(span, ExpressionErrorKind::NotCallable(name.to_string()))),
            None => return Err(self.error(span, ExpressionErrorKind::UnresolvedName(name.to_string()))),
        };

        if !func.arity().accepts(args.len()) {
            return Err(self.error(
                span,
                ExpressionErrorKind::Arity { name: name.to_string(), expected: func.arity(), found: args.len() },
            ));
        }

        func.call(args).map_err(|e| {
            self.error(span, ExpressionErrorKind::Helper { name: name.to_string(), message: e.to_string() })
        })
    }
}
