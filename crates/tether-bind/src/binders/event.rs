//! `on(event)` binder
//!
//! The expression must yield a zero-argument function. The listener always
//! suppresses the host's default action before calling it.

use std::cell::RefCell;
use std::rc::Rc;

use tether_dom::Event;

use crate::binder::{BindContext, Binder};
use crate::error::{BindError, BindResult, BindingExpressionError, ExpressionErrorKind};
use crate::value::{Func, Value, ValueKind};

#[derive(Debug, Default)]
pub struct EventBinder {
    /// Shared with the listener so updates swap the target in place
    handler: Rc<RefCell<Option<Func>>>,
}

impl Binder for EventBinder {
    fn arg_count(&self) -> usize {
        1
    }

    fn bind(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        let current = self.handler.clone();
        let sink = ctx.sink();
        let expression = ctx.expression().to_string();

        let listener = Rc::new(move |event: &mut Event| {
            event.prevent_default();
            let Some(func) = current.borrow().clone() else {
                return;
            };
            if let Err(e) = func.call(&[]) {
                let kind = ExpressionErrorKind::Helper { name: event.event_type.clone(), message: e.to_string() };
                sink.report(BindError::from(BindingExpressionError::whole(&expression, kind)));
            }
        });
        ctx.host().add_listener(ctx.node, &ctx.args[0], listener)?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        match &ctx.value {
            Value::Func(func) if func.arity().accepts(0) => {
                *self.handler.borrow_mut() = Some(func.clone());
                Ok(())
            }
            _ => Err(ctx.type_error(ValueKind::Func)),
        }
    }
}
