//! `value` binder
//!
//! Mirrors the value into an editable element and pushes `change` events
//! back into the single bound location.

use std::rc::Rc;

use tether_dom::Event;

use crate::binder::{BindContext, Binder, PushBack};
use crate::error::BindResult;
use crate::value::Value;

const EDITABLE: &[&str] = &["input", "textarea", "select"];

#[derive(Debug, Default)]
pub struct ValueBinder;

impl Binder for ValueBinder {
    fn two_way(&self) -> bool {
        true
    }

    fn bind(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        let tag = ctx.host().tag_name(ctx.node).unwrap_or_default();
        if !EDITABLE.contains(&tag.as_str()) {
            return Err(ctx.unsupported("an editable input element is required"));
        }
        Ok(())
    }

    fn watch(&mut self, ctx: &mut BindContext, push: PushBack) -> BindResult<()> {
        let host = ctx.weak_host();
        let handler = Rc::new(move |event: &mut Event| {
            let Some(host) = host.upgrade() else {
                return;
            };
            let value = host.borrow().value(event.target).unwrap_or_default();
            push.push_or_report(Value::Str(value));
        });
        ctx.host().add_listener(ctx.node, "change", handler)?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        let text = ctx.value.to_display_string();
        ctx.host().set_value(ctx.node, &text)?;
        Ok(())
    }
}
