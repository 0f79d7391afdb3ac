//! `attr(name)` binder

use crate::binder::{BindContext, Binder};
use crate::error::BindResult;

/// Sets the attribute named by the first argument
#[derive(Debug, Default)]
pub struct AttrBinder;

impl Binder for AttrBinder {
    fn arg_count(&self) -> usize {
        1
    }

    fn update(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        let text = ctx.value.to_display_string();
        ctx.host().set_attr(ctx.node, &ctx.args[0], &text)?;
        Ok(())
    }
}
