//! `html` binder

use crate::binder::{BindContext, Binder};
use crate::error::BindResult;

/// Replaces the node's inner markup with the stringified value
#[derive(Debug, Default)]
pub struct HtmlBinder;

impl Binder for HtmlBinder {
    fn bind(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        // Generated markup is not a template
        ctx.skip_children();
        Ok(())
    }

    fn update(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        let markup = ctx.value.to_display_string();
        ctx.host().set_inner_html(ctx.node, &markup)?;
        Ok(())
    }
}
