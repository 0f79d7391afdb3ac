//! `page` binder
//!
//! Turns a hyperlink into a navigation link: `href` gets the full url and
//! the page attribute gets the route path for the router to intercept.

use crate::binder::{BindContext, Binder};
use crate::error::BindResult;
use crate::value::{Value, ValueKind};

#[derive(Debug, Default)]
pub struct PageBinder;

impl Binder for PageBinder {
    fn bind(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        let is_link = ctx.host().tag_name(ctx.node).as_deref() == Some("a");
        if !is_link {
            return Err(ctx.unsupported("a hyperlink (<a>) is required"));
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        let Value::Route(route) = &ctx.value else {
            return Err(ctx.type_error(ValueKind::Route));
        };
        let page_attr = ctx.config().page_attr.clone();

        let mut host = ctx.host();
        host.set_attr(ctx.node, "href", &route.full_url)?;
        host.set_attr(ctx.node, &page_attr, &route.path)?;
        Ok(())
    }
}
