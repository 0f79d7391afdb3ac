//! `if` / `ifn` binders
//!
//! A hidden node is swapped for a comment placeholder at the same position,
//! and swapped back when shown again.

use tether_dom::NodeId;

use crate::binder::{BindContext, Binder};
use crate::error::BindResult;
use crate::value::{Value, ValueKind};

#[derive(Debug)]
pub struct CondBinder {
    negate: bool,
    placeholder: NodeId,
    shown: bool,
}

impl CondBinder {
    /// `negate` turns `if` into `ifn`
    pub fn new(negate: bool) -> Self {
        Self { negate, placeholder: NodeId::NONE, shown: true }
    }
}

impl Binder for CondBinder {
    fn bind(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        let label = if self.negate { "ifn" } else { "if" };
        self.placeholder = ctx.host().create_comment(label);
        Ok(())
    }

    fn update(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        let Value::Bool(flag) = ctx.value else {
            return Err(ctx.type_error(ValueKind::Bool));
        };
        let show = flag != self.negate;
        if show == self.shown {
            return Ok(());
        }

        let mut host = ctx.host();
        if show {
            host.replace_with(self.placeholder, ctx.node)?;
        } else {
            host.replace_with(ctx.node, self.placeholder)?;
        }
        self.shown = show;
        Ok(())
    }
}
