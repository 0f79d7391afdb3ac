//! `each` binder
//!
//! The annotated node becomes a prototype; a comment marker keeps its
//! position. Reconciliation is positional: the list shrinks from the end,
//! grows at the end, and every surviving slot is rebuilt from the prototype
//! with the new item's scope. There is no key-based identity across updates.

use tether_dom::NodeId;

use crate::binder::{BindContext, Binder};
use crate::error::BindResult;
use crate::value::{Value, ValueKind};
use crate::watch::WatchGroup;

#[derive(Debug)]
struct Slot {
    node: NodeId,
    group: WatchGroup,
}

#[derive(Debug)]
pub struct EachBinder {
    marker: NodeId,
    prototype: NodeId,
    slots: Vec<Slot>,
}

impl Default for EachBinder {
    fn default() -> Self {
        Self { marker: NodeId::NONE, prototype: NodeId::NONE, slots: Vec::new() }
    }
}

impl EachBinder {
    /// (key, value) pairs in iteration order
    fn items(ctx: &BindContext) -> BindResult<Vec<(Value, Value)>> {
        match &ctx.value {
            Value::List(items) => Ok(items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v.clone()))
                .collect()),
            Value::Map(map) => Ok(map
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
                .collect()),
            _ => Err(ctx.type_error(ValueKind::List)),
        }
    }

    /// Copy of the prototype in a fresh watch group
    fn copy(&self, ctx: &BindContext) -> BindResult<Slot> {
        let node = ctx.host().clone_node(self.prototype)?;
        Ok(Slot { node, group: ctx.child_group() })
    }

    /// Node new slots are inserted after
    fn tail(&self) -> NodeId {
        self.slots.last().map_or(self.marker, |s| s.node)
    }
}

impl Binder for EachBinder {
    fn bind(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        ctx.check_outputs()?;
        {
            let mut host = ctx.host();
            self.marker = host.create_comment("each");
            host.insert_before(ctx.node, self.marker)?;
            self.prototype = host.clone_node(ctx.node)?;
            host.remove(ctx.node)?;
        }
        ctx.stop_descent();
        Ok(())
    }

    fn update(&mut self, ctx: &mut BindContext) -> BindResult<()> {
        let items = Self::items(ctx)?;
        let surviving = self.slots.len().min(items.len());

        // Shrink
        while self.slots.len() > items.len() {
            if let Some(slot) = self.slots.pop() {
                ctx.release_group(slot.group);
                ctx.host().remove(slot.node)?;
            }
        }

        // Slots are placed before binding so binders see their final position
        for (i, (key, value)) in items.iter().take(surviving).enumerate() {
            ctx.release_group(self.slots[i].group);
            let slot = self.copy(ctx)?;
            ctx.host().replace_with(self.slots[i].node, slot.node)?;
            let (node, group) = (slot.node, slot.group);
            self.slots[i] = slot;
            ctx.bind_item(node, group, key.clone(), value.clone())?;
        }

        for (key, value) in items.into_iter().skip(surviving) {
            let slot = self.copy(ctx)?;
            let tail = self.tail();
            ctx.host().insert_after(tail, slot.node)?;
            let (node, group) = (slot.node, slot.group);
            self.slots.push(slot);
            ctx.bind_item(node, group, key, value)?;
        }

        tracing::debug!("each at {}: {} slot(s)", ctx.node, self.slots.len());
        Ok(())
    }
}
