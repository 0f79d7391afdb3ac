//! Abstract tree-mutation capability
//!
//! The binding engine never touches a concrete document; everything it needs
//! goes through [`TreeHost`]. The trait is object safe so the engine can hold
//! an `Rc<RefCell<dyn TreeHost>>`.

use crate::{DomResult, EventHandler, NodeId};

/// Tree operations a host document provides to the binder
pub trait TreeHost {
    // Creation
    fn create_element(&mut self, tag: &str) -> NodeId;
    fn create_text(&mut self, text: &str) -> NodeId;
    fn create_comment(&mut self, text: &str) -> NodeId;
    /// Deep copy of a subtree, detached. Event listeners are not copied.
    fn clone_node(&mut self, node: NodeId) -> DomResult<NodeId>;
    /// Parse markup into detached top-level nodes
    fn parse_fragment(&mut self, markup: &str) -> DomResult<Vec<NodeId>>;

    // Structure
    /// Detach a node from its parent
    fn remove(&mut self, node: NodeId) -> DomResult<()>;
    fn insert_before(&mut self, reference: NodeId, new: NodeId) -> DomResult<()>;
    fn insert_after(&mut self, reference: NodeId, new: NodeId) -> DomResult<()>;
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()>;
    /// Put `new` at the position of `old`, detaching `old`
    fn replace_with(&mut self, old: NodeId, new: NodeId) -> DomResult<()>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    /// Snapshot of the direct children
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    // Inspection
    fn is_element(&self, node: NodeId) -> bool;
    fn is_text(&self, node: NodeId) -> bool;
    /// Lowercase tag name of an element
    fn tag_name(&self, node: NodeId) -> Option<String>;

    // Attributes
    /// Attributes in source order
    fn attrs(&self, node: NodeId) -> Vec<(String, String)>;
    fn get_attr(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> DomResult<()>;
    fn remove_attr(&mut self, node: NodeId, name: &str) -> DomResult<()>;

    // Content
    fn text(&self, node: NodeId) -> String;
    fn set_text(&mut self, node: NodeId, text: &str) -> DomResult<()>;
    fn set_inner_html(&mut self, node: NodeId, markup: &str) -> DomResult<()>;
    fn outer_html(&self, node: NodeId) -> String;

    /// Current value of an editable element
    fn value(&self, node: NodeId) -> Option<String>;
    fn set_value(&mut self, node: NodeId, value: &str) -> DomResult<()>;

    // Events
    fn add_listener(&mut self, node: NodeId, event_type: &str, handler: EventHandler) -> DomResult<()>;
    /// Snapshot of the handlers registered for an event type
    fn listeners(&self, node: NodeId, event_type: &str) -> Vec<EventHandler>;

    // Provided

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.get_attr(node, "class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    fn add_class(&mut self, node: NodeId, class: &str) -> DomResult<()> {
        if self.has_class(node, class) {
            return Ok(());
        }
        let current = self.get_attr(node, "class").unwrap_or_default();
        let joined = if current.trim().is_empty() {
            class.to_string()
        } else {
            format!("{} {}", current.trim(), class)
        };
        self.set_attr(node, "class", &joined)
    }

    fn remove_class(&mut self, node: NodeId, class: &str) -> DomResult<()> {
        let Some(current) = self.get_attr(node, "class") else {
            return Ok(());
        };
        let kept: Vec<&str> = current.split_whitespace().filter(|c| *c != class).collect();
        if kept.is_empty() {
            self.remove_attr(node, "class")
        } else {
            self.set_attr(node, "class", &kept.join(" "))
        }
    }

    /// Direct children that are elements
    fn child_elements(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node).into_iter().filter(|&c| self.is_element(c)).collect()
    }

    /// Whether the node hangs below `root`
    fn is_attached(&self, node: NodeId, root: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(p) = current {
            if p == root {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// `tag#id (ancestor>ancestor>)` description used in error messages
    fn debug_info(&self, node: NodeId) -> String {
        let describe = |n: NodeId| match self.tag_name(n) {
            Some(tag) => match self.get_attr(n, "id") {
                Some(id) => format!("{tag}#{id}"),
                None => tag,
            },
            None if self.is_text(n) => "#text".to_string(),
            None => "#node".to_string(),
        };

        let mut chain = Vec::new();
        let mut current = self.parent(node);
        while let Some(p) = current {
            if self.tag_name(p).is_some() {
                chain.push(describe(p));
            }
            current = self.parent(p);
        }
        chain.reverse();

        let mut out = describe(node);
        out.push_str(" (");
        for tag in chain {
            out.push_str(&tag);
            out.push('>');
        }
        out.push(')');
        out
    }
}
