//! Document - `TreeHost` implementation over the arena tree

use std::collections::HashMap;

use crate::{DomError, DomResult, DomTree, EventHandler, NodeData, NodeId, TreeHost};

/// Container tag used for parsed fragments
const FRAGMENT_ROOT: &str = "wroot";

/// HTML document with event listeners
#[derive(Default)]
pub struct Document {
    /// The DOM tree
    pub tree: DomTree,
    listeners: HashMap<NodeId, Vec<(String, EventHandler)>>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse markup into a detached `<wroot>` container and return it
    pub fn fragment(&mut self, markup: &str) -> DomResult<NodeId> {
        let root = self.tree.create_element(FRAGMENT_ROOT);
        for node in crate::parse_fragment(&mut self.tree, markup)? {
            self.tree.append_child(root, node)?;
        }
        Ok(root)
    }

    /// Access the DOM tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Access the DOM tree mutably
    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    /// Number of listeners attached to a node
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.listeners.get(&node).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.tree.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TreeHost for Document {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.tree.create_element(tag)
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.tree.create_text(text)
    }

    fn create_comment(&mut self, text: &str) -> NodeId {
        self.tree.create_comment(text)
    }

    fn clone_node(&mut self, node: NodeId) -> DomResult<NodeId> {
        self.tree.clone_subtree(node)
    }

    fn parse_fragment(&mut self, markup: &str) -> DomResult<Vec<NodeId>> {
        crate::parse_fragment(&mut self.tree, markup)
    }

    fn remove(&mut self, node: NodeId) -> DomResult<()> {
        self.tree.detach(node)
    }

    fn insert_before(&mut self, reference: NodeId, new: NodeId) -> DomResult<()> {
        self.tree.insert_before(reference, new)
    }

    fn insert_after(&mut self, reference: NodeId, new: NodeId) -> DomResult<()> {
        self.tree.insert_after(reference, new)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.tree.append_child(parent, child)
    }

    fn replace_with(&mut self, old: NodeId, new: NodeId) -> DomResult<()> {
        self.tree.replace(old, new)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.parent(node)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree.child_ids(node)
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.tree.get(node).is_some_and(|n| n.is_element())
    }

    fn is_text(&self, node: NodeId) -> bool {
        self.tree.get(node).is_some_and(|n| n.is_text())
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.tree.element(node).ok().map(|e| e.tag.clone())
    }

    fn attrs(&self, node: NodeId) -> Vec<(String, String)> {
        self.tree.element(node).map_or_else(
            |_| Vec::new(),
            |e| e.attrs.iter().map(|a| (a.name.clone(), a.value.clone())).collect(),
        )
    }

    fn get_attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree.element(node).ok()?.get_attr(name).map(str::to_string)
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> DomResult<()> {
        self.tree.element_mut(node)?.set_attr(name, value.to_string());
        Ok(())
    }

    fn remove_attr(&mut self, node: NodeId, name: &str) -> DomResult<()> {
        self.tree.element_mut(node)?.remove_attr(name);
        Ok(())
    }

    fn text(&self, node: NodeId) -> String {
        self.tree.text_content(node)
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> DomResult<()> {
        self.tree.set_text(node, text)
    }

    fn set_inner_html(&mut self, node: NodeId, markup: &str) -> DomResult<()> {
        if !self.is_element(node) {
            return Err(DomError::InvalidNodeType(node));
        }
        for child in self.tree.child_ids(node) {
            self.tree.detach(child)?;
        }
        for child in crate::parse_fragment(&mut self.tree, markup)? {
            self.tree.append_child(node, child)?;
        }
        Ok(())
    }

    fn outer_html(&self, node: NodeId) -> String {
        self.tree.outer_html(node)
    }

    fn value(&self, node: NodeId) -> Option<String> {
        let el = self.tree.element(node).ok()?;
        if let Some(v) = &el.value {
            return Some(v.clone());
        }
        match el.tag.as_str() {
            "textarea" => Some(self.tree.text_content(node)),
            _ => Some(el.get_attr("value").unwrap_or_default().to_string()),
        }
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> DomResult<()> {
        self.tree.element_mut(node)?.value = Some(value.to_string());
        Ok(())
    }

    fn add_listener(&mut self, node: NodeId, event_type: &str, handler: EventHandler) -> DomResult<()> {
        match self.tree.get(node).map(|n| &n.data) {
            Some(NodeData::Element(_)) => {
                self.listeners
                    .entry(node)
                    .or_default()
                    .push((event_type.to_string(), handler));
                Ok(())
            }
            Some(_) => Err(DomError::InvalidNodeType(node)),
            None => Err(DomError::NotFound(node)),
        }
    }

    fn listeners(&self, node: NodeId, event_type: &str) -> Vec<EventHandler> {
        self.listeners.get(&node).map_or_else(Vec::new, |list| {
            list.iter()
                .filter(|(t, _)| t == event_type)
                .map(|(_, h)| h.clone())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dispatch_event, Event};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn test_fragment_container() {
        let mut doc = Document::new();
        let root = doc.fragment("<ul><li>a</li><li>b</li></ul>").unwrap();

        assert_eq!(doc.tag_name(root).as_deref(), Some("wroot"));
        assert_eq!(doc.tree.inner_html(root), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn test_class_helpers() {
        let mut doc = Document::new();
        let root = doc.fragment(r#"<li class="x"></li>"#).unwrap();
        let li = doc.children(root)[0];

        doc.add_class(li, "active").unwrap();
        doc.add_class(li, "active").unwrap();
        assert_eq!(doc.get_attr(li, "class").as_deref(), Some("x active"));

        doc.remove_class(li, "x").unwrap();
        doc.remove_class(li, "active").unwrap();
        assert_eq!(doc.get_attr(li, "class"), None);
    }

    #[test]
    fn test_editable_value() {
        let mut doc = Document::new();
        let root = doc.fragment(r#"<input value="start"><textarea>body</textarea>"#).unwrap();
        let kids = doc.children(root);

        assert_eq!(doc.value(kids[0]).as_deref(), Some("start"));
        assert_eq!(doc.value(kids[1]).as_deref(), Some("body"));
        doc.set_value(kids[0], "typed").unwrap();
        assert_eq!(doc.value(kids[0]).as_deref(), Some("typed"));
        assert_eq!(doc.get_attr(kids[0], "value").as_deref(), Some("start"));
    }

    #[test]
    fn test_event_bubbles_and_releases_host() {
        let doc = Rc::new(RefCell::new(Document::new()));
        let (outer, inner) = {
            let mut d = doc.borrow_mut();
            let root = d.fragment("<div><a>go</a></div>").unwrap();
            let outer = d.children(root)[0];
            (outer, d.children(outer)[0])
        };

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let d = doc.clone();
        doc.borrow_mut()
            .add_listener(outer, "click", Rc::new(move |ev: &mut Event| {
                h.set(h.get() + 1);
                // Host must be released while handlers run
                d.borrow_mut().set_attr(ev.target, "clicked", "yes").unwrap();
                ev.prevent_default();
            }))
            .unwrap();

        let ev = dispatch_event(&*doc, inner, "click");
        assert_eq!(hits.get(), 1);
        assert!(ev.default_prevented());
        assert_eq!(doc.borrow().get_attr(inner, "clicked").as_deref(), Some("yes"));
    }
}
