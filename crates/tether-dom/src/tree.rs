//! DOM Tree (arena-based allocation)
//!
//! Nodes are never freed: removal only unlinks them, so a detached node can be
//! re-inserted later (the conditional binder relies on this).

use crate::{DomError, DomResult, ElementData, Node, NodeData, NodeId};

/// Elements that never have children or a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "source", "track", "wbr",
];

/// Arena-based DOM tree
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a new tree holding only the root fragment
    pub fn new() -> Self {
        Self { nodes: vec![Node::fragment()] }
    }

    /// Root node
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if !id.is_valid() {
            return None;
        }
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if !id.is_valid() {
            return None;
        }
        self.nodes.get_mut(id.index())
    }

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomError::NotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.get_mut(id).ok_or(DomError::NotFound(id))
    }

    /// Number of nodes in the arena (attached or not)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::element(tag))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(Node::text(text.to_string()))
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(Node::comment(text.to_string()))
    }

    /// Create a detached fragment container
    pub fn create_fragment(&mut self) -> NodeId {
        self.push(Node::fragment())
    }

    /// Parent of a node, if attached
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent.some()
    }

    /// Element data of a node
    pub fn element(&self, id: NodeId) -> DomResult<&ElementData> {
        self.node(id)?.as_element().ok_or(DomError::InvalidNodeType(id))
    }

    /// Mutable element data of a node
    pub fn element_mut(&mut self, id: NodeId) -> DomResult<&mut ElementData> {
        self.node_mut(id)?.as_element_mut().ok_or(DomError::InvalidNodeType(id))
    }

    /// Check whether `ancestor` is a proper ancestor of `node`
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.node(parent)?;
        self.node(child)?;
        if child == parent || child == NodeId::ROOT || self.is_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest(child));
        }
        Ok(())
    }

    /// Unlink a node from its parent. Detached nodes are left untouched.
    pub fn detach(&mut self, id: NodeId) -> DomResult<()> {
        let (parent, prev, next) = {
            let n = self.node(id)?;
            (n.parent, n.prev_sibling, n.next_sibling)
        };
        if !parent.is_valid() {
            return Ok(());
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = next;
        } else {
            self.nodes[parent.index()].first_child = next;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = prev;
        } else {
            self.nodes[parent.index()].last_child = prev;
        }

        let n = &mut self.nodes[id.index()];
        n.parent = NodeId::NONE;
        n.prev_sibling = NodeId::NONE;
        n.next_sibling = NodeId::NONE;
        Ok(())
    }

    /// Append a child, moving it out of its previous position
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.check_insert(parent, child)?;
        self.detach(child)?;

        let last = self.nodes[parent.index()].last_child;
        {
            let c = &mut self.nodes[child.index()];
            c.parent = parent;
            c.prev_sibling = last;
            c.next_sibling = NodeId::NONE;
        }
        if last.is_valid() {
            self.nodes[last.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        self.nodes[parent.index()].last_child = child;
        Ok(())
    }

    /// Insert `new` as the previous sibling of `reference`
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) -> DomResult<()> {
        if reference == new {
            return Ok(());
        }
        let parent = self.parent(reference).ok_or(DomError::NotAChild(reference))?;
        self.check_insert(parent, new)?;
        self.detach(new)?;

        // Read after detaching: `new` may have been the previous sibling.
        let prev = self.nodes[reference.index()].prev_sibling;
        {
            let c = &mut self.nodes[new.index()];
            c.parent = parent;
            c.prev_sibling = prev;
            c.next_sibling = reference;
        }
        self.nodes[reference.index()].prev_sibling = new;
        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = new;
        } else {
            self.nodes[parent.index()].first_child = new;
        }
        Ok(())
    }

    /// Insert `new` as the next sibling of `reference`
    pub fn insert_after(&mut self, reference: NodeId, new: NodeId) -> DomResult<()> {
        if reference == new {
            return Ok(());
        }
        let parent = self.parent(reference).ok_or(DomError::NotAChild(reference))?;
        self.check_insert(parent, new)?;
        self.detach(new)?;

        let next = self.nodes[reference.index()].next_sibling;
        if next.is_valid() {
            self.insert_before(next, new)
        } else {
            self.append_child(parent, new)
        }
    }

    /// Put `new` where `old` is and detach `old`
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> DomResult<()> {
        if old == new {
            return Ok(());
        }
        self.insert_before(old, new)?;
        self.detach(old)
    }

    /// Iterate over direct children
    pub fn children(&self, parent: NodeId) -> Children<'_> {
        let next = self.get(parent).map_or(NodeId::NONE, |n| n.first_child);
        Children { tree: self, next }
    }

    /// Snapshot of the direct children ids
    pub fn child_ids(&self, parent: NodeId) -> Vec<NodeId> {
        self.children(parent).map(|(id, _)| id).collect()
    }

    /// Deep copy of a subtree; the copy is detached
    pub fn clone_subtree(&mut self, id: NodeId) -> DomResult<NodeId> {
        let copy = self.node(id)?.detached_copy();
        let copy = self.push(copy);
        for child in self.child_ids(id) {
            let child_copy = self.clone_subtree(child)?;
            self.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    /// Concatenated text of a subtree
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Text(t)) => out.push_str(t),
            Some(NodeData::Element(_) | NodeData::Fragment) => {
                for (child, _) in self.children(id) {
                    self.collect_text(child, out);
                }
            }
            _ => {}
        }
    }

    /// Replace a node's text. Containers lose their children.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> DomResult<()> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(t) | NodeData::Comment(t) => {
                *t = text.to_string();
                Ok(())
            }
            NodeData::Element(_) | NodeData::Fragment => {
                for child in self.child_ids(id) {
                    self.detach(child)?;
                }
                if !text.is_empty() {
                    let t = self.create_text(text);
                    self.append_child(id, t)?;
                }
                Ok(())
            }
        }
    }

    /// Serialize a node and its subtree
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Serialize the children of a node
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for (child, _) in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        match &node.data {
            NodeData::Fragment => {
                for (child, _) in self.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeData::Text(t) => escape_into(t, false, out),
            NodeData::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for attr in &el.attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    escape_into(&attr.value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                    return;
                }
                for (child, _) in self.children(id) {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_into(s: &str, attr: bool, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attr => out.push_str("&lt;"),
            '>' if !attr => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Iterator over the direct children of a node
pub struct Children<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl<'a> Iterator for Children<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next;
        let node = self.tree.get(id)?;
        self.next = node.next_sibling;
        Some((id, node))
    }
}
