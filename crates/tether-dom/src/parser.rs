//! Markup fragment parsing
//!
//! html5ever always builds a full document, so the fragment is taken from the
//! children of `<head>` and `<body>` and converted into the arena.

use crate::{DomResult, DomTree, Node, NodeData, NodeId};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

/// Parse markup into detached top-level nodes of `tree`, in document order
pub fn parse_fragment(tree: &mut DomTree, markup: &str) -> DomResult<Vec<NodeId>> {
    let dom = parse_document(RcDom::default(), Default::default()).one(markup);

    let container = tree.create_fragment();
    for section in ["head", "body"] {
        if let Some(handle) = find_element(&dom.document, section) {
            for child in handle.children.borrow().iter() {
                convert_node(child, tree, container)?;
            }
        }
    }

    let nodes = tree.child_ids(container);
    for &id in &nodes {
        tree.detach(id)?;
    }
    tracing::debug!("Parsed fragment into {} top-level nodes", nodes.len());
    Ok(nodes)
}

/// Depth-first search for the first element with the given local name
fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if let RcNodeData::Element { name, .. } = &handle.data {
        if &*name.local == tag {
            return Some(handle.clone());
        }
    }
    handle.children.borrow().iter().find_map(|child| find_element(child, tag))
}

fn convert_node(handle: &Handle, tree: &mut DomTree, parent: NodeId) -> DomResult<()> {
    match &handle.data {
        RcNodeData::Document => {
            for child in handle.children.borrow().iter() {
                convert_node(child, tree, parent)?;
            }
        }
        RcNodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            if !text.trim().is_empty() {
                let id = tree.create_text(&text);
                tree.append_child(parent, id)?;
            }
        }
        RcNodeData::Comment { contents } => {
            let id = tree.create_comment(contents);
            tree.append_child(parent, id)?;
        }
        RcNodeData::Element { name, attrs, .. } => {
            let mut node = Node::element(&name.local);
            if let NodeData::Element(elem) = &mut node.data {
                for attr in attrs.borrow().iter() {
                    elem.set_attr(&attr.name.local, attr.value.to_string());
                }
            }
            let id = tree.push(node);
            tree.append_child(parent, id)?;

            for child in handle.children.borrow().iter() {
                convert_node(child, tree, id)?;
            }
        }
        // Doctypes and processing instructions have no place in a fragment
        RcNodeData::Doctype { .. } | RcNodeData::ProcessingInstruction { .. } => {}
    }
    Ok(())
}
