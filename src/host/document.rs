// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Headless document tree.
//!
//! A minimal node arena standing in for a browser document: elements, text
//! and comments with attributes, classes and inline style. It exists so the
//! structural mutation primitives have something real to mutate; it does no
//! layout or rendering.
//!
//! Each node has exactly one [`HostValue`], created with the node, so every
//! handle the module holds for a node aliases the same value and event
//! registrations on a node match no matter which handle was used.

use std::collections::BTreeMap;

use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Host value for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(pub NodeId);

#[derive(Debug)]
enum NodeKind {
    Document,
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        classes: Vec<String>,
        style: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    value: HostValue,
}

#[derive(Debug)]
pub struct HeadlessDocument {
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
}

fn not_found(what: &str) -> BridgeError {
    BridgeError::host("NotFoundError", format!("{what} is not a child of this node"))
}

fn hierarchy(message: &str) -> BridgeError {
    BridgeError::host("HierarchyRequestError", message.to_string())
}

fn valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl HeadlessDocument {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
        };
        doc.root = doc.push(NodeKind::Document);
        let html = doc.push(Self::element_kind("html"));
        doc.head = doc.push(Self::element_kind("head"));
        doc.body = doc.push(Self::element_kind("body"));
        doc.link(doc.root, html, None);
        doc.link(html, doc.head, None);
        doc.link(html, doc.body, None);
        doc
    }

    fn element_kind(tag: &str) -> NodeKind {
        NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            classes: Vec::new(),
            style: Vec::new(),
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            value: HostValue::new(NodeRef(id)),
        });
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId, before: Option<usize>) {
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        match before {
            Some(idx) => children.insert(idx, child),
            None => children.push(child),
        }
    }

    fn unlink(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != child);
        }
    }

    pub fn value(&self, id: NodeId) -> HostValue {
        self.nodes[id.0].value.clone()
    }

    pub fn document_value(&self) -> HostValue {
        self.value(self.root)
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    /// Resolves a host value to one of this document's nodes.
    pub fn node_of(&self, value: &HostValue) -> BridgeResult<NodeId> {
        match value.downcast_ref::<NodeRef>() {
            Some(NodeRef(id)) if id.0 < self.nodes.len() => Ok(*id),
            _ => Err(BridgeError::host(
                "TypeError",
                format!("expected a document node, got {value:?}"),
            )),
        }
    }

    pub fn create_element(&mut self, tag: &str) -> BridgeResult<NodeId> {
        if !valid_tag(tag) {
            return Err(BridgeError::host(
                "InvalidCharacterError",
                format!("'{tag}' is not a valid tag name"),
            ));
        }
        Ok(self.push(Self::element_kind(tag)))
    }

    pub fn create_text_node(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment(text.to_string()))
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> BridgeResult<()> {
        if !matches!(
            self.nodes[parent.0].kind,
            NodeKind::Document | NodeKind::Element { .. }
        ) {
            return Err(hierarchy("this node type does not accept children"));
        }
        if matches!(self.nodes[child.0].kind, NodeKind::Document) {
            return Err(hierarchy("a document can not be inserted"));
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(hierarchy("the new child is an ancestor of the parent"));
            }
            cursor = self.nodes[id.0].parent;
        }
        Ok(())
    }

    fn index_in(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.nodes[parent.0].children.iter().position(|c| *c == child)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> BridgeResult<NodeId> {
        self.check_insert(parent, child)?;
        self.unlink(child);
        self.link(parent, child, None);
        Ok(child)
    }

    /// Inserts `child` before `reference`, or appends when there is none.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> BridgeResult<NodeId> {
        let Some(reference) = reference else {
            return self.append_child(parent, child);
        };
        if self.index_in(parent, reference).is_none() {
            return Err(not_found("the reference node"));
        }
        self.check_insert(parent, child)?;
        if child == reference {
            return Ok(child);
        }
        self.unlink(child);
        let idx = self
            .index_in(parent, reference)
            .ok_or_else(|| not_found("the reference node"))?;
        self.link(parent, child, Some(idx));
        Ok(child)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> BridgeResult<NodeId> {
        if self.index_in(parent, child).is_none() {
            return Err(not_found("the node to remove"));
        }
        self.unlink(child);
        Ok(child)
    }

    /// Replaces `old` with `new` and returns `old`.
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> BridgeResult<NodeId> {
        if self.index_in(parent, old).is_none() {
            return Err(not_found("the node to replace"));
        }
        self.check_insert(parent, new)?;
        if new == old {
            return Ok(old);
        }
        self.unlink(new);
        let idx = self
            .index_in(parent, old)
            .ok_or_else(|| not_found("the node to replace"))?;
        self.unlink(old);
        self.link(parent, new, Some(idx));
        Ok(old)
    }

    pub fn set_text_data(&mut self, node: NodeId, text: &str) -> BridgeResult<()> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => {
                *data = text.to_string();
                Ok(())
            }
            _ => Err(BridgeError::host("TypeError", "node has no character data")),
        }
    }

    fn element_mut(
        &mut self,
        node: NodeId,
    ) -> BridgeResult<(
        &mut BTreeMap<String, String>,
        &mut Vec<String>,
        &mut Vec<(String, String)>,
    )> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Element {
                attributes,
                classes,
                style,
                ..
            } => Ok((attributes, classes, style)),
            _ => Err(BridgeError::host("TypeError", "node is not an element")),
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> BridgeResult<()> {
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '=' || c == '"') {
            return Err(BridgeError::host(
                "InvalidCharacterError",
                format!("'{name}' is not a valid attribute name"),
            ));
        }
        let name = name.to_ascii_lowercase();
        let (attributes, classes, _) = self.element_mut(node)?;
        if name == "class" {
            *classes = value.split_whitespace().map(str::to_string).collect();
            return Ok(());
        }
        attributes.insert(name, value.to_string());
        Ok(())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            _ => None,
        }
    }

    pub fn class_add(&mut self, node: NodeId, class: &str) -> BridgeResult<()> {
        let (_, classes, _) = self.element_mut(node)?;
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
        Ok(())
    }

    pub fn class_remove(&mut self, node: NodeId, class: &str) -> BridgeResult<()> {
        let (_, classes, _) = self.element_mut(node)?;
        classes.retain(|c| c != class);
        Ok(())
    }

    pub fn style_set(&mut self, node: NodeId, property: &str, value: &str) -> BridgeResult<()> {
        let (_, _, style) = self.element_mut(node)?;
        match style.iter_mut().find(|(p, _)| p == property) {
            Some((_, existing)) => *existing = value.to_string(),
            None => style.push((property.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Current value of a style property; empty when unset.
    pub fn style_get(&mut self, node: NodeId, property: &str) -> BridgeResult<String> {
        let (_, _, style) = self.element_mut(node)?;
        Ok(style
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    }

    /// Removes a style property and returns its old value.
    pub fn style_remove(&mut self, node: NodeId, property: &str) -> BridgeResult<String> {
        let (_, _, style) = self.element_mut(node)?;
        let old = style
            .iter()
            .position(|(p, _)| p == property)
            .map(|idx| style.remove(idx).1);
        Ok(old.unwrap_or_default())
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Serializes a subtree as markup.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Document => {
                for child in &self.nodes[node.0].children {
                    self.write_markup(*child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(&escape(text)),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Element {
                tag,
                attributes,
                classes,
                style,
            } => {
                out.push('<');
                out.push_str(tag);
                if !classes.is_empty() {
                    out.push_str(&format!(" class=\"{}\"", escape(&classes.join(" "))));
                }
                for (name, value) in attributes {
                    out.push_str(&format!(" {name}=\"{}\"", escape(value)));
                }
                if !style.is_empty() {
                    let css: Vec<String> = style.iter().map(|(p, v)| format!("{p}: {v}")).collect();
                    out.push_str(&format!(" style=\"{}\"", escape(&css.join("; "))));
                }
                out.push('>');
                for child in &self.nodes[node.0].children {
                    self.write_markup(*child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }
}

impl Default for HeadlessDocument {
    fn default() -> Self {
        Self::new()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_serialize_tree() {
        let mut doc = HeadlessDocument::new();
        let list = doc.create_element("ul").unwrap();
        let first = doc.create_element("li").unwrap();
        let text = doc.create_text_node("one & two");
        doc.append_child(first, text).unwrap();
        doc.append_child(list, first).unwrap();
        doc.append_child(doc.body(), list).unwrap();
        doc.class_add(list, "todo").unwrap();
        doc.class_add(list, "todo").unwrap();
        doc.set_attribute(list, "id", "items").unwrap();
        doc.style_set(list, "color", "red").unwrap();

        assert_eq!(
            doc.outer_html(doc.body()),
            "<body><ul class=\"todo\" id=\"items\" style=\"color: red\"><li>one &amp; two</li></ul></body>"
        );
    }

    #[test]
    fn test_node_value_identity_is_stable() {
        let mut doc = HeadlessDocument::new();
        let el = doc.create_element("div").unwrap();
        assert!(HostValue::ptr_eq(&doc.value(el), &doc.value(el)));
        assert_eq!(doc.node_of(&doc.value(el)).unwrap(), el);
        assert!(doc.node_of(&HostValue::string("div")).is_err());
    }

    #[test]
    fn test_insert_remove_replace() {
        let mut doc = HeadlessDocument::new();
        let body = doc.body();
        let a = doc.create_element("a").unwrap();
        let b = doc.create_element("b").unwrap();
        let c = doc.create_element("i").unwrap();

        doc.append_child(body, a).unwrap();
        doc.insert_before(body, b, Some(a)).unwrap();
        assert_eq!(doc.children(body), &[b, a]);

        assert_eq!(doc.replace_child(body, c, b).unwrap(), b);
        assert_eq!(doc.children(body), &[c, a]);
        assert_eq!(doc.parent(b), None);

        doc.remove_child(body, a).unwrap();
        assert_eq!(doc.children(body), &[c]);
        assert!(doc.remove_child(body, a).unwrap_err().is_boxable());
    }

    #[test]
    fn test_append_moves_existing_child() {
        let mut doc = HeadlessDocument::new();
        let left = doc.create_element("div").unwrap();
        let right = doc.create_element("div").unwrap();
        let item = doc.create_element("span").unwrap();
        doc.append_child(left, item).unwrap();
        doc.append_child(right, item).unwrap();
        assert!(doc.children(left).is_empty());
        assert_eq!(doc.children(right), &[item]);
    }

    #[test]
    fn test_cycles_and_bad_names_are_rejected() {
        let mut doc = HeadlessDocument::new();
        let outer = doc.create_element("div").unwrap();
        let inner = doc.create_element("div").unwrap();
        doc.append_child(outer, inner).unwrap();

        match doc.append_child(inner, outer) {
            Err(BridgeError::HostFailure { kind, .. }) => assert_eq!(kind, "HierarchyRequestError"),
            other => panic!("Expected HierarchyRequestError, got {other:?}"),
        }
        assert!(doc.create_element("1abc").is_err());
        assert!(doc.create_element("").is_err());

        let text = doc.create_text_node("x");
        assert!(doc.append_child(text, outer).is_err());
        assert!(doc.set_attribute(text, "id", "t").is_err());
    }

    #[test]
    fn test_style_get_and_remove() {
        let mut doc = HeadlessDocument::new();
        let el = doc.create_element("p").unwrap();
        assert_eq!(doc.style_get(el, "margin").unwrap(), "");
        doc.style_set(el, "margin", "4px").unwrap();
        doc.style_set(el, "margin", "8px").unwrap();
        assert_eq!(doc.style_get(el, "margin").unwrap(), "8px");
        assert_eq!(doc.style_remove(el, "margin").unwrap(), "8px");
        assert_eq!(doc.style_remove(el, "margin").unwrap(), "");
    }

    #[test]
    fn test_set_text_data() {
        let mut doc = HeadlessDocument::new();
        let text = doc.create_text_node("before");
        let note = doc.create_comment("note");
        doc.set_text_data(text, "after").unwrap();
        doc.set_text_data(note, "edited").unwrap();
        doc.append_child(doc.body(), text).unwrap();
        doc.append_child(doc.body(), note).unwrap();
        assert_eq!(doc.outer_html(doc.body()), "<body>after<!--edited--></body>");
        assert!(doc.set_text_data(doc.body(), "x").is_err());
    }
}
