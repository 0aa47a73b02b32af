//! Arena-backed document tree.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Write as _};
use std::rc::Rc;

use super::node::{DomEvent, Element, NodeData, NodeId, NodeKind};

/// Elements serialised without a closing tag.
const VOID_ELEMENTS: &[&str] = &["img", "source", "br", "hr", "input"];

/// A shared, single-threaded document.
///
/// Cloning a `Document` yields another handle to the same tree. Nodes are
/// never freed; detached nodes simply lose their parent.
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

struct DocumentInner {
    nodes: RefCell<Vec<NodeData>>,
    body: NodeId,
    next_listener: Cell<u64>,
}

impl Document {
    /// Create a document with an empty `<body>`.
    pub fn new() -> Self {
        let body = NodeData::new(NodeKind::Element(Element {
            tag: "body".to_string(),
            ..Element::default()
        }));
        Self {
            inner: Rc::new(DocumentInner {
                nodes: RefCell::new(vec![body]),
                body: NodeId(0),
                next_listener: Cell::new(0),
            }),
        }
    }

    /// The `<body>` element, the usual mount target.
    pub fn body(&self) -> NodeId {
        self.inner.body
    }

    fn push(&self, kind: NodeKind) -> NodeId {
        let mut nodes = self.inner.nodes.borrow_mut();
        nodes.push(NodeData::new(kind));
        NodeId(nodes.len() - 1)
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(Element {
            tag: tag.to_string(),
            ..Element::default()
        }))
    }

    pub fn create_text(&self, data: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(data.into()))
    }

    /// A single-space text node, used between sibling blocks.
    pub fn space(&self) -> NodeId {
        self.create_text(" ")
    }

    /// Append `child` as the last child of `parent`.
    pub fn append(&self, parent: NodeId, child: NodeId) {
        self.insert(parent, child, None);
    }

    /// Insert `node` into `target` before `anchor`.
    ///
    /// A missing anchor, or one that is not a child of `target`, appends.
    pub fn insert(&self, target: NodeId, node: NodeId, anchor: Option<NodeId>) {
        self.detach(node);
        let mut nodes = self.inner.nodes.borrow_mut();
        let children = &mut nodes[target.0].children;
        let position = anchor
            .and_then(|a| children.iter().position(|c| *c == a))
            .unwrap_or(children.len());
        children.insert(position, node);
        nodes[node.0].parent = Some(target);
    }

    /// Remove `node` from its parent. Detaching an orphan does nothing.
    pub fn detach(&self, node: NodeId) {
        let mut nodes = self.inner.nodes.borrow_mut();
        if let Some(parent) = nodes[node.0].parent.take() {
            nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.nodes.borrow()[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner.nodes.borrow()[node.0].children.clone()
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.inner.nodes.borrow()[node.0]
            .element()
            .map(|el| el.tag.clone())
    }

    /// Set an attribute, or remove it when `value` is `None`.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: Option<&str>) {
        let mut nodes = self.inner.nodes.borrow_mut();
        if let Some(el) = nodes[node.0].element_mut() {
            match value {
                Some(value) => {
                    if el.attributes.get(name).map(String::as_str) != Some(value) {
                        el.attributes.insert(name.to_string(), value.to_string());
                    }
                }
                None => {
                    el.attributes.shift_remove(name);
                }
            }
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner.nodes.borrow()[node.0]
            .element()
            .and_then(|el| el.attributes.get(name).cloned())
    }

    pub fn set_style(&self, node: NodeId, key: &str, value: &str) {
        let mut nodes = self.inner.nodes.borrow_mut();
        if let Some(el) = nodes[node.0].element_mut() {
            el.style.insert(key.to_string(), value.to_string());
        }
    }

    pub fn style(&self, node: NodeId, key: &str) -> Option<String> {
        self.inner.nodes.borrow()[node.0]
            .element()
            .and_then(|el| el.style.get(key).cloned())
    }

    pub fn set_property(&self, node: NodeId, name: &str, value: bool) {
        let mut nodes = self.inner.nodes.borrow_mut();
        if let Some(el) = nodes[node.0].element_mut() {
            el.properties.insert(name.to_string(), value);
        }
    }

    pub fn property(&self, node: NodeId, name: &str) -> bool {
        self.inner.nodes.borrow()[node.0]
            .element()
            .and_then(|el| el.properties.get(name).copied())
            .unwrap_or(false)
    }

    /// Replace the data of a text node. Unchanged data is not rewritten.
    pub fn set_data(&self, node: NodeId, data: &str) {
        let mut nodes = self.inner.nodes.borrow_mut();
        if let NodeKind::Text(current) = &mut nodes[node.0].kind {
            if current != data {
                *current = data.to_string();
            }
        }
    }

    pub fn data(&self, node: NodeId) -> Option<String> {
        match &self.inner.nodes.borrow()[node.0].kind {
            NodeKind::Text(data) => Some(data.clone()),
            NodeKind::Element(_) => None,
        }
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let nodes = self.inner.nodes.borrow();
        let mut out = String::new();
        collect_text(&nodes, node, &mut out);
        out
    }

    /// Descendants of `root` (excluding `root`) with the given tag, in
    /// document order.
    pub fn find_all(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let nodes = self.inner.nodes.borrow();
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = nodes[root.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if nodes[id.0].element().is_some_and(|el| el.tag == tag) {
                found.push(id);
            }
            stack.extend(nodes[id.0].children.iter().rev().copied());
        }
        found
    }

    pub fn find(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        self.find_all(root, tag).into_iter().next()
    }

    /// Attach an event listener. The returned handle removes it.
    pub fn listen<F>(&self, node: NodeId, event: &str, handler: F) -> NodeListener
    where
        F: Fn(&DomEvent) + 'static,
    {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner.nodes.borrow_mut()[node.0]
            .listeners
            .push((id, event.to_string(), Rc::new(handler)));
        NodeListener {
            document: self.clone(),
            node,
            id,
            removed: Cell::new(false),
        }
    }

    /// Deliver an event to the listeners of `node`.
    ///
    /// Returns the number of handlers invoked. Handlers run after the tree
    /// borrow is released, so they may freely mutate the document.
    pub fn dispatch(&self, node: NodeId, event: &str) -> usize {
        let handlers: Vec<_> = self.inner.nodes.borrow()[node.0]
            .listeners
            .iter()
            .filter(|(_, kind, _)| kind == event)
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect();
        let dom_event = DomEvent {
            kind: event.to_string(),
            target: node,
        };
        for handler in &handlers {
            handler(&dom_event);
        }
        handlers.len()
    }

    /// Simulate a user click. Disabled elements swallow it.
    pub fn click(&self, node: NodeId) -> usize {
        if self.property(node, "disabled") {
            return 0;
        }
        self.dispatch(node, "click")
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.inner.nodes.borrow()[node.0].listeners.len()
    }

    /// Serialise `node` and its subtree as HTML.
    pub fn outer_html(&self, node: NodeId) -> String {
        let nodes = self.inner.nodes.borrow();
        let mut out = String::new();
        write_html(&nodes, node, &mut out);
        out
    }

    /// Serialise the children of `node` as HTML.
    pub fn inner_html(&self, node: NodeId) -> String {
        let nodes = self.inner.nodes.borrow();
        let mut out = String::new();
        for child in &nodes[node.0].children {
            write_html(&nodes, *child, &mut out);
        }
        out
    }

    fn remove_listener(&self, node: NodeId, id: u64) {
        self.inner.nodes.borrow_mut()[node.0]
            .listeners
            .retain(|(listener, _, _)| *listener != id);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("node_count", &self.inner.nodes.borrow().len())
            .finish()
    }
}

/// Removal handle returned by [`Document::listen`].
pub struct NodeListener {
    document: Document,
    node: NodeId,
    id: u64,
    removed: Cell<bool>,
}

impl NodeListener {
    /// Remove the listener. Safe to call more than once.
    pub fn dispose(&self) {
        if !self.removed.replace(true) {
            self.document.remove_listener(self.node, self.id);
        }
    }
}

fn collect_text(nodes: &[NodeData], node: NodeId, out: &mut String) {
    match &nodes[node.0].kind {
        NodeKind::Text(data) => out.push_str(data),
        NodeKind::Element(_) => {
            for child in &nodes[node.0].children {
                collect_text(nodes, *child, out);
            }
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn write_html(nodes: &[NodeData], node: NodeId, out: &mut String) {
    match &nodes[node.0].kind {
        NodeKind::Text(data) => out.push_str(&escape(data)),
        NodeKind::Element(el) => {
            let _ = write!(out, "<{}", el.tag);
            for (name, value) in &el.attributes {
                let _ = write!(out, " {}=\"{}\"", name, escape(value));
            }
            if !el.style.is_empty() {
                let style: Vec<String> = el
                    .style
                    .iter()
                    .map(|(k, v)| format!("{}: {};", k, v))
                    .collect();
                let _ = write!(out, " style=\"{}\"", escape(&style.join(" ")));
            }
            for (name, on) in &el.properties {
                if *on {
                    let _ = write!(out, " {}", name);
                }
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                return;
            }
            for child in &nodes[node.0].children {
                write_html(nodes, *child, out);
            }
            let _ = write!(out, "</{}>", el.tag);
        }
    }
}
