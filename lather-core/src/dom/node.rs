//! Document nodes.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Index of a node inside its [`Document`](super::Document).
///
/// Node ids are only meaningful for the document that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Get the raw index.
    pub fn raw(&self) -> usize {
        self.0
    }
}

/// An event delivered to node listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    /// Event type, e.g. `"click"`.
    pub kind: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
}

pub(crate) type NodeHandler = Rc<dyn Fn(&DomEvent)>;

/// Element payload: tag name plus the three kinds of state fragments touch.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub style: IndexMap<String, String>,
    /// Boolean DOM properties such as `disabled`.
    pub properties: IndexMap<String, bool>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(Element),
    Text(String),
}

pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) listeners: Vec<(u64, String, NodeHandler)>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub(crate) fn element(&self) -> Option<&Element> {
        match &self.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text(_) => None,
        }
    }

    pub(crate) fn element_mut(&mut self) -> Option<&mut Element> {
        match &mut self.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text(_) => None,
        }
    }
}

impl fmt::Debug for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeData")
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("listener_count", &self.listeners.len())
            .finish()
    }
}
