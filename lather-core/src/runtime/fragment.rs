//! Render fragments.
//!
//! A fragment owns the document nodes of one component and knows how to
//! build, attach, update and remove them. Fragments are created by
//! [`Component::fragment`](super::Component::fragment) and driven by the
//! runtime; components never call these methods on their own fragment.

use crate::dom::{Document, NodeId};

use super::dirty::DirtySet;

/// The rendered part of a component with state `C`.
pub trait Fragment<C> {
    /// Build the nodes, detached from any parent.
    fn create(&mut self);

    /// Adopt existing nodes instead of creating new ones.
    ///
    /// Implementations take the nodes they reuse out of `nodes`; whatever is
    /// left after the root fragment has claimed is detached. The default
    /// ignores existing markup and creates fresh nodes.
    fn claim(&mut self, nodes: &mut Vec<NodeId>) {
        let _ = nodes;
        self.create();
    }

    /// Insert the nodes into `target` before `anchor`.
    fn mount(&mut self, target: NodeId, anchor: Option<NodeId>);

    /// Bring the nodes in line with `state` for the slots in `dirty`.
    ///
    /// Writes through the component's [`Scope`](super::Scope) are deferred
    /// until this returns and land in a later patch of the same flush.
    fn patch(&mut self, state: &C, dirty: &DirtySet);

    fn intro(&mut self, _local: bool) {}

    fn outro(&mut self, _local: bool) {}

    /// Release listeners and child components. Nodes are removed from the
    /// document only when `detaching`.
    fn destroy(&mut self, detaching: bool);
}

/// Take the first element with `tag` out of `nodes`, or create one.
///
/// A claimed element keeps its identity and children; only attributes the
/// caller sets afterwards are updated.
pub fn claim_element(document: &Document, nodes: &mut Vec<NodeId>, tag: &str) -> NodeId {
    let position = nodes
        .iter()
        .position(|node| document.tag(*node).as_deref() == Some(tag));
    match position {
        Some(position) => nodes.remove(position),
        None => document.create_element(tag),
    }
}

/// Take the first text node out of `nodes` and set its data, or create one.
pub fn claim_text(document: &Document, nodes: &mut Vec<NodeId>, data: &str) -> NodeId {
    let position = nodes.iter().position(|node| document.data(*node).is_some());
    match position {
        Some(position) => {
            let node = nodes.remove(position);
            document.set_data(node, data);
            node
        }
        None => document.create_text(data),
    }
}

/// Claim the single-space text node used between sibling blocks.
pub fn claim_space(document: &Document, nodes: &mut Vec<NodeId>) -> NodeId {
    claim_text(document, nodes, " ")
}

/// Detach `node` when `detaching` is set.
pub fn detach_if(document: &Document, node: NodeId, detaching: bool) {
    if detaching {
        document.detach(node);
    }
}
