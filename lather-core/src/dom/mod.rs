//! In-Memory Document
//!
//! Fragments render into this tree instead of a browser DOM. It supports
//! exactly the operations generated fragments need: creating elements and
//! text, inserting before an anchor, detaching, attributes, inline style,
//! boolean properties, text data and node event listeners.
//!
//! The document is shared by handle (`Rc`) and is not thread-safe, matching
//! the single-threaded runtime that drives it.

mod document;
mod node;

pub use document::{Document, NodeListener};
pub use node::{DomEvent, Element, NodeId, NodeKind};
