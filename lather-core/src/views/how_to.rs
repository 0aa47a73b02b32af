//! Static instructions panel.

use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::runtime::{
    claim_element, detach_if, Component, DirtySet, Fragment, NoSlots, Scope,
};

pub const HOW_TO_IMAGE: &str = "images/how_to_handwash.gif";

#[derive(Debug)]
pub struct HowTo;

impl Component for HowTo {
    type Props = ();
    type Slot = NoSlots;

    fn create(_props: (), _scope: &Scope<Self>) -> Result<Self> {
        Ok(HowTo)
    }

    fn fragment(&self, scope: &Scope<Self>) -> Result<Box<dyn Fragment<Self>>> {
        Ok(Box::new(HowToFragment {
            document: scope.document().clone(),
            grid: None,
        }))
    }
}

struct HowToFragment {
    document: Document,
    grid: Option<NodeId>,
}

impl HowToFragment {
    fn fill(&self, grid: NodeId) {
        let doc = &self.document;
        doc.set_attribute(grid, "bp", Some("grid"));
        if !doc.children(grid).is_empty() {
            return;
        }
        let left = doc.create_element("div");
        doc.set_attribute(left, "bp", Some("4@md"));
        let image = doc.create_element("img");
        doc.set_attribute(image, "bp", Some("4@md 12@sm"));
        doc.set_attribute(image, "src", Some(HOW_TO_IMAGE));
        doc.set_attribute(image, "alt", Some("How to wash your hands"));
        let right = doc.create_element("div");
        doc.set_attribute(right, "bp", Some("4@md"));

        doc.append(grid, left);
        doc.append(grid, doc.space());
        doc.append(grid, image);
        doc.append(grid, doc.space());
        doc.append(grid, right);
    }
}

impl Fragment<HowTo> for HowToFragment {
    fn create(&mut self) {
        let grid = self.document.create_element("div");
        self.fill(grid);
        self.grid = Some(grid);
    }

    fn claim(&mut self, nodes: &mut Vec<NodeId>) {
        let grid = claim_element(&self.document, nodes, "div");
        self.fill(grid);
        self.grid = Some(grid);
    }

    fn mount(&mut self, target: NodeId, anchor: Option<NodeId>) {
        if let Some(grid) = self.grid {
            self.document.insert(target, grid, anchor);
        }
    }

    fn patch(&mut self, _state: &HowTo, _dirty: &DirtySet) {}

    fn destroy(&mut self, detaching: bool) {
        if let Some(grid) = self.grid.take() {
            detach_if(&self.document, grid, detaching);
        }
    }
}
