//! Horizontal progress bar.

use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::runtime::{claim_element, detach_if, Component, DirtySet, Fragment, Scope, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressBarSlot {
    ProgressPercentage,
}

impl Slot for ProgressBarSlot {
    const COUNT: usize = 1;

    fn index(self) -> usize {
        0
    }
}

/// Props accepted by [`ProgressBar`]. `None` leaves the value unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProgressBarProps {
    pub progress_percentage: Option<f64>,
}

#[derive(Debug)]
pub struct ProgressBar {
    progress_percentage: f64,
}

impl ProgressBar {
    pub fn progress_percentage(&self) -> f64 {
        self.progress_percentage
    }
}

impl Component for ProgressBar {
    type Props = ProgressBarProps;
    type Slot = ProgressBarSlot;

    fn create(props: ProgressBarProps, _scope: &Scope<Self>) -> Result<Self> {
        Ok(Self {
            progress_percentage: props.progress_percentage.unwrap_or(0.0),
        })
    }

    fn fragment(&self, scope: &Scope<Self>) -> Result<Box<dyn Fragment<Self>>> {
        Ok(Box::new(ProgressBarFragment {
            document: scope.document().clone(),
            width: width(self.progress_percentage),
            nodes: None,
        }))
    }

    fn set_props(scope: &Scope<Self>, props: ProgressBarProps) {
        if let Some(value) = props.progress_percentage {
            scope.set(
                ProgressBarSlot::ProgressPercentage,
                |bar| &mut bar.progress_percentage,
                value,
            );
        }
    }
}

fn width(percentage: f64) -> String {
    format!("{percentage}%")
}

struct Nodes {
    grid: NodeId,
    container: NodeId,
    bar: NodeId,
    label: NodeId,
}

struct ProgressBarFragment {
    document: Document,
    width: String,
    nodes: Option<Nodes>,
}

impl ProgressBarFragment {
    fn decorate(&self, nodes: &Nodes) {
        let doc = &self.document;
        doc.set_attribute(nodes.label, "class", Some("sr-only"));
        doc.set_attribute(nodes.bar, "class", Some("progress-bar"));
        doc.set_style(nodes.bar, "width", &self.width);
        doc.set_attribute(nodes.container, "bp", Some("offset-5@md 4@md 12@sm"));
        doc.set_attribute(nodes.container, "class", Some("progress-container"));
        doc.set_attribute(nodes.grid, "bp", Some("grid"));
    }
}

impl Fragment<ProgressBar> for ProgressBarFragment {
    fn create(&mut self) {
        let doc = &self.document;
        let nodes = Nodes {
            grid: doc.create_element("div"),
            container: doc.create_element("div"),
            bar: doc.create_element("div"),
            label: doc.create_element("span"),
        };
        self.decorate(&nodes);
        self.nodes = Some(nodes);
    }

    fn claim(&mut self, nodes: &mut Vec<NodeId>) {
        let doc = self.document.clone();
        let grid = claim_element(&doc, nodes, "div");
        let mut grid_children = doc.children(grid);
        let container = claim_element(&doc, &mut grid_children, "div");
        let mut container_children = doc.children(container);
        let bar = claim_element(&doc, &mut container_children, "div");
        let mut bar_children = doc.children(bar);
        let label = claim_element(&doc, &mut bar_children, "span");

        let claimed = Nodes {
            grid,
            container,
            bar,
            label,
        };
        self.decorate(&claimed);
        self.nodes = Some(claimed);
    }

    fn mount(&mut self, target: NodeId, anchor: Option<NodeId>) {
        let Some(nodes) = &self.nodes else {
            return;
        };
        let doc = &self.document;
        doc.insert(target, nodes.grid, anchor);
        doc.append(nodes.grid, nodes.container);
        doc.append(nodes.container, nodes.bar);
        doc.append(nodes.bar, nodes.label);
    }

    fn patch(&mut self, state: &ProgressBar, dirty: &DirtySet) {
        if !dirty.has(ProgressBarSlot::ProgressPercentage) {
            return;
        }
        self.width = width(state.progress_percentage);
        if let Some(nodes) = &self.nodes {
            self.document.set_style(nodes.bar, "width", &self.width);
        }
    }

    fn destroy(&mut self, detaching: bool) {
        if let Some(nodes) = self.nodes.take() {
            detach_if(&self.document, nodes.grid, detaching);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::host::Host;

    fn bar_width(host: &Host) -> Option<String> {
        let doc = host.document();
        let bar = doc
            .find_all(doc.body(), "div")
            .into_iter()
            .find(|node| doc.attribute(*node, "class").as_deref() == Some("progress-bar"))?;
        doc.style(bar, "width")
    }

    #[test]
    fn width_follows_the_percentage() {
        let host = Host::new(Config::default());
        let bar = host
            .mount::<ProgressBar>(ProgressBarProps {
                progress_percentage: Some(10.0),
            })
            .unwrap();
        assert_eq!(bar_width(&host).as_deref(), Some("10%"));

        bar.set(ProgressBarProps {
            progress_percentage: Some(62.5),
        });
        assert_eq!(bar_width(&host).as_deref(), Some("10%"));
        host.run_microtasks().unwrap();
        assert_eq!(bar_width(&host).as_deref(), Some("62.5%"));
        assert_eq!(bar.with(ProgressBar::progress_percentage), Some(62.5));
    }

    #[test]
    fn empty_props_leave_the_value_alone() {
        let host = Host::new(Config::default());
        let bar = host.mount::<ProgressBar>(ProgressBarProps::default()).unwrap();
        bar.set(ProgressBarProps::default());
        assert!(!host.scheduler().is_flush_pending());
        assert_eq!(bar_width(&host).as_deref(), Some("0%"));
    }
}
