//! Countdown timer.
//!
//! The start button counts `total_seconds` down to zero, one step per
//! interval, with a [`ProgressBar`] tracking the elapsed share. When the
//! countdown reaches zero the interval is cleared, the button turns into a
//! "Reset" button and the component dispatches `timerend` with
//! `{"totalTime": total_seconds}`.
//!
//! The countdown length comes from, in order: the props, the
//! [`TIMER_CONFIG_KEY`] context entry set by an ancestor, the host config.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, info};

use super::progress_bar::{ProgressBar, ProgressBarProps};
use crate::config::TimerConfig;
use crate::dom::{Document, NodeId, NodeListener};
use crate::error::Result;
use crate::host::IntervalId;
use crate::runtime::{
    claim_element, claim_space, claim_text, create_event_dispatcher, detach_if, get_context,
    on_destroy, Changes, Component, ComponentRef, DirtySet, EventDispatcher, Fragment, Scope,
    Slot,
};

/// Context key under which an ancestor provides a [`TimerConfig`].
pub const TIMER_CONFIG_KEY: &str = "timer-config";

/// Event dispatched when the countdown reaches zero.
pub const TIMER_END: &str = "timerend";

const START: &str = "Start";
const RESET: &str = "Reset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSlot {
    SecondsLeft,
    IsDisabled,
    ButtonClass,
    ButtonLabel,
    ProgressPercentage,
}

impl Slot for TimerSlot {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimerProps {
    pub config: Option<TimerConfig>,
}

#[derive(Debug)]
pub struct Timer {
    total_seconds: u32,
    interval: Duration,
    seconds_left: u32,
    is_disabled: bool,
    button_class: &'static str,
    button_label: &'static str,
    progress_percentage: f64,
    ticker: Option<IntervalId>,
    dispatcher: EventDispatcher,
}

impl Timer {
    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    pub fn is_disabled(&self) -> bool {
        self.is_disabled
    }

    pub fn button_class(&self) -> &'static str {
        self.button_class
    }

    pub fn button_label(&self) -> &'static str {
        self.button_label
    }

    pub fn progress_percentage(&self) -> f64 {
        self.progress_percentage
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// The start button's click handler: start when labelled "Start",
    /// otherwise reset.
    pub fn press(scope: &Scope<Self>) {
        match scope.with(|timer| timer.button_label) {
            Some(START) => Self::start(scope),
            Some(_) => Self::reset(scope),
            None => {}
        }
    }

    /// Stop any running countdown and restore the full time.
    ///
    /// Safe to call at any point, any number of times.
    pub fn reset(scope: &Scope<Self>) {
        Self::stop_ticker(scope);
        let Some(total) = scope.with(|timer| timer.total_seconds) else {
            return;
        };
        scope.set(TimerSlot::SecondsLeft, |t| &mut t.seconds_left, total);
        scope.set(TimerSlot::ButtonLabel, |t| &mut t.button_label, START);
        Self::control_button(scope, false);
        debug!(total, "timer reset");
    }

    fn start(scope: &Scope<Self>) {
        let Some((period, total)) = scope.with(|timer| (timer.interval, timer.total_seconds)) else {
            return;
        };
        Self::control_button(scope, true);

        let tick_scope = scope.clone();
        let id = scope
            .timers()
            .set_interval(period, move || Self::tick(&tick_scope));
        let previous = scope.with_mut(|timer| timer.ticker.replace(id)).flatten();
        if let Some(previous) = previous {
            scope.timers().clear_interval(previous);
        }
        info!(total, ?period, "countdown started");
    }

    fn tick(scope: &Scope<Self>) {
        let Some(left) = scope.with(|timer| timer.seconds_left.saturating_sub(1)) else {
            return;
        };
        scope.set(TimerSlot::SecondsLeft, |t| &mut t.seconds_left, left);
        if left > 0 {
            return;
        }

        Self::stop_ticker(scope);
        Self::control_button(scope, false);
        if let Some((dispatcher, total)) =
            scope.with(|timer| (timer.dispatcher.clone(), timer.total_seconds))
        {
            info!(total, "countdown finished");
            dispatcher.dispatch(TIMER_END, json!({ "totalTime": total }));
        }
    }

    fn control_button(scope: &Scope<Self>, disabled: bool) {
        scope.set(TimerSlot::IsDisabled, |t| &mut t.is_disabled, disabled);
        let class = if disabled { "start disabled" } else { "start" };
        scope.set(TimerSlot::ButtonClass, |t| &mut t.button_class, class);
        let label = match scope.with(|timer| timer.seconds_left) {
            Some(0) => RESET,
            _ => START,
        };
        scope.set(TimerSlot::ButtonLabel, |t| &mut t.button_label, label);
    }

    /// Clear the running interval, if any. The interval is cleared at most
    /// once because the id is taken out of the state.
    fn stop_ticker(scope: &Scope<Self>) {
        if let Some(id) = scope.with_mut(|timer| timer.ticker.take()).flatten() {
            scope.timers().clear_interval(id);
        }
    }
}

impl Component for Timer {
    type Props = TimerProps;
    type Slot = TimerSlot;

    fn create(props: TimerProps, scope: &Scope<Self>) -> Result<Self> {
        let config = match props.config {
            Some(config) => config,
            None => match get_context::<TimerConfig>(TIMER_CONFIG_KEY)? {
                Some(config) => (*config).clone(),
                None => scope.host().config().timer.clone(),
            },
        };
        let dispatcher = create_event_dispatcher()?;

        let destroy_scope = scope.clone();
        on_destroy(move || Self::stop_ticker(&destroy_scope))?;

        // Zero would make the progress ratio undefined
        let total_seconds = config.total_seconds.max(1);
        Ok(Self {
            total_seconds,
            interval: config.interval(),
            seconds_left: total_seconds,
            is_disabled: false,
            button_class: "start",
            button_label: START,
            progress_percentage: 0.0,
            ticker: None,
            dispatcher,
        })
    }

    fn update(&mut self, dirty: &DirtySet, changes: &mut Changes<TimerSlot>) {
        if dirty.has(TimerSlot::SecondsLeft) {
            let ratio = f64::from(self.seconds_left) / f64::from(self.total_seconds);
            changes.set(
                TimerSlot::ProgressPercentage,
                &mut self.progress_percentage,
                100.0 - 100.0 * ratio,
            );
        }
    }

    fn fragment(&self, scope: &Scope<Self>) -> Result<Box<dyn Fragment<Self>>> {
        let progress_bar = scope.child::<ProgressBar>(ProgressBarProps {
            progress_percentage: Some(self.progress_percentage),
        })?;
        Ok(Box::new(TimerFragment {
            scope: scope.clone(),
            document: scope.document().clone(),
            initial: Snapshot {
                seconds_left: self.seconds_left.to_string(),
                label: self.button_label,
                class: self.button_class,
                disabled: self.is_disabled,
            },
            nodes: None,
            progress_bar,
            click: None,
            current: false,
        }))
    }
}

/// Values rendered by `create`/`claim`.
struct Snapshot {
    seconds_left: String,
    label: &'static str,
    class: &'static str,
    disabled: bool,
}

struct TimerNodes {
    grid: NodeId,
    left_cell: NodeId,
    left_space: NodeId,
    heading: NodeId,
    heading_prefix: NodeId,
    seconds: NodeId,
    heading_suffix: NodeId,
    right_space: NodeId,
    right_cell: NodeId,
    bar_space_before: NodeId,
    bar_space_after: NodeId,
    button_row: NodeId,
    button: NodeId,
    label: NodeId,
}

struct TimerFragment {
    scope: Scope<Timer>,
    document: Document,
    initial: Snapshot,
    nodes: Option<TimerNodes>,
    progress_bar: ComponentRef<ProgressBar>,
    click: Option<NodeListener>,
    current: bool,
}

impl TimerFragment {
    fn decorate(&self, nodes: &TimerNodes) {
        let doc = &self.document;
        doc.set_attribute(nodes.left_cell, "bp", Some("4@md"));
        doc.set_attribute(nodes.heading, "bp", Some("4@md 12@sm"));
        doc.set_attribute(nodes.right_cell, "bp", Some("4@md"));
        doc.set_attribute(nodes.grid, "bp", Some("grid"));
        doc.set_attribute(nodes.button, "bp", Some("offset-5@md 4@md 12@sm"));
        doc.set_attribute(nodes.button, "class", Some(self.initial.class));
        doc.set_property(nodes.button, "disabled", self.initial.disabled);
        doc.set_attribute(nodes.button_row, "bp", Some("grid"));
    }
}

impl Fragment<Timer> for TimerFragment {
    fn create(&mut self) {
        let doc = &self.document;
        let grid = doc.create_element("div");
        let left_cell = doc.create_element("div");
        let left_space = doc.space();
        let heading = doc.create_element("h2");
        let heading_prefix = doc.create_text("Time Left : ");
        let seconds = doc.create_text(self.initial.seconds_left.as_str());
        let heading_suffix = doc.create_text(" sec");
        let right_space = doc.space();
        let right_cell = doc.create_element("div");
        let bar_space_before = doc.space();
        self.progress_bar.create_fragment();
        let bar_space_after = doc.space();
        let button_row = doc.create_element("div");
        let button = doc.create_element("button");
        let label = doc.create_text(self.initial.label);

        let nodes = TimerNodes {
            grid,
            left_cell,
            left_space,
            heading,
            heading_prefix,
            seconds,
            heading_suffix,
            right_space,
            right_cell,
            bar_space_before,
            bar_space_after,
            button_row,
            button,
            label,
        };
        self.decorate(&nodes);
        self.nodes = Some(nodes);
    }

    fn claim(&mut self, nodes: &mut Vec<NodeId>) {
        let doc = self.document.clone();
        let grid = claim_element(&doc, nodes, "div");
        let mut grid_children = doc.children(grid);
        let left_cell = claim_element(&doc, &mut grid_children, "div");
        let left_space = claim_space(&doc, &mut grid_children);
        let heading = claim_element(&doc, &mut grid_children, "h2");
        let mut heading_children = doc.children(heading);
        let heading_prefix = claim_text(&doc, &mut heading_children, "Time Left : ");
        let seconds = claim_text(&doc, &mut heading_children, &self.initial.seconds_left);
        let heading_suffix = claim_text(&doc, &mut heading_children, " sec");
        let right_space = claim_space(&doc, &mut grid_children);
        let right_cell = claim_element(&doc, &mut grid_children, "div");
        let bar_space_before = claim_space(&doc, nodes);
        self.progress_bar.claim(nodes);
        let bar_space_after = claim_space(&doc, nodes);
        let button_row = claim_element(&doc, nodes, "div");
        let mut row_children = doc.children(button_row);
        let button = claim_element(&doc, &mut row_children, "button");
        let mut button_children = doc.children(button);
        let label = claim_text(&doc, &mut button_children, self.initial.label);

        let claimed = TimerNodes {
            grid,
            left_cell,
            left_space,
            heading,
            heading_prefix,
            seconds,
            heading_suffix,
            right_space,
            right_cell,
            bar_space_before,
            bar_space_after,
            button_row,
            button,
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
        doc.append(nodes.grid, nodes.left_cell);
        doc.append(nodes.grid, nodes.left_space);
        doc.append(nodes.grid, nodes.heading);
        doc.append(nodes.heading, nodes.heading_prefix);
        doc.append(nodes.heading, nodes.seconds);
        doc.append(nodes.heading, nodes.heading_suffix);
        doc.append(nodes.grid, nodes.right_space);
        doc.append(nodes.grid, nodes.right_cell);
        doc.insert(target, nodes.bar_space_before, anchor);
        self.progress_bar.mount(target, anchor);
        doc.insert(target, nodes.bar_space_after, anchor);
        doc.insert(target, nodes.button_row, anchor);
        doc.append(nodes.button_row, nodes.button);
        doc.append(nodes.button, nodes.label);
        self.current = true;

        if self.click.is_none() {
            let scope = self.scope.clone();
            self.click = Some(doc.listen(nodes.button, "click", move |_| Timer::press(&scope)));
        }
    }

    fn patch(&mut self, state: &Timer, dirty: &DirtySet) {
        let Some(nodes) = &self.nodes else {
            return;
        };
        let doc = &self.document;
        let all = !self.current;

        if all || dirty.has(TimerSlot::SecondsLeft) {
            doc.set_data(nodes.seconds, &state.seconds_left.to_string());
        }
        let progress = dirty
            .has(TimerSlot::ProgressPercentage)
            .then_some(state.progress_percentage);
        self.progress_bar.set(ProgressBarProps {
            progress_percentage: progress,
        });
        if all || dirty.has(TimerSlot::ButtonLabel) {
            doc.set_data(nodes.label, state.button_label);
        }
        if all || dirty.has(TimerSlot::ButtonClass) {
            doc.set_attribute(nodes.button, "class", Some(state.button_class));
        }
        if all || dirty.has(TimerSlot::IsDisabled) {
            doc.set_property(nodes.button, "disabled", state.is_disabled);
        }
    }

    fn intro(&mut self, local: bool) {
        if self.current {
            return;
        }
        self.progress_bar.transition_in(local);
        self.current = true;
    }

    fn outro(&mut self, local: bool) {
        self.progress_bar.transition_out(local, false, None);
        self.current = false;
    }

    fn destroy(&mut self, detaching: bool) {
        if let Some(nodes) = self.nodes.take() {
            let doc = &self.document;
            detach_if(doc, nodes.grid, detaching);
            detach_if(doc, nodes.bar_space_before, detaching);
            self.progress_bar.destroy_with(detaching);
            detach_if(doc, nodes.bar_space_after, detaching);
            detach_if(doc, nodes.button_row, detaching);
        }
        if let Some(click) = self.click.take() {
            click.dispose();
        }
    }
}
