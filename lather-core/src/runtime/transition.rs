//! Intro/outro bookkeeping.
//!
//! An outro is the exit phase of a fragment. While it runs the fragment is
//! in the outro set, and a second `transition_out` for it is ignored.
//! Completions are collected in the current outro group and run when the
//! group is closed with [`Scheduler::check_outros`] and no animated outro of
//! the group is still pending.
//!
//! A fragment that animates its exit calls [`Scheduler::outro_started`] from
//! its `outro` hook and finishes the returned [`OutroHandle`] when the
//! animation ends.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use tracing::trace;

use super::lifecycle::ComponentId;
use super::scheduler::{Callback, Scheduler};

#[derive(Default)]
struct OutroGroup {
    pending: Cell<usize>,
    callbacks: RefCell<Vec<Callback>>,
}

impl OutroGroup {
    fn complete(&self) {
        let callbacks = std::mem::take(&mut *self.callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }
}

/// Keeps an outro group open until the animation it tracks finishes.
#[must_use = "an unfinished outro handle keeps its group open forever"]
pub struct OutroHandle {
    group: Rc<OutroGroup>,
}

impl OutroHandle {
    /// Signal that the animated outro ended.
    pub fn finish(self) {
        let remaining = self.group.pending.get().saturating_sub(1);
        self.group.pending.set(remaining);
        if remaining == 0 {
            self.group.complete();
        }
    }
}

#[derive(Default)]
pub(crate) struct Transitions {
    outroing: RefCell<HashSet<ComponentId>>,
    groups: RefCell<Vec<Rc<OutroGroup>>>,
}

impl Transitions {
    pub(crate) fn clear(&self) {
        self.outroing.borrow_mut().clear();
        self.groups.borrow_mut().clear();
    }
}

impl Scheduler {
    /// Open an outro group. Groups nest.
    pub fn group_outros(&self) {
        self.transitions
            .groups
            .borrow_mut()
            .push(Rc::new(OutroGroup::default()));
    }

    /// Close the innermost outro group, running its completions now if none
    /// of its outros is still animating.
    pub fn check_outros(&self) {
        let group = self.transitions.groups.borrow_mut().pop();
        if let Some(group) = group {
            if group.pending.get() == 0 {
                group.complete();
            }
        }
    }

    pub fn has_outro_group(&self) -> bool {
        !self.transitions.groups.borrow().is_empty()
    }

    /// Hold the current outro group open until the handle is finished.
    ///
    /// Returns `None` when no group is open.
    pub fn outro_started(&self) -> Option<OutroHandle> {
        let group = self.transitions.groups.borrow().last().cloned()?;
        group.pending.set(group.pending.get() + 1);
        Some(OutroHandle { group })
    }

    /// Counterpart of [`outro_started`](Self::outro_started).
    pub fn outro_finished(&self, handle: OutroHandle) {
        handle.finish();
    }

    /// Whether the fragment of `component` is currently outroing.
    pub fn is_outroing(&self, component: ComponentId) -> bool {
        self.transitions.outroing.borrow().contains(&component)
    }

    /// Remove `component` from the outro set. Returns `true` if it was there,
    /// so an outro completion can tell whether an intro cancelled it.
    pub(crate) fn end_outro(&self, component: ComponentId) -> bool {
        let removed = self.transitions.outroing.borrow_mut().remove(&component);
        if removed {
            trace!(?component, "outro ended");
        }
        removed
    }

    /// Start tracking an outro for `component` with `completion` queued in
    /// the current group. Returns `false` if the component is already
    /// outroing, in which case `completion` is dropped. With no group open
    /// the completion runs immediately.
    pub(crate) fn begin_outro(&self, component: ComponentId, completion: Callback) -> bool {
        if !self.transitions.outroing.borrow_mut().insert(component) {
            return false;
        }
        let group = self.transitions.groups.borrow().last().cloned();
        match group {
            Some(group) => group.callbacks.borrow_mut().push(completion),
            None => completion(),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl Fn() -> Callback) {
        let count = Rc::new(Cell::new(0));
        let make = {
            let count = count.clone();
            move || -> Callback {
                let count = count.clone();
                Box::new(move || count.set(count.get() + 1))
            }
        };
        (count, make)
    }

    #[test]
    fn completions_wait_for_the_group_to_close() {
        let scheduler = Scheduler::default();
        let (count, completion) = counter();
        let id = ComponentId::new();

        scheduler.group_outros();
        assert!(scheduler.begin_outro(id, completion()));
        assert!(scheduler.is_outroing(id));
        assert_eq!(count.get(), 0);

        scheduler.check_outros();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn second_outro_for_the_same_component_is_ignored() {
        let scheduler = Scheduler::default();
        let (count, completion) = counter();
        let id = ComponentId::new();

        scheduler.group_outros();
        assert!(scheduler.begin_outro(id, completion()));
        assert!(!scheduler.begin_outro(id, completion()));
        scheduler.check_outros();

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn animated_outro_holds_the_group_open() {
        let scheduler = Scheduler::default();
        let (count, completion) = counter();

        scheduler.group_outros();
        let handle = scheduler.outro_started().expect("group is open");
        scheduler.begin_outro(ComponentId::new(), completion());
        scheduler.check_outros();
        assert_eq!(count.get(), 0);

        scheduler.outro_finished(handle);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn outro_started_needs_a_group() {
        let scheduler = Scheduler::default();
        assert!(scheduler.outro_started().is_none());
        assert!(!scheduler.has_outro_group());
    }

    #[test]
    fn end_outro_reports_membership() {
        let scheduler = Scheduler::default();
        let id = ComponentId::new();

        scheduler.group_outros();
        scheduler.begin_outro(id, Box::new(|| {}));
        assert!(scheduler.end_outro(id));
        assert!(!scheduler.end_outro(id));
        scheduler.check_outros();
    }
}
