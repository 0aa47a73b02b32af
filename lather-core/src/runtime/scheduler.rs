//! Update Scheduler
//!
//! The scheduler batches state changes into renders. A slot write marks its
//! component dirty and requests a flush; the flush itself runs on the host's
//! next microtask turn, never inside the call that made the change. Any
//! number of writes in one synchronous turn therefore produce one patch per
//! component.
//!
//! # Algorithm
//!
//! A flush repeats the following until no component is dirty:
//!
//! 1. Walk the dirty queue by index (components dirtied during the walk are
//!    picked up in the same walk). For each component: run its update hook,
//!    its `before_update` callbacks, patch its fragment with the accumulated
//!    dirty bits, reset the bits, and queue its `after_update` callbacks as
//!    render callbacks.
//! 2. Clear the dirty queue.
//! 3. Pop binding callbacks until the queue is empty (last in, first out).
//! 4. Run render callbacks in queue order. A callback with a given id runs
//!    at most once per flush, no matter how many passes the flush takes.
//!
//! Afterwards the flush callbacks are popped until empty.
//!
//! Only one flush is ever active: calling [`Scheduler::flush`] from inside a
//! flush returns immediately.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, trace};

use super::lifecycle::ComponentId;
use super::transition::Transitions;
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};

/// A one-shot callback.
pub type Callback = Box<dyn FnOnce()>;

/// Identity of a render callback, used to run it at most once per flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CallbackId {
    fn default() -> Self {
        Self::new()
    }
}

/// A callback run after components are patched.
///
/// Clones share the same id, so queueing a clone twice in one flush still
/// runs the callback once.
#[derive(Clone)]
pub struct RenderCallback {
    id: CallbackId,
    run: Rc<dyn Fn()>,
}

impl RenderCallback {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            id: CallbackId::new(),
            run: Rc::new(run),
        }
    }

    /// A render callback that does nothing after its first run.
    pub fn once<F>(run: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        let slot = RefCell::new(Some(run));
        Self::new(move || {
            let run = slot.borrow_mut().take();
            if let Some(run) = run {
                run();
            }
        })
    }

    pub fn id(&self) -> CallbackId {
        self.id
    }
}

impl fmt::Debug for RenderCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCallback").field("id", &self.id).finish()
    }
}

/// A component as the scheduler sees it.
pub(crate) trait Schedulable {
    fn component_id(&self) -> ComponentId;

    /// Set the dirty bit for `slot`. Returns `true` if the component was
    /// clean before.
    fn mark_slot(&self, slot: usize) -> bool;

    /// Update hook, `before_update`, patch, queue `after_update`.
    fn run_update(&self, scheduler: &Scheduler);
}

/// The per-runtime render scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    dirty_components: RefCell<Vec<Rc<dyn Schedulable>>>,
    binding_callbacks: RefCell<Vec<Callback>>,
    render_callbacks: RefCell<Vec<RenderCallback>>,
    flush_callbacks: RefCell<Vec<Callback>>,
    seen_callbacks: RefCell<HashSet<CallbackId>>,
    update_scheduled: Cell<bool>,
    flushing: Cell<bool>,
    flush_count: Cell<u64>,
    pub(crate) transitions: Transitions,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            dirty_components: RefCell::new(Vec::new()),
            binding_callbacks: RefCell::new(Vec::new()),
            render_callbacks: RefCell::new(Vec::new()),
            flush_callbacks: RefCell::new(Vec::new()),
            seen_callbacks: RefCell::new(HashSet::new()),
            update_scheduled: Cell::new(false),
            flushing: Cell::new(false),
            flush_count: Cell::new(0),
            transitions: Transitions::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Record that `slot` of `component` changed.
    ///
    /// The first mark after a patch queues the component and requests a
    /// flush; later marks only add bits.
    pub(crate) fn mark_dirty(&self, component: Rc<dyn Schedulable>, slot: usize) {
        if component.mark_slot(slot) {
            trace!(component = ?component.component_id(), slot, "component dirtied");
            self.dirty_components.borrow_mut().push(component);
            self.request_flush();
        }
    }

    /// Ask for a flush on the next microtask turn. Idempotent.
    pub fn request_flush(&self) {
        if !self.update_scheduled.replace(true) {
            trace!("flush scheduled");
        }
    }

    /// Whether a flush has been requested and not yet run.
    pub fn is_flush_pending(&self) -> bool {
        self.update_scheduled.get()
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.get()
    }

    /// Number of components waiting for the next flush.
    pub fn dirty_count(&self) -> usize {
        self.dirty_components.borrow().len()
    }

    /// Number of flushes that have run (re-entrant calls excluded).
    pub fn flush_count(&self) -> u64 {
        self.flush_count.get()
    }

    pub fn add_render_callback(&self, callback: RenderCallback) {
        self.render_callbacks.borrow_mut().push(callback);
    }

    /// Queue a binding callback. Binding callbacks drain last in, first out.
    pub fn add_binding_callback<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.binding_callbacks.borrow_mut().push(Box::new(callback));
    }

    /// Queue a binding callback at the bottom of the stack, so it runs after
    /// every binding callback already queued.
    pub fn add_binding_callback_front<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.binding_callbacks
            .borrow_mut()
            .insert(0, Box::new(callback));
    }

    /// Queue a callback to run once the current (or next) flush settles.
    pub fn add_flush_callback<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.flush_callbacks.borrow_mut().push(Box::new(callback));
    }

    /// Process every dirty component and drain the callback queues.
    ///
    /// Returns immediately when a flush is already running. Fails with
    /// [`Error::FlushLimitExceeded`] when components are still dirty after
    /// `max_flush_passes` passes; the remaining work stays queued.
    pub fn flush(&self) -> Result<()> {
        if self.flushing.get() {
            trace!("flush already running");
            return Ok(());
        }

        let outcome = {
            let _guard = FlushGuard::enter(self);
            self.run_passes()
        };

        // Flush callbacks may dirty components after the last pass.
        if outcome.is_ok() && self.dirty_count() > 0 {
            self.request_flush();
        }
        outcome
    }

    fn run_passes(&self) -> Result<()> {
        self.flush_count.set(self.flush_count.get() + 1);
        let mut passes = 0;
        let mut updated = 0;

        loop {
            if passes == self.config.max_flush_passes {
                error!(passes, dirty = self.dirty_count(), "flush did not settle");
                return Err(Error::FlushLimitExceeded { passes });
            }
            passes += 1;

            let mut index = 0;
            loop {
                let component = {
                    let queue = self.dirty_components.borrow();
                    match queue.get(index) {
                        Some(component) => Rc::clone(component),
                        None => break,
                    }
                };
                component.run_update(self);
                updated += 1;
                index += 1;
            }
            self.dirty_components.borrow_mut().clear();

            loop {
                let callback = self.binding_callbacks.borrow_mut().pop();
                match callback {
                    Some(callback) => callback(),
                    None => break,
                }
            }

            let mut index = 0;
            loop {
                let callback = {
                    let queue = self.render_callbacks.borrow();
                    match queue.get(index) {
                        Some(callback) => callback.clone(),
                        None => break,
                    }
                };
                let first_run = self.seen_callbacks.borrow_mut().insert(callback.id);
                if first_run {
                    (callback.run)();
                }
                index += 1;
            }
            self.render_callbacks.borrow_mut().clear();

            if self.dirty_count() == 0 {
                break;
            }
        }

        loop {
            let callback = self.flush_callbacks.borrow_mut().pop();
            match callback {
                Some(callback) => callback(),
                None => break,
            }
        }

        debug!(passes, updated, "flush complete");
        Ok(())
    }

    /// Drop every queued component and callback and clear all flags.
    pub fn reset(&self) {
        self.dirty_components.borrow_mut().clear();
        self.binding_callbacks.borrow_mut().clear();
        self.render_callbacks.borrow_mut().clear();
        self.flush_callbacks.borrow_mut().clear();
        self.seen_callbacks.borrow_mut().clear();
        self.update_scheduled.set(false);
        self.flushing.set(false);
        self.transitions.clear();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("dirty", &self.dirty_count())
            .field("flush_pending", &self.is_flush_pending())
            .field("flushing", &self.is_flushing())
            .field("flush_count", &self.flush_count())
            .finish()
    }
}

/// Holds the active-flush flag for the duration of one flush.
///
/// Restores the flags even if a hook panics mid-flush.
struct FlushGuard<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> FlushGuard<'a> {
    fn enter(scheduler: &'a Scheduler) -> Self {
        scheduler.flushing.set(true);
        Self { scheduler }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.update_scheduled.set(false);
        self.scheduler.flushing.set(false);
        self.scheduler.seen_callbacks.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::DirtySet;

    /// A component stand-in that records its patches.
    struct Probe {
        id: ComponentId,
        dirty: RefCell<DirtySet>,
        patches: RefCell<Vec<DirtySet>>,
        on_update: RefCell<Option<Box<dyn Fn(&Scheduler)>>>,
    }

    impl Probe {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: ComponentId::new(),
                dirty: RefCell::new(DirtySet::Clean),
                patches: RefCell::new(Vec::new()),
                on_update: RefCell::new(None),
            })
        }
    }

    impl Schedulable for Probe {
        fn component_id(&self) -> ComponentId {
            self.id
        }

        fn mark_slot(&self, slot: usize) -> bool {
            self.dirty.borrow_mut().insert(slot)
        }

        fn run_update(&self, scheduler: &Scheduler) {
            let dirty = self.dirty.borrow_mut().take();
            self.patches.borrow_mut().push(dirty);
            if let Some(hook) = self.on_update.borrow().as_ref() {
                hook(scheduler);
            }
        }
    }

    #[test]
    fn marks_coalesce_into_one_patch() {
        let scheduler = Scheduler::default();
        let probe = Probe::new();

        scheduler.mark_dirty(probe.clone(), 0);
        scheduler.mark_dirty(probe.clone(), 2);
        scheduler.mark_dirty(probe.clone(), 0);

        assert_eq!(scheduler.dirty_count(), 1);
        assert!(scheduler.is_flush_pending());
        // Nothing ran yet: the flush is deferred
        assert!(probe.patches.borrow().is_empty());

        scheduler.flush().unwrap();

        let patches = probe.patches.borrow();
        assert_eq!(patches.len(), 1);
        assert!(patches[0].contains(0));
        assert!(patches[0].contains(2));
        assert!(!patches[0].contains(1));
        assert!(!scheduler.is_flush_pending());
        assert_eq!(scheduler.flush_count(), 1);
    }

    #[test]
    fn request_flush_is_idempotent() {
        let scheduler = Scheduler::default();
        scheduler.request_flush();
        scheduler.request_flush();
        assert!(scheduler.is_flush_pending());

        scheduler.flush().unwrap();
        assert!(!scheduler.is_flush_pending());
    }

    #[test]
    fn binding_callbacks_drain_lifo_before_render_callbacks() {
        let scheduler = Rc::new(Scheduler::default());
        let log = Rc::new(RefCell::new(Vec::new()));

        let probe = Probe::new();
        let hook_log = log.clone();
        *probe.on_update.borrow_mut() = Some(Box::new(move |scheduler: &Scheduler| {
            for name in ["bind-1", "bind-2"] {
                let log = hook_log.clone();
                scheduler.add_binding_callback(move || log.borrow_mut().push(name));
            }
            let log = hook_log.clone();
            scheduler.add_render_callback(RenderCallback::new(move || {
                log.borrow_mut().push("render")
            }));
        }));

        scheduler.mark_dirty(probe, 0);
        scheduler.flush().unwrap();

        assert_eq!(*log.borrow(), vec!["bind-2", "bind-1", "render"]);
    }

    #[test]
    fn binding_front_runs_last() {
        let scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        scheduler.add_binding_callback(move || l.borrow_mut().push("pushed"));
        let l = log.clone();
        scheduler.add_binding_callback_front(move || l.borrow_mut().push("unshifted"));

        scheduler.flush().unwrap();
        assert_eq!(*log.borrow(), vec!["pushed", "unshifted"]);
    }

    #[test]
    fn render_callback_runs_once_per_flush_across_passes() {
        let scheduler = Rc::new(Scheduler::default());
        let probe = Probe::new();
        let runs = Rc::new(Cell::new(0));

        // The render callback re-dirties the probe, which forces a second
        // pass that re-queues the same callback.
        let callback = {
            let scheduler = Rc::downgrade(&scheduler);
            let probe = probe.clone();
            let runs = runs.clone();
            RenderCallback::new(move || {
                runs.set(runs.get() + 1);
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.mark_dirty(probe.clone(), 1);
                }
            })
        };
        let requeue = callback.clone();
        *probe.on_update.borrow_mut() = Some(Box::new(move |scheduler: &Scheduler| {
            scheduler.add_render_callback(requeue.clone());
        }));

        scheduler.mark_dirty(probe.clone(), 0);
        scheduler.flush().unwrap();

        assert_eq!(runs.get(), 1);
        assert_eq!(probe.patches.borrow().len(), 2);

        // A new flush is a new cycle
        scheduler.mark_dirty(probe.clone(), 0);
        scheduler.flush().unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nested_flush_is_a_no_op() {
        let scheduler = Rc::new(Scheduler::default());
        let probe = Probe::new();
        let nested = Rc::new(Cell::new(false));

        let weak = Rc::downgrade(&scheduler);
        let nested_clone = nested.clone();
        scheduler.add_render_callback(RenderCallback::new(move || {
            if let Some(scheduler) = weak.upgrade() {
                assert!(scheduler.is_flushing());
                scheduler.flush().unwrap();
                nested_clone.set(true);
            }
        }));
        scheduler.mark_dirty(probe.clone(), 0);
        scheduler.flush().unwrap();

        assert!(nested.get());
        assert_eq!(probe.patches.borrow().len(), 1);
        assert_eq!(scheduler.flush_count(), 1);
        assert!(!scheduler.is_flushing());
    }

    #[test]
    fn flush_callbacks_run_last_in_reverse_order() {
        let scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second"] {
            let log = log.clone();
            scheduler.add_flush_callback(move || log.borrow_mut().push(name));
        }
        let l = log.clone();
        scheduler.add_render_callback(RenderCallback::new(move || l.borrow_mut().push("render")));

        scheduler.flush().unwrap();
        assert_eq!(*log.borrow(), vec!["render", "second", "first"]);
    }

    #[test]
    fn runaway_dirtying_hits_the_pass_limit() {
        let scheduler = Rc::new(Scheduler::new(SchedulerConfig {
            max_flush_passes: 5,
        }));
        let probe = Probe::new();

        let weak_scheduler = Rc::downgrade(&scheduler);
        let weak_probe = Rc::downgrade(&probe);
        *probe.on_update.borrow_mut() = Some(Box::new(move |scheduler: &Scheduler| {
            let weak_scheduler = weak_scheduler.clone();
            let weak_probe = weak_probe.clone();
            // A fresh callback every pass, so the seen-set never skips it
            scheduler.add_render_callback(RenderCallback::new(move || {
                if let (Some(scheduler), Some(probe)) =
                    (weak_scheduler.upgrade(), weak_probe.upgrade())
                {
                    scheduler.mark_dirty(probe, 0);
                }
            }));
        }));

        scheduler.mark_dirty(probe.clone(), 0);
        let err = scheduler.flush().unwrap_err();
        assert!(matches!(err, Error::FlushLimitExceeded { passes: 5 }));
        assert_eq!(probe.patches.borrow().len(), 5);
        assert!(!scheduler.is_flushing());
    }

    #[test]
    fn reset_clears_everything() {
        let scheduler = Scheduler::default();
        let probe = Probe::new();
        scheduler.mark_dirty(probe, 0);
        scheduler.add_flush_callback(|| panic!("reset callbacks must not run"));

        scheduler.reset();
        assert_eq!(scheduler.dirty_count(), 0);
        assert!(!scheduler.is_flush_pending());
        scheduler.flush().unwrap();
    }
}
