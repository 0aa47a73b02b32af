//! Components and their instances.
//!
//! A component is a state struct implementing [`Component`]. The runtime
//! wraps it in an instance that owns the fragment, the dirty bits and the
//! lifecycle lists, and hands out two views of it:
//!
//! - [`Scope`], a weak handle the component's own closures (event handlers,
//!   interval callbacks, lifecycle hooks) use to read and write state.
//! - [`ComponentRef`], the strong handle held by whoever created the
//!   component: the host for a root, the parent fragment for a child.
//!
//! # Lifecycle
//!
//! [`init`] builds the state, runs the update hook once with every slot
//! dirty, builds the fragment and, when a target is given, creates, mounts
//! and flushes synchronously. From then on every [`Scope::set`] that changes
//! a value marks its slot dirty and the scheduler patches the fragment on
//! the next microtask turn. [`ComponentRef::destroy`] runs the destroy hooks,
//! tears the fragment down and leaves an inert instance behind.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::compare::{Equality, Tracked};
use super::current::{try_current, CurrentComponent};
use super::dirty::{Changes, DirtySet, Slot};
use super::events::{ComponentEvent, ListenerId};
use super::fragment::Fragment;
use super::lifecycle::{ComponentCore, ComponentId, Teardown};
use super::scheduler::{Callback, RenderCallback, Schedulable, Scheduler};
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::host::{Host, Timers};

/// A stateful piece of UI.
pub trait Component: Sized + 'static {
    /// Initial input, also accepted later through [`ComponentRef::set`].
    type Props: Default + 'static;

    /// Names of the tracked fields.
    type Slot: Slot;

    /// How [`Scope::set`] decides whether a write changed anything.
    const EQUALITY: Equality = Equality::Safe;

    /// Build the initial state. Lifecycle accessors such as
    /// [`on_destroy`](super::on_destroy) may be called from here.
    fn create(props: Self::Props, scope: &Scope<Self>) -> Result<Self>;

    /// Recompute derived fields after the slots in `dirty` changed.
    ///
    /// Runs before every patch, and once during init with every slot dirty.
    /// Writes go through `changes` so the patch sees them.
    fn update(&mut self, dirty: &DirtySet, changes: &mut Changes<Self::Slot>) {
        let _ = (dirty, changes);
    }

    /// Build the fragment that renders this state.
    fn fragment(&self, scope: &Scope<Self>) -> Result<Box<dyn Fragment<Self>>>;

    /// Apply new props to a live instance.
    fn set_props(scope: &Scope<Self>, props: Self::Props) {
        let _ = (scope, props);
    }
}

/// Where and how to initialise a component.
#[derive(Debug, Clone, Default)]
pub struct Options<P> {
    pub props: P,
    pub target: Option<NodeId>,
    pub anchor: Option<NodeId>,
    /// Claim the target's existing children instead of creating new nodes.
    pub hydrate: bool,
    /// Run the intro when mounting.
    pub intro: bool,
}

impl<P> Options<P> {
    pub fn new(props: P) -> Self {
        Self {
            props,
            target: None,
            anchor: None,
            hydrate: false,
            intro: false,
        }
    }

    pub fn target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn anchor(mut self, anchor: NodeId) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn hydrate(mut self, hydrate: bool) -> Self {
        self.hydrate = hydrate;
        self
    }

    pub fn intro(mut self, intro: bool) -> Self {
        self.intro = intro;
        self
    }
}

type BoundSetter<C> = Rc<dyn Fn(&C) -> Callback>;

/// A state write made during a patch, applied once the patch returns.
type DeferredWrite<C> = (usize, Box<dyn FnOnce(&mut C) -> bool>);

pub(crate) struct Instance<C: Component> {
    core: Rc<ComponentCore>,
    host: Host,
    state: RefCell<Option<C>>,
    dirty: RefCell<DirtySet>,
    fragment: RefCell<Option<Box<dyn Fragment<C>>>>,
    bound: RefCell<HashMap<usize, BoundSetter<C>>>,
    ready: Cell<bool>,
    /// Set while the fragment is checked out for a call.
    busy: Cell<bool>,
    /// Set while the fragment patches against a shared borrow of the state.
    patching: Cell<bool>,
    deferred: RefCell<Vec<DeferredWrite<C>>>,
    /// A destroy requested while `busy`, with its `detaching` flag.
    pending_destroy: Cell<Option<bool>>,
    this: Weak<Self>,
}

impl<C: Component> Instance<C> {
    fn with_state<R>(&self, f: impl FnOnce(&C) -> R) -> Option<R> {
        let state = self.state.borrow();
        state.as_ref().map(f)
    }

    /// Run `f` on the fragment with the fragment taken out of its cell.
    ///
    /// A destroy requested from inside `f` runs once the fragment is back.
    fn with_fragment(&self, f: impl FnOnce(&mut Box<dyn Fragment<C>>)) {
        let taken = self.fragment.borrow_mut().take();
        let Some(mut fragment) = taken else {
            return;
        };
        self.busy.set(true);
        f(&mut fragment);
        self.busy.set(false);
        *self.fragment.borrow_mut() = Some(fragment);

        if let Some(detaching) = self.pending_destroy.take() {
            self.destroy(detaching);
        }
    }

    fn set<T, F>(&self, slot: C::Slot, field: F, value: T) -> bool
    where
        T: Tracked + 'static,
        F: FnOnce(&mut C) -> &mut T + 'static,
    {
        let write = move |state: &mut C| {
            let current = field(state);
            let changed = current.changed(&value, C::EQUALITY);
            *current = value;
            changed
        };
        if self.patching.get() {
            let write: Box<dyn FnOnce(&mut C) -> bool> = Box::new(write);
            self.deferred.borrow_mut().push((slot.index(), write));
            return true;
        }

        let changed = {
            let mut state = self.state.borrow_mut();
            let Some(state) = state.as_mut() else {
                return false;
            };
            write(state)
        };
        if changed {
            self.invalidate(slot.index());
        }
        changed
    }

    fn apply_deferred(&self) {
        let writes = std::mem::take(&mut *self.deferred.borrow_mut());
        for (slot, write) in writes {
            let changed = {
                let mut state = self.state.borrow_mut();
                state.as_mut().map(write).unwrap_or(false)
            };
            if changed {
                self.invalidate(slot);
            }
        }
    }

    fn destroy(&self, detaching: bool) {
        if self.busy.get() {
            if self.pending_destroy.get().is_none() {
                self.pending_destroy.set(Some(detaching));
            }
            return;
        }
        let hooks = self.core.lifecycle.borrow_mut().on_destroy.take();
        let Some(hooks) = hooks else {
            return;
        };
        for hook in hooks {
            hook();
        }

        let fragment = self.fragment.borrow_mut().take();
        if let Some(mut fragment) = fragment {
            fragment.destroy(detaching);
        }

        let state = self.state.borrow_mut().take();
        drop(state);
        self.dirty.borrow_mut().take();
        self.deferred.borrow_mut().clear();
        self.bound.borrow_mut().clear();
        self.core.listeners.borrow_mut().clear();
        {
            let mut lifecycle = self.core.lifecycle.borrow_mut();
            lifecycle.before_update.clear();
            lifecycle.after_update.clear();
        }

        debug!(component = type_name::<C>(), id = ?self.core.id, detaching, "component destroyed");
    }

    fn invalidate(&self, slot: usize) {
        self.notify_bound(slot);
        if self.ready.get() {
            self.make_dirty(slot);
        }
    }

    fn make_dirty(&self, slot: usize) {
        if let Some(this) = self.this.upgrade() {
            self.host.scheduler().mark_dirty(this, slot);
        }
    }

    /// Queue the bound setter of `slot`, if any, with the current value.
    fn notify_bound(&self, slot: usize) {
        let bound = self.bound.borrow().get(&slot).cloned();
        let Some(bound) = bound else {
            return;
        };
        if let Some(callback) = self.with_state(|state| bound(state)) {
            let scheduler = self.host.scheduler();
            scheduler.add_binding_callback(callback);
            scheduler.request_flush();
        }
    }

    fn queue_after_update(&self, scheduler: &Scheduler) {
        let after = self.core.lifecycle.borrow().after_update.clone();
        for callback in after {
            scheduler.add_render_callback(callback);
        }
    }

    fn run_before_update(&self) {
        let before = self.core.lifecycle.borrow().before_update.clone();
        for hook in before {
            hook();
        }
    }
}

impl<C: Component> Schedulable for Instance<C> {
    fn component_id(&self) -> ComponentId {
        self.core.id
    }

    fn mark_slot(&self, slot: usize) -> bool {
        self.dirty.borrow_mut().insert(slot)
    }

    fn run_update(&self, scheduler: &Scheduler) {
        if self.fragment.borrow().is_none() {
            return;
        }
        let _current = CurrentComponent::enter(Rc::clone(&self.core));

        let pending = self.dirty.borrow().clone();
        let derived = {
            let mut state = self.state.borrow_mut();
            let Some(state) = state.as_mut() else {
                return;
            };
            let mut changes = Changes::new(C::EQUALITY);
            state.update(&pending, &mut changes);
            changes.into_slots()
        };
        {
            let mut dirty = self.dirty.borrow_mut();
            for slot in derived {
                dirty.insert(slot.index());
            }
        }

        self.run_before_update();

        let dirty = self.dirty.borrow_mut().take();
        self.with_fragment(|fragment| {
            let state = self.state.borrow();
            if let Some(state) = state.as_ref() {
                self.patching.set(true);
                fragment.patch(state, &dirty);
                self.patching.set(false);
            }
        });
        self.apply_deferred();

        self.queue_after_update(scheduler);
    }
}

/// Initialise a component.
///
/// The context of the component currently being initialised, if any, is
/// inherited. With a target the component is created (or hydrated), mounted
/// and flushed before this returns; without one the caller drives
/// [`ComponentRef::create_fragment`] and [`ComponentRef::mount`].
pub fn init<C: Component>(host: &Host, options: Options<C::Props>) -> Result<ComponentRef<C>> {
    let context = try_current()
        .map(|parent| parent.context_snapshot())
        .unwrap_or_default();
    let core = Rc::new(ComponentCore::new(context));
    let instance = Rc::new_cyclic(|this| Instance {
        core: Rc::clone(&core),
        host: host.clone(),
        state: RefCell::new(None),
        dirty: RefCell::new(DirtySet::Clean),
        fragment: RefCell::new(None),
        bound: RefCell::new(HashMap::new()),
        ready: Cell::new(false),
        busy: Cell::new(false),
        patching: Cell::new(false),
        deferred: RefCell::new(Vec::new()),
        pending_destroy: Cell::new(None),
        this: this.clone(),
    });
    let component = ComponentRef { instance };
    let scope = component.scope();

    {
        let _current = CurrentComponent::enter(Rc::clone(&core));

        let mut state = C::create(options.props, &scope)?;
        let mut changes = Changes::new(C::EQUALITY);
        state.update(&DirtySet::all(C::Slot::COUNT), &mut changes);
        *component.instance.state.borrow_mut() = Some(state);

        component.instance.ready.set(true);
        component.instance.run_before_update();

        let fragment = {
            let state = component.instance.state.borrow();
            state
                .as_ref()
                .map(|state| state.fragment(&scope))
                .transpose()?
        };
        *component.instance.fragment.borrow_mut() = fragment;

        if let Some(target) = options.target {
            if options.hydrate {
                let document = host.document();
                let mut nodes = document.children(target);
                component.claim(&mut nodes);
                for node in nodes {
                    document.detach(node);
                }
            } else {
                component.create_fragment();
            }
            if options.intro {
                component.transition_in(false);
            }
            component.mount(target, options.anchor);
        }
    }

    debug!(component = type_name::<C>(), id = ?core.id, "component initialised");

    if options.target.is_some() {
        host.scheduler().flush()?;
    }
    Ok(component)
}

/// Weak handle to a component's own instance.
///
/// Every method is a no-op (or returns `None`/`false`) once the instance has
/// been destroyed or dropped.
pub struct Scope<C: Component> {
    instance: Weak<Instance<C>>,
    host: Host,
}

impl<C: Component> Clone for Scope<C> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            host: self.host.clone(),
        }
    }
}

impl<C: Component> Scope<C> {
    /// Write `value` into the field selected by `field`.
    ///
    /// If the value changed, the bound setter of `slot` is queued and, once
    /// the component is ready, `slot` is marked dirty. Returns whether the
    /// value changed.
    ///
    /// A write made while the fragment is patching is applied as soon as the
    /// patch returns, and reports `true` since it has not been compared yet.
    pub fn set<T, F>(&self, slot: C::Slot, field: F, value: T) -> bool
    where
        T: Tracked + 'static,
        F: FnOnce(&mut C) -> &mut T + 'static,
    {
        match self.instance.upgrade() {
            Some(instance) => instance.set(slot, field, value),
            None => false,
        }
    }

    /// Mark `slot` changed after an in-place mutation through
    /// [`with_mut`](Self::with_mut).
    pub fn invalidate(&self, slot: C::Slot) {
        if let Some(instance) = self.instance.upgrade() {
            if instance.state.borrow().is_some() {
                instance.invalidate(slot.index());
            }
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&C) -> R) -> Option<R> {
        self.instance.upgrade()?.with_state(f)
    }

    /// Mutate state without tracking. Pair with [`invalidate`](Self::invalidate)
    /// for fields that are rendered.
    ///
    /// `None` once destroyed, and while the fragment is patching.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        let instance = self.instance.upgrade()?;
        let mut state = instance.state.try_borrow_mut().ok()?;
        state.as_mut().map(f)
    }

    /// Bind an element reference into a state field.
    ///
    /// The write happens in the binding phase of the flush. A new element is
    /// bound after every binding already queued has run; clearing the
    /// reference (`None`) is queued like any other binding.
    pub fn bind_this<F>(&self, slot: C::Slot, field: F, node: Option<NodeId>)
    where
        F: FnOnce(&mut C) -> &mut Option<NodeId> + 'static,
    {
        let scope = self.clone();
        let write = move || {
            scope.set(slot, field, node);
        };
        let scheduler = self.host.scheduler();
        match node {
            Some(_) => scheduler.add_binding_callback_front(write),
            None => scheduler.add_binding_callback(write),
        }
        scheduler.request_flush();
    }

    /// Initialise a child component without a target.
    ///
    /// Call from [`Component::fragment`]: the child inherits this component's
    /// context.
    pub fn child<D: Component>(&self, props: D::Props) -> Result<ComponentRef<D>> {
        init(&self.host, Options::new(props))
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn document(&self) -> &Document {
        self.host.document()
    }

    pub fn timers(&self) -> &Timers {
        self.host.timers()
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        self.host.scheduler()
    }

    pub fn is_alive(&self) -> bool {
        self.instance
            .upgrade()
            .is_some_and(|instance| !instance.core.is_destroyed())
    }
}

/// Owning handle to a component instance.
pub struct ComponentRef<C: Component> {
    instance: Rc<Instance<C>>,
}

impl<C: Component> Clone for ComponentRef<C> {
    fn clone(&self) -> Self {
        Self {
            instance: Rc::clone(&self.instance),
        }
    }
}

impl<C: Component> fmt::Debug for ComponentRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("component", &type_name::<C>())
            .field("id", &self.id())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl<C: Component> ComponentRef<C> {
    pub fn id(&self) -> ComponentId {
        self.instance.core.id
    }

    pub fn scope(&self) -> Scope<C> {
        Scope {
            instance: Rc::downgrade(&self.instance),
            host: self.instance.host.clone(),
        }
    }

    /// Read the current state. `None` after destroy.
    pub fn with<R>(&self, f: impl FnOnce(&C) -> R) -> Option<R> {
        self.instance.with_state(f)
    }

    /// Destroy the component and remove its nodes from the document.
    pub fn destroy(&self) {
        self.destroy_with(true);
    }

    /// Run the destroy hooks and tear the fragment down. Nodes are removed
    /// only when `detaching`. A second call does nothing.
    ///
    /// Called from inside one of the component's own fragment methods (a
    /// listener fired during `patch`, say), the destroy waits until that
    /// method returns.
    pub fn destroy_with(&self, detaching: bool) {
        self.instance.destroy(detaching);
    }

    pub fn is_destroyed(&self) -> bool {
        self.instance.core.is_destroyed()
    }

    /// Listen for events dispatched by the component.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&ComponentEvent) + 'static,
    {
        self.instance.core.add_listener(event, Rc::new(listener))
    }

    /// Remove a listener added with [`on`](Self::on).
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.instance.core.remove_listener(event, id)
    }

    /// Apply new props.
    pub fn set(&self, props: C::Props) {
        if !self.is_destroyed() {
            C::set_props(&self.scope(), props);
        }
    }

    /// Two-way bind `slot` of this component to `setter`.
    ///
    /// `read` extracts the bound value from the state. The setter runs in the
    /// binding phase of a flush: once with the current value, then after
    /// every [`Scope::set`] that changes the slot.
    pub fn bind<T, R, S>(&self, slot: C::Slot, read: R, setter: S)
    where
        T: 'static,
        R: Fn(&C) -> T + 'static,
        S: Fn(T) + 'static,
    {
        let setter = Rc::new(setter);
        let forward: BoundSetter<C> = Rc::new(move |state: &C| {
            let value = read(state);
            let setter = Rc::clone(&setter);
            let callback: Callback = Box::new(move || setter(value));
            callback
        });
        self.instance
            .bound
            .borrow_mut()
            .insert(slot.index(), Rc::clone(&forward));

        if let Some(callback) = self.instance.with_state(|state| forward(state)) {
            let scheduler = self.instance.host.scheduler();
            scheduler.add_binding_callback(callback);
            scheduler.request_flush();
        }
    }

    /// Build the fragment's nodes without attaching them.
    pub fn create_fragment(&self) {
        self.instance.with_fragment(|fragment| fragment.create());
    }

    /// Adopt existing nodes for the fragment.
    pub fn claim(&self, nodes: &mut Vec<NodeId>) {
        self.instance.with_fragment(|fragment| fragment.claim(nodes));
    }

    /// Attach the fragment to `target` and schedule the mount hooks.
    ///
    /// Mount hooks run as a render callback of the current (or next) flush,
    /// so a parent's hooks run after those of children mounted in the same
    /// pass. Teardowns they return join the destroy hooks; if the component
    /// was destroyed before the hooks ran, the teardowns run at once.
    pub fn mount(&self, target: NodeId, anchor: Option<NodeId>) {
        let instance = &self.instance;
        instance.with_fragment(|fragment| fragment.mount(target, anchor));

        let scheduler = instance.host.scheduler();
        let core = Rc::clone(&instance.core);
        scheduler.add_render_callback(RenderCallback::once(move || {
            let hooks = std::mem::take(&mut core.lifecycle.borrow_mut().on_mount);
            let teardowns: Vec<Teardown> = hooks.into_iter().filter_map(|hook| hook()).collect();
            let orphaned = {
                let mut lifecycle = core.lifecycle.borrow_mut();
                match lifecycle.on_destroy.as_mut() {
                    Some(on_destroy) => {
                        on_destroy.extend(teardowns);
                        Vec::new()
                    }
                    None => teardowns,
                }
            };
            for teardown in orphaned {
                teardown();
            }
        }));

        instance.queue_after_update(scheduler);
    }

    /// Run the intro, cancelling a pending outro.
    pub fn transition_in(&self, local: bool) {
        let instance = &self.instance;
        instance.host.scheduler().end_outro(instance.core.id);
        instance.with_fragment(|fragment| fragment.intro(local));
    }

    /// Run the outro.
    ///
    /// Ignored while an outro is already running. When the outro group
    /// completes, the component is destroyed if `detach` is set and then
    /// `on_complete` runs, unless a [`transition_in`](Self::transition_in)
    /// cancelled the outro in the meantime. Without an open group the outro
    /// forms a group of its own.
    pub fn transition_out(&self, local: bool, detach: bool, on_complete: Option<Callback>) {
        let instance = &self.instance;
        let scheduler = Rc::clone(instance.host.scheduler());
        let implicit = !scheduler.has_outro_group();
        if implicit {
            scheduler.group_outros();
        }

        let component = self.clone();
        let completion: Callback = Box::new(move || {
            let scheduler = Rc::clone(component.instance.host.scheduler());
            if !scheduler.end_outro(component.id()) {
                return;
            }
            if detach {
                component.destroy_with(true);
            }
            if let Some(on_complete) = on_complete {
                on_complete();
            }
        });

        if scheduler.begin_outro(instance.core.id, completion) {
            instance.with_fragment(|fragment| fragment.outro(local));
        }

        if implicit {
            scheduler.check_outros();
        }
    }

    pub fn is_outroing(&self) -> bool {
        self.instance
            .host
            .scheduler()
            .is_outroing(self.instance.core.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::runtime::{
        after_update, before_update, create_event_dispatcher, on_destroy, on_mount, EventDispatcher,
        NoSlots,
    };
    use crate::runtime::fragment::detach_if;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum CounterSlot {
        Count,
        Doubled,
        Element,
    }

    impl Slot for CounterSlot {
        const COUNT: usize = 3;

        fn index(self) -> usize {
            self as usize
        }
    }

    #[derive(Default)]
    struct CounterProps {
        start: u32,
    }

    struct Counter {
        count: u32,
        doubled: u32,
        element: Option<NodeId>,
        log: Rc<RefCell<Vec<String>>>,
    }

    thread_local! {
        static LOG: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    }

    fn log() -> Rc<RefCell<Vec<String>>> {
        LOG.with(Rc::clone)
    }

    impl Component for Counter {
        type Props = CounterProps;
        type Slot = CounterSlot;

        fn create(props: CounterProps, _scope: &Scope<Self>) -> Result<Self> {
            let log = log();
            let mount_log = log.clone();
            on_mount(move || {
                mount_log.borrow_mut().push("mount".into());
                let teardown_log = mount_log.clone();
                let teardown: Teardown =
                    Box::new(move || teardown_log.borrow_mut().push("teardown".into()));
                teardown
            })?;
            let destroy_log = log.clone();
            on_destroy(move || destroy_log.borrow_mut().push("destroy".into()))?;
            let after_log = log.clone();
            after_update(move || after_log.borrow_mut().push("after".into()))?;
            Ok(Self {
                count: props.start,
                doubled: 0,
                element: None,
                log,
            })
        }

        fn update(&mut self, dirty: &DirtySet, changes: &mut Changes<CounterSlot>) {
            if dirty.has(CounterSlot::Count) {
                let doubled = self.count * 2;
                changes.set(CounterSlot::Doubled, &mut self.doubled, doubled);
            }
        }

        fn fragment(&self, scope: &Scope<Self>) -> Result<Box<dyn Fragment<Self>>> {
            Ok(Box::new(CounterFragment {
                scope: scope.clone(),
                text: None,
                log: self.log.clone(),
            }))
        }

        fn set_props(scope: &Scope<Self>, props: CounterProps) {
            scope.set(CounterSlot::Count, |c| &mut c.count, props.start);
        }
    }

    struct CounterFragment {
        scope: Scope<Counter>,
        text: Option<NodeId>,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Fragment<Counter> for CounterFragment {
        fn create(&mut self) {
            self.text = Some(self.scope.document().create_text("0"));
        }

        fn mount(&mut self, target: NodeId, anchor: Option<NodeId>) {
            if let Some(text) = self.text {
                self.scope.document().insert(target, text, anchor);
                self.scope
                    .bind_this(CounterSlot::Element, |c| &mut c.element, Some(text));
            }
        }

        fn patch(&mut self, state: &Counter, dirty: &DirtySet) {
            self.log
                .borrow_mut()
                .push(format!("patch {} {}", state.count, state.doubled));
            if let (Some(text), true) = (self.text, dirty.has(CounterSlot::Doubled)) {
                self.scope
                    .document()
                    .set_data(text, &state.doubled.to_string());
            }
        }

        fn intro(&mut self, _local: bool) {
            self.log.borrow_mut().push("intro".into());
        }

        fn outro(&mut self, _local: bool) {
            self.log.borrow_mut().push("outro".into());
        }

        fn destroy(&mut self, detaching: bool) {
            if let Some(text) = self.text {
                detach_if(self.scope.document(), text, detaching);
            }
        }
    }

    struct Inert;

    impl Component for Inert {
        type Props = ();
        type Slot = NoSlots;

        fn create(_props: (), _scope: &Scope<Self>) -> Result<Self> {
            Ok(Inert)
        }

        fn fragment(&self, _scope: &Scope<Self>) -> Result<Box<dyn Fragment<Self>>> {
            Ok(Box::new(InertFragment))
        }
    }

    struct InertFragment;

    impl Fragment<Inert> for InertFragment {
        fn create(&mut self) {}
        fn mount(&mut self, _target: NodeId, _anchor: Option<NodeId>) {}
        fn patch(&mut self, _state: &Inert, _dirty: &DirtySet) {}
        fn destroy(&mut self, _detaching: bool) {}
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TracedSlot {
        A,
        B,
    }

    impl Slot for TracedSlot {
        const COUNT: usize = 2;

        fn index(self) -> usize {
            self as usize
        }
    }

    /// Logs every step of init and update, and copies `a` into `b` from
    /// inside its own patch.
    struct Traced {
        a: u32,
        b: u32,
        dispatcher: EventDispatcher,
    }

    impl Component for Traced {
        type Props = ();
        type Slot = TracedSlot;

        fn create(_props: (), _scope: &Scope<Self>) -> Result<Self> {
            before_update(|| log().borrow_mut().push("before".into()))?;
            on_destroy(|| log().borrow_mut().push("destroy".into()))?;
            Ok(Self {
                a: 0,
                b: 0,
                dispatcher: create_event_dispatcher()?,
            })
        }

        fn update(&mut self, _dirty: &DirtySet, _changes: &mut Changes<TracedSlot>) {
            log().borrow_mut().push("update".into());
        }

        fn fragment(&self, scope: &Scope<Self>) -> Result<Box<dyn Fragment<Self>>> {
            log().borrow_mut().push("fragment".into());
            Ok(Box::new(TracedFragment {
                scope: scope.clone(),
                text: None,
            }))
        }
    }

    struct TracedFragment {
        scope: Scope<Traced>,
        text: Option<NodeId>,
    }

    impl Fragment<Traced> for TracedFragment {
        fn create(&mut self) {
            self.text = Some(self.scope.document().create_text(""));
        }

        fn mount(&mut self, target: NodeId, anchor: Option<NodeId>) {
            log().borrow_mut().push("mount".into());
            if let Some(text) = self.text {
                self.scope.document().insert(target, text, anchor);
            }
        }

        fn patch(&mut self, state: &Traced, dirty: &DirtySet) {
            log()
                .borrow_mut()
                .push(format!("patch {} {}", state.a, state.b));
            if dirty.has(TracedSlot::A) {
                self.scope.set(TracedSlot::B, |t| &mut t.b, state.a);
                state.dispatcher.dispatch("patched", serde_json::Value::Null);
            }
        }

        fn intro(&mut self, _local: bool) {
            log().borrow_mut().push("intro".into());
        }

        fn destroy(&mut self, detaching: bool) {
            if let Some(text) = self.text.take() {
                detach_if(self.scope.document(), text, detaching);
            }
        }
    }

    fn host() -> Host {
        log().borrow_mut().clear();
        Host::new(Config::default())
    }

    #[test]
    fn init_runs_update_mounts_and_flushes() {
        let host = host();
        let counter = host.mount::<Counter>(CounterProps { start: 3 }).unwrap();

        assert_eq!(counter.with(|c| c.doubled), Some(6));
        assert_eq!(counter.with(|c| c.element.is_some()), Some(true));
        // Binding the element dirties it, so a second pass patches
        assert_eq!(*log().borrow(), vec!["mount", "after", "patch 3 6"]);
        assert!(!host.scheduler().is_flush_pending());
    }

    #[test]
    fn set_batches_until_the_next_microtask() {
        let host = host();
        let counter = host.mount::<Counter>(CounterProps::default()).unwrap();
        log().borrow_mut().clear();

        let scope = counter.scope();
        assert!(scope.set(CounterSlot::Count, |c| &mut c.count, 1));
        assert!(scope.set(CounterSlot::Count, |c| &mut c.count, 2));
        assert!(!scope.set(CounterSlot::Count, |c| &mut c.count, 2));
        assert!(log().borrow().is_empty());

        host.run_microtasks().unwrap();
        assert_eq!(*log().borrow(), vec!["patch 2 4", "after"]);
        let text = host.document().children(host.document().body())[0];
        assert_eq!(host.document().data(text).as_deref(), Some("4"));
    }

    #[test]
    fn set_props_goes_through_the_scheduler() {
        let host = host();
        let counter = host.mount::<Counter>(CounterProps::default()).unwrap();

        counter.set(CounterProps { start: 5 });
        host.run_microtasks().unwrap();
        assert_eq!(counter.with(|c| c.doubled), Some(10));
    }

    #[test]
    fn destroy_twice_is_inert() {
        let host = host();
        let counter = host.mount::<Counter>(CounterProps::default()).unwrap();
        log().borrow_mut().clear();

        counter.destroy();
        counter.destroy();

        assert_eq!(*log().borrow(), vec!["destroy", "teardown"]);
        assert!(counter.is_destroyed());
        assert!(counter.with(|_| ()).is_none());
        assert!(!counter.scope().set(CounterSlot::Count, |c| &mut c.count, 9));
        assert!(host.document().children(host.document().body()).is_empty());
        assert!(!counter.scope().is_alive());
    }

    #[test]
    fn destroy_before_mount_hooks_run_fires_teardown_immediately() {
        let host = host();
        let counter = init::<Counter>(&host, Options::new(CounterProps::default())).unwrap();
        counter.create_fragment();
        counter.mount(host.document().body(), None);
        counter.destroy();
        log().borrow_mut().clear();

        host.scheduler().flush().unwrap();
        assert_eq!(*log().borrow(), vec!["mount", "teardown", "after"]);
    }

    #[test]
    fn bound_setter_receives_initial_and_changed_values() {
        let host = host();
        let counter = host.mount::<Counter>(CounterProps { start: 1 }).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();

        counter.bind(CounterSlot::Count, |c| c.count, move |v| sink.borrow_mut().push(v));
        host.run_microtasks().unwrap();
        assert_eq!(*seen.borrow(), vec![1]);

        counter.scope().set(CounterSlot::Count, |c| &mut c.count, 7);
        host.run_microtasks().unwrap();
        assert_eq!(*seen.borrow(), vec![1, 7]);
    }

    #[test]
    fn listeners_can_be_removed() {
        let host = host();
        let counter = host.mount::<Inert>(()).unwrap();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let id = counter.on("ping", move |_| h.set(h.get() + 1));
        assert!(counter.off("ping", id));
        assert!(!counter.off("ping", id));
    }

    #[test]
    fn transition_out_twice_completes_once() {
        let host = host();
        let counter = host.mount::<Counter>(CounterProps::default()).unwrap();
        let done = Rc::new(Cell::new(0));

        host.scheduler().group_outros();
        for _ in 0..2 {
            let done = done.clone();
            counter.transition_out(false, false, Some(Box::new(move || done.set(done.get() + 1))));
        }
        assert!(counter.is_outroing());
        host.scheduler().check_outros();

        assert_eq!(done.get(), 1);
        assert!(!counter.is_outroing());
        let outros = log().borrow().iter().filter(|l| *l == "outro").count();
        assert_eq!(outros, 1);
    }

    #[test]
    fn transition_in_cancels_a_pending_outro() {
        let host = host();
        let counter = host.mount::<Counter>(CounterProps::default()).unwrap();
        let done = Rc::new(Cell::new(false));
        let d = done.clone();

        host.scheduler().group_outros();
        counter.transition_out(false, true, Some(Box::new(move || d.set(true))));
        counter.transition_in(false);
        host.scheduler().check_outros();

        assert!(!done.get());
        assert!(!counter.is_destroyed());
        assert!(!counter.is_outroing());
    }

    #[test]
    fn transition_out_with_detach_destroys() {
        let host = host();
        let counter = host.mount::<Counter>(CounterProps::default()).unwrap();

        counter.transition_out(false, true, None);
        assert!(counter.is_destroyed());
        assert!(host.document().children(host.document().body()).is_empty());
    }

    #[test]
    fn init_runs_before_update_once_ahead_of_the_fragment() {
        let host = host();
        let _traced = host.mount::<Traced>(()).unwrap();

        assert_eq!(*log().borrow(), vec!["update", "before", "fragment", "mount"]);
    }

    #[test]
    fn init_with_intro_runs_the_intro_before_mounting() {
        let host = host();
        let body = host.document().body();
        let _traced = init::<Traced>(&host, Options::new(()).target(body).intro(true)).unwrap();

        assert_eq!(
            *log().borrow(),
            vec!["update", "before", "fragment", "intro", "mount"]
        );
    }

    #[test]
    fn before_update_runs_between_update_and_patch() {
        let host = host();
        let traced = host.mount::<Traced>(()).unwrap();
        log().borrow_mut().clear();

        traced.scope().set(TracedSlot::B, |t| &mut t.b, 4);
        host.run_microtasks().unwrap();
        assert_eq!(*log().borrow(), vec!["update", "before", "patch 0 4"]);
    }

    #[test]
    fn writes_from_patch_land_in_a_later_patch() {
        let host = host();
        let traced = host.mount::<Traced>(()).unwrap();
        log().borrow_mut().clear();

        traced.scope().set(TracedSlot::A, |t| &mut t.a, 5);
        host.run_microtasks().unwrap();

        assert_eq!(
            *log().borrow(),
            vec!["update", "before", "patch 5 0", "update", "before", "patch 5 5"]
        );
        assert_eq!(traced.with(|t| t.b), Some(5));
        assert!(!host.scheduler().is_flush_pending());
    }

    #[test]
    fn with_mut_during_patch_returns_none() {
        let host = host();
        let traced = host.mount::<Traced>(()).unwrap();
        let seen = Rc::new(Cell::new(Some(0)));
        let sink = seen.clone();
        let scope = traced.scope();
        traced.on("patched", move |_| sink.set(scope.with_mut(|t| t.a)));

        traced.scope().set(TracedSlot::A, |t| &mut t.a, 2);
        host.run_microtasks().unwrap();
        assert_eq!(seen.get(), None);
    }

    #[test]
    fn destroy_from_a_listener_during_patch_waits_for_the_patch() {
        let host = host();
        let traced = host.mount::<Traced>(()).unwrap();
        let handle = traced.clone();
        traced.on("patched", move |_| {
            handle.destroy();
            log().borrow_mut().push(format!("destroyed {}", handle.is_destroyed()));
        });
        log().borrow_mut().clear();

        traced.scope().set(TracedSlot::A, |t| &mut t.a, 1);
        host.run_microtasks().unwrap();

        assert_eq!(
            *log().borrow(),
            vec!["update", "before", "patch 1 0", "destroyed false", "destroy"]
        );
        assert!(traced.is_destroyed());
        assert!(host.document().children(host.document().body()).is_empty());
        assert!(!host.scheduler().is_flush_pending());
    }
}
