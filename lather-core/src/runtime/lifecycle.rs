//! Per-component bookkeeping that does not depend on the state type.
//!
//! Everything a lifecycle accessor (`on_mount`, `create_event_dispatcher`,
//! ...) needs to touch lives here, so the current-component stack can hold
//! type-erased `Rc<ComponentCore>` entries.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::events::{ComponentListener, ListenerId};
use super::scheduler::RenderCallback;

/// Unique identifier for a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Generate a new unique component ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

/// Cleanup returned by a mount hook and run when the component is destroyed.
pub type Teardown = Box<dyn FnOnce()>;

/// Values a mount hook may return.
///
/// `()` means "nothing to clean up"; a [`Teardown`] is folded into the
/// component's destroy hooks.
pub trait IntoTeardown {
    fn into_teardown(self) -> Option<Teardown>;
}

impl IntoTeardown for () {
    fn into_teardown(self) -> Option<Teardown> {
        None
    }
}

impl IntoTeardown for Teardown {
    fn into_teardown(self) -> Option<Teardown> {
        Some(self)
    }
}

impl IntoTeardown for Option<Teardown> {
    fn into_teardown(self) -> Option<Teardown> {
        self
    }
}

pub(crate) type MountHook = Box<dyn FnOnce() -> Option<Teardown>>;

/// The four lifecycle callback lists.
pub(crate) struct Lifecycle {
    pub(crate) on_mount: Vec<MountHook>,
    /// `None` once the component has been destroyed.
    pub(crate) on_destroy: Option<Vec<Teardown>>,
    pub(crate) before_update: Vec<Rc<dyn Fn()>>,
    pub(crate) after_update: Vec<RenderCallback>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            on_mount: Vec::new(),
            on_destroy: Some(Vec::new()),
            before_update: Vec::new(),
            after_update: Vec::new(),
        }
    }
}

/// Type-erased part of a component instance.
pub(crate) struct ComponentCore {
    pub(crate) id: ComponentId,
    pub(crate) lifecycle: RefCell<Lifecycle>,
    pub(crate) listeners: RefCell<IndexMap<String, Vec<(ListenerId, ComponentListener)>>>,
    pub(crate) context: RefCell<HashMap<String, Rc<dyn Any>>>,
}

impl ComponentCore {
    pub(crate) fn new(context: HashMap<String, Rc<dyn Any>>) -> Self {
        Self {
            id: ComponentId::new(),
            lifecycle: RefCell::new(Lifecycle::default()),
            listeners: RefCell::new(IndexMap::new()),
            context: RefCell::new(context),
        }
    }

    /// Copy of the context map, handed to children at init.
    pub(crate) fn context_snapshot(&self) -> HashMap<String, Rc<dyn Any>> {
        self.context.borrow().clone()
    }

    pub(crate) fn add_listener(&self, event: &str, listener: ComponentListener) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    pub(crate) fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners.get_mut(event) {
            Some(list) => {
                let before = list.len();
                list.retain(|(listener, _)| *listener != id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Snapshot of the listeners for `event`, safe to call while
    /// listeners add or remove themselves.
    pub(crate) fn listeners_for(&self, event: &str) -> Vec<ComponentListener> {
        self.listeners
            .borrow()
            .get(event)
            .map(|list| list.iter().map(|(_, l)| Rc::clone(l)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.lifecycle.borrow().on_destroy.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::events::ComponentEvent;

    #[test]
    fn component_ids_are_unique() {
        assert_ne!(ComponentId::new(), ComponentId::new());
    }

    #[test]
    fn listeners_are_kept_in_registration_order() {
        let core = ComponentCore::new(HashMap::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let log = log.clone();
            core.add_listener(
                "ping",
                Rc::new(move |_: &ComponentEvent| log.borrow_mut().push(tag)),
            );
        }

        let event = ComponentEvent::new("ping", serde_json::Value::Null);
        for listener in core.listeners_for("ping") {
            listener(&event);
        }
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn remove_listener_reports_whether_it_existed() {
        let core = ComponentCore::new(HashMap::new());
        let id = core.add_listener("ping", Rc::new(|_: &ComponentEvent| {}));

        assert!(core.remove_listener("ping", id));
        assert!(!core.remove_listener("ping", id));
        assert!(!core.remove_listener("pong", id));
        assert!(core.listeners_for("ping").is_empty());
    }

    #[test]
    fn teardown_conversions() {
        assert!(().into_teardown().is_none());
        let teardown: Teardown = Box::new(|| {});
        assert!(teardown.into_teardown().is_some());
        assert!(Option::<Teardown>::None.into_teardown().is_none());
    }
}
