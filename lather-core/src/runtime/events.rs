//! Component events.
//!
//! Components announce things to their owner by dispatching named events
//! with a JSON detail payload. Owners subscribe with
//! [`ComponentRef::on`](super::ComponentRef::on).

use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::debug;

use super::lifecycle::ComponentCore;

/// Identifies one registered listener so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An event dispatched by a component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEvent {
    pub name: String,
    pub detail: Value,
}

impl ComponentEvent {
    pub fn new(name: impl Into<String>, detail: Value) -> Self {
        Self {
            name: name.into(),
            detail,
        }
    }
}

pub(crate) type ComponentListener = Rc<dyn Fn(&ComponentEvent)>;

/// Dispatches events on behalf of the component that created it.
///
/// Obtained with [`create_event_dispatcher`](super::create_event_dispatcher)
/// during component construction. The dispatcher does not keep the component
/// alive; dispatching after the component is gone does nothing.
#[derive(Clone)]
pub struct EventDispatcher {
    core: Weak<ComponentCore>,
}

impl EventDispatcher {
    pub(crate) fn new(core: &Rc<ComponentCore>) -> Self {
        Self {
            core: Rc::downgrade(core),
        }
    }

    /// Deliver `name` to every listener registered at the time of the call.
    ///
    /// Returns `true` if at least one listener was invoked.
    pub fn dispatch(&self, name: &str, detail: Value) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        let listeners = core.listeners_for(name);
        if listeners.is_empty() {
            return false;
        }

        debug!(event = name, listeners = listeners.len(), "dispatching component event");
        let event = ComponentEvent::new(name, detail);
        for listener in listeners {
            listener(&event);
        }
        true
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("alive", &(self.core.strong_count() > 0))
            .finish()
    }
}
