//! Current Component
//!
//! Tracks which component is being constructed or updated, so lifecycle
//! accessors such as [`on_mount`] and [`create_event_dispatcher`] can be
//! called from inside `Component::create` without threading the instance
//! through by hand.
//!
//! # Implementation
//!
//! A thread-local stack of component cores. Initialising a child component
//! from inside a parent's fragment factory pushes the child on top of the
//! parent; the guard pops it again when the child is done. Calling an
//! accessor with an empty stack is a programmer error and fails with
//! [`Error::OutsideComponentInit`].

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use super::events::EventDispatcher;
use super::lifecycle::{ComponentCore, ComponentId, IntoTeardown};
use super::scheduler::RenderCallback;
use crate::error::{Error, Result};

thread_local! {
    static CURRENT: RefCell<Vec<Rc<ComponentCore>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the current component when dropped.
pub(crate) struct CurrentComponent {
    id: ComponentId,
}

impl CurrentComponent {
    pub(crate) fn enter(core: Rc<ComponentCore>) -> Self {
        let id = core.id;
        CURRENT.with(|stack| stack.borrow_mut().push(core));
        Self { id }
    }
}

impl Drop for CurrentComponent {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(core) = popped {
                debug_assert_eq!(
                    core.id, self.id,
                    "CurrentComponent mismatch: expected {:?}, got {:?}",
                    self.id, core.id
                );
            }
        });
    }
}

/// The component on top of the stack, if any.
pub(crate) fn try_current() -> Option<Rc<ComponentCore>> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

fn current(operation: &'static str) -> Result<Rc<ComponentCore>> {
    try_current().ok_or(Error::OutsideComponentInit { operation })
}

/// Run `hook` once the component has been mounted.
///
/// The hook runs after every synchronous mount in the same flush, so child
/// components are mounted before their parent's hooks fire. A returned
/// [`Teardown`](super::Teardown) runs when the component is destroyed.
pub fn on_mount<F, R>(hook: F) -> Result<()>
where
    F: FnOnce() -> R + 'static,
    R: IntoTeardown,
{
    let core = current("on_mount")?;
    core.lifecycle
        .borrow_mut()
        .on_mount
        .push(Box::new(move || hook().into_teardown()));
    Ok(())
}

/// Run `hook` when the component is destroyed.
pub fn on_destroy<F>(hook: F) -> Result<()>
where
    F: FnOnce() + 'static,
{
    let core = current("on_destroy")?;
    if let Some(hooks) = core.lifecycle.borrow_mut().on_destroy.as_mut() {
        hooks.push(Box::new(hook));
    }
    Ok(())
}

/// Run `hook` before every patch of the component, and once before the
/// fragment is first created.
pub fn before_update<F>(hook: F) -> Result<()>
where
    F: Fn() + 'static,
{
    let core = current("before_update")?;
    core.lifecycle.borrow_mut().before_update.push(Rc::new(hook));
    Ok(())
}

/// Run `hook` after every patch of the component, and once after mount.
///
/// Within one flush the hook runs at most once, even when the component is
/// patched several times.
pub fn after_update<F>(hook: F) -> Result<()>
where
    F: Fn() + 'static,
{
    let core = current("after_update")?;
    core.lifecycle
        .borrow_mut()
        .after_update
        .push(RenderCallback::new(hook));
    Ok(())
}

/// Create a dispatcher for events of the current component.
pub fn create_event_dispatcher() -> Result<EventDispatcher> {
    let core = current("create_event_dispatcher")?;
    Ok(EventDispatcher::new(&core))
}

/// Make `value` available to the current component and its descendants
/// under `key`. Children initialised afterwards inherit it.
pub fn set_context<T: 'static>(key: &str, value: T) -> Result<Rc<T>> {
    let core = current("set_context")?;
    let value = Rc::new(value);
    let erased: Rc<dyn Any> = value.clone();
    core.context.borrow_mut().insert(key.to_string(), erased);
    Ok(value)
}

/// Look up a context value set by this component or an ancestor.
///
/// Returns `Ok(None)` when the key is missing or holds a different type.
pub fn get_context<T: 'static>(key: &str) -> Result<Option<Rc<T>>> {
    let core = current("get_context")?;
    let value = core.context.borrow().get(key).cloned();
    Ok(value.and_then(|v| v.downcast::<T>().ok()))
}

/// Whether `key` is present in the current component's context.
pub fn has_context(key: &str) -> Result<bool> {
    let core = current("has_context")?;
    let present = core.context.borrow().contains_key(key);
    Ok(present)
}
