//! Component Runtime
//!
//! This module implements the batched component model: components with
//! typed state, a scheduler that turns state writes into fragment patches,
//! and the lifecycle and transition machinery around them.
//!
//! # Concepts
//!
//! ## Slots and dirty sets
//!
//! Every rendered field of a component is named by a [`Slot`]. Writing a
//! field through [`Scope::set`] compares old and new value and, on a change,
//! records the slot in the component's [`DirtySet`].
//!
//! ## Flushes
//!
//! The first dirty mark queues the component and requests a flush. Flushes
//! run on the host's microtask turn, so every write made in one synchronous
//! turn lands in a single patch. See [`Scheduler`] for the exact order of a
//! flush.
//!
//! ## Lifecycle
//!
//! [`on_mount`], [`on_destroy`], [`before_update`] and [`after_update`]
//! register hooks for the component currently being constructed.
//! [`set_context`] and [`get_context`] share values with descendants.
//!
//! # Implementation Notes
//!
//! Everything is single-threaded. Instances live behind `Rc` and keep their
//! state in `RefCell`s. The one borrow held across user code is the shared
//! borrow of the state during [`Fragment::patch`]: a [`Scope::set`] made
//! there is queued and applied when the patch returns, and a destroy
//! requested from any fragment method waits until that method returns.
//! Everywhere else hooks may freely write state or destroy components.

mod compare;
mod component;
mod current;
mod dirty;
mod events;
mod fragment;
mod lifecycle;
mod scheduler;
mod transition;

pub use compare::{not_equal, safe_not_equal, Equality, Tracked};
pub use component::{init, Component, ComponentRef, Options, Scope};
pub use current::{
    after_update, before_update, create_event_dispatcher, get_context, has_context, on_destroy,
    on_mount, set_context,
};
pub use dirty::{Changes, DirtySet, NoSlots, Slot};
pub use events::{ComponentEvent, EventDispatcher, ListenerId};
pub use fragment::{claim_element, claim_space, claim_text, detach_if, Fragment};
pub use lifecycle::{ComponentId, IntoTeardown, Teardown};
pub use scheduler::{Callback, CallbackId, RenderCallback, Scheduler};
pub use transition::OutroHandle;
