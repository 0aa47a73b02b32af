//! Host Environment
//!
//! The host stands in for the browser event loop. It owns the scheduler,
//! the document components render into and the interval clock, and it
//! decides when deferred work runs:
//!
//! - [`Host::run_microtasks`] is the microtask turn. Pending flushes run
//!   here and nowhere else.
//! - [`Host::advance`] moves the virtual clock. Every interval callback is
//!   its own task, followed by a microtask turn.

mod timers;

pub use timers::{IntervalId, Timers};

use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::config::Config;
use crate::dom::Document;
use crate::error::{Error, Result};
use crate::runtime::{init, Component, ComponentRef, Options, Scheduler};

struct HostInner {
    config: Config,
    scheduler: Rc<Scheduler>,
    document: Document,
    timers: Timers,
}

/// Shared handle to one runtime environment.
#[derive(Clone)]
pub struct Host {
    inner: Rc<HostInner>,
}

impl Host {
    pub fn new(config: Config) -> Self {
        let scheduler = Rc::new(Scheduler::new(config.scheduler.clone()));
        Self {
            inner: Rc::new(HostInner {
                config,
                scheduler,
                document: Document::new(),
                timers: Timers::new(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.inner.scheduler
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn timers(&self) -> &Timers {
        &self.inner.timers
    }

    /// Initialise `C` as a root component in the document body.
    pub fn mount<C: Component>(&self, props: C::Props) -> Result<ComponentRef<C>> {
        let body = self.document().body();
        init(self, Options::new(props).target(body))
    }

    /// Run pending flushes until none is requested.
    ///
    /// Does nothing while a flush is already running; that flush picks up
    /// the work.
    pub fn run_microtasks(&self) -> Result<()> {
        let scheduler = self.scheduler();
        if scheduler.is_flushing() {
            return Ok(());
        }
        let limit = scheduler.config().max_flush_passes;
        let mut rounds = 0;
        while scheduler.is_flush_pending() {
            if rounds == limit {
                return Err(Error::MicrotaskLimitExceeded { rounds });
            }
            rounds += 1;
            scheduler.flush()?;
        }
        Ok(())
    }

    /// Alias of [`run_microtasks`](Self::run_microtasks), named after the
    /// "await the next update" helper components use in tests.
    pub fn tick(&self) -> Result<()> {
        self.run_microtasks()
    }

    /// Advance the virtual clock by `duration`, firing due intervals.
    ///
    /// Returns the number of interval callbacks that ran.
    pub fn advance(&self, duration: Duration) -> Result<usize> {
        let timers = self.timers();
        let deadline = timers.now() + duration;
        let mut fired = 0;
        while let Some((id, due)) = timers.next_due(deadline) {
            timers.fire(id, due);
            fired += 1;
            self.run_microtasks()?;
        }
        timers.set_now(deadline);
        if fired > 0 {
            debug!(fired, now = ?timers.now(), "clock advanced");
        }
        Ok(fired)
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("scheduler", &self.inner.scheduler)
            .field("timers", &self.inner.timers)
            .finish()
    }
}
