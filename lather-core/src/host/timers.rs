//! Virtual repeating-interval clock.
//!
//! Time only moves when the host advances it. Intervals fire in due-time
//! order; two intervals due at the same instant fire in the order they were
//! registered.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::trace;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle returned by [`Timers::set_interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalId(u64);

struct Interval {
    period: Duration,
    next_due: Duration,
    callback: Rc<dyn Fn()>,
}

#[derive(Default)]
struct TimersInner {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    intervals: RefCell<IndexMap<IntervalId, Interval>>,
    cleared: Cell<usize>,
}

/// Shared handle to the interval table.
#[derive(Clone, Default)]
pub struct Timers {
    inner: Rc<TimersInner>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since the clock was created.
    pub fn now(&self) -> Duration {
        self.inner.now.get()
    }

    /// Call `callback` every `period`, first at `now + period`.
    ///
    /// Periods shorter than a millisecond are rounded up.
    pub fn set_interval<F>(&self, period: Duration, callback: F) -> IntervalId
    where
        F: Fn() + 'static,
    {
        let id = IntervalId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        let period = period.max(MIN_PERIOD);
        self.inner.intervals.borrow_mut().insert(
            id,
            Interval {
                period,
                next_due: self.now() + period,
                callback: Rc::new(callback),
            },
        );
        trace!(?id, ?period, "interval set");
        id
    }

    /// Stop an interval. Returns `false` if it was already cleared.
    pub fn clear_interval(&self, id: IntervalId) -> bool {
        let removed = self.inner.intervals.borrow_mut().shift_remove(&id).is_some();
        if removed {
            self.inner.cleared.set(self.inner.cleared.get() + 1);
            trace!(?id, "interval cleared");
        }
        removed
    }

    pub fn active_count(&self) -> usize {
        self.inner.intervals.borrow().len()
    }

    /// Number of successful [`clear_interval`](Self::clear_interval) calls.
    pub fn cleared_count(&self) -> usize {
        self.inner.cleared.get()
    }

    /// Earliest interval due at or before `deadline`.
    pub(crate) fn next_due(&self, deadline: Duration) -> Option<(IntervalId, Duration)> {
        self.inner
            .intervals
            .borrow()
            .iter()
            .filter(|(_, interval)| interval.next_due <= deadline)
            .min_by_key(|(_, interval)| interval.next_due)
            .map(|(id, interval)| (*id, interval.next_due))
    }

    /// Move the clock to `at`, reschedule `id` and run its callback.
    ///
    /// The callback may clear this or any other interval.
    pub(crate) fn fire(&self, id: IntervalId, at: Duration) {
        self.set_now(at);
        let callback = {
            let mut intervals = self.inner.intervals.borrow_mut();
            match intervals.get_mut(&id) {
                Some(interval) => {
                    interval.next_due = at + interval.period;
                    Rc::clone(&interval.callback)
                }
                None => return,
            }
        };
        callback();
    }

    pub(crate) fn set_now(&self, now: Duration) {
        if now > self.now() {
            self.inner.now.set(now);
        }
    }
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("now", &self.now())
            .field("active", &self.active_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_due_orders_by_time_then_registration() {
        let timers = Timers::new();
        let slow = timers.set_interval(Duration::from_millis(30), || {});
        let fast = timers.set_interval(Duration::from_millis(10), || {});
        let tied = timers.set_interval(Duration::from_millis(10), || {});

        assert_eq!(
            timers.next_due(Duration::from_millis(100)),
            Some((fast, Duration::from_millis(10)))
        );
        timers.fire(fast, Duration::from_millis(10));
        assert_eq!(
            timers.next_due(Duration::from_millis(100)),
            Some((tied, Duration::from_millis(10)))
        );
        assert_eq!(timers.next_due(Duration::from_millis(5)), None);
        assert!(timers.clear_interval(slow));
    }

    #[test]
    fn double_clear_is_a_no_op() {
        let timers = Timers::new();
        let id = timers.set_interval(Duration::from_secs(1), || {});

        assert!(timers.clear_interval(id));
        assert!(!timers.clear_interval(id));
        assert_eq!(timers.cleared_count(), 1);
        assert_eq!(timers.active_count(), 0);
    }

    #[test]
    fn zero_period_is_clamped() {
        let timers = Timers::new();
        let id = timers.set_interval(Duration::ZERO, || {});
        assert_eq!(
            timers.next_due(Duration::from_secs(1)),
            Some((id, Duration::from_millis(1)))
        );
    }
}
