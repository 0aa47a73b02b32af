//! Change detection for state slots.
//!
//! A write to a slot only dirties the component when the new value differs
//! from the old one. "Differs" follows two rules:
//!
//! - NaN is considered equal to NaN, so a NaN-valued slot does not re-render
//!   forever.
//! - Shared references (`Rc<T>`) are assumed to have been mutated behind the
//!   runtime's back and always count as changed, unless the component opts
//!   into [`Equality::Immutable`], in which case pointer identity decides.

use std::rc::Rc;

use crate::dom::NodeId;

/// How a component compares shared references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Equality {
    /// Shared references always count as changed.
    #[default]
    Safe,
    /// Shared references are compared by identity.
    Immutable,
}

/// A value that can live in a tracked state slot.
pub trait Tracked {
    /// Whether replacing `self` with `new` counts as a change.
    fn changed(&self, new: &Self, equality: Equality) -> bool;
}

macro_rules! tracked_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Tracked for $ty {
                fn changed(&self, new: &Self, _: Equality) -> bool {
                    self != new
                }
            }
        )*
    };
}

tracked_by_value!(
    bool, char, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, String, &'static str, NodeId,
);

macro_rules! tracked_float {
    ($($ty:ty),*) => {
        $(
            impl Tracked for $ty {
                fn changed(&self, new: &Self, _: Equality) -> bool {
                    if self.is_nan() {
                        !new.is_nan()
                    } else {
                        self != new
                    }
                }
            }
        )*
    };
}

tracked_float!(f32, f64);

impl<T: Tracked> Tracked for Option<T> {
    fn changed(&self, new: &Self, equality: Equality) -> bool {
        match (self, new) {
            (Some(old), Some(new)) => old.changed(new, equality),
            (None, None) => false,
            _ => true,
        }
    }
}

impl<T: ?Sized> Tracked for Rc<T> {
    fn changed(&self, new: &Self, equality: Equality) -> bool {
        match equality {
            Equality::Safe => true,
            Equality::Immutable => !Rc::ptr_eq(self, new),
        }
    }
}

/// The default comparator.
pub fn safe_not_equal<T: Tracked>(old: &T, new: &T) -> bool {
    old.changed(new, Equality::Safe)
}

/// The comparator used by components declared immutable.
pub fn not_equal<T: Tracked>(old: &T, new: &T) -> bool {
    old.changed(new, Equality::Immutable)
}
