//! Slot identifiers and dirty bitsets.
//!
//! Each component names its tracked fields with a small `Copy` enum that
//! implements [`Slot`]. The scheduler records which slots changed since the
//! last patch in a [`DirtySet`]: a bitset over slot indices, or the `Clean`
//! sentinel when nothing is pending.

use std::fmt::Debug;

use smallvec::{smallvec, SmallVec};

use super::compare::{Equality, Tracked};

const WORD_BITS: usize = 32;

/// A named, indexable state field of a component.
pub trait Slot: Copy + Debug + 'static {
    /// Number of slots the component declares.
    const COUNT: usize;

    /// Position of this slot in the dirty bitset.
    fn index(self) -> usize;
}

/// Slot type for components without tracked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoSlots {}

impl Slot for NoSlots {
    const COUNT: usize = 0;

    fn index(self) -> usize {
        match self {}
    }
}

/// Which slots changed since the component was last patched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DirtySet {
    /// Nothing pending. The component is not in the dirty queue.
    #[default]
    Clean,
    /// One bit per slot, 32 slots per word.
    Slots(SmallVec<[u32; 1]>),
}

fn words_for(count: usize) -> usize {
    count.div_ceil(WORD_BITS).max(1)
}

impl DirtySet {
    /// A set with every slot of a `count`-slot component marked.
    ///
    /// Used for the initial update pass, where every derived value must be
    /// computed.
    pub fn all(count: usize) -> Self {
        DirtySet::Slots(smallvec![u32::MAX; words_for(count)])
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, DirtySet::Clean)
    }

    /// Mark `index`. Returns `true` if the set was clean before.
    pub fn insert(&mut self, index: usize) -> bool {
        let was_clean = self.is_clean();
        if was_clean {
            *self = DirtySet::Slots(smallvec![0; words_for(index + 1)]);
        }
        if let DirtySet::Slots(words) = self {
            let word = index / WORD_BITS;
            if words.len() <= word {
                words.resize(word + 1, 0);
            }
            words[word] |= 1 << (index % WORD_BITS);
        }
        was_clean
    }

    pub fn contains(&self, index: usize) -> bool {
        match self {
            DirtySet::Clean => false,
            DirtySet::Slots(words) => words
                .get(index / WORD_BITS)
                .is_some_and(|word| word & (1 << (index % WORD_BITS)) != 0),
        }
    }

    /// Whether `slot` is marked.
    pub fn has<S: Slot>(&self, slot: S) -> bool {
        self.contains(slot.index())
    }

    /// Whether any of `slots` is marked.
    pub fn any<S: Slot>(&self, slots: &[S]) -> bool {
        slots.iter().any(|slot| self.has(*slot))
    }

    /// Raw bitset words; empty when clean.
    pub fn words(&self) -> &[u32] {
        match self {
            DirtySet::Clean => &[],
            DirtySet::Slots(words) => words.as_slice(),
        }
    }

    /// Number of marked slots.
    pub fn len(&self) -> usize {
        self.words().iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the current set and reset to `Clean`.
    pub fn take(&mut self) -> DirtySet {
        std::mem::take(self)
    }
}

/// Slot writes performed by a component's update hook.
///
/// Update hooks recompute derived fields. They write through
/// [`Changes::set`], which applies the component's comparator and records
/// the slot when the value actually changed.
#[derive(Debug)]
pub struct Changes<S: Slot> {
    equality: Equality,
    slots: SmallVec<[S; 4]>,
}

impl<S: Slot> Changes<S> {
    pub(crate) fn new(equality: Equality) -> Self {
        Self {
            equality,
            slots: SmallVec::new(),
        }
    }

    /// Write `value` into `field`, recording `slot` if it changed.
    pub fn set<T: Tracked>(&mut self, slot: S, field: &mut T, value: T) -> bool {
        let changed = field.changed(&value, self.equality);
        *field = value;
        if changed {
            self.slots.push(slot);
        }
        changed
    }

    /// Record `slot` as changed without comparing.
    pub fn mark(&mut self, slot: S) {
        self.slots.push(slot);
    }

    pub(crate) fn into_slots(self) -> SmallVec<[S; 4]> {
        self.slots
    }
}
