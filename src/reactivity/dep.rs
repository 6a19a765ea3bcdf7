// ============================================================================
// lumen-reactive - Dependency Sets
// One subscriber set per (target, key)
// ============================================================================
//
// Edges are bidirectional: an effect holds its DepSets strongly, each DepSet
// holds its effects weakly. Dropping the last handle to an effect therefore
// unhooks it from the graph without any sweep, and `stop` breaks the cycle
// explicitly from the strong side.
// ============================================================================

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::primitives::effect::{Effect, EffectInner};

struct DepInner {
    subscribers: RefCell<Vec<Weak<EffectInner>>>,
}

/// An unordered set of effects subscribed to one `(target, key)` pair.
///
/// Subscribers execute in subscription order within a trigger; the order is
/// documented but callers must not rely on it across effects.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<DepInner>,
}

impl Dep {
    pub(crate) fn new() -> Dep {
        Dep {
            inner: Rc::new(DepInner {
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn add(&self, effect: &Rc<EffectInner>) {
        self.inner
            .subscribers
            .borrow_mut()
            .push(Rc::downgrade(effect));
    }

    /// Removes one side of the edge; the caller mirrors the other side.
    pub(crate) fn remove(&self, effect: &EffectInner) {
        let ptr = effect as *const EffectInner;
        self.inner
            .subscribers
            .borrow_mut()
            .retain(|w| w.strong_count() > 0 && w.as_ptr() != ptr);
    }

    pub(crate) fn contains(&self, effect: &EffectInner) -> bool {
        let ptr = effect as *const EffectInner;
        self.inner
            .subscribers
            .borrow()
            .iter()
            .any(|w| w.strong_count() > 0 && w.as_ptr() == ptr)
    }

    /// Live subscribers, with dead weak entries compacted away. Triggers
    /// iterate this snapshot, never the live list, so effects that resubscribe
    /// mid-run cannot grow the set being executed.
    pub(crate) fn snapshot(&self) -> Vec<Rc<EffectInner>> {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let mut live = Vec::with_capacity(subscribers.len());
        subscribers.retain(|w| match w.upgrade() {
            Some(rc) => {
                live.push(rc);
                true
            }
            None => false,
        });
        live
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Whether the given effect is currently subscribed.
    pub fn has_subscriber(&self, effect: &Effect) -> bool {
        self.contains(effect.inner())
    }

    /// Identity comparison for the edge-symmetry checks.
    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Dep {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dep[{} subscribers]", self.subscriber_count())
    }
}

// =============================================================================
// TESTS
// =============================================================================
