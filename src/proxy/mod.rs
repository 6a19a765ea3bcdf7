// ============================================================================
// lumen-reactive - Proxy
// Observation wrappers over container targets
// ============================================================================
//
// `Reactive` is the explicit-accessor stand-in for a transparent proxy: the
// same target, reached through `get`/`set`/method shims that feed the
// tracker. One wrapper exists per (target, flavor), cached weakly in the
// registry.
// ============================================================================

pub mod collection;
pub mod object;

use std::rc::{Rc, Weak};

use crate::core::ops::Flavor;
use crate::core::value::{Obj, TargetKind, Value};
use crate::reactivity::registry;

pub(crate) struct ProxyInner {
    raw: Obj,
    flavor: Flavor,
    /// Set when a readonly wrapper was constructed over a mutable proxy:
    /// `is_reactive` keeps answering true through the readonly layer.
    over_reactive: bool,
}

/// An observation wrapper. Cloning shares the wrapper; equality is identity.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ProxyInner>,
}

impl Reactive {
    pub(crate) fn from_inner(inner: Rc<ProxyInner>) -> Self {
        Reactive { inner }
    }

    pub(crate) fn downgrade_inner(&self) -> Weak<ProxyInner> {
        Rc::downgrade(&self.inner)
    }

    /// The wrapped target.
    pub fn raw(&self) -> Obj {
        self.inner.raw.clone()
    }

    pub fn flavor(&self) -> Flavor {
        self.inner.flavor
    }

    pub fn kind(&self) -> TargetKind {
        self.inner.raw.kind()
    }

    pub(crate) fn wraps_reactive(&self) -> bool {
        self.inner.over_reactive
    }

    /// Stable address for identity comparison and hashing.
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Reactive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reactive({:?}, {:?})", self.inner.flavor, self.inner.raw)
    }
}

// =============================================================================
// WRAP
// =============================================================================

/// Wrap a value in the requested flavor, reusing the cached wrapper when one
/// exists.
///
/// Pass-through cases: non-containers, skip-marked targets, frozen targets,
/// proxies already in a compatible flavor. Requesting a readonly flavor over
/// a mutable proxy layers a new readonly wrapper over the same target.
pub(crate) fn wrap(value: Value, flavor: Flavor) -> Value {
    match value {
        Value::Proxy(p) => {
            if flavor.is_readonly() && !p.flavor().is_readonly() {
                make_or_lookup(p.raw(), flavor, true)
            } else {
                // Mutable-over-readonly and same-flavor requests return the
                // existing wrapper.
                Value::Proxy(p)
            }
        }
        Value::Obj(target) => {
            if target.is_skipped() || target.is_frozen() {
                return Value::Obj(target);
            }
            make_or_lookup(target, flavor, false)
        }
        other => other,
    }
}

fn make_or_lookup(target: Obj, flavor: Flavor, over_reactive: bool) -> Value {
    if let Some(existing) = registry::lookup_proxy(&target, flavor) {
        return Value::Proxy(existing);
    }
    let proxy = Reactive {
        inner: Rc::new(ProxyInner {
            raw: target,
            flavor,
            over_reactive,
        }),
    };
    registry::store_proxy(&proxy);
    Value::Proxy(proxy)
}

fn wrap_public(value: Value, flavor: Flavor) -> Value {
    match &value {
        Value::Obj(_) | Value::Proxy(_) => wrap(value, flavor),
        // Refs carry their own reactivity; hand them back untouched.
        Value::Ref(_) => value,
        _ => {
            tracing::warn!("value cannot be made reactive: {}", value.kind_name());
            value
        }
    }
}

// =============================================================================
// PUBLIC ENTRY POINTS
// =============================================================================

/// Deep mutable observation.
///
/// # Example
///
/// ```
/// use lumen_reactive::{effect, reactive, record, Value};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let state = reactive(record! { "count" => 0 });
/// let seen = Rc::new(Cell::new(0));
///
/// let read = state.clone();
/// let seen_in = seen.clone();
/// let _e = effect(move || {
///     seen_in.set(read.get("count").as_int().unwrap());
/// });
///
/// state.set("count", Value::Int(3));
/// assert_eq!(seen.get(), 3);
/// ```
pub fn reactive(value: Value) -> Value {
    wrap_public(value, Flavor::MutableDeep)
}

/// Mutable observation of the first level only; nested values come back as
/// stored.
pub fn shallow_reactive(value: Value) -> Value {
    wrap_public(value, Flavor::MutableShallow)
}

/// Deep readonly view: reads never track, writes warn and are refused.
pub fn readonly(value: Value) -> Value {
    wrap_public(value, Flavor::ReadonlyDeep)
}

/// Readonly at the first level only.
pub fn shallow_readonly(value: Value) -> Value {
    wrap_public(value, Flavor::ReadonlyShallow)
}

// =============================================================================
// TESTS
// =============================================================================
