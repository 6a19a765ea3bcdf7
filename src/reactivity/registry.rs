// ============================================================================
// lumen-reactive - Registry
// Process-wide bookkeeping: proxy cache and the target -> key -> DepSet index
// ============================================================================
//
// Both indices key on the target's numeric id and hold the target itself
// weakly, so neither a cached wrapper nor a dependency entry extends a
// target's lifetime. Dead entries are swept opportunistically.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::core::key::Key;
use crate::core::ops::Flavor;
use crate::core::value::{Obj, TargetCell, Value};
use crate::proxy::{ProxyInner, Reactive};
use crate::reactivity::dep::Dep;

/// Sweep the indices after this many dep-set creations.
const SWEEP_INTERVAL: u32 = 256;

struct ProxySlots {
    target: Weak<TargetCell>,
    slots: [Option<Weak<ProxyInner>>; 4],
}

struct TargetDeps {
    target: Weak<TargetCell>,
    keys: FxHashMap<Key, Dep>,
}

pub(crate) struct Registry {
    proxies: RefCell<FxHashMap<u64, ProxySlots>>,
    deps: RefCell<FxHashMap<u64, TargetDeps>>,
    creations: Cell<u32>,
}

impl Registry {
    fn new() -> Self {
        Self {
            proxies: RefCell::new(FxHashMap::default()),
            deps: RefCell::new(FxHashMap::default()),
            creations: Cell::new(0),
        }
    }

    fn sweep_if_due(&self) {
        let n = self.creations.get() + 1;
        self.creations.set(n);
        if n % SWEEP_INTERVAL != 0 {
            return;
        }
        let proxies_before;
        let deps_before;
        {
            let mut proxies = self.proxies.borrow_mut();
            proxies_before = proxies.len();
            proxies.retain(|_, slot| slot.target.strong_count() > 0);
            let mut deps = self.deps.borrow_mut();
            deps_before = deps.len();
            deps.retain(|_, entry| entry.target.strong_count() > 0);
        }
        tracing::trace!(
            proxies_before,
            deps_before,
            "swept registry indices for dead targets"
        );
    }
}

thread_local! {
    static REGISTRY: Registry = Registry::new();
}

fn with_registry<R>(f: impl FnOnce(&Registry) -> R) -> R {
    REGISTRY.with(f)
}

// =============================================================================
// DEPENDENCY INDEX
// =============================================================================

/// Look up (optionally creating) the DepSet for `(target, key)`.
pub fn get_dep(target: &Obj, key: &Key, create: bool) -> Option<Dep> {
    with_registry(|reg| {
        if create {
            reg.sweep_if_due();
            let mut deps = reg.deps.borrow_mut();
            let entry = deps.entry(target.id()).or_insert_with(|| TargetDeps {
                target: Rc::downgrade(target),
                keys: FxHashMap::default(),
            });
            Some(entry.keys.entry(key.clone()).or_insert_with(Dep::new).clone())
        } else {
            let deps = reg.deps.borrow();
            deps.get(&target.id()).and_then(|e| e.keys.get(key)).cloned()
        }
    })
}

/// Every `(key, DepSet)` recorded for the target. Trigger works off this
/// snapshot so registry borrows never overlap effect execution.
pub(crate) fn key_deps(target: &Obj) -> Vec<(Key, Dep)> {
    with_registry(|reg| {
        let deps = reg.deps.borrow();
        deps.get(&target.id())
            .map(|e| e.keys.iter().map(|(k, d)| (k.clone(), d.clone())).collect())
            .unwrap_or_default()
    })
}

// =============================================================================
// PROXY CACHE
// =============================================================================

pub(crate) fn lookup_proxy(target: &Obj, flavor: Flavor) -> Option<Reactive> {
    with_registry(|reg| {
        let proxies = reg.proxies.borrow();
        proxies
            .get(&target.id())
            .and_then(|s| s.slots[flavor.slot()].as_ref())
            .and_then(Weak::upgrade)
            .map(Reactive::from_inner)
    })
}

pub(crate) fn store_proxy(proxy: &Reactive) {
    with_registry(|reg| {
        let mut proxies = reg.proxies.borrow_mut();
        let target = proxy.raw();
        let entry = proxies.entry(target.id()).or_insert_with(|| ProxySlots {
            target: Rc::downgrade(&target),
            slots: [None, None, None, None],
        });
        entry.slots[proxy.flavor().slot()] = Some(proxy.downgrade_inner());
    });
}

// =============================================================================
// RAW-CHAIN QUERIES
// =============================================================================

/// Follow the raw chain to its fixed point. Non-proxies return unchanged.
pub fn to_raw(value: &Value) -> Value {
    let mut current = value.clone();
    while let Value::Proxy(p) = current {
        current = Value::Obj(p.raw());
    }
    current
}

/// Opt a container out of wrapping: `wrap` will return it unchanged from now
/// on. Non-containers pass through untouched.
pub fn mark_raw(value: Value) -> Value {
    if let Value::Obj(o) = &value {
        o.mark_skip();
    }
    value
}

/// True for mutable-flavored proxies, and for readonly proxies constructed
/// over a mutable proxy.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Proxy(p) => !p.flavor().is_readonly() || p.wraps_reactive(),
        _ => false,
    }
}

/// True for readonly-flavored proxies and for setter-less computed cells.
pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Proxy(p) => p.flavor().is_readonly(),
        Value::Ref(r) => r.is_readonly_ref(),
        _ => false,
    }
}

/// True for any observation wrapper, regardless of flavor.
pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Proxy(_))
}

// =============================================================================
// TESTS
// =============================================================================
