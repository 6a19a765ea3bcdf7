// ============================================================================
// lumen-reactive - Computed
// Lazy memoized derived cell: an effect wearing a ref interface
// ============================================================================
//
// The getter runs inside a lazy inner effect whose scheduler never recomputes
// anything. It flips the dirty bit and self-triggers once; the next read pays
// for the recomputation. Between a dependency write and that read, `cached`
// must not be trusted.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::key::Key;
use crate::core::ops::TrackOp;
use crate::core::value::Value;
use crate::primitives::effect::{effect_with_options, Effect, EffectOptions};
use crate::primitives::reference::AnyRef;
use crate::reactivity::dep::Dep;
use crate::reactivity::tracking::{track_cell, trigger_cell};

pub struct ComputedInner {
    cached: RefCell<Value>,
    dirty: Cell<bool>,
    dep: Dep,
    effect: RefCell<Option<Effect>>,
    setter: Option<Rc<dyn Fn(Value)>>,
    self_weak: RefCell<Weak<ComputedInner>>,
}

impl ComputedInner {
    fn describe(&self) -> Value {
        match self.self_weak.borrow().upgrade() {
            Some(rc) => Value::Ref(rc as Rc<dyn AnyRef>),
            None => Value::Unit,
        }
    }

    fn refresh_if_dirty(&self) {
        if !self.dirty.get() {
            return;
        }
        let runner = self.effect.borrow().clone();
        if let Some(effect) = runner {
            let fresh = effect.run();
            *self.cached.borrow_mut() = fresh;
            self.dirty.set(false);
        }
    }
}

impl AnyRef for ComputedInner {
    fn get(&self) -> Value {
        self.refresh_if_dirty();
        track_cell(&self.dep, || self.describe(), TrackOp::Get, Key::prop("value"));
        self.cached.borrow().clone()
    }

    fn peek(&self) -> Value {
        self.refresh_if_dirty();
        self.cached.borrow().clone()
    }

    fn set(&self, value: Value) {
        match &self.setter {
            Some(setter) => setter(value),
            None => {
                tracing::warn!("write ignored: computed value has no setter");
            }
        }
    }

    fn dep(&self) -> Dep {
        self.dep.clone()
    }

    fn is_readonly_ref(&self) -> bool {
        self.setter.is_none()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn build(getter: Rc<dyn Fn() -> Value>, setter: Option<Rc<dyn Fn(Value)>>) -> Value {
    let inner = Rc::new(ComputedInner {
        cached: RefCell::new(Value::Unit),
        dirty: Cell::new(true),
        dep: Dep::new(),
        effect: RefCell::new(None),
        setter,
        self_weak: RefCell::new(Weak::new()),
    });
    *inner.self_weak.borrow_mut() = Rc::downgrade(&inner);

    let cell = Rc::downgrade(&inner);
    let runner = effect_with_options(
        move || getter(),
        EffectOptions {
            lazy: true,
            // First fire after the last read marks dirty and self-triggers
            // exactly once; later fires before the next read are swallowed.
            scheduler: Some(Rc::new(move |_effect| {
                if let Some(computed) = cell.upgrade() {
                    if !computed.dirty.get() {
                        computed.dirty.set(true);
                        trigger_cell(&computed.dep, computed.describe(), None, None);
                    }
                }
            })),
            ..Default::default()
        },
    );
    *inner.effect.borrow_mut() = Some(runner);

    Value::Ref(inner as Rc<dyn AnyRef>)
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create a read-only computed from a getter.
///
/// The getter does not run until the first read, and re-runs only after a
/// dependency changed.
///
/// # Example
///
/// ```
/// use lumen_reactive::{computed, create_ref, Value};
///
/// let base = create_ref(Value::Int(3));
/// let reader = base.clone();
/// let doubled = computed(move || {
///     Value::Int(reader.get_value().as_int().unwrap() * 2)
/// });
///
/// assert_eq!(doubled.get_value(), Value::Int(6));
/// base.set_value(Value::Int(5));
/// assert_eq!(doubled.get_value(), Value::Int(10));
/// ```
pub fn computed(getter: impl Fn() -> Value + 'static) -> Value {
    build(Rc::new(getter), None)
}

/// Create a computed with a write path.
pub fn writable_computed(
    getter: impl Fn() -> Value + 'static,
    setter: impl Fn(Value) + 'static,
) -> Value {
    build(Rc::new(getter), Some(Rc::new(setter)))
}

/// Options form: either accessor may be absent.
#[derive(Default, Clone)]
pub struct ComputedOptions {
    pub getter: Option<Rc<dyn Fn() -> Value>>,
    pub setter: Option<Rc<dyn Fn(Value)>>,
}

/// Build a computed from options. A missing getter degrades to a constant
/// read-only cell.
pub fn computed_with_options(options: ComputedOptions) -> Value {
    match options.getter {
        Some(getter) => build(getter, options.setter),
        None => {
            tracing::warn!("computed created without a getter; treating as a constant");
            build(Rc::new(|| Value::Unit), None)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::effect::effect;
    use crate::primitives::reference::{create_ref, is_ref};

    #[test]
    fn computed_is_a_ref() {
        let c = computed(|| Value::Int(1));
        assert!(is_ref(&c));
    }

    #[test]
    fn lazy_until_first_read_then_cached() {
        let calls = Rc::new(Cell::new(0));
        let base = create_ref(Value::Int(3));

        let reader = base.clone();
        let calls_in = calls.clone();
        let c = computed(move || {
            calls_in.set(calls_in.get() + 1);
            Value::Int(reader.get_value().as_int().unwrap() * 2)
        });

        assert_eq!(calls.get(), 0, "getter must not run before the first read");
        assert_eq!(c.get_value(), Value::Int(6));
        assert_eq!(c.get_value(), Value::Int(6));
        assert_eq!(calls.get(), 1, "second read must hit the cache");
    }

    #[test]
    fn dependency_write_defers_recompute_to_next_read() {
        let calls = Rc::new(Cell::new(0));
        let base = create_ref(Value::Int(3));

        let reader = base.clone();
        let calls_in = calls.clone();
        let c = computed(move || {
            calls_in.set(calls_in.get() + 1);
            Value::Int(reader.get_value().as_int().unwrap() * 2)
        });

        assert_eq!(c.get_value(), Value::Int(6));
        assert_eq!(calls.get(), 1);

        base.set_value(Value::Int(4));
        assert_eq!(calls.get(), 1, "write alone must not recompute");

        assert_eq!(c.get_value(), Value::Int(8));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn downstream_effect_sees_exactly_one_self_trigger() {
        let base = create_ref(Value::Int(1));
        let reader = base.clone();
        let c = computed(move || reader.get_value());

        let runs = Rc::new(Cell::new(0));
        let watched = c.clone();
        let runs_in = runs.clone();
        let _e = effect(move || {
            let _ = watched.get_value();
            runs_in.set(runs_in.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        base.set_value(Value::Int(2));
        assert_eq!(runs.get(), 2, "one dependency write, one downstream run");

        base.set_value(Value::Int(3));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn chained_computeds_propagate() {
        let base = create_ref(Value::Int(1));
        let reader = base.clone();
        let doubled = computed(move || Value::Int(reader.get_value().as_int().unwrap() * 2));
        let doubled_in = doubled.clone();
        let plus_ten = computed(move || {
            Value::Int(doubled_in.get_value().as_int().unwrap() + 10)
        });

        assert_eq!(plus_ten.get_value(), Value::Int(12));
        base.set_value(Value::Int(5));
        assert_eq!(plus_ten.get_value(), Value::Int(20));
    }

    #[test]
    fn setter_routes_writes() {
        let base = create_ref(Value::Int(1));
        let reader = base.clone();
        let writer = base.clone();
        let c = writable_computed(
            move || Value::Int(reader.get_value().as_int().unwrap() + 1),
            move |v| writer.set_value(Value::Int(v.as_int().unwrap() - 1)),
        );

        assert_eq!(c.get_value(), Value::Int(2));
        c.set_value(Value::Int(10));
        assert_eq!(base.get_value(), Value::Int(9));
        assert_eq!(c.get_value(), Value::Int(10));
    }

    #[test]
    fn setter_less_computed_refuses_writes() {
        let c = computed(|| Value::Int(1));
        c.set_value(Value::Int(5));
        assert_eq!(c.get_value(), Value::Int(1));

        let Value::Ref(cell) = &c else { unreachable!() };
        assert!(cell.is_readonly_ref());
    }

    #[test]
    fn options_without_getter_is_a_constant() {
        let c = computed_with_options(ComputedOptions::default());
        assert_eq!(c.get_value(), Value::Unit);
        c.set_value(Value::Int(1));
        assert_eq!(c.get_value(), Value::Unit);
    }
}
