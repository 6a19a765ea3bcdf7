// ============================================================================
// lumen-reactive - Ref
// Single-slot reactive cell with the fixed key "value"
// ============================================================================
//
// A ref is its own (target, key) pair: the DepSet lives on the cell, not in
// the registry index. Deep refs wrap container payloads so nested reads keep
// tracking; shallow refs store payloads as given.
// ============================================================================

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::core::key::Key;
use crate::core::ops::TrackOp;
use crate::core::value::Value;
use crate::proxy::reactive;
use crate::reactivity::dep::Dep;
use crate::reactivity::equality::has_changed;
use crate::reactivity::registry::to_raw;
use crate::reactivity::tracking::{track_cell, trigger_cell};

// =============================================================================
// THE REF SEAM
// =============================================================================

/// Type-erased single-cell interface.
///
/// Implemented by plain refs and by computeds, which is what lets a computed
/// sit anywhere a ref can: inside records, behind auto-unwrap, behind
/// `get_value`.
pub trait AnyRef {
    /// Tracked read of the cell.
    fn get(&self) -> Value;

    /// Untracked read. Readonly proxies unwrap through this.
    fn peek(&self) -> Value;

    /// Write the cell. Plain refs trigger; setter-less computeds warn.
    fn set(&self, value: Value);

    /// The cell's own DepSet.
    fn dep(&self) -> Dep;

    /// True when writes are refused (computed without setter).
    fn is_readonly_ref(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

// =============================================================================
// PLAIN REF
// =============================================================================

pub struct RefInner {
    /// Possibly-wrapped payload handed back to readers.
    value: RefCell<Value>,
    /// Raw payload used for change detection.
    raw_value: RefCell<Value>,
    dep: Dep,
    shallow: bool,
    self_weak: RefCell<Weak<RefInner>>,
}

impl RefInner {
    fn describe(&self) -> Value {
        match self.self_weak.borrow().upgrade() {
            Some(rc) => Value::Ref(rc as Rc<dyn AnyRef>),
            None => Value::Unit,
        }
    }
}

/// Deep refs observe container payloads through a mutable-deep wrapper.
fn convert(value: Value) -> Value {
    if value.is_container() {
        reactive(value)
    } else {
        value
    }
}

impl AnyRef for RefInner {
    fn get(&self) -> Value {
        track_cell(&self.dep, || self.describe(), TrackOp::Get, Key::prop("value"));
        self.value.borrow().clone()
    }

    fn peek(&self) -> Value {
        self.value.borrow().clone()
    }

    fn set(&self, new_value: Value) {
        let new_raw = to_raw(&new_value);
        let changed = has_changed(&new_raw, &self.raw_value.borrow());
        if !changed {
            return;
        }
        let old_raw = self.raw_value.replace(new_raw.clone());
        *self.value.borrow_mut() = if self.shallow {
            new_value
        } else {
            convert(new_value)
        };
        trigger_cell(&self.dep, self.describe(), Some(new_raw), Some(old_raw));
    }

    fn dep(&self) -> Dep {
        self.dep.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn build_ref(value: Value, shallow: bool) -> Value {
    let raw = to_raw(&value);
    let stored = if shallow { value } else { convert(raw.clone()) };
    let inner = Rc::new(RefInner {
        value: RefCell::new(stored),
        raw_value: RefCell::new(raw),
        dep: Dep::new(),
        shallow,
        self_weak: RefCell::new(Weak::new()),
    });
    *inner.self_weak.borrow_mut() = Rc::downgrade(&inner);
    Value::Ref(inner as Rc<dyn AnyRef>)
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create a deep ref: container payloads are observed recursively.
///
/// # Example
///
/// ```
/// use lumen_reactive::{create_ref, Value};
///
/// let count = create_ref(Value::Int(1));
/// assert_eq!(count.get_value(), Value::Int(1));
/// count.set_value(Value::Int(2));
/// assert_eq!(count.get_value(), Value::Int(2));
/// ```
pub fn create_ref(value: Value) -> Value {
    build_ref(value, false)
}

/// Create a shallow ref: only `.value` itself is observed.
pub fn create_shallow_ref(value: Value) -> Value {
    build_ref(value, true)
}

/// Brand check.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// Refs read through to their payload; everything else passes through.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}

// =============================================================================
// VALUE-SIDE CONVENIENCE
// =============================================================================

impl Value {
    /// Tracked read of a ref or computed cell. Non-refs return themselves,
    /// so this doubles as `unref`.
    pub fn get_value(&self) -> Value {
        unref(self)
    }

    /// Write a ref cell. Warns on non-refs.
    pub fn set_value(&self, value: Value) {
        match self {
            Value::Ref(r) => r.set(value),
            other => {
                tracing::warn!(
                    "set_value ignored: {} is not a ref",
                    other.kind_name()
                );
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
