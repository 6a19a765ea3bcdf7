// ============================================================================
// lumen-reactive - Object Interceptor
// Records and ordered sequences: keyed access and the sequence method shims
// ============================================================================
//
// Reads feed the tracker and lazily wrap what they return; writes detect
// change NaN-aware, then hand the tracker an ADD / SET / DELETE. Sequence
// methods that write the length run with tracking paused so the common
// write-then-read-length pattern cannot subscribe an effect to its own
// output.
// ============================================================================

use crate::core::context::TrackPause;
use crate::core::key::Key;
use crate::core::ops::{
    is_reserved_prop, TrackOp, TriggerOp, IS_REACTIVE_KEY, IS_READONLY_KEY, RAW_KEY, SKIP_KEY,
};
use crate::core::value::{Obj, TargetKind, Value};
use crate::proxy::{wrap, Reactive};
use crate::reactivity::equality::{has_changed, same_value, same_value_zero, strict_equals};
use crate::reactivity::registry::to_raw;
use crate::reactivity::tracking::{track, trigger};

impl Reactive {
    // =========================================================================
    // READ
    // =========================================================================

    /// Answer the four reserved introspection keys without touching the
    /// target.
    fn reserved_read(&self, key: &Key) -> Option<Value> {
        let Key::Prop(name) = key else {
            return None;
        };
        match &**name {
            IS_REACTIVE_KEY => Some(Value::Bool(
                !self.flavor().is_readonly() || self.wraps_reactive(),
            )),
            IS_READONLY_KEY => Some(Value::Bool(self.flavor().is_readonly())),
            RAW_KEY => Some(Value::Obj(self.raw())),
            SKIP_KEY => Some(Value::Bool(self.raw().is_skipped())),
            _ => None,
        }
    }

    /// Keyed read.
    ///
    /// Mutable flavors track `(target, key)`. Deep flavors auto-unwrap ref
    /// values (except sequence slots) and lazily wrap container values in
    /// the same flavor.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        if let Some(synthetic) = self.reserved_read(&key) {
            return synthetic;
        }

        let raw = self.raw();
        let readonly = self.flavor().is_readonly();
        if !readonly {
            track(&raw, TrackOp::Get, key.clone());
        }

        let value = raw.raw_get(&key);
        if self.flavor().is_shallow() {
            return value;
        }

        if let Value::Ref(cell) = &value {
            // No auto-unwrap for integer slots of a sequence.
            let sequence_slot = raw.kind() == TargetKind::List && key.is_index();
            if !sequence_slot {
                return if readonly { cell.peek() } else { cell.get() };
            }
            return value;
        }

        if value.is_container() {
            return wrap(value, self.flavor());
        }
        value
    }

    /// Sequence length (0 for other kinds). Tracks the length slot.
    pub fn len(&self) -> usize {
        match self.get(Key::Length).as_int() {
            Some(n) => n as usize,
            None => 0,
        }
    }

    /// Membership test. Tracks `HAS` on the key; reserved keys are answered
    /// without tracking.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if let Key::Prop(name) = &key {
            if is_reserved_prop(name) {
                return false;
            }
        }
        let raw = self.raw();
        if !self.flavor().is_readonly() {
            track(&raw, TrackOp::Has, key.clone());
        }
        raw.raw_has(&key)
    }

    /// Own-key enumeration.
    ///
    /// Sequences track `ITERATE` on the length slot; records track the
    /// `ITERATE` sentinel; keyed maps track the keys-only sentinel.
    pub fn keys(&self) -> Vec<Key> {
        let raw = self.raw();
        if !self.flavor().is_readonly() {
            match raw.kind() {
                TargetKind::List => track(&raw, TrackOp::Iterate, Key::Length),
                TargetKind::Map => track(&raw, TrackOp::Iterate, Key::MapKeyIterate),
                TargetKind::Record | TargetKind::Set => {
                    track(&raw, TrackOp::Iterate, Key::Iterate)
                }
                TargetKind::WeakMap | TargetKind::WeakSet => {
                    tracing::warn!("weak collections are not enumerable");
                    return Vec::new();
                }
            }
        } else if raw.kind().is_weak() {
            tracing::warn!("weak collections are not enumerable");
            return Vec::new();
        }
        raw.raw_keys()
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Keyed write. Readonly flavors warn and refuse; the call still returns
    /// normally so opaque caller code keeps running.
    pub fn set(&self, key: impl Into<Key>, value: Value) {
        let key = key.into();
        if self.flavor().is_readonly() {
            tracing::warn!(key = ?key, "set ignored: target is readonly");
            return;
        }

        let raw = self.raw();
        let mut value = value;

        if !self.flavor().is_shallow() {
            value = to_raw(&value);
            // A ref sitting in a record absorbs plain writes itself.
            let old = raw.raw_get(&key);
            if let Value::Ref(cell) = &old {
                if !matches!(value, Value::Ref(_)) && raw.kind() != TargetKind::List {
                    cell.set(value);
                    return;
                }
            }
        }

        if raw.kind() == TargetKind::List && key == Key::Length {
            if let Some(n) = value.as_int() {
                self.apply_set_len(n.max(0) as usize);
            } else {
                tracing::warn!("length must be an integer");
            }
            return;
        }

        let (had, old) = raw.raw_set(&key, value.clone());
        if !had {
            trigger(&raw, TriggerOp::Add, Some(key), Some(value), None, None);
        } else if has_changed(&old, &value) {
            trigger(&raw, TriggerOp::Set, Some(key), Some(value), Some(old), None);
        }
    }

    /// Write the sequence length; truncation invalidates the removed slots.
    pub fn set_len(&self, new_len: usize) {
        if self.flavor().is_readonly() {
            tracing::warn!("set_len ignored: target is readonly");
            return;
        }
        self.apply_set_len(new_len);
    }

    fn apply_set_len(&self, new_len: usize) {
        let raw = self.raw();
        if raw.kind() != TargetKind::List {
            return;
        }
        let old_len = raw.list_resize(new_len);
        if old_len != new_len {
            trigger(
                &raw,
                TriggerOp::Set,
                Some(Key::Length),
                Some(Value::Int(new_len as i64)),
                Some(Value::Int(old_len as i64)),
                None,
            );
        }
    }

    /// Keyed delete. Returns whether the key existed.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.flavor().is_readonly() {
            tracing::warn!(key = ?key, "delete ignored: target is readonly");
            return false;
        }
        let raw = self.raw();
        match raw.raw_delete(&key) {
            Some(old) => {
                trigger(&raw, TriggerOp::Delete, Some(key), None, Some(old), None);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // IDENTITY-SENSITIVE SEQUENCE LOOKUPS
    // =========================================================================
    //
    // The result depends on element identity, so every slot is tracked. A
    // caller may hold the wrapped form of a stored element (or vice versa);
    // a miss retries once with the argument unwrapped to raw.
    // =========================================================================

    fn track_all_indices(&self, raw: &Obj, len: usize) {
        if !self.flavor().is_readonly() {
            for i in 0..len {
                track(raw, TrackOp::Get, Key::Index(i));
            }
        }
    }

    /// Same-value-zero membership test over the sequence.
    pub fn contains(&self, needle: &Value) -> bool {
        let raw = self.raw();
        let items = raw.list_snapshot();
        self.track_all_indices(&raw, items.len());

        if items.iter().any(|v| same_value_zero(v, needle)) {
            return true;
        }
        let raw_needle = to_raw(needle);
        if !same_value(&raw_needle, needle) {
            return items.iter().any(|v| same_value_zero(v, &raw_needle));
        }
        false
    }

    /// First index holding the value (strict equality).
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        let raw = self.raw();
        let items = raw.list_snapshot();
        self.track_all_indices(&raw, items.len());

        if let Some(i) = items.iter().position(|v| strict_equals(v, needle)) {
            return Some(i);
        }
        let raw_needle = to_raw(needle);
        if !same_value(&raw_needle, needle) {
            return items.iter().position(|v| strict_equals(v, &raw_needle));
        }
        None
    }

    /// Last index holding the value (strict equality).
    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        let raw = self.raw();
        let items = raw.list_snapshot();
        self.track_all_indices(&raw, items.len());

        if let Some(i) = items.iter().rposition(|v| strict_equals(v, needle)) {
            return Some(i);
        }
        let raw_needle = to_raw(needle);
        if !same_value(&raw_needle, needle) {
            return items.iter().rposition(|v| strict_equals(v, &raw_needle));
        }
        None
    }

    // =========================================================================
    // LENGTH-MUTATING SEQUENCE METHODS
    // =========================================================================
    //
    // All run under a tracking pause: reads the mutation itself performs
    // must not subscribe the calling effect to the length it is changing.
    // Triggers still fire normally.
    // =========================================================================

    fn refuse_readonly(&self, method: &str) -> bool {
        if self.flavor().is_readonly() {
            tracing::warn!("{method} ignored: target is readonly");
            return true;
        }
        false
    }

    fn store_form(&self, value: Value) -> Value {
        if self.flavor().is_shallow() {
            value
        } else {
            to_raw(&value)
        }
    }

    /// Append to the end. Returns the new length.
    pub fn push(&self, value: Value) -> usize {
        if self.refuse_readonly("push") {
            return self.raw().list_len();
        }
        let _pause = TrackPause::new();
        let raw = self.raw();
        let value = self.store_form(value);
        let index = match raw.list_mutate(|items| {
            items.push(value.clone());
            items.len() - 1
        }) {
            Some(i) => i,
            None => return 0,
        };
        trigger(
            &raw,
            TriggerOp::Add,
            Some(Key::Index(index)),
            Some(value),
            None,
            None,
        );
        index + 1
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Value {
        if self.refuse_readonly("pop") {
            return Value::Unit;
        }
        let _pause = TrackPause::new();
        let raw = self.raw();
        let old = raw.list_snapshot();
        if old.is_empty() {
            return Value::Unit;
        }
        let removed = raw
            .list_mutate(|items| items.pop())
            .flatten()
            .unwrap_or(Value::Unit);
        fire_sequence_diff(&raw, &old);
        removed
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Value {
        if self.refuse_readonly("shift") {
            return Value::Unit;
        }
        let _pause = TrackPause::new();
        let raw = self.raw();
        let old = raw.list_snapshot();
        if old.is_empty() {
            return Value::Unit;
        }
        let removed = raw
            .list_mutate(|items| items.remove(0))
            .unwrap_or(Value::Unit);
        fire_sequence_diff(&raw, &old);
        removed
    }

    /// Prepend. Returns the new length.
    pub fn unshift(&self, value: Value) -> usize {
        if self.refuse_readonly("unshift") {
            return self.raw().list_len();
        }
        let _pause = TrackPause::new();
        let raw = self.raw();
        let old = raw.list_snapshot();
        let value = self.store_form(value);
        let new_len = raw
            .list_mutate(|items| {
                items.insert(0, value.clone());
                items.len()
            })
            .unwrap_or(0);
        fire_sequence_diff(&raw, &old);
        new_len
    }

    /// Replace `delete_count` elements starting at `start` with `items`.
    /// Returns the removed elements.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        if self.refuse_readonly("splice") {
            return Vec::new();
        }
        let _pause = TrackPause::new();
        let raw = self.raw();
        let old = raw.list_snapshot();
        let start = start.min(old.len());
        let delete_count = delete_count.min(old.len() - start);
        let items: Vec<Value> = items.into_iter().map(|v| self.store_form(v)).collect();
        let removed = raw
            .list_mutate(|list| {
                list.splice(start..start + delete_count, items)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        fire_sequence_diff(&raw, &old);
        removed
    }
}

/// Compare the sequence against a pre-mutation snapshot and fire the
/// per-slot writes the mutation amounts to: SET for moved values, ADD for
/// new tail slots, DELETE for removed ones, and a length SET on shrink.
/// Growth needs no explicit length write because ADD fans out to the length
/// DepSet already.
fn fire_sequence_diff(raw: &Obj, old: &[Value]) {
    let new = raw.list_snapshot();
    let old_len = old.len();
    let new_len = new.len();

    for i in 0..old_len.min(new_len) {
        if has_changed(&old[i], &new[i]) {
            trigger(
                raw,
                TriggerOp::Set,
                Some(Key::Index(i)),
                Some(new[i].clone()),
                Some(old[i].clone()),
                None,
            );
        }
    }
    for (i, item) in new.iter().enumerate().skip(old_len) {
        trigger(
            raw,
            TriggerOp::Add,
            Some(Key::Index(i)),
            Some(item.clone()),
            None,
            None,
        );
    }
    for (i, item) in old.iter().enumerate().skip(new_len) {
        trigger(
            raw,
            TriggerOp::Delete,
            Some(Key::Index(i)),
            None,
            Some(item.clone()),
            None,
        );
    }
    if new_len < old_len {
        trigger(
            raw,
            TriggerOp::Set,
            Some(Key::Length),
            Some(Value::Int(new_len as i64)),
            Some(Value::Int(old_len as i64)),
            None,
        );
    }
}

// =============================================================================
// VALUE DISPATCH
// =============================================================================
//
// The same accessor surface on `Value`: proxies intercept, plain containers
// answer natively with no tracking or triggering. This keeps call sites
// uniform whether or not a value has been wrapped.
// =============================================================================

impl Value {
    pub fn get(&self, key: impl Into<Key>) -> Value {
        match self {
            Value::Proxy(p) => p.get(key),
            Value::Obj(o) => o.raw_get(&key.into()),
            _ => Value::Unit,
        }
    }

    pub fn set(&self, key: impl Into<Key>, value: Value) {
        match self {
            Value::Proxy(p) => p.set(key, value),
            Value::Obj(o) => {
                let key = key.into();
                if o.kind() == TargetKind::List && key == Key::Length {
                    if let Some(n) = value.as_int() {
                        o.list_resize(n.max(0) as usize);
                    }
                } else {
                    o.raw_set(&key, value);
                }
            }
            other => {
                tracing::warn!("set ignored: {} is not a container", other.kind_name());
            }
        }
    }

    pub fn delete(&self, key: impl Into<Key>) -> bool {
        match self {
            Value::Proxy(p) => p.delete(key),
            Value::Obj(o) => o.raw_delete(&key.into()).is_some(),
            _ => false,
        }
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        match self {
            Value::Proxy(p) => p.has(key),
            Value::Obj(o) => o.raw_has(&key.into()),
            _ => false,
        }
    }

    pub fn keys(&self) -> Vec<Key> {
        match self {
            Value::Proxy(p) => p.keys(),
            Value::Obj(o) => o.raw_keys(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Proxy(p) => p.len(),
            Value::Obj(o) => o.list_len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_len(&self, new_len: usize) {
        match self {
            Value::Proxy(p) => p.set_len(new_len),
            Value::Obj(o) => {
                o.list_resize(new_len);
            }
            _ => {}
        }
    }

    pub fn contains(&self, needle: &Value) -> bool {
        match self {
            Value::Proxy(p) => p.contains(needle),
            Value::Obj(o) => o
                .list_snapshot()
                .iter()
                .any(|v| same_value_zero(v, needle)),
            _ => false,
        }
    }

    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        match self {
            Value::Proxy(p) => p.index_of(needle),
            Value::Obj(o) => o
                .list_snapshot()
                .iter()
                .position(|v| strict_equals(v, needle)),
            _ => None,
        }
    }

    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        match self {
            Value::Proxy(p) => p.last_index_of(needle),
            Value::Obj(o) => o
                .list_snapshot()
                .iter()
                .rposition(|v| strict_equals(v, needle)),
            _ => None,
        }
    }

    pub fn push(&self, value: Value) -> usize {
        match self {
            Value::Proxy(p) => p.push(value),
            Value::Obj(o) => o
                .list_mutate(|items| {
                    items.push(value);
                    items.len()
                })
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn pop(&self) -> Value {
        match self {
            Value::Proxy(p) => p.pop(),
            Value::Obj(o) => o
                .list_mutate(|items| items.pop())
                .flatten()
                .unwrap_or(Value::Unit),
            _ => Value::Unit,
        }
    }

    pub fn shift(&self) -> Value {
        match self {
            Value::Proxy(p) => p.shift(),
            Value::Obj(o) => o
                .list_mutate(|items| {
                    if items.is_empty() {
                        Value::Unit
                    } else {
                        items.remove(0)
                    }
                })
                .unwrap_or(Value::Unit),
            _ => Value::Unit,
        }
    }

    pub fn unshift(&self, value: Value) -> usize {
        match self {
            Value::Proxy(p) => p.unshift(value),
            Value::Obj(o) => o
                .list_mutate(|items| {
                    items.insert(0, value);
                    items.len()
                })
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        match self {
            Value::Proxy(p) => p.splice(start, delete_count, items),
            Value::Obj(o) => o
                .list_mutate(|list| {
                    let start = start.min(list.len());
                    let delete_count = delete_count.min(list.len() - start);
                    list.splice(start..start + delete_count, items)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
