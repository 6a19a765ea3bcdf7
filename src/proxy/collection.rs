// ============================================================================
// lumen-reactive - Collection Interceptor
// Keyed maps and unique sets: state is reached only through method shims
// ============================================================================
//
// Keys normalize to raw before every lookup and mutation, so a caller holding
// the wrapped form of a key still lands on the same entry. Weak variants keep
// only the keyed surface: size, clear, and iteration warn and answer empty.
// ============================================================================

use crate::core::key::Key;
use crate::core::ops::{TrackOp, TriggerOp};
use crate::core::value::{Value, ValueKey};
use crate::proxy::{wrap, Reactive};
use crate::reactivity::equality::has_changed;
use crate::reactivity::registry::to_raw;
use crate::reactivity::tracking::{track, trigger};

impl Reactive {
    fn wrap_entry(&self, value: Value) -> Value {
        if self.flavor().is_shallow() {
            value
        } else if value.is_container() {
            wrap(value, self.flavor())
        } else {
            value
        }
    }

    fn entry_key(&self, key: &Value) -> ValueKey {
        ValueKey(to_raw(key))
    }

    /// Weak containers only accept identity-bearing keys.
    fn valid_weak_key(&self, key: &Value) -> bool {
        if !self.kind().is_weak() {
            return true;
        }
        let ok = matches!(key, Value::Obj(_) | Value::Ref(_) | Value::Proxy(_));
        if !ok {
            tracing::warn!(
                "weak collections only accept containers, refs, or proxies as keys"
            );
        }
        ok
    }

    /// Guard for the enumeration surface weak variants do not have.
    fn refuse_weak(&self, method: &str) -> bool {
        if self.kind().is_weak() {
            tracing::warn!("{method} is not available on weak collections");
            return true;
        }
        false
    }

    // =========================================================================
    // READ-TYPE SHIMS
    // =========================================================================

    /// Keyed-map read. Tracks the entry; deep flavors wrap the result.
    pub fn entry(&self, key: &Value) -> Value {
        if !self.kind().is_map_like() {
            tracing::warn!("entry: target is not a keyed map");
            return Value::Unit;
        }
        if !self.valid_weak_key(key) {
            return Value::Unit;
        }
        let raw = self.raw();
        let entry_key = self.entry_key(key);
        if !self.flavor().is_readonly() {
            track(&raw, TrackOp::Get, Key::Entry(entry_key.clone()));
        }
        match raw.entry_get(&entry_key) {
            Some(value) => self.wrap_entry(value),
            None => Value::Unit,
        }
    }

    /// Membership test for keyed maps and unique sets.
    pub fn has_entry(&self, key: &Value) -> bool {
        if !self.valid_weak_key(key) {
            return false;
        }
        let raw = self.raw();
        let entry_key = self.entry_key(key);
        if !self.flavor().is_readonly() {
            track(&raw, TrackOp::Has, Key::Entry(entry_key.clone()));
        }
        raw.entry_has(&entry_key)
    }

    /// Entry count. Tracks the whole-container enumeration.
    pub fn size(&self) -> usize {
        if self.refuse_weak("size") {
            return 0;
        }
        let raw = self.raw();
        if !self.flavor().is_readonly() {
            track(&raw, TrackOp::Iterate, Key::Iterate);
        }
        raw.entry_size()
    }

    /// Visit every entry as `(value, key)`, both in wrapped form. Sets pass
    /// the member for both.
    pub fn for_each(&self, mut f: impl FnMut(&Value, &Value)) {
        if self.refuse_weak("for_each") {
            return;
        }
        let raw = self.raw();
        if !self.flavor().is_readonly() {
            track(&raw, TrackOp::Iterate, Key::Iterate);
        }
        for (key, value) in raw.entries() {
            f(&self.wrap_entry(value), &self.wrap_entry(key));
        }
    }

    /// `(key, value)` snapshot in insertion order, wrapped.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        if self.refuse_weak("entries") {
            return Vec::new();
        }
        let raw = self.raw();
        if !self.flavor().is_readonly() {
            track(&raw, TrackOp::Iterate, Key::Iterate);
        }
        raw.entries()
            .into_iter()
            .map(|(k, v)| (self.wrap_entry(k), self.wrap_entry(v)))
            .collect()
    }

    /// Keys-only snapshot. On keyed maps this tracks the keys-only sentinel,
    /// so value-only writes do not invalidate it.
    pub fn entry_keys(&self) -> Vec<Value> {
        if self.refuse_weak("entry_keys") {
            return Vec::new();
        }
        let raw = self.raw();
        if !self.flavor().is_readonly() {
            let sentinel = if raw.kind().is_map_like() {
                Key::MapKeyIterate
            } else {
                Key::Iterate
            };
            track(&raw, TrackOp::Iterate, sentinel);
        }
        raw.entries()
            .into_iter()
            .map(|(k, _)| self.wrap_entry(k))
            .collect()
    }

    /// Values-only snapshot, wrapped.
    pub fn entry_values(&self) -> Vec<Value> {
        if self.refuse_weak("entry_values") {
            return Vec::new();
        }
        let raw = self.raw();
        if !self.flavor().is_readonly() {
            track(&raw, TrackOp::Iterate, Key::Iterate);
        }
        raw.entries()
            .into_iter()
            .map(|(_, v)| self.wrap_entry(v))
            .collect()
    }

    // =========================================================================
    // MUTATING SHIMS
    // =========================================================================

    /// Keyed-map write.
    pub fn set_entry(&self, key: Value, value: Value) {
        if self.flavor().is_readonly() {
            tracing::warn!("set_entry ignored: target is readonly");
            return;
        }
        if !self.kind().is_map_like() {
            tracing::warn!("set_entry: target is not a keyed map");
            return;
        }
        if !self.valid_weak_key(&key) {
            return;
        }
        let raw = self.raw();
        let entry_key = self.entry_key(&key);
        let value = if self.flavor().is_shallow() {
            value
        } else {
            to_raw(&value)
        };

        let (had, old) = raw.entry_set(entry_key.clone(), value.clone());
        if !had {
            trigger(
                &raw,
                TriggerOp::Add,
                Some(Key::Entry(entry_key)),
                Some(value),
                None,
                None,
            );
        } else if has_changed(&old, &value) {
            trigger(
                &raw,
                TriggerOp::Set,
                Some(Key::Entry(entry_key)),
                Some(value),
                Some(old),
                None,
            );
        }
    }

    /// Unique-set insert.
    pub fn add_entry(&self, value: Value) {
        if self.flavor().is_readonly() {
            tracing::warn!("add_entry ignored: target is readonly");
            return;
        }
        if !self.kind().is_set_like() {
            tracing::warn!("add_entry: target is not a unique set");
            return;
        }
        if !self.valid_weak_key(&value) {
            return;
        }
        let raw = self.raw();
        let entry_key = self.entry_key(&value);
        if raw.entry_add(entry_key.clone()) {
            let member = entry_key.0.clone();
            trigger(
                &raw,
                TriggerOp::Add,
                Some(Key::Entry(entry_key)),
                Some(member),
                None,
                None,
            );
        }
    }

    /// Remove a map entry or set member. Returns whether it existed.
    pub fn delete_entry(&self, key: &Value) -> bool {
        if self.flavor().is_readonly() {
            tracing::warn!("delete_entry ignored: target is readonly");
            return false;
        }
        if !self.valid_weak_key(key) {
            return false;
        }
        let raw = self.raw();
        let entry_key = self.entry_key(key);
        match raw.entry_delete(&entry_key) {
            Some(old) => {
                trigger(
                    &raw,
                    TriggerOp::Delete,
                    Some(Key::Entry(entry_key)),
                    None,
                    Some(old),
                    None,
                );
                true
            }
            None => false,
        }
    }

    /// Empty the container. The pre-clear contents are snapshotted for the
    /// `on_trigger` debug hook.
    pub fn clear(&self) {
        if self.flavor().is_readonly() {
            tracing::warn!("clear ignored: target is readonly");
            return;
        }
        if self.refuse_weak("clear") {
            return;
        }
        let raw = self.raw();
        if raw.entry_size() == 0 {
            return;
        }
        let snapshot = raw.entry_clear();
        trigger(
            &raw,
            TriggerOp::Clear,
            None,
            None,
            None,
            Some(Value::Obj(snapshot)),
        );
    }
}

// =============================================================================
// VALUE DISPATCH
// =============================================================================

impl Value {
    pub fn entry(&self, key: &Value) -> Value {
        match self {
            Value::Proxy(p) => p.entry(key),
            Value::Obj(o) => o
                .entry_get(&ValueKey(to_raw(key)))
                .unwrap_or(Value::Unit),
            _ => Value::Unit,
        }
    }

    pub fn has_entry(&self, key: &Value) -> bool {
        match self {
            Value::Proxy(p) => p.has_entry(key),
            Value::Obj(o) => o.entry_has(&ValueKey(to_raw(key))),
            _ => false,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Value::Proxy(p) => p.size(),
            Value::Obj(o) => o.entry_size(),
            _ => 0,
        }
    }

    pub fn set_entry(&self, key: Value, value: Value) {
        match self {
            Value::Proxy(p) => p.set_entry(key, value),
            Value::Obj(o) => {
                o.entry_set(ValueKey(to_raw(&key)), value);
            }
            _ => {}
        }
    }

    pub fn add_entry(&self, value: Value) {
        match self {
            Value::Proxy(p) => p.add_entry(value),
            Value::Obj(o) => {
                o.entry_add(ValueKey(to_raw(&value)));
            }
            _ => {}
        }
    }

    pub fn delete_entry(&self, key: &Value) -> bool {
        match self {
            Value::Proxy(p) => p.delete_entry(key),
            Value::Obj(o) => o.entry_delete(&ValueKey(to_raw(key))).is_some(),
            _ => false,
        }
    }

    pub fn clear(&self) {
        match self {
            Value::Proxy(p) => p.clear(),
            Value::Obj(o) => {
                o.entry_clear();
            }
            _ => {}
        }
    }

    pub fn for_each(&self, f: impl FnMut(&Value, &Value)) {
        match self {
            Value::Proxy(p) => p.for_each(f),
            Value::Obj(o) => {
                let mut f = f;
                for (k, v) in o.entries() {
                    f(&v, &k);
                }
            }
            _ => {}
        }
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        match self {
            Value::Proxy(p) => p.entries(),
            Value::Obj(o) => o.entries(),
            _ => Vec::new(),
        }
    }

    pub fn entry_keys(&self) -> Vec<Value> {
        match self {
            Value::Proxy(p) => p.entry_keys(),
            Value::Obj(o) => o.entries().into_iter().map(|(k, _)| k).collect(),
            _ => Vec::new(),
        }
    }

    pub fn entry_values(&self) -> Vec<Value> {
        match self {
            Value::Proxy(p) => p.entry_values(),
            Value::Obj(o) => o.entries().into_iter().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
