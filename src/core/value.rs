// ============================================================================
// lumen-reactive - Dynamic Value Model
// The observable value substrate: scalars, shared containers, refs, proxies
// ============================================================================
//
// Rust has no transparent property interception, so observation happens
// through an explicit accessor API over a dynamic value model. Scalars are
// copied; containers are shared `Rc` cells with pointer identity, which is
// what the dependency registry keys on.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;

use crate::core::context::next_object_id;
use crate::core::key::Key;
use crate::primitives::reference::AnyRef;
use crate::proxy::Reactive;
use crate::reactivity::equality::{same_value_zero, strict_equals};

/// Insertion-ordered map with the fast rustc hasher.
pub(crate) type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;
/// Insertion-ordered set with the fast rustc hasher.
pub(crate) type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

// =============================================================================
// TARGET KINDS
// =============================================================================

/// The container shapes eligible for observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Plain record: string-keyed fields.
    Record,
    /// Ordered sequence: integer-indexed slots plus a length.
    List,
    /// Keyed map: arbitrary value keys.
    Map,
    /// Unique set: arbitrary value members.
    Set,
    /// Keyed map without size/clear/iteration surface.
    WeakMap,
    /// Unique set without size/clear/iteration surface.
    WeakSet,
}

impl TargetKind {
    /// Keyed-map semantics (including the weak variant).
    pub fn is_map_like(self) -> bool {
        matches!(self, TargetKind::Map | TargetKind::WeakMap)
    }

    /// Unique-set semantics (including the weak variant).
    pub fn is_set_like(self) -> bool {
        matches!(self, TargetKind::Set | TargetKind::WeakSet)
    }

    /// Weak variants drop the enumeration surface.
    pub fn is_weak(self) -> bool {
        matches!(self, TargetKind::WeakMap | TargetKind::WeakSet)
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// A dynamically-typed observable value.
///
/// Cloning a `Value` copies scalars and shares containers, refs, and proxies.
/// Equality (`==`) follows strict-equality semantics: scalars by numeric or
/// textual value (`NaN != NaN`), containers/refs/proxies by identity.
#[derive(Clone)]
pub enum Value {
    /// The absent value (`undefined` in the host templates).
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// A shared container target.
    Obj(Obj),
    /// A single reactive cell (plain ref or computed).
    Ref(Rc<dyn AnyRef>),
    /// An observation wrapper over a container target.
    Proxy(Reactive),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    /// New empty record target.
    pub fn record() -> Value {
        Value::Obj(TargetCell::new(
            TargetKind::Record,
            ObjData::Record(FxIndexMap::default()),
        ))
    }

    /// New sequence target from initial items.
    pub fn list(items: Vec<Value>) -> Value {
        Value::Obj(TargetCell::new(TargetKind::List, ObjData::List(items)))
    }

    /// New empty keyed-map target.
    pub fn map() -> Value {
        Value::Obj(TargetCell::new(
            TargetKind::Map,
            ObjData::Map(FxIndexMap::default()),
        ))
    }

    /// New empty unique-set target.
    pub fn set() -> Value {
        Value::Obj(TargetCell::new(
            TargetKind::Set,
            ObjData::Set(FxIndexSet::default()),
        ))
    }

    /// New empty weak keyed-map target.
    pub fn weak_map() -> Value {
        Value::Obj(TargetCell::new(
            TargetKind::WeakMap,
            ObjData::Map(FxIndexMap::default()),
        ))
    }

    /// New empty weak unique-set target.
    pub fn weak_set() -> Value {
        Value::Obj(TargetCell::new(
            TargetKind::WeakSet,
            ObjData::Set(FxIndexSet::default()),
        ))
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    /// Containers are the only values eligible for wrapping.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Obj(_))
    }

    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Value::Obj(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Reactive> {
        match self {
            Value::Proxy(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short name for warnings.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Obj(o) => match o.kind() {
                TargetKind::Record => "record",
                TargetKind::List => "list",
                TargetKind::Map => "map",
                TargetKind::Set => "set",
                TargetKind::WeakMap => "weak map",
                TargetKind::WeakSet => "weak set",
            },
            Value::Ref(_) => "ref",
            Value::Proxy(_) => "proxy",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        strict_equals(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Containers print shallowly: nested data may be cyclic.
        match self {
            Value::Unit => write!(f, "Unit"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Obj(o) => write!(f, "{:?}#{}", o.kind(), o.id()),
            Value::Ref(_) => write!(f, "Ref"),
            Value::Proxy(p) => {
                write!(f, "Proxy({:?}, {:?}#{})", p.flavor(), p.raw().kind(), p.raw().id())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Value {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Value {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Value {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::str(s)
    }
}

impl From<Obj> for Value {
    fn from(o: Obj) -> Value {
        Value::Obj(o)
    }
}

// =============================================================================
// VALUE KEY
// =============================================================================

/// Hash/equality wrapper for values used as map keys or set members.
///
/// Key equality is same-value-zero: `NaN` matches `NaN` and the two zeros
/// match each other. Containers, refs, and proxies key by identity. Floats
/// hash by normalized bit pattern so hashing agrees with equality.
#[derive(Clone)]
pub struct ValueKey(pub Value);

impl ValueKey {
    fn numeric_bits(&self) -> Option<u64> {
        let x = match &self.0 {
            Value::Int(i) => *i as f64,
            Value::Float(x) => *x,
            _ => return None,
        };
        if x.is_nan() {
            Some(f64::NAN.to_bits())
        } else if x == 0.0 {
            Some(0.0_f64.to_bits())
        } else {
            Some(x.to_bits())
        }
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        same_value_zero(&self.0, &other.0)
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Unit => state.write_u8(0),
            Value::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Value::Int(_) | Value::Float(_) => {
                state.write_u8(2);
                // numeric_bits is Some for both arms
                if let Some(bits) = self.numeric_bits() {
                    bits.hash(state);
                }
            }
            Value::Str(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            Value::Obj(o) => {
                state.write_u8(4);
                (Rc::as_ptr(o) as usize).hash(state);
            }
            Value::Ref(r) => {
                state.write_u8(5);
                (Rc::as_ptr(r) as *const () as usize).hash(state);
            }
            Value::Proxy(p) => {
                state.write_u8(6);
                p.identity().hash(state);
            }
        }
    }
}

impl fmt::Debug for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<Value> for ValueKey {
    fn from(v: Value) -> ValueKey {
        ValueKey(v)
    }
}

// =============================================================================
// TARGET CELL
// =============================================================================

/// A shared container target: the original value a caller asked to observe.
pub type Obj = Rc<TargetCell>;

pub(crate) enum ObjData {
    Record(FxIndexMap<Rc<str>, Value>),
    List(Vec<Value>),
    Map(FxIndexMap<ValueKey, Value>),
    Set(FxIndexSet<ValueKey>),
}

/// The storage behind an [`Obj`]: kind, data, and the wrap opt-out flags.
pub struct TargetCell {
    id: u64,
    kind: TargetKind,
    data: RefCell<ObjData>,
    skip: Cell<bool>,
    frozen: Cell<bool>,
}

impl TargetCell {
    pub(crate) fn new(kind: TargetKind, data: ObjData) -> Obj {
        Rc::new(TargetCell {
            id: next_object_id(),
            kind,
            data: RefCell::new(data),
            skip: Cell::new(false),
            frozen: Cell::new(false),
        })
    }

    /// Process-unique (per thread) identity, stable for the cell's lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Opt this target out of wrapping. Set by `mark_raw`.
    pub fn mark_skip(&self) {
        self.skip.set(true);
    }

    pub fn is_skipped(&self) -> bool {
        self.skip.get()
    }

    /// Frozen targets pass through `wrap` unchanged.
    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    // =========================================================================
    // Raw record/sequence operations (no tracking, no triggering)
    // =========================================================================

    pub(crate) fn raw_get(&self, key: &Key) -> Value {
        let data = self.data.borrow();
        match (&*data, key) {
            (ObjData::Record(fields), Key::Prop(name)) => {
                fields.get(name).cloned().unwrap_or(Value::Unit)
            }
            (ObjData::List(items), Key::Index(i)) => {
                items.get(*i).cloned().unwrap_or(Value::Unit)
            }
            (ObjData::List(items), Key::Length) => Value::Int(items.len() as i64),
            _ => Value::Unit,
        }
    }

    /// Performs a keyed write. Returns `(had_key, old_value)`.
    pub(crate) fn raw_set(&self, key: &Key, value: Value) -> (bool, Value) {
        let mut data = self.data.borrow_mut();
        match (&mut *data, key) {
            (ObjData::Record(fields), Key::Prop(name)) => match fields.insert(name.clone(), value)
            {
                Some(old) => (true, old),
                None => (false, Value::Unit),
            },
            (ObjData::List(items), Key::Index(i)) => {
                let i = *i;
                if i < items.len() {
                    let old = std::mem::replace(&mut items[i], value);
                    (true, old)
                } else {
                    // Writing past the end extends the sequence with units,
                    // matching sparse-assignment semantics.
                    items.resize(i, Value::Unit);
                    items.push(value);
                    (false, Value::Unit)
                }
            }
            _ => (false, Value::Unit),
        }
    }

    pub(crate) fn raw_delete(&self, key: &Key) -> Option<Value> {
        let mut data = self.data.borrow_mut();
        match (&mut *data, key) {
            (ObjData::Record(fields), Key::Prop(name)) => fields.shift_remove(name),
            (ObjData::List(items), Key::Index(i)) => {
                // Deleting a sequence slot leaves a unit hole; length is
                // unchanged, as in the host language.
                if *i < items.len() {
                    Some(std::mem::replace(&mut items[*i], Value::Unit))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub(crate) fn raw_has(&self, key: &Key) -> bool {
        let data = self.data.borrow();
        match (&*data, key) {
            (ObjData::Record(fields), Key::Prop(name)) => fields.contains_key(name),
            (ObjData::List(items), Key::Index(i)) => *i < items.len(),
            (ObjData::List(_), Key::Length) => true,
            _ => false,
        }
    }

    pub(crate) fn raw_keys(&self) -> Vec<Key> {
        let data = self.data.borrow();
        match &*data {
            ObjData::Record(fields) => fields.keys().map(|k| Key::Prop(k.clone())).collect(),
            ObjData::List(items) => (0..items.len()).map(Key::Index).collect(),
            ObjData::Map(entries) => entries
                .keys()
                .map(|k| Key::Entry(k.clone()))
                .collect(),
            ObjData::Set(members) => members.iter().map(|k| Key::Entry(k.clone())).collect(),
        }
    }

    // =========================================================================
    // Raw sequence helpers
    // =========================================================================

    pub(crate) fn list_len(&self) -> usize {
        match &*self.data.borrow() {
            ObjData::List(items) => items.len(),
            _ => 0,
        }
    }

    /// Truncates or unit-extends the sequence. Returns the previous length.
    pub(crate) fn list_resize(&self, new_len: usize) -> usize {
        let mut data = self.data.borrow_mut();
        match &mut *data {
            ObjData::List(items) => {
                let old = items.len();
                items.resize(new_len, Value::Unit);
                old
            }
            _ => 0,
        }
    }

    pub(crate) fn list_snapshot(&self) -> Vec<Value> {
        match &*self.data.borrow() {
            ObjData::List(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn list_mutate<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
        let mut data = self.data.borrow_mut();
        match &mut *data {
            ObjData::List(items) => Some(f(items)),
            _ => None,
        }
    }

    // =========================================================================
    // Raw keyed-map / unique-set operations
    // =========================================================================

    pub(crate) fn entry_get(&self, key: &ValueKey) -> Option<Value> {
        match &*self.data.borrow() {
            ObjData::Map(entries) => entries.get(key).cloned(),
            _ => None,
        }
    }

    pub(crate) fn entry_has(&self, key: &ValueKey) -> bool {
        match &*self.data.borrow() {
            ObjData::Map(entries) => entries.contains_key(key),
            ObjData::Set(members) => members.contains(key),
            _ => false,
        }
    }

    /// Map insert. Returns `(had_key, old_value)`.
    pub(crate) fn entry_set(&self, key: ValueKey, value: Value) -> (bool, Value) {
        let mut data = self.data.borrow_mut();
        match &mut *data {
            ObjData::Map(entries) => match entries.insert(key, value) {
                Some(old) => (true, old),
                None => (false, Value::Unit),
            },
            _ => (false, Value::Unit),
        }
    }

    /// Set insert. Returns true when the member was new.
    pub(crate) fn entry_add(&self, key: ValueKey) -> bool {
        let mut data = self.data.borrow_mut();
        match &mut *data {
            ObjData::Set(members) => members.insert(key),
            _ => false,
        }
    }

    pub(crate) fn entry_delete(&self, key: &ValueKey) -> Option<Value> {
        let mut data = self.data.borrow_mut();
        match &mut *data {
            ObjData::Map(entries) => entries.shift_remove(key),
            ObjData::Set(members) => {
                if members.shift_remove(key) {
                    Some(key.0.clone())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub(crate) fn entry_size(&self) -> usize {
        match &*self.data.borrow() {
            ObjData::Map(entries) => entries.len(),
            ObjData::Set(members) => members.len(),
            _ => 0,
        }
    }

    /// `(key, value)` pairs in insertion order; sets yield `(member, member)`.
    pub(crate) fn entries(&self) -> Vec<(Value, Value)> {
        match &*self.data.borrow() {
            ObjData::Map(entries) => entries
                .iter()
                .map(|(k, v)| (k.0.clone(), v.clone()))
                .collect(),
            ObjData::Set(members) => members
                .iter()
                .map(|k| (k.0.clone(), k.0.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Empties the container and returns a detached snapshot cell holding the
    /// prior contents, for the `on_trigger` debug hook.
    pub(crate) fn entry_clear(&self) -> Obj {
        let mut data = self.data.borrow_mut();
        match &mut *data {
            ObjData::Map(entries) => {
                let old = std::mem::take(entries);
                TargetCell::new(self.kind, ObjData::Map(old))
            }
            ObjData::Set(members) => {
                let old = std::mem::take(members);
                TargetCell::new(self.kind, ObjData::Set(old))
            }
            _ => TargetCell::new(self.kind, ObjData::Record(FxIndexMap::default())),
        }
    }
}

impl fmt::Debug for TargetCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = match &*self.data.borrow() {
            ObjData::Record(fields) => fields.len(),
            ObjData::List(items) => items.len(),
            ObjData::Map(entries) => entries.len(),
            ObjData::Set(members) => members.len(),
        };
        write!(f, "{:?}#{}[{} entries]", self.kind, self.id, len)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_equality() {
        assert_eq!(Value::Int(3), Value::Int(3));
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::str("a"), Value::str("a"));
        assert_ne!(Value::str("a"), Value::str("b"));
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn container_identity() {
        let a = Value::record();
        let b = Value::record();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn record_raw_roundtrip() {
        let obj = Value::record();
        let cell = obj.as_obj().unwrap();
        let (had, _) = cell.raw_set(&Key::prop("a"), Value::Int(1));
        assert!(!had);
        assert_eq!(cell.raw_get(&Key::prop("a")), Value::Int(1));
        assert!(cell.raw_has(&Key::prop("a")));
        let (had, old) = cell.raw_set(&Key::prop("a"), Value::Int(2));
        assert!(had);
        assert_eq!(old, Value::Int(1));
        assert_eq!(cell.raw_delete(&Key::prop("a")), Some(Value::Int(2)));
        assert_eq!(cell.raw_get(&Key::prop("a")), Value::Unit);
    }

    #[test]
    fn list_raw_operations() {
        let obj = Value::list(vec![Value::Int(10), Value::Int(20)]);
        let cell = obj.as_obj().unwrap();
        assert_eq!(cell.list_len(), 2);
        assert_eq!(cell.raw_get(&Key::Index(1)), Value::Int(20));
        assert_eq!(cell.raw_get(&Key::Length), Value::Int(2));

        // In-bounds write replaces.
        let (had, old) = cell.raw_set(&Key::Index(0), Value::Int(11));
        assert!(had);
        assert_eq!(old, Value::Int(10));

        // Past-the-end write unit-extends.
        let (had, _) = cell.raw_set(&Key::Index(4), Value::Int(50));
        assert!(!had);
        assert_eq!(cell.list_len(), 5);
        assert_eq!(cell.raw_get(&Key::Index(3)), Value::Unit);

        let old_len = cell.list_resize(2);
        assert_eq!(old_len, 5);
        assert_eq!(cell.list_len(), 2);
    }

    #[test]
    fn map_raw_entries() {
        let obj = Value::map();
        let cell = obj.as_obj().unwrap();
        let key = ValueKey(Value::str("k"));
        let (had, _) = cell.entry_set(key.clone(), Value::Int(1));
        assert!(!had);
        assert_eq!(cell.entry_get(&key), Some(Value::Int(1)));
        assert_eq!(cell.entry_size(), 1);

        let snapshot = cell.entry_clear();
        assert_eq!(cell.entry_size(), 0);
        assert_eq!(snapshot.entry_size(), 1);
    }

    #[test]
    fn value_key_same_value_zero() {
        let nan_a = ValueKey(Value::Float(f64::NAN));
        let nan_b = ValueKey(Value::Float(f64::NAN));
        assert_eq!(nan_a, nan_b);
        assert_eq!(ValueKey(Value::Float(0.0)), ValueKey(Value::Float(-0.0)));
        assert_eq!(ValueKey(Value::Int(2)), ValueKey(Value::Float(2.0)));

        // Hash agreement for keys that compare equal.
        let obj = Value::set();
        let cell = obj.as_obj().unwrap();
        assert!(cell.entry_add(ValueKey(Value::Float(f64::NAN))));
        assert!(!cell.entry_add(ValueKey(Value::Float(f64::NAN))));
        assert!(cell.entry_has(&ValueKey(Value::Float(f64::NAN))));
        assert!(cell.entry_add(ValueKey(Value::Int(2))));
        assert!(!cell.entry_add(ValueKey(Value::Float(2.0))));
    }

    #[test]
    fn skip_and_frozen_flags() {
        let obj = Value::record();
        let cell = obj.as_obj().unwrap();
        assert!(!cell.is_skipped());
        assert!(!cell.is_frozen());
        cell.mark_skip();
        cell.freeze();
        assert!(cell.is_skipped());
        assert!(cell.is_frozen());
    }
}
