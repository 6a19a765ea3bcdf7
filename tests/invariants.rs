// Property-based checks of the graph invariants: edge symmetry, cleanup
// freshness, idempotent wrapping, and NaN-aware spurious-trigger suppression.
//
// The chain-reader model mirrors the runtime on purpose: each effect reads
// key 0, then keeps reading the next key while the current value is
// positive. Conditional dependencies emerge from the data, which is exactly
// the regime cleanup-on-every-run has to get right.

use proptest::prelude::*;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use lumen_reactive::{
    cloned, effect, get_dep, has_changed, is_proxy, is_reactive, reactive, to_raw, Effect, Key,
    Value,
};

const KEYS: [&str; 5] = ["k0", "k1", "k2", "k3", "k4"];
const EFFECTS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Set(usize, i64),
    Delete(usize),
    Stop(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..KEYS.len(), -2..4i64).prop_map(|(k, v)| Op::Set(k, v)),
        2 => (0..KEYS.len()).prop_map(Op::Delete),
        1 => (0..EFFECTS).prop_map(Op::Stop),
    ]
}

/// The key set a chain reader subscribes to, given the record contents.
fn chain_reads(data: &HashMap<usize, i64>) -> HashSet<usize> {
    let mut reads = HashSet::new();
    let mut j = 0;
    loop {
        reads.insert(j);
        let v = *data.get(&j).unwrap_or(&0);
        if v <= 0 || j + 1 == KEYS.len() {
            break;
        }
        j += 1;
    }
    reads
}

struct ModelEffect {
    stopped: bool,
    deps: HashSet<usize>,
}

fn spawn_chain_reader(state: &Value) -> Effect {
    let state = state.clone();
    effect(move || {
        let mut j = 0;
        loop {
            let v = state.get(KEYS[j]).as_int().unwrap_or(0);
            if v <= 0 || j + 1 == KEYS.len() {
                break;
            }
            j += 1;
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Edge symmetry and cleanup freshness under random write sequences.
    #[test]
    fn edges_stay_symmetric_and_fresh(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let state = reactive(Value::record());
        let obj_value = to_raw(&state);
        let obj = obj_value.as_obj().unwrap();

        let effects: Vec<Effect> = (0..EFFECTS).map(|_| spawn_chain_reader(&state)).collect();

        // Model state mirroring what the runtime should converge to.
        let mut data: HashMap<usize, i64> = HashMap::new();
        let mut model: Vec<ModelEffect> = (0..EFFECTS)
            .map(|_| ModelEffect { stopped: false, deps: chain_reads(&data) })
            .collect();

        for op in ops {
            match op {
                Op::Set(k, v) => {
                    let had = data.contains_key(&k);
                    let changed = !had || data[&k] != v;
                    data.insert(k, v);
                    state.set(KEYS[k], Value::Int(v));
                    if changed {
                        for m in model.iter_mut() {
                            if !m.stopped && m.deps.contains(&k) {
                                m.deps = chain_reads(&data);
                            }
                        }
                    }
                }
                Op::Delete(k) => {
                    let had = data.remove(&k).is_some();
                    state.delete(KEYS[k]);
                    if had {
                        for m in model.iter_mut() {
                            if !m.stopped && m.deps.contains(&k) {
                                m.deps = chain_reads(&data);
                            }
                        }
                    }
                }
                Op::Stop(i) => {
                    effects[i].stop();
                    model[i].stopped = true;
                    model[i].deps.clear();
                }
            }

            // After every operation, the live graph must match the model
            // exactly, and every edge must be present on both sides.
            for (i, m) in model.iter().enumerate() {
                let e = &effects[i];
                prop_assert_eq!(
                    e.subscription_count(),
                    m.deps.len(),
                    "effect {} subscription count",
                    i
                );
                for (k, name) in KEYS.iter().enumerate() {
                    let dep = get_dep(obj, &Key::prop(name), false);
                    let subscribed = dep.as_ref().map(|d| d.has_subscriber(e)).unwrap_or(false);
                    prop_assert_eq!(
                        subscribed,
                        m.deps.contains(&k),
                        "effect {} membership in dep {}",
                        i,
                        name
                    );
                    if let Some(d) = dep {
                        // Both directions of the edge agree.
                        prop_assert_eq!(d.has_subscriber(e), e.subscribes_to(&d));
                    }
                }
            }
        }
    }

    /// `wrap(wrap(t)) == wrap(t)` and `to_raw(wrap(t)) == t`, for arbitrary
    /// nesting.
    #[test]
    fn wrapping_is_idempotent(depth in 0..3usize, width in 0..3usize, seed in any::<i64>()) {
        fn build(depth: usize, width: usize, seed: i64) -> Value {
            if depth == 0 {
                return Value::Int(seed);
            }
            let rec = Value::record();
            for i in 0..width {
                rec.set(
                    format!("f{i}"),
                    build(depth - 1, width, seed.wrapping_add(i as i64)),
                );
            }
            rec
        }

        let target = build(depth, width, seed);
        let once = reactive(target.clone());
        let twice = reactive(once.clone());
        prop_assert_eq!(&once, &twice);
        prop_assert!(is_proxy(&once));
        prop_assert!(is_reactive(&once));
        prop_assert_eq!(&to_raw(&once), &target);
    }

    /// A write that does not change the value (same-value semantics) fires
    /// nothing; a changing write fires exactly once.
    #[test]
    fn no_spurious_triggers(first in scalar(), second in scalar()) {
        let state = reactive(Value::record());
        state.set("x", first.clone());

        let runs = Rc::new(Cell::new(0u32));
        let _e = effect(cloned!(state, runs => move || {
            runs.set(runs.get() + 1);
            let _ = state.get("x");
        }));
        prop_assert_eq!(runs.get(), 1);

        state.set("x", second.clone());
        let expected = if has_changed(&first, &second) { 2 } else { 1 };
        prop_assert_eq!(runs.get(), expected);

        // Writing the identical value again is always silent.
        state.set("x", second.clone());
        prop_assert_eq!(runs.get(), expected);
    }
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Unit),
        any::<bool>().prop_map(Value::Bool),
        (-3..4i64).prop_map(Value::Int),
        Just(Value::Float(0.0)),
        Just(Value::Float(-0.0)),
        Just(Value::Float(f64::NAN)),
        Just(Value::Float(f64::INFINITY)),
        (-2.0..2.0f64).prop_map(Value::Float),
        "[a-c]{0,2}".prop_map(Value::str),
    ]
}
