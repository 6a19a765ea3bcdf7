// Integration scenarios: end-to-end behavior of the observation pipeline,
// from wrapping through tracking, triggering, and the derived primitives.

use lumen_reactive::{
    cloned, computed, create_ref, effect, effect_with_options, list, reactive, readonly, record,
    EffectOptions, Value,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
    (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)))
}

// =============================================================================
// Deep reactive SET
// =============================================================================

#[test]
fn deep_reactive_set_re_runs_reader() {
    let o = reactive(record! { "a" => 1 });
    let runs = Rc::new(Cell::new(0));
    let last = Rc::new(Cell::new(0));

    let _e = effect(cloned!(o, runs, last => move || {
        runs.set(runs.get() + 1);
        last.set(o.get("a").as_int().unwrap_or(0));
    }));
    assert_eq!(runs.get(), 1);

    o.set("a", Value::Int(2));
    assert_eq!(runs.get(), 2, "effect ran twice total");
    assert_eq!(last.get(), 2, "second run sees the new value");
}

// =============================================================================
// Sequence length shrink
// =============================================================================

#[test]
fn length_shrink_hits_truncated_readers_only() {
    let a = reactive(list![10, 20, 30, 40]);

    let (runs_tail, runs_len) = counter();
    let runs_head = Rc::new(Cell::new(0));

    let _e1 = effect(cloned!(a, runs_tail => move || {
        runs_tail.set(runs_tail.get() + 1);
        let _ = a.get(3usize);
    }));
    let _e2 = effect(cloned!(a, runs_len => move || {
        runs_len.set(runs_len.get() + 1);
        let _ = a.len();
    }));
    let _e3 = effect(cloned!(a, runs_head => move || {
        runs_head.set(runs_head.get() + 1);
        let _ = a.get(0usize);
    }));

    a.set_len(2);

    assert_eq!(runs_tail.get(), 2, "reader of a truncated slot re-ran");
    assert_eq!(runs_len.get(), 2, "length reader re-ran");
    assert_eq!(runs_head.get(), 1, "reader below the new length did not");
}

// =============================================================================
// Keyed-map iteration
// =============================================================================

#[test]
fn map_iteration_re_runs_on_value_change_only_when_changed() {
    let m = reactive(Value::map());
    m.set_entry(Value::str("k"), Value::Int(1));

    let runs = Rc::new(Cell::new(0));
    let _e = effect(cloned!(m, runs => move || {
        runs.set(runs.get() + 1);
        for _ in m.entries() {}
    }));
    assert_eq!(runs.get(), 1);

    // SET on a keyed map invalidates iteration.
    m.set_entry(Value::str("k"), Value::Int(2));
    assert_eq!(runs.get(), 2);

    // Same value again: no change, no run.
    m.set_entry(Value::str("k"), Value::Int(2));
    assert_eq!(runs.get(), 2);
}

// =============================================================================
// Conditional dependency shedding
// =============================================================================

#[test]
fn conditional_read_sheds_stale_branch() {
    let flag = create_ref(Value::Bool(true));
    let x = create_ref(Value::Int(1));
    let y = create_ref(Value::Int(2));

    let runs = Rc::new(Cell::new(0));
    let _e = effect(cloned!(flag, x, y, runs => move || {
        runs.set(runs.get() + 1);
        let _ = if flag.get_value() == Value::Bool(true) {
            x.get_value()
        } else {
            y.get_value()
        };
    }));
    assert_eq!(runs.get(), 1);

    flag.set_value(Value::Bool(false));
    assert_eq!(runs.get(), 2);

    // The x branch is no longer read; writing it must not fire.
    x.set_value(Value::Int(99));
    assert_eq!(runs.get(), 2);

    // The y branch is live.
    y.set_value(Value::Int(99));
    assert_eq!(runs.get(), 3);
}

// =============================================================================
// Computed dirty bit
// =============================================================================

#[test]
fn computed_getter_runs_lazily_and_once_per_invalidation() {
    let x = create_ref(Value::Int(3));
    let calls = Rc::new(Cell::new(0));

    let c = computed(cloned!(x, calls => move || {
        calls.set(calls.get() + 1);
        Value::Int(x.get_value().as_int().unwrap() * 2)
    }));

    assert_eq!(c.get_value(), Value::Int(6));
    assert_eq!(c.get_value(), Value::Int(6));
    assert_eq!(calls.get(), 1, "two reads, one computation");

    x.set_value(Value::Int(4));
    assert_eq!(calls.get(), 1, "write alone does not recompute");

    assert_eq!(c.get_value(), Value::Int(8));
    assert_eq!(calls.get(), 2, "read after invalidation recomputes once");
}

// =============================================================================
// Readonly refuses writes
// =============================================================================

#[test]
fn readonly_write_is_refused_without_failing_the_caller() {
    let r = readonly(record! { "a" => 1 });
    let runs = Rc::new(Cell::new(0));

    let _e = effect(cloned!(r, runs => move || {
        runs.set(runs.get() + 1);
        let _ = r.get("a");
    }));
    assert_eq!(runs.get(), 1);

    // The write returns normally, changes nothing, fires nothing.
    r.set("a", Value::Int(2));
    assert_eq!(r.get("a"), Value::Int(1));
    assert_eq!(runs.get(), 1);
}

// =============================================================================
// Recursion guard
// =============================================================================

#[test]
fn self_writing_effect_terminates_by_default() {
    let n = create_ref(Value::Int(0));
    let runs = Rc::new(Cell::new(0));

    let _e = effect(cloned!(n, runs => move || {
        runs.set(runs.get() + 1);
        let v = n.get_value().as_int().unwrap();
        n.set_value(Value::Int(v + 1));
    }));
    // First run wrote 1; the self-trigger was skipped by the guard.
    assert_eq!(runs.get(), 1);
    assert_eq!(n.get_value(), Value::Int(1));

    // An outside write re-runs it exactly once more.
    n.set_value(Value::Int(10));
    assert_eq!(runs.get(), 2);
    assert_eq!(n.get_value(), Value::Int(11));
}

#[test]
fn allow_recurse_converges_on_a_fixed_point() {
    let n = create_ref(Value::Int(0));
    let runs = Rc::new(Cell::new(0));

    // Clamp to 5: one extra invocation reaches the fixed point and stops.
    let _e = effect_with_options(
        cloned!(n, runs => move || {
            runs.set(runs.get() + 1);
            let v = n.get_value().as_int().unwrap();
            n.set_value(Value::Int(v.min(5)));
            Value::Unit
        }),
        EffectOptions {
            allow_recurse: true,
            ..Default::default()
        },
    );
    assert_eq!(runs.get(), 1, "initial value is already a fixed point");

    n.set_value(Value::Int(12));
    // Outside write runs it; the clamp writes 5, which re-enters once; the
    // re-entrant run writes 5 again, which is no change.
    assert_eq!(n.get_value(), Value::Int(5));
    assert_eq!(runs.get(), 3);
}

// =============================================================================
// Triggers snapshot their run set
// =============================================================================

#[test]
fn run_set_is_fixed_at_trigger_time() {
    let a = create_ref(Value::Int(0));
    let b = create_ref(Value::Int(0));
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(vec![]));

    // First effect writes b when a changes.
    let _e1 = effect(cloned!(a, b, log => move || {
        let v = a.get_value();
        log.borrow_mut().push("writer");
        if v != Value::Int(0) {
            b.set_value(v);
        }
    }));
    // Second effect reads only a.
    let _e2 = effect(cloned!(a, log => move || {
        let _ = a.get_value();
        log.borrow_mut().push("reader");
    }));

    log.borrow_mut().clear();
    a.set_value(Value::Int(1));

    // Both subscribers of `a` ran exactly once for this trigger; the nested
    // write to `b` did not re-enter them.
    let runs = log.borrow();
    assert_eq!(
        runs.iter().filter(|s| **s == "writer").count(),
        1,
        "writer ran once"
    );
    assert_eq!(
        runs.iter().filter(|s| **s == "reader").count(),
        1,
        "reader ran once"
    );
}

// =============================================================================
// Boundary behaviors
// =============================================================================

#[test]
fn empty_sequence_zero_length_write_is_silent() {
    let a = reactive(Value::list(vec![]));
    let runs = Rc::new(Cell::new(0));
    let _e = effect(cloned!(a, runs => move || {
        runs.set(runs.get() + 1);
        let _ = a.len();
    }));
    assert_eq!(runs.get(), 1);

    a.set_len(0);
    assert_eq!(runs.get(), 1, "no change, no trigger");
}

#[test]
fn deleting_a_missing_key_is_silent() {
    let o = reactive(record! { "a" => 1 });
    let runs = Rc::new(Cell::new(0));
    let _e = effect(cloned!(o, runs => move || {
        runs.set(runs.get() + 1);
        let _ = o.keys();
    }));
    assert_eq!(runs.get(), 1);

    assert!(!o.delete("nope"));
    assert_eq!(runs.get(), 1);
}

#[test]
fn ref_in_a_sequence_slot_is_not_unwrapped() {
    let cell = create_ref(Value::Int(5));
    let xs = reactive(Value::list(vec![]));
    xs.push(cell.clone());

    let slot = xs.get(0usize);
    assert!(lumen_reactive::is_ref(&slot));
    assert_eq!(slot, cell);
    assert_eq!(slot.get_value(), Value::Int(5));
}

#[test]
fn readonly_over_reactive_does_not_track() {
    let target = record! { "a" => 1 };
    let inner = reactive(target.clone());
    let outer = readonly(inner.clone());

    let runs = Rc::new(Cell::new(0));
    let _e = effect(cloned!(outer, runs => move || {
        runs.set(runs.get() + 1);
        let _ = outer.get("a");
    }));
    assert_eq!(runs.get(), 1);

    // Writes through the inner mutable wrapper do not reach the readonly
    // reader: readonly reads never track, even over a reactive wrapper.
    inner.set("a", Value::Int(2));
    assert_eq!(runs.get(), 1);
    assert_eq!(outer.get("a"), Value::Int(2));
}

#[test]
fn computed_chain_through_records_and_sequences() {
    let state = reactive(record! { "items" => list![1, 2, 3] });

    let total = computed(cloned!(state => move || {
        let items = state.get("items");
        let mut sum = 0;
        for i in 0..items.len() {
            sum += items.get(i).as_int().unwrap_or(0);
        }
        Value::Int(sum)
    }));

    assert_eq!(total.get_value(), Value::Int(6));

    state.get("items").push(Value::Int(10));
    assert_eq!(total.get_value(), Value::Int(16));

    state.get("items").set(0usize, Value::Int(100));
    assert_eq!(total.get_value(), Value::Int(115));
}

#[test]
fn debug_hooks_observe_track_and_trigger() {
    let o = reactive(record! { "a" => 1 });
    let tracked: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(vec![]));
    let triggered = Rc::new(Cell::new(0));

    let _e = effect_with_options(
        cloned!(o => move || {
            let _ = o.get("a");
            Value::Unit
        }),
        EffectOptions {
            on_track: Some(Rc::new(cloned!(tracked => move |event| {
                tracked.borrow_mut().push(format!("{:?}", event.key));
            }))),
            on_trigger: Some(Rc::new(cloned!(triggered => move |_event| {
                triggered.set(triggered.get() + 1);
            }))),
            ..Default::default()
        },
    );

    assert_eq!(tracked.borrow().len(), 1, "one edge gained on first run");
    assert_eq!(triggered.get(), 0);

    o.set("a", Value::Int(2));
    assert_eq!(triggered.get(), 1, "one trigger observed");
}
