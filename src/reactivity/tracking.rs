// ============================================================================
// lumen-reactive - Tracker
// track / trigger: reading and writing the dependency graph
// ============================================================================
//
// The graph is mutated by the very computations that read from it, so the
// discipline here is collect-then-run: every trigger assembles its run set
// from detached snapshots before executing anything. Writes performed by the
// effects it runs cannot retroactively join that run set.
// ============================================================================

use std::rc::Rc;

use crate::core::context::with_context;
use crate::core::key::Key;
use crate::core::ops::{TrackOp, TriggerOp};
use crate::core::value::{Obj, TargetKind, Value};
use crate::primitives::effect::{run_effect, Effect, EffectInner};
use crate::reactivity::dep::Dep;
use crate::reactivity::registry;

// =============================================================================
// DEBUG EVENTS
// =============================================================================

/// Payload delivered to an effect's `on_track` hook when it gains an edge.
#[derive(Clone, Debug)]
pub struct TrackEvent {
    pub target: Value,
    pub op: TrackOp,
    pub key: Key,
}

/// Payload delivered to an effect's `on_trigger` hook before it is scheduled.
///
/// `old_collection` carries the pre-`CLEAR` snapshot of a keyed map or
/// unique set; it is `None` for every other operation.
#[derive(Clone, Debug)]
pub struct TriggerEvent {
    pub target: Value,
    pub op: TriggerOp,
    pub key: Option<Key>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    pub old_collection: Option<Value>,
}

// =============================================================================
// TRACK
// =============================================================================

/// Record `(target, key)` as a dependency of the running effect.
///
/// No-op when tracking is disabled or no effect is running. The edge is
/// mirrored on both sides: the DepSet gains the effect, the effect gains the
/// DepSet.
pub fn track(target: &Obj, op: TrackOp, key: Key) {
    let Some(effect) = current_subscriber() else {
        return;
    };
    // Creation can be unconditional: this thread is about to subscribe.
    let Some(dep) = registry::get_dep(target, &key, true) else {
        return;
    };
    attach(&effect, &dep, || TrackEvent {
        target: Value::Obj(target.clone()),
        op,
        key: key.clone(),
    });
}

/// Track a self-keyed cell (ref or computed): same edge discipline, but the
/// DepSet lives on the cell instead of in the registry index.
pub(crate) fn track_cell(dep: &Dep, describe: impl FnOnce() -> Value, op: TrackOp, key: Key) {
    let Some(effect) = current_subscriber() else {
        return;
    };
    attach(&effect, dep, || TrackEvent {
        target: describe(),
        op,
        key,
    });
}

fn current_subscriber() -> Option<Rc<EffectInner>> {
    with_context(|ctx| {
        if !ctx.tracking_enabled() {
            return None;
        }
        ctx.active_effect()
    })
}

fn attach(effect: &Rc<EffectInner>, dep: &Dep, event: impl FnOnce() -> TrackEvent) {
    if dep.contains(effect) {
        return;
    }
    dep.add(effect);
    effect.record_dep(dep.clone());
    if let Some(hook) = effect.on_track() {
        hook(&event());
    }
}

// =============================================================================
// TRIGGER
// =============================================================================

/// Schedule every effect subscribed to a write on `(target, key)`.
///
/// The run set is assembled atomically from the graph state at call time,
/// de-duplicated, and executed once per effect. The currently-running effect
/// is skipped unless it opted into recursion.
pub fn trigger(
    target: &Obj,
    op: TriggerOp,
    key: Option<Key>,
    new_value: Option<Value>,
    old_value: Option<Value>,
    old_collection: Option<Value>,
) {
    let all = registry::key_deps(target);
    if all.is_empty() {
        return;
    }

    fn find(all: &[(Key, Dep)], wanted: &Key) -> Option<Dep> {
        all.iter()
            .find(|(k, _)| k == wanted)
            .map(|(_, d)| d.clone())
    }

    let kind = target.kind();
    let mut deps: Vec<Dep> = Vec::new();

    if op == TriggerOp::Clear {
        // Emptying the container invalidates everything recorded for it.
        for (_, d) in &all {
            deps.push(d.clone());
        }
    } else if kind == TargetKind::List && key == Some(Key::Length) {
        // Length writes invalidate the length slot and every index at or
        // past the new end.
        let new_len = target.list_len();
        for (k, d) in &all {
            match k {
                Key::Length => deps.push(d.clone()),
                Key::Index(i) if *i >= new_len => deps.push(d.clone()),
                _ => {}
            }
        }
    } else {
        if let Some(k) = &key {
            deps.extend(find(&all, k));
        }
        match op {
            TriggerOp::Add => {
                if kind == TargetKind::List {
                    // A new slot is also a length change.
                    deps.extend(find(&all, &Key::Length));
                } else if kind.is_map_like() {
                    deps.extend(find(&all, &Key::Iterate));
                    deps.extend(find(&all, &Key::MapKeyIterate));
                } else {
                    deps.extend(find(&all, &Key::Iterate));
                }
            }
            TriggerOp::Delete => {
                if kind != TargetKind::List {
                    deps.extend(find(&all, &Key::Iterate));
                    if kind.is_map_like() {
                        deps.extend(find(&all, &Key::MapKeyIterate));
                    }
                }
            }
            TriggerOp::Set => {
                // Map iteration observes values, so a value change
                // invalidates it; keys-only enumeration is unaffected.
                if kind.is_map_like() {
                    deps.extend(find(&all, &Key::Iterate));
                }
            }
            TriggerOp::Clear => unreachable!("handled above"),
        }
    }

    let event = TriggerEvent {
        target: Value::Obj(target.clone()),
        op,
        key,
        new_value,
        old_value,
        old_collection,
    };
    run_scheduled(collect_run_set(deps), &event);
}

/// Trigger a self-keyed cell (ref or computed).
pub(crate) fn trigger_cell(
    dep: &Dep,
    target: Value,
    new_value: Option<Value>,
    old_value: Option<Value>,
) {
    let event = TriggerEvent {
        target,
        op: TriggerOp::Set,
        key: Some(Key::prop("value")),
        new_value,
        old_value,
        old_collection: None,
    };
    run_scheduled(collect_run_set(vec![dep.clone()]), &event);
}

/// De-duplicated union of the given DepSets, with the recursion guard
/// applied: the active effect joins only when it allows recursion.
fn collect_run_set(deps: Vec<Dep>) -> Vec<Rc<EffectInner>> {
    let active = with_context(|ctx| ctx.active_effect());
    let mut run_set: Vec<Rc<EffectInner>> = Vec::new();
    for dep in deps {
        for effect in dep.snapshot() {
            if run_set.iter().any(|e| Rc::ptr_eq(e, &effect)) {
                continue;
            }
            if let Some(a) = &active {
                if Rc::ptr_eq(a, &effect) && !effect.allow_recurse() {
                    continue;
                }
            }
            run_set.push(effect);
        }
    }
    run_set
}

fn run_scheduled(run_set: Vec<Rc<EffectInner>>, event: &TriggerEvent) {
    for effect in run_set {
        if let Some(hook) = effect.on_trigger() {
            hook(event);
        }
        match effect.scheduler() {
            Some(scheduler) => scheduler(&Effect::from_inner(effect.clone())),
            None => {
                run_effect(&effect);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
