// ============================================================================
// lumen-reactive - Reactivity core of the Lumen UI framework
// ============================================================================
//
// A runtime that observes reads and writes of dynamically-typed in-memory
// values and re-runs dependent computations when their inputs change. The
// render layer, component model, and template compiler live elsewhere; this
// crate only publishes the hooks they attach to (the per-effect scheduler
// seam and the debug events).
//
// Everything is single-threaded cooperative: each thread owns a disjoint
// registry and context.
// ============================================================================

pub mod core;
mod macros;
pub mod primitives;
pub mod proxy;
pub mod reactivity;

// Re-export core items at crate root for ergonomic access. (`self::` keeps
// the local module from colliding with the `core` crate in the prelude.)
pub use self::core::context::{
    enable_tracking, is_tracking, pause_tracking, reset_tracking, untrack,
};
pub use self::core::key::Key;
pub use self::core::ops::{
    Flavor, TrackOp, TriggerOp, IS_REACTIVE_KEY, IS_READONLY_KEY, RAW_KEY, SKIP_KEY,
};
pub use self::core::value::{Obj, TargetCell, TargetKind, Value, ValueKey};

// Primitives
pub use primitives::computed::{
    computed, computed_with_options, writable_computed, ComputedOptions,
};
pub use primitives::effect::{
    effect, effect_with_options, stop, Effect, EffectOptions, SchedulerFn, StopHook, TrackHook,
    TriggerHook,
};
pub use primitives::reference::{create_ref, create_shallow_ref, is_ref, unref, AnyRef};

// Proxy layer
pub use proxy::{reactive, readonly, shallow_reactive, shallow_readonly, Reactive};

// Reactivity functions
pub use reactivity::dep::Dep;
pub use reactivity::equality::{has_changed, same_value, same_value_zero, strict_equals};
pub use reactivity::registry::{
    get_dep, is_proxy, is_reactive, is_readonly, mark_raw, to_raw,
};
pub use reactivity::tracking::{track, trigger, TrackEvent, TriggerEvent};

// =============================================================================
// TESTS
// =============================================================================
