// ============================================================================
// lumen-reactive - Effect
// A re-runnable unit of work with a tracked subscription list
// ============================================================================
//
// Every run starts from a clean slate: the effect detaches all current
// subscriptions, then re-collects whatever the body reads this time. That is
// what makes conditional reads shed stale dependencies.
//
// Lifetime is ownership-driven: DepSets hold effects weakly, so dropping the
// last `Effect` handle releases the effect from the graph. Hold the handle
// for as long as the effect should stay live.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::context::{next_effect_id, with_context};
use crate::core::value::Value;
use crate::reactivity::dep::Dep;
use crate::reactivity::tracking::{TrackEvent, TriggerEvent};

// =============================================================================
// OPTION TYPES
// =============================================================================

/// Receives the effect when one of its dependencies triggers; the host
/// decides when (and whether) to call `run`.
pub type SchedulerFn = Rc<dyn Fn(&Effect)>;

/// Debug callback fired when the effect gains a dependency edge.
pub type TrackHook = Rc<dyn Fn(&TrackEvent)>;

/// Debug callback fired when a write schedules the effect.
pub type TriggerHook = Rc<dyn Fn(&TriggerEvent)>;

/// Finalizer fired by `stop`.
pub type StopHook = Rc<dyn Fn()>;

#[derive(Default, Clone)]
pub struct EffectOptions {
    /// Defer the initial run; the caller invokes `run` when ready.
    pub lazy: bool,
    pub scheduler: Option<SchedulerFn>,
    pub on_track: Option<TrackHook>,
    pub on_trigger: Option<TriggerHook>,
    pub on_stop: Option<StopHook>,
    /// Allow a write made during this effect's own run to re-enter it.
    pub allow_recurse: bool,
}

// =============================================================================
// EFFECT INNER
// =============================================================================

pub struct EffectInner {
    id: u64,
    active: Cell<bool>,
    func: Rc<dyn Fn() -> Value>,
    /// Subscriptions, strong side of the bidirectional edge.
    deps: RefCell<Vec<Dep>>,
    options: EffectOptions,
}

impl EffectInner {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn allow_recurse(&self) -> bool {
        self.options.allow_recurse
    }

    pub(crate) fn scheduler(&self) -> Option<SchedulerFn> {
        self.options.scheduler.clone()
    }

    pub(crate) fn on_track(&self) -> Option<TrackHook> {
        self.options.on_track.clone()
    }

    pub(crate) fn on_trigger(&self) -> Option<TriggerHook> {
        self.options.on_trigger.clone()
    }

    /// Mirror of `Dep::add`, called by the tracker.
    pub(crate) fn record_dep(&self, dep: Dep) {
        self.deps.borrow_mut().push(dep);
    }

    pub(crate) fn dep_count(&self) -> usize {
        self.deps.borrow().len()
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        // Dropping the last handle is external release; honor the finalizer.
        if self.active.get() {
            if let Some(hook) = &self.options.on_stop {
                hook();
            }
        }
    }
}

/// Detach both sides of every subscription edge.
pub(crate) fn cleanup_effect(inner: &EffectInner) {
    let deps = std::mem::take(&mut *inner.deps.borrow_mut());
    for dep in deps {
        dep.remove(inner);
    }
}

// =============================================================================
// RUN PROTOCOL
// =============================================================================

/// Scoped stack frame: pushes on creation, pops on drop, so the active-effect
/// and tracking stacks restore on panicking exits too.
struct EffectFrame;

impl EffectFrame {
    fn enter(effect: Rc<EffectInner>) -> Self {
        with_context(|ctx| ctx.push_effect(effect));
        EffectFrame
    }
}

impl Drop for EffectFrame {
    fn drop(&mut self) {
        with_context(|ctx| ctx.pop_effect());
    }
}

/// Execute an effect under the run protocol.
///
/// Stopped effects still compute on direct invocation (unless they have a
/// scheduler) but do not subscribe. A re-entrant run of an effect already on
/// the stack is a no-op unless the effect allows recursion.
pub(crate) fn run_effect(inner: &Rc<EffectInner>) -> Value {
    if !inner.active.get() {
        return if inner.options.scheduler.is_some() {
            Value::Unit
        } else {
            (inner.func)()
        };
    }

    if !inner.options.allow_recurse && with_context(|ctx| ctx.stack_contains(inner)) {
        return Value::Unit;
    }

    cleanup_effect(inner);
    let _frame = EffectFrame::enter(inner.clone());
    (inner.func)()
}

// =============================================================================
// EFFECT HANDLE
// =============================================================================

/// Owning handle to an effect.
///
/// Cloning shares the effect. When the last clone drops, the effect's weak
/// subscriptions die with it and no further triggers reach it.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    pub(crate) fn from_inner(inner: Rc<EffectInner>) -> Self {
        Effect { inner }
    }

    pub(crate) fn inner(&self) -> &Rc<EffectInner> {
        &self.inner
    }

    pub fn id(&self) -> u64 {
        self.inner.id()
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Run the effect body under the run protocol, returning its result.
    /// Failures propagate; the stacks are restored either way.
    pub fn run(&self) -> Value {
        run_effect(&self.inner)
    }

    /// Detach all subscriptions, fire `on_stop`, and deactivate. Idempotent.
    pub fn stop(&self) {
        if self.inner.active.get() {
            cleanup_effect(&self.inner);
            if let Some(hook) = &self.inner.options.on_stop {
                hook();
            }
            self.inner.active.set(false);
        }
    }

    /// Number of DepSets this effect is currently subscribed to.
    pub fn subscription_count(&self) -> usize {
        self.inner.dep_count()
    }

    /// Whether the given DepSet is on this effect's subscription list.
    pub fn subscribes_to(&self, dep: &Dep) -> bool {
        self.inner.deps.borrow().iter().any(|d| d.ptr_eq(dep))
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("active", &self.inner.active.get())
            .field("subscriptions", &self.inner.dep_count())
            .finish()
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create an effect from a plain closure and run it once immediately.
///
/// Reads of reactive values inside the closure subscribe the effect; any
/// later write to one of them re-runs it.
///
/// # Example
///
/// ```
/// use lumen_reactive::{create_ref, effect, Value};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = create_ref(Value::Int(0));
/// let seen = Rc::new(Cell::new(0));
///
/// let watched = count.clone();
/// let seen_in = seen.clone();
/// let _e = effect(move || {
///     seen_in.set(watched.get_value().as_int().unwrap());
/// });
///
/// count.set_value(Value::Int(7));
/// assert_eq!(seen.get(), 7);
/// ```
pub fn effect(f: impl Fn() + 'static) -> Effect {
    effect_with_options(
        move || {
            f();
            Value::Unit
        },
        EffectOptions::default(),
    )
}

/// Create an effect with explicit options. The body returns a value so the
/// same machinery can back computed getters.
pub fn effect_with_options(f: impl Fn() -> Value + 'static, options: EffectOptions) -> Effect {
    let lazy = options.lazy;
    let inner = Rc::new(EffectInner {
        id: next_effect_id(),
        active: Cell::new(true),
        func: Rc::new(f),
        deps: RefCell::new(Vec::new()),
        options,
    });
    if !lazy {
        run_effect(&inner);
    }
    Effect { inner }
}

/// Free-function form of [`Effect::stop`].
pub fn stop(effect: &Effect) {
    effect.stop();
}

// =============================================================================
// TESTS
// =============================================================================
