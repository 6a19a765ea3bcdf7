// ============================================================================
// lumen-reactive - Operation Taxonomy
// Read/write operation kinds and proxy flavors
// ============================================================================

// =============================================================================
// READ OPERATIONS
// =============================================================================

/// The kind of read being tracked.
///
/// Exposed to `on_track` debug callbacks so a host can tell a field read from
/// a membership test from a whole-container enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackOp {
    /// A keyed read (`get`).
    Get,
    /// A membership test (`has`).
    Has,
    /// A whole-container enumeration (`keys`, `size`, iteration).
    Iterate,
}

// =============================================================================
// WRITE OPERATIONS
// =============================================================================

/// The kind of write being propagated.
///
/// Exposed to `on_trigger` debug callbacks, and drives the fan-out rules in
/// [`crate::reactivity::tracking::trigger`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriggerOp {
    /// An existing key changed value.
    Set,
    /// A new key appeared.
    Add,
    /// A key was removed.
    Delete,
    /// The whole container was emptied.
    Clear,
}

// =============================================================================
// PROXY FLAVORS
// =============================================================================

/// The four observation flavors. Fixed at wrap time, immutable per proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Reads track and lazily wrap nested containers; writes trigger.
    MutableDeep,
    /// Reads track but return nested values as stored; writes trigger.
    MutableShallow,
    /// Reads neither track nor allow writes; nested reads stay readonly.
    ReadonlyDeep,
    /// Readonly at the first level only.
    ReadonlyShallow,
}

impl Flavor {
    pub fn is_readonly(self) -> bool {
        matches!(self, Flavor::ReadonlyDeep | Flavor::ReadonlyShallow)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Flavor::MutableShallow | Flavor::ReadonlyShallow)
    }

    /// Stable slot index for the per-target proxy cache.
    pub(crate) fn slot(self) -> usize {
        match self {
            Flavor::MutableDeep => 0,
            Flavor::MutableShallow => 1,
            Flavor::ReadonlyDeep => 2,
            Flavor::ReadonlyShallow => 3,
        }
    }
}

// =============================================================================
// RESERVED INTROSPECTION KEYS
// =============================================================================
//
// String sentinels a host may read through any proxy. Answered synthetically
// by the read interceptor; they never reach the underlying target.
// =============================================================================

/// Reads as `true` on proxies that track (or wrap something that tracks).
pub const IS_REACTIVE_KEY: &str = "__is_reactive";

/// Reads as `true` on readonly-flavored proxies.
pub const IS_READONLY_KEY: &str = "__is_readonly";

/// Reads as the underlying target of the proxy.
pub const RAW_KEY: &str = "__raw";

/// Reads as `true` when the target was opted out via `mark_raw`.
pub const SKIP_KEY: &str = "__skip";

pub(crate) fn is_reserved_prop(name: &str) -> bool {
    matches!(
        name,
        IS_REACTIVE_KEY | IS_READONLY_KEY | RAW_KEY | SKIP_KEY
    )
}

// =============================================================================
// TESTS
// =============================================================================
