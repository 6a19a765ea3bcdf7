// ============================================================================
// lumen-reactive - Core
// Value model, dependency keys, operation taxonomy, thread-local context
// ============================================================================

pub mod context;
pub mod key;
pub mod ops;
pub mod value;
