// ============================================================================
// lumen-reactive - Ergonomic Macros
// ============================================================================

/// Clone variables into a move closure.
///
/// Handles (`Value`, `Effect`) are `Rc`-backed, so effect bodies usually need
/// a clone of everything they capture. This trims the boilerplate.
///
/// # Usage
///
/// ```rust
/// use lumen_reactive::{cloned, create_ref, effect, Value};
///
/// let a = create_ref(Value::Int(1));
/// let b = create_ref(Value::Int(2));
///
/// let _e = effect(cloned!(a, b => move || {
///     let _ = a.get_value();
///     let _ = b.get_value();
/// }));
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Build a record [`Value`](crate::Value) from field/value pairs.
///
/// ```rust
/// use lumen_reactive::{record, Value};
///
/// let user = record! { "name" => "ada", "age" => 36 };
/// assert_eq!(user.get("age"), Value::Int(36));
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Value::record() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let target = $crate::Value::record();
        $( target.set($key, $crate::Value::from($value)); )+
        target
    }};
}

/// Build a sequence [`Value`](crate::Value) from items.
///
/// ```rust
/// use lumen_reactive::{list, Value};
///
/// let xs = list![1, 2, 3];
/// assert_eq!(xs.len(), 3);
/// assert_eq!(xs.get(0usize), Value::Int(1));
/// ```
#[macro_export]
macro_rules! list {
    () => { $crate::Value::list(Vec::new()) };
    ($($item:expr),+ $(,)?) => {
        $crate::Value::list(vec![ $( $crate::Value::from($item) ),+ ])
    };
}
