// src/value.rs
use std::{any::Any, fmt, rc::Rc};

use crate::error::PromiseError;

/// Dynamically typed payload carried by fulfillment values and rejection reasons.
///
/// Cloning is cheap (shared `Rc`). The empty value stands for "undefined":
/// what a skipped boundary or a unit-returning handler settles with.
#[derive(Clone, Default)]
pub struct Value(Option<Rc<dyn Any>>);

impl Value {
    #[inline]
    pub fn undefined() -> Self {
        Self(None)
    }

    /// Wraps `v`. Wrapping a `Value` returns it unchanged rather than nesting it.
    pub fn new<T: Any>(v: T) -> Self {
        let boxed: Box<dyn Any> = Box::new(v);
        match boxed.downcast::<Value>() {
            Ok(inner) => *inner,
            Err(other) => Self(Some(Rc::from(other))),
        }
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        self.0.is_none()
    }

    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_ref().map_or(false, |v| v.is::<T>())
    }

    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Clones the payload out when it is a `T`.
    #[inline]
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    /// True when both values point at the same payload (or are both undefined).
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `Some(false)` / `Some(true)` when the payload is a `bool`.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        self.get::<bool>()
    }
}

impl From<PromiseError> for Value {
    fn from(err: PromiseError) -> Self {
        Value::new(err)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(v) = self.0.as_ref() else {
            return f.write_str("undefined");
        };

        macro_rules! try_debug {
            ($($t:ty),+ $(,)?) => {
                $(
                    if let Some(x) = v.downcast_ref::<$t>() {
                        return write!(f, "{x:?}");
                    }
                )+
            };
        }

        try_debug!(
            bool, i32, i64, u32, u64, usize, f64, char, String, &'static str,
            (), PromiseError, Vec<Value>,
        );
        f.write_str("<opaque>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_a_value_does_not_nest() {
        let v = Value::new(7_i32);
        let again = Value::new(v.clone());
        assert!(again.ptr_eq(&v));
        assert_eq!(again.get::<i32>(), Some(7));
    }

    #[test]
    fn undefined_is_default_and_debug_prints() {
        let v = Value::default();
        assert!(v.is_undefined());
        assert_eq!(format!("{v:?}"), "undefined");
        assert_eq!(format!("{:?}", Value::new("b")), "\"b\"");
    }

    #[test]
    fn downcast_mismatch_is_none() {
        let v = Value::new(String::from("x"));
        assert!(v.is::<String>());
        assert_eq!(v.get::<i32>(), None);
        assert_eq!(v.as_bool(), None);
    }
}
