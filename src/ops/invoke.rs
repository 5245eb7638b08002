// src/ops/invoke.rs
use std::any::Any;

use crate::{IntoResolution, Promise, Resolver, Value};

/// Error-first completion callback handed to producers wrapped by [`invoke`].
#[derive(Clone)]
pub struct NodeCallback {
    resolver: Resolver,
}

impl NodeCallback {
    /// `Some(err)` rejects with it, `None` fulfills with `value`.
    pub fn call(&self, err: Option<Value>, value: impl IntoResolution) {
        match err {
            Some(e) => self.resolver.reject(e),
            None => self.resolver.resolve(value),
        }
    }

    pub fn complete<T: IntoResolution, E: Any>(&self, result: Result<T, E>) {
        match result {
            Ok(v) => self.resolver.resolve(v),
            Err(e) => self.resolver.reject(Value::new(e)),
        }
    }
}

/// Adapts a producer that reports through an error-first callback. Arguments
/// are whatever the closure captures. An `Err` returned synchronously rejects.
pub fn invoke<F, E>(f: F) -> Promise
where
    F: FnOnce(NodeCallback) -> Result<(), E>,
    E: Any,
{
    Promise::with_producer(|resolver| f(NodeCallback { resolver }))
}
