// src/resolution.rs
use std::{cell::Cell, rc::Rc};

use crate::{
    promise::{Outcome, Promise},
    signal::ControlSignal,
    value::Value,
};

/// What a handler (or a resolver) hands back to the engine.
pub enum Resolution {
    /// An already-available fulfillment value.
    Value(Value),
    /// Adopt another promise's eventual state.
    Promise(Promise),
    /// Adopt a foreign deferred value.
    Thenable(Rc<dyn Thenable>),
    /// Reject with this reason.
    Rejected(Value),
    /// Break or jump instead of settling normally.
    Signal(ControlSignal),
}

/// Anything a handler may return.
pub trait IntoResolution {
    fn into_resolution(self) -> Resolution;
}

impl IntoResolution for Resolution {
    #[inline]
    fn into_resolution(self) -> Resolution {
        self
    }
}

impl IntoResolution for Value {
    #[inline]
    fn into_resolution(self) -> Resolution {
        Resolution::Value(self)
    }
}

impl IntoResolution for Promise {
    #[inline]
    fn into_resolution(self) -> Resolution {
        Resolution::Promise(self)
    }
}

impl IntoResolution for &Promise {
    #[inline]
    fn into_resolution(self) -> Resolution {
        Resolution::Promise(self.clone())
    }
}

impl IntoResolution for ControlSignal {
    #[inline]
    fn into_resolution(self) -> Resolution {
        Resolution::Signal(self)
    }
}

impl IntoResolution for Rc<dyn Thenable> {
    #[inline]
    fn into_resolution(self) -> Resolution {
        Resolution::Thenable(self)
    }
}

impl IntoResolution for () {
    #[inline]
    fn into_resolution(self) -> Resolution {
        Resolution::Value(Value::undefined())
    }
}

/// `None` fulfills with undefined.
impl<T: IntoResolution> IntoResolution for Option<T> {
    fn into_resolution(self) -> Resolution {
        match self {
            Some(v) => v.into_resolution(),
            None => Resolution::Value(Value::undefined()),
        }
    }
}

/// `Err` rejects with the error as reason.
impl<T: IntoResolution, E: 'static> IntoResolution for Result<T, E> {
    fn into_resolution(self) -> Resolution {
        match self {
            Ok(v) => v.into_resolution(),
            Err(e) => Resolution::Rejected(Value::new(e)),
        }
    }
}

crate::impl_into_resolution!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str, Vec<Value>,
);

/// A foreign deferred value the engine can adopt.
///
/// `then` must eventually call [`Completer::resolve`] or
/// [`Completer::reject`]; only the first completion counts. Returning `Err`
/// before completing rejects with that reason.
pub trait Thenable {
    fn then(&self, completer: Completer) -> Result<(), Value>;
}

/// One-shot completion handle handed to a [`Thenable`].
#[derive(Clone)]
pub struct Completer {
    target: Promise,
    called: Rc<Cell<bool>>,
}

impl Completer {
    pub(crate) fn new(target: Promise) -> Self {
        Self { target, called: Rc::new(Cell::new(false)) }
    }

    #[inline]
    fn claim(&self) -> bool {
        !self.called.replace(true)
    }

    pub fn resolve(&self, value: impl IntoResolution) {
        if self.claim() {
            self.target.unpack(value.into_resolution());
        }
    }

    pub fn reject(&self, reason: impl Into<Value>) {
        if self.claim() {
            self.target.receive(Outcome::Rejected(reason.into()));
        }
    }

    /// True once either side was called.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.called.get()
    }
}
