// src/ops/each.rs
//! Sequential iteration over a chain of continuations.
//!
//! Both combinators build their whole chain up front in one fresh context and
//! enclose it, so a break raised by the callback only stops the iteration,
//! never the caller's own chain.
use std::{cell::RefCell, rc::Rc};

use crate::{ControlSignal, IntoResolution, Promise, Resolution, Value};

/// Feeds the inputs one at a time to `f(value, index)`. A callback result of
/// `false` (or a break) stops the iteration. Fulfills with `true` when every
/// element was processed, `false` when interrupted.
pub fn each<I, T, F, R>(values: I, f: F) -> Promise
where
    I: IntoIterator<Item = T>,
    T: IntoResolution + 'static,
    F: FnMut(Value, usize) -> R + 'static,
    R: IntoResolution + 'static,
{
    let f = Rc::new(RefCell::new(f));
    let start = Promise::resolved(());
    let mut chain = start.clone();

    for (index, item) in values.into_iter().enumerate() {
        let f = f.clone();
        chain = chain
            .then(move |_| item)
            .then(move |v| (f.borrow_mut())(v, index))
            .then(|r| match r.as_bool() {
                Some(false) => Resolution::Signal(ControlSignal::new_break()),
                _ => Resolution::Value(r),
            });
    }

    let completed = chain.then(|_| true).enclose();
    let result = completed.then(|v| v.as_bool() == Some(true));
    // disposing the result stops the iteration
    result.context().add_child(&start.context());
    result
}

/// Like [`each`] but threads the previous result: `f(previous, value, index)`
/// starting from `initial`. Only a break interrupts; the result is the last
/// value the callback produced before it.
pub fn waterfall<I, T, V, F, R>(values: I, initial: V, f: F) -> Promise
where
    I: IntoIterator<Item = T>,
    T: IntoResolution + 'static,
    V: IntoResolution,
    F: FnMut(Value, Value, usize) -> R + 'static,
    R: IntoResolution + 'static,
{
    let f = Rc::new(RefCell::new(f));
    let last = Rc::new(RefCell::new(Value::undefined()));

    let start = Promise::resolved(initial);
    let keep = last.clone();
    let mut chain = start.then(move |v| {
        *keep.borrow_mut() = v.clone();
        v
    });

    for (index, item) in values.into_iter().enumerate() {
        let f = f.clone();
        let prev = last.clone();
        let keep = last.clone();
        chain = chain
            .then(move |_| item)
            .then(move |v| {
                let previous = prev.borrow().clone();
                (f.borrow_mut())(previous, v, index)
            })
            .then(move |r| {
                *keep.borrow_mut() = r.clone();
                r
            });
    }

    let result = chain.enclose().then(move |_| last.borrow().clone());
    result.context().add_child(&start.context());
    result
}
