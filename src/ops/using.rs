// src/ops/using.rs
use std::{any::Any, rc::Rc};

use crate::{guard::FireOnce, IntoResolution, Promise, PromiseError, Resolution, Value};

/// A value paired with the cleanup that must run once it is no longer used.
#[derive(Clone)]
pub struct Resource {
    value: Value,
    disposer: Rc<FireOnce>,
}

impl Resource {
    pub fn new<T: Any>(value: T, disposer: impl FnOnce() + 'static) -> Self {
        let once = FireOnce::new();
        once.arm(disposer);
        Self { value: Value::new(value), disposer: Rc::new(once) }
    }

    #[inline]
    pub fn value(&self) -> Value {
        self.value.clone()
    }

    /// Runs the disposer unless it already ran. Returns whether it ran now.
    pub fn dispose(&self) -> bool {
        self.disposer.fire()
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource").field("value", &self.value).finish_non_exhaustive()
    }
}

impl IntoResolution for Resource {
    fn into_resolution(self) -> Resolution {
        Resolution::Value(Value::new(self))
    }
}

/// Resolves `resource`, hands its value to `handler`, and disposes the
/// resource exactly once afterwards: on fulfillment, on rejection, or when
/// the scope is disposed while the handler's work is still in flight.
/// Anything other than a [`Resource`] rejects with
/// [`PromiseError::NotAResource`].
pub fn using<T, F, R>(resource: T, handler: F) -> Promise
where
    T: IntoResolution,
    F: FnOnce(Value) -> R + 'static,
    R: IntoResolution,
{
    let cleanup = FireOnce::new();

    let arm = cleanup.clone();
    let step = Promise::resolved(resource).then(move |v| {
        let Some(res) = v.downcast_ref::<Resource>().cloned() else {
            return Resolution::Rejected(PromiseError::NotAResource.into());
        };
        let value = res.value();
        arm.arm(move || {
            res.dispose();
        });
        handler(value).into_resolution()
    });

    let on_interrupt = cleanup.clone();
    // a freshly chained promise has no interruption callback yet
    if let Err(err) = step.interruption(move || {
        on_interrupt.fire();
    }) {
        debug_assert!(false, "{err}");
        tracing::warn!(error = %err, "resource cleanup not armed for interruption");
    }

    step.always(move || {
        cleanup.fire();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scheduler::run, State};
    use std::cell::Cell;

    fn counted(value: i32, hits: &Rc<Cell<u32>>) -> Resource {
        let h = hits.clone();
        Resource::new(value, move || h.set(h.get() + 1))
    }

    #[test]
    fn disposes_after_fulfillment() {
        let hits = Rc::new(Cell::new(0));
        let p = using(counted(4, &hits), |v| v.get::<i32>().map(|n| n * 2));
        run();
        assert_eq!(hits.get(), 1);
        assert_eq!(p.value().and_then(|v| v.get::<i32>()), Some(8));
    }

    #[test]
    fn disposes_after_rejection() {
        let hits = Rc::new(Cell::new(0));
        let p = using(counted(0, &hits), |_| Err::<(), _>("broken"));
        run();
        assert_eq!(hits.get(), 1);
        assert_eq!(p.reason().and_then(|r| r.get::<&str>()), Some("broken"));
    }

    #[test]
    fn disposes_once_when_cancelled_mid_flight() {
        let hits = Rc::new(Cell::new(0));
        let gate = Promise::new();
        let g = gate.clone();
        let p = using(counted(0, &hits), move |_| g);
        crate::scheduler::run_idle();
        p.context().dispose();
        gate.resolve(());
        run();
        assert_eq!(hits.get(), 1);
        assert_eq!(p.state(), State::Skipped);
    }

    #[test]
    fn non_resource_rejects() {
        let p = using(5_i32, |_| ());
        run();
        let err = p.reason().and_then(|r| r.get::<PromiseError>());
        assert_eq!(err, Some(PromiseError::NotAResource));
    }
}
