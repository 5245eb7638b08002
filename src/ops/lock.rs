// src/ops/lock.rs
use std::{cell::RefCell, rc::Rc};

use crate::{IntoResolution, Promise};

/// Runs queued handlers strictly one after another.
///
/// The tail each handler waits on is insulated: a handler that rejects (or
/// breaks) still releases the lock for the next one. Clones share the queue.
#[derive(Clone)]
pub struct Lock {
    tail: Rc<RefCell<Promise>>,
}

impl Lock {
    pub fn new() -> Self {
        Self { tail: Rc::new(RefCell::new(Promise::resolved(()))) }
    }

    /// Queues `handler` behind everything queued so far. The returned promise
    /// settles with the handler's own outcome.
    pub fn queue<F, R>(&self, handler: F) -> Promise
    where
        F: FnOnce() -> R + 'static,
        R: IntoResolution,
    {
        let tail = self.tail.borrow().clone();
        let result = tail.then(move |_| handler());

        // separate scope, so signals from `result` end here
        let released = Promise::new();
        result.handle(&released);
        *self.tail.borrow_mut() = released.then_both(|_| (), |_| ());
        result
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::run;
    use std::time::Duration;

    #[test]
    fn handlers_run_in_order_even_after_failure() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let lock = Lock::new();

        let l = log.clone();
        lock.queue(move || Promise::delay(Duration::from_millis(3)).then(move |_| l.borrow_mut().push("slow")));
        let l = log.clone();
        let failed = lock.queue(move || {
            l.borrow_mut().push("fail");
            Err::<(), _>("nope")
        });
        let l = log.clone();
        let last = lock.queue(move || {
            l.borrow_mut().push("last");
            Promise::break_signal()
        });
        let l = log.clone();
        lock.queue(move || l.borrow_mut().push("after break"));

        run();
        assert_eq!(*log.borrow(), vec!["slow", "fail", "last", "after break"]);
        assert_eq!(failed.reason().and_then(|r| r.get::<&str>()), Some("nope"));
        assert!(last.value().is_none());
    }
}
