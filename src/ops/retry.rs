// src/ops/retry.rs
use std::{cell::RefCell, rc::Rc, time::Duration};

use crate::{scheduler, IntoResolution, Promise, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Total attempts, including the first.
    pub limit: usize,
    /// Pause between a failure and the next attempt.
    pub interval: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self { limit: 3, interval: Duration::ZERO }
    }
}

impl RetryOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Calls `f(last_reason, attempt)` (attempts count from 1) until it fulfills
/// or `options.limit` attempts failed, in which case the result rejects with
/// the last reason. Disposing the result's context stops further attempts.
pub fn retry<F, R>(options: RetryOptions, f: F) -> Promise
where
    F: FnMut(Option<Value>, usize) -> R + 'static,
    R: IntoResolution + 'static,
{
    let result = Promise::new();
    try_once(Rc::new(RefCell::new(f)), options, 1, None, result.clone());
    result
}

fn try_once<F, R>(f: Rc<RefCell<F>>, options: RetryOptions, n: usize, last: Option<Value>, result: Promise)
where
    F: FnMut(Option<Value>, usize) -> R + 'static,
    R: IntoResolution + 'static,
{
    // called from a handler so a panic becomes a rejection like any other
    let call = {
        let f = f.clone();
        Promise::resolved(()).then(move |_| (f.borrow_mut())(last, n))
    };

    // cancelling the result stops the attempt in flight too
    result.context().add_child(&call.context());

    call.handle_with(move |outcome| match outcome {
        Ok(v) => result.resolve(v),
        Err(reason) if n >= options.limit.max(1) => {
            tracing::debug!(attempts = n, "retry limit reached");
            result.reject(reason);
        }
        Err(reason) => {
            let next = move || {
                // a disposed result settles as skipped instead of waiting forever
                if result.context().is_disposed() {
                    result.reject(reason);
                    return;
                }
                try_once(f, options, n + 1, Some(reason), result);
            };
            if options.interval.is_zero() {
                next();
            } else {
                scheduler::set_timeout(options.interval, next);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scheduler::run, State};
    use std::cell::Cell;

    #[test]
    fn always_failing_callback_runs_limit_times() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let c = calls.clone();
        let p = retry(RetryOptions::default(), move |last, n| {
            c.borrow_mut().push((last.and_then(|r| r.get::<usize>()), n));
            Err::<(), _>(n)
        });
        run();
        assert_eq!(*calls.borrow(), vec![(None, 1), (Some(1), 2), (Some(2), 3)]);
        assert_eq!(p.reason().and_then(|r| r.get::<usize>()), Some(3));
    }

    #[test]
    fn stops_on_first_success() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let p = retry(RetryOptions::default().with_limit(5), move |_, n| {
            c.set(n);
            if n < 2 {
                Err("not yet")
            } else {
                Ok("ok")
            }
        });
        run();
        assert_eq!(calls.get(), 2);
        assert_eq!(p.value().and_then(|v| v.get::<&str>()), Some("ok"));
    }

    #[test]
    fn waits_the_interval_between_attempts() {
        let started = std::time::Instant::now();
        let p = retry(
            RetryOptions::default().with_limit(2).with_interval(Duration::from_millis(10)),
            |_, n| if n == 1 { Err("first") } else { Ok(n) },
        );
        run();
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert_eq!(p.value().and_then(|v| v.get::<usize>()), Some(2));
    }

    #[test]
    fn disposed_retry_settles_instead_of_hanging() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let p = retry(RetryOptions::default(), move |_, _| {
            c.set(c.get() + 1);
            Err::<(), _>("x")
        });
        let after = p.then(|_| 1_i32);
        p.context().dispose();
        run();
        assert!(calls.get() <= 1);
        assert_eq!(p.state(), State::Skipped);
        assert_eq!(after.state(), State::Skipped);
    }

    #[test]
    fn disposal_during_the_interval_stops_further_attempts() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let p = retry(
            RetryOptions::default().with_limit(5).with_interval(Duration::from_millis(20)),
            move |_, _| {
                c.set(c.get() + 1);
                Err::<(), _>("x")
            },
        );
        let after = p.then(|_| 1_i32);
        let ctx = p.context();
        scheduler::set_timeout(Duration::from_millis(5), move || ctx.dispose());
        run();
        assert_eq!(calls.get(), 1);
        assert_eq!(p.state(), State::Skipped);
        assert_eq!(after.state(), State::Skipped);
    }
}
