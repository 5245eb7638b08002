// src/task.rs
//! Bridge between `async` code and the promise engine.
//!
//! [`spawn_local`] polls a future on scheduler jobs and settles a promise with
//! its output; awaiting a [`Promise`] yields `Ok(value)` or `Err(reason)`.
//! Wakers may be moved to other threads; they only send the task id back
//! over the scheduler's wake channel.
use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    task::{Context as PollContext, Poll, Waker},
};

use crate::{
    promise::{Promise, Settlement},
    resolution::{IntoResolution, Resolution},
    scheduler,
    value::Value,
    wake::task_waker,
};

pub type TaskId = usize;

type LocalFuture = Pin<Box<dyn Future<Output = Resolution>>>;

struct LocalTask {
    // `None` while being polled
    future: Option<LocalFuture>,
    promise: Promise,
    queued: bool,
}

#[derive(Default)]
struct TaskSlab {
    slots: Vec<Option<LocalTask>>,
    free: Vec<TaskId>,
    live: usize,
}

impl TaskSlab {
    fn insert(&mut self, task: LocalTask) -> TaskId {
        self.live += 1;
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(task);
                id
            }
            None => {
                self.slots.push(Some(task));
                self.slots.len() - 1
            }
        }
    }

    fn remove(&mut self, id: TaskId) {
        if let Some(slot) = self.slots.get_mut(id) {
            if slot.take().is_some() {
                self.live -= 1;
                self.free.push(id);
            }
        }
    }
}

thread_local! {
    static TASKS: RefCell<TaskSlab> = RefCell::new(TaskSlab::default());
}

/// Runs `future` on this thread's scheduler. The returned promise settles
/// with whatever the future produces (adopting promises and signals like a
/// handler result would). Disposing the promise's context drops the future
/// at its next wake-up without polling it again.
pub fn spawn_local<F, R>(future: F) -> Promise
where
    F: Future<Output = R> + 'static,
    R: IntoResolution,
{
    let promise = Promise::new();
    let future: LocalFuture = Box::pin(async move { future.await.into_resolution() });
    let id = TASKS.with(|t| {
        t.borrow_mut().insert(LocalTask {
            future: Some(future),
            promise: promise.clone(),
            queued: false,
        })
    });
    tracing::trace!(task = id, promise = promise.id(), "task spawned");
    wake(id);
    promise
}

/// Tasks that have not finished yet.
pub(crate) fn live_tasks() -> usize {
    TASKS.with(|t| t.borrow().live)
}

/// Queues a poll of `id` unless it is already queued or gone.
pub(crate) fn wake(id: TaskId) {
    let queue = TASKS.with(|t| {
        let mut t = t.borrow_mut();
        match t.slots.get_mut(id).and_then(|s| s.as_mut()) {
            Some(task) if !task.queued => {
                task.queued = true;
                true
            }
            _ => false,
        }
    });
    if queue {
        scheduler::schedule(move || poll_task(id));
    }
}

fn poll_task(id: TaskId) {
    let taken = TASKS.with(|t| {
        let mut t = t.borrow_mut();
        let task = t.slots.get_mut(id)?.as_mut()?;
        task.queued = false;
        Some((task.future.take()?, task.promise.clone()))
    });
    let Some((mut future, promise)) = taken else { return };

    if promise.context().is_disposed() {
        tracing::debug!(task = id, "task dropped: context disposed");
        TASKS.with(|t| t.borrow_mut().remove(id));
        drop(future);
        promise.resolve(());
        return;
    }

    let waker = task_waker(id, scheduler::wake_tx());
    let mut cx = PollContext::from_waker(&waker);
    // the future is not in the slab while polled, so it may spawn or wake freely
    match future.as_mut().poll(&mut cx) {
        Poll::Pending => TASKS.with(|t| {
            if let Some(Some(task)) = t.borrow_mut().slots.get_mut(id) {
                task.future = Some(future);
            }
        }),
        Poll::Ready(resolution) => {
            TASKS.with(|t| t.borrow_mut().remove(id));
            promise.resolve(resolution);
        }
    }
}

// ---------------- awaiting promises ----------------

struct PromiseWait {
    waker: Option<Waker>,
    registered: bool,
}

/// Future returned by awaiting a [`Promise`].
pub struct PromiseFuture {
    promise: Promise,
    wait: std::rc::Rc<RefCell<PromiseWait>>,
}

impl Future for PromiseFuture {
    type Output = Result<Value, Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut PollContext<'_>) -> Poll<Self::Output> {
        match self.promise.settlement() {
            Settlement::Fulfilled(v) => return Poll::Ready(Ok(v)),
            Settlement::Rejected(r) => return Poll::Ready(Err(r)),
            Settlement::Skipped(_) => return Poll::Ready(Ok(Value::undefined())),
            Settlement::Pending => {}
        }

        let first = {
            let mut w = self.wait.borrow_mut();
            w.waker = Some(cx.waker().clone());
            !std::mem::replace(&mut w.registered, true)
        };
        if first {
            let wait = self.wait.clone();
            self.promise.on_settled(move |_| {
                if let Some(w) = wait.borrow_mut().waker.take() {
                    w.wake();
                }
            });
        }
        Poll::Pending
    }
}

impl std::future::IntoFuture for Promise {
    type Output = Result<Value, Value>;
    type IntoFuture = PromiseFuture;

    fn into_future(self) -> PromiseFuture {
        self.mark_handled();
        PromiseFuture {
            promise: self,
            wait: std::rc::Rc::new(RefCell::new(PromiseWait { waker: None, registered: false })),
        }
    }
}

/// Yields once to the scheduler, then completes.
pub async fn yield_now() {
    struct YieldNow {
        yielded: bool,
    }
    impl Future for YieldNow {
        type Output = ();
        fn poll(mut self: Pin<&mut Self>, cx: &mut PollContext<'_>) -> Poll<()> {
            if self.yielded {
                return Poll::Ready(());
            }
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
    YieldNow { yielded: false }.await
}
