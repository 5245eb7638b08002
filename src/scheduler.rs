// src/scheduler.rs
//! Microtask scheduler.
//!
//! Jobs are zero-argument closures queued FIFO on a per-thread queue. They
//! never run inline with the call that scheduled them: only [`tick`], [`run`],
//! [`run_idle`], [`run_until`] and [`try_run`] execute work. A job that panics
//! is isolated (later jobs still run), logged, and surfaced once the run
//! finishes.
use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    time::{Duration, Instant},
};

use crate::{
    config,
    error::{panic_message, SchedulerError},
    task,
    timer::{TimerId, TimerWheel},
    wake::{wake_channel, WakeRecvTimeout, WakeRx, WakeTx},
};

pub type Job = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    /// A job ran.
    Progress,
    /// Nothing runnable now, but timers or live tasks remain.
    Idle,
    /// Nothing left at all.
    Done,
}

struct Scheduler {
    ready: RefCell<VecDeque<Job>>,
    // runs only once `ready` is empty
    idle: RefCell<VecDeque<Job>>,
    timers: RefCell<TimerWheel>,
    failures: RefCell<Vec<Box<dyn Any + Send>>>,
    jobs_run: Cell<u64>,
    wake_tx: WakeTx,
    wake_rx: WakeRx,
}

impl Scheduler {
    fn new() -> Self {
        let (wake_tx, wake_rx) = wake_channel();
        Self {
            ready: RefCell::new(VecDeque::new()),
            idle: RefCell::new(VecDeque::new()),
            timers: RefCell::new(TimerWheel::default()),
            failures: RefCell::new(Vec::new()),
            jobs_run: Cell::new(0),
            wake_tx,
            wake_rx,
        }
    }
}

thread_local! {
    static SCHEDULER: Scheduler = Scheduler::new();
}

// ---------------- queueing ----------------

/// Queue `job` to run after everything already queued.
pub fn schedule(job: impl FnOnce() + 'static) {
    SCHEDULER.with(|s| s.ready.borrow_mut().push_back(Box::new(job)));
}

/// Queue `job` to run once the microtask queue has fully drained.
pub(crate) fn schedule_idle(job: impl FnOnce() + 'static) {
    SCHEDULER.with(|s| s.idle.borrow_mut().push_back(Box::new(job)));
}

/// Queue `job` once `delay` has elapsed.
pub fn set_timeout(delay: Duration, job: impl FnOnce() + 'static) -> TimerId {
    let deadline = Instant::now() + delay;
    let id = SCHEDULER.with(|s| s.timers.borrow_mut().arm(deadline, Box::new(job)));
    tracing::trace!(?id, delay_ms = delay.as_millis() as u64, "timer armed");
    id
}

/// Returns true if the timer had not fired yet.
pub fn clear_timeout(id: TimerId) -> bool {
    SCHEDULER.with(|s| s.timers.borrow_mut().disarm(id))
}

/// Jobs currently queued (microtasks plus post-flush jobs).
pub fn pending_jobs() -> usize {
    SCHEDULER.with(|s| s.ready.borrow().len() + s.idle.borrow().len())
}

/// Total jobs executed on this thread.
pub fn jobs_run() -> u64 {
    SCHEDULER.with(|s| s.jobs_run.get())
}

#[inline]
pub(crate) fn wake_tx() -> WakeTx {
    SCHEDULER.with(|s| s.wake_tx.clone())
}

// ---------------- driving ----------------

/// Runs at most one job.
pub fn tick() -> TickResult {
    fire_expired_timers();
    drain_wakes();

    let job = SCHEDULER.with(|s| {
        let next = s.ready.borrow_mut().pop_front();
        next.or_else(|| s.idle.borrow_mut().pop_front())
    });

    if let Some(job) = job {
        run_job(job);
        return TickResult::Progress;
    }

    let timers_empty = SCHEDULER.with(|s| s.timers.borrow().is_empty());
    if timers_empty && task::live_tasks() == 0 {
        TickResult::Done
    } else {
        TickResult::Idle
    }
}

/// Runs jobs until nothing is immediately runnable. Never blocks.
pub fn run_idle() -> TickResult {
    loop {
        match tick() {
            TickResult::Progress => continue,
            other => return other,
        }
    }
}

/// Runs until no jobs, timers or live tasks remain, sleeping until the next
/// timer deadline when idle. Re-raises the first panic of a job, if any,
/// after everything else has run.
///
/// With a live task waiting on something that never settles and no timers
/// armed this blocks until another thread wakes the task.
pub fn run() {
    drive(None);
    if let Some(payload) = take_failures().into_iter().next() {
        panic::resume_unwind(payload);
    }
}

/// Like [`run`] but gives up after `timeout`. Returns true if everything finished.
pub fn run_until(timeout: Duration) -> bool {
    let done = drive(Some(Instant::now() + timeout));
    if let Some(payload) = take_failures().into_iter().next() {
        panic::resume_unwind(payload);
    }
    done
}

/// Like [`run`] but reports panicking jobs as an error instead of re-raising.
pub fn try_run() -> Result<(), SchedulerError> {
    drive(None);
    let failures = take_failures();
    match failures.first() {
        None => Ok(()),
        Some(first) => Err(SchedulerError::JobPanicked {
            count: failures.len(),
            message: panic_message(first.as_ref()),
        }),
    }
}

fn drive(deadline: Option<Instant>) -> bool {
    loop {
        match tick() {
            TickResult::Progress => {}
            TickResult::Done => return true,
            TickResult::Idle => {
                let now = Instant::now();
                if deadline.map_or(false, |dl| now >= dl) {
                    return false;
                }
                let next = SCHEDULER.with(|s| s.timers.borrow_mut().time_to_next_deadline(now));
                let remain = deadline.map(|dl| dl.saturating_duration_since(now));
                let wait = match (next, remain) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                if !wait_for_work(wait) {
                    return false;
                }
            }
        }
    }
}

// Blocks until a timer is due or a task is woken. False if woken tasks can
// never arrive.
fn wait_for_work(wait: Option<Duration>) -> bool {
    if task::live_tasks() == 0 {
        if let Some(d) = wait {
            std::thread::sleep(d);
        }
        return true;
    }

    let msg = SCHEDULER.with(|s| match wait {
        Some(d) => s.wake_rx.recv_timeout(d),
        None => match s.wake_rx.recv() {
            Some(id) => WakeRecvTimeout::Msg(id),
            None => WakeRecvTimeout::Disconnected,
        },
    });
    match msg {
        WakeRecvTimeout::Msg(id) => {
            task::wake(id);
            true
        }
        WakeRecvTimeout::Timeout => true,
        WakeRecvTimeout::Disconnected => false,
    }
}

// ---------------- internals ----------------

fn run_job(job: Job) {
    SCHEDULER.with(|s| s.jobs_run.set(s.jobs_run.get() + 1));

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let msg = panic_message(payload.as_ref());
        config::logger().error(&format!("scheduled job panicked: {msg}"));
        SCHEDULER.with(|s| s.failures.borrow_mut().push(payload));
    }
}

fn fire_expired_timers() {
    let now = Instant::now();
    let expired = SCHEDULER.with(|s| s.timers.borrow_mut().expired(now));
    if expired.is_empty() {
        return;
    }
    tracing::trace!(count = expired.len(), "timers fired");
    SCHEDULER.with(|s| s.ready.borrow_mut().extend(expired));
}

fn drain_wakes() {
    while let Some(id) = SCHEDULER.with(|s| s.wake_rx.try_recv()) {
        task::wake(id);
    }
}

fn take_failures() -> Vec<Box<dyn Any + Send>> {
    SCHEDULER.with(|s| std::mem::take(&mut *s.failures.borrow_mut()))
}
