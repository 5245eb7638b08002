// src/promise.rs
//! The settlement engine.
//!
//! A [`Promise`] settles exactly once into Fulfilled, Rejected or Skipped.
//! Handlers attached with [`Promise::then`] and friends run on a later
//! scheduler turn, never inline. Successors come in two kinds:
//!
//! * chained: created by `then`, they see the post-handler state;
//! * handled: promises waiting on this one because a handler (or resolver)
//!   produced it while it was still pending. They see the raw state.
//!
//! Break and goto travel beside the rejection channel as [`ControlSignal`]s.
//! Within one context they skip (or search for a label through) the chained
//! successors; crossing into a different context they are absorbed and the
//! successor is fulfilled with undefined.
use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    time::Duration,
};

use crate::{
    config,
    context::Context,
    error::{panic_message, PromiseError},
    guard::OnDrop,
    resolution::{Completer, IntoResolution, Resolution},
    scheduler,
    signal::ControlSignal,
    value::Value,
};

pub(crate) type Handler = Box<dyn FnOnce(Value) -> Resolution>;
type Observer = Box<dyn FnOnce(&Settlement)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
    Skipped,
}

#[derive(Debug, Clone)]
pub(crate) enum Settlement {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
    Skipped(ControlSignal),
}

impl Settlement {
    #[inline]
    fn state(&self) -> State {
        match self {
            Settlement::Pending => State::Pending,
            Settlement::Fulfilled(_) => State::Fulfilled,
            Settlement::Rejected(_) => State::Rejected,
            Settlement::Skipped(_) => State::Skipped,
        }
    }

    /// What a promise waiting on this one receives.
    fn handoff(&self) -> Option<Outcome> {
        match self {
            Settlement::Pending => None,
            Settlement::Fulfilled(v) => Some(Outcome::Fulfilled(v.clone())),
            Settlement::Rejected(r) => Some(Outcome::Rejected(r.clone())),
            Settlement::Skipped(sig) => Some(match sig.hop() {
                Some(sig) => Outcome::Signal(sig),
                None => Outcome::Fulfilled(Value::undefined()),
            }),
        }
    }
}

/// A settlement on its way into a promise.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Fulfilled(Value),
    Rejected(Value),
    Signal(ControlSignal),
}

struct Inner {
    id: u64,
    settlement: Settlement,
    // handler has been invoked and its result is being unwrapped
    running: bool,
    // resolve/reject already called from outside
    adopted: bool,
    // some consumer attached
    handled: bool,
    context: Context,
    label: Option<String>,
    on_fulfilled: Option<Handler>,
    on_rejected: Option<Handler>,
    chained: Vec<Promise>,
    handled_by: Vec<Promise>,
    interruption: Option<Box<dyn FnOnce()>>,
    observers: Vec<Observer>,
}

/// Handle to a deferred value. Clones share the same instance.
#[derive(Clone)]
pub struct Promise {
    inner: Rc<RefCell<Inner>>,
}

thread_local! {
    static NEXT_ID: Cell<u64> = Cell::new(0);
    static PROPAGATION: RefCell<VecDeque<Box<dyn FnOnce()>>> = RefCell::new(VecDeque::new());
    static DRAINING: Cell<bool> = Cell::new(false);
}

// Settling fans out synchronously through links. Steps are queued and drained
// by the outermost caller so arbitrarily long chains don't grow the stack.
fn propagate(step: impl FnOnce() + 'static) {
    PROPAGATION.with(|q| q.borrow_mut().push_back(Box::new(step)));
    if DRAINING.with(|d| d.replace(true)) {
        return;
    }
    let _reset = OnDrop::new(|| DRAINING.with(|d| d.set(false)));
    while let Some(step) = PROPAGATION.with(|q| q.borrow_mut().pop_front()) {
        step();
    }
}

#[inline]
fn boxed<F, R>(f: F) -> Handler
where
    F: FnOnce(Value) -> R + 'static,
    R: IntoResolution,
{
    Box::new(move |v| f(v).into_resolution())
}

impl Promise {
    fn with_context(context: Context) -> Self {
        let id = NEXT_ID.with(|n| {
            let id = n.get() + 1;
            n.set(id);
            id
        });
        tracing::trace!(promise = id, context = ?context.id(), "promise created");
        Self {
            inner: Rc::new(RefCell::new(Inner {
                id,
                settlement: Settlement::Pending,
                running: false,
                adopted: false,
                handled: false,
                context,
                label: None,
                on_fulfilled: None,
                on_rejected: None,
                chained: Vec::new(),
                handled_by: Vec::new(),
                interruption: None,
                observers: Vec::new(),
            })),
        }
    }

    // ---------------- construction ----------------

    /// A pending promise in a fresh context.
    pub fn new() -> Self {
        Self::with_context(Context::new())
    }

    /// A pending promise inheriting `context` (or a fresh scope derived from
    /// it when it is enclosed).
    pub fn in_context(context: &Context) -> Self {
        Self::with_context(context.derive())
    }

    /// Runs `producer` synchronously with a resolver. An `Err` from the
    /// producer rejects the promise unless it already settled.
    pub fn with_producer<F, E>(producer: F) -> Self
    where
        F: FnOnce(Resolver) -> Result<(), E>,
        E: Any,
    {
        let promise = Self::new();
        if let Err(e) = producer(Resolver { promise: promise.clone() }) {
            promise.reject(Value::new(e));
        }
        promise
    }

    pub fn resolved(value: impl IntoResolution) -> Self {
        let promise = Self::new();
        promise.resolve(value);
        promise
    }

    pub fn rejected(reason: impl Into<Value>) -> Self {
        let promise = Self::new();
        promise.reject(reason);
        promise
    }

    /// Fulfills with undefined after `duration`.
    pub fn delay(duration: Duration) -> Self {
        let promise = Self::new();
        let p = promise.clone();
        scheduler::set_timeout(duration, move || p.resolve(()));
        promise
    }

    /// Returned from a handler: abandon the rest of the chain in this context.
    pub fn break_signal() -> Self {
        Self::signalled(ControlSignal::new_break())
    }

    /// Returned from a handler: skip forward to the continuation labelled
    /// `label` in this context and fulfill it with `value`.
    pub fn goto(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::signalled(ControlSignal::new_goto(label, value.into()))
    }

    fn signalled(sig: ControlSignal) -> Self {
        let promise = Self::new();
        promise.inner.borrow_mut().settlement = Settlement::Skipped(sig.into_preliminary());
        promise
    }

    // ---------------- settling from outside ----------------

    /// Settle with `value`, adopting it if it is a promise or thenable.
    /// Ignored once settled or once a resolution was already supplied.
    pub fn resolve(&self, value: impl IntoResolution) {
        if self.claim() {
            self.unpack(value.into_resolution());
        }
    }

    pub fn reject(&self, reason: impl Into<Value>) {
        if self.claim() {
            self.receive(Outcome::Rejected(reason.into()));
        }
    }

    fn claim(&self) -> bool {
        let mut i = self.inner.borrow_mut();
        if !matches!(i.settlement, Settlement::Pending) || i.adopted {
            return false;
        }
        i.adopted = true;
        true
    }

    // ---------------- continuations ----------------

    pub fn then<F, R>(&self, on_fulfilled: F) -> Promise
    where
        F: FnOnce(Value) -> R + 'static,
        R: IntoResolution,
    {
        self.chain(Some(boxed(on_fulfilled)), None, None)
    }

    pub fn then_both<F, R, G, S>(&self, on_fulfilled: F, on_rejected: G) -> Promise
    where
        F: FnOnce(Value) -> R + 'static,
        R: IntoResolution,
        G: FnOnce(Value) -> S + 'static,
        S: IntoResolution,
    {
        self.chain(Some(boxed(on_fulfilled)), Some(boxed(on_rejected)), None)
    }

    /// Rejection-only continuation.
    pub fn fail<G, S>(&self, on_rejected: G) -> Promise
    where
        G: FnOnce(Value) -> S + 'static,
        S: IntoResolution,
    {
        self.chain(None, Some(boxed(on_rejected)), None)
    }

    /// Like [`fail`](Self::fail) but only for reasons of type `E`; other
    /// reasons pass through untouched.
    pub fn fail_with<E, G, S>(&self, on_rejected: G) -> Promise
    where
        E: Any,
        G: FnOnce(&E) -> S + 'static,
        S: IntoResolution,
    {
        let filtered: Handler = Box::new(move |reason: Value| match reason.downcast_ref::<E>() {
            Some(e) => on_rejected(e).into_resolution(),
            None => Resolution::Rejected(reason),
        });
        self.chain(None, Some(filtered), None)
    }

    /// Like [`then`](Self::then) but the result is a goto target named `name`.
    pub fn label<F, R>(&self, name: impl Into<String>, on_fulfilled: F) -> Promise
    where
        F: FnOnce(Value) -> R + 'static,
        R: IntoResolution,
    {
        self.chain(Some(boxed(on_fulfilled)), None, Some(name.into()))
    }

    pub fn label_both<F, R, G, S>(&self, name: impl Into<String>, on_fulfilled: F, on_rejected: G) -> Promise
    where
        F: FnOnce(Value) -> R + 'static,
        R: IntoResolution,
        G: FnOnce(Value) -> S + 'static,
        S: IntoResolution,
    {
        self.chain(Some(boxed(on_fulfilled)), Some(boxed(on_rejected)), Some(name.into()))
    }

    /// Runs `f` on fulfillment or rejection, then passes the original outcome
    /// on (unless `f`'s own result rejects).
    pub fn always<F, R>(&self, f: F) -> Promise
    where
        F: FnOnce() -> R + 'static,
        R: IntoResolution,
    {
        let slot = Rc::new(Cell::new(Some(f)));
        let on_ok = slot.clone();
        self.then_both(
            move |value| match on_ok.take() {
                Some(f) => Promise::resolved(f()).then(move |_| value),
                None => Promise::resolved(value),
            },
            move |reason| match slot.take() {
                Some(f) => Promise::resolved(f()).then(move |_| Resolution::Rejected(reason)),
                None => Promise::rejected(reason),
            },
        )
    }

    fn chain(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>, label: Option<String>) -> Promise {
        let next = Promise::with_context(self.context().derive());
        {
            let mut n = next.inner.borrow_mut();
            n.on_fulfilled = on_fulfilled;
            n.on_rejected = on_rejected;
            n.label = label;
        }

        let settled = {
            let mut i = self.inner.borrow_mut();
            i.handled = true;
            match &i.settlement {
                Settlement::Pending => {
                    i.chained.push(next.clone());
                    None
                }
                s => Some(s.clone()),
            }
        };

        if let Some(s) = settled {
            self.feed_late(&next, s);
        }
        next
    }

    // Successor attached after this promise settled. A goto that already
    // happened is not re-searched: late successors are only skipped.
    fn feed_late(&self, next: &Promise, settlement: Settlement) {
        match settlement {
            Settlement::Pending => {}
            Settlement::Fulfilled(v) => next.grab(Outcome::Fulfilled(v)),
            Settlement::Rejected(r) => next.grab(Outcome::Rejected(r)),
            Settlement::Skipped(_) => {
                if next.context() == self.context() {
                    next.interrupt(ControlSignal::new_break());
                } else {
                    next.grab(Outcome::Fulfilled(Value::undefined()));
                }
            }
        }
    }

    // ---------------- scope controls ----------------

    /// Registers the callback run if this promise's context is disposed
    /// while its handler is in flight.
    pub fn interruption(&self, callback: impl FnOnce() + 'static) -> Result<Promise, PromiseError> {
        let mut i = self.inner.borrow_mut();
        if i.interruption.is_some() {
            return Err(PromiseError::InterruptionAlreadySet);
        }
        i.interruption = Some(Box::new(callback));
        Ok(self.clone())
    }

    /// Continuations attached from now on live in a fresh scope, so break and
    /// goto signals raised before this point stop here.
    pub fn enclose(&self) -> Promise {
        self.context().enclose();
        self.clone()
    }

    /// Rejects with [`PromiseError::Timeout`] if still pending after `after`,
    /// then disposes the scopes owned by this promise's context so the work
    /// feeding it stops. The context itself stays live: continuations already
    /// attached still see the rejection. Encloses first, so continuations
    /// attached afterwards get their own scope.
    pub fn timeout(&self, after: Duration, message: Option<&str>) -> Promise {
        self.enclose();
        let this = self.clone();
        let message = message.map(str::to_owned);
        let timer = scheduler::set_timeout(after, move || {
            if !this.is_pending() {
                return;
            }
            tracing::debug!(promise = this.id(), "promise timed out");
            this.relay(Outcome::Rejected(PromiseError::timeout(message.as_deref()).into()));
            this.context().dispose_sub_contexts();
        });
        self.on_settled(move |_| {
            scheduler::clear_timeout(timer);
        });
        self.clone()
    }

    // ---------------- observation ----------------

    /// Mirrors this promise's eventual state into `target`.
    pub fn handle(&self, target: &Promise) {
        if target.ptr_eq(self) {
            return;
        }
        if let Some(outcome) = self.follow(target) {
            target.receive(outcome);
        }
    }

    /// Calls `callback` (on a later turn) with the eventual state. A skipped
    /// promise reports `Ok(undefined)`.
    pub fn handle_with(&self, callback: impl FnOnce(Result<Value, Value>) + 'static) {
        self.inner.borrow_mut().handled = true;
        self.on_settled(move |s| {
            let result = match s {
                Settlement::Pending => return,
                Settlement::Fulfilled(v) => Ok(v.clone()),
                Settlement::Rejected(r) => Err(r.clone()),
                Settlement::Skipped(_) => Ok(Value::undefined()),
            };
            scheduler::schedule(move || callback(result));
        });
    }

    /// Ends a chain: a rejection reaching this point is re-raised as a panic
    /// on a later scheduler turn instead of only being logged.
    pub fn done(&self) {
        self.inner.borrow_mut().handled = true;
        let id = self.id();
        self.on_settled(move |s| {
            if let Settlement::Rejected(reason) = s {
                let err = PromiseError::Unhandled { reason: format!("{reason:?}") };
                tracing::debug!(promise = id, "re-raising rejection from done()");
                scheduler::schedule(move || panic!("{err}"));
            }
        });
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    pub fn context(&self) -> Context {
        self.inner.borrow().context.clone()
    }

    #[inline]
    pub fn state(&self) -> State {
        self.inner.borrow().settlement.state()
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// The fulfillment value, once fulfilled.
    pub fn value(&self) -> Option<Value> {
        match &self.inner.borrow().settlement {
            Settlement::Fulfilled(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// The rejection reason, once rejected.
    pub fn reason(&self) -> Option<Value> {
        match &self.inner.borrow().settlement {
            Settlement::Rejected(r) => Some(r.clone()),
            _ => None,
        }
    }

    pub fn label_name(&self) -> Option<String> {
        self.inner.borrow().label.clone()
    }

    pub(crate) fn settlement(&self) -> Settlement {
        self.inner.borrow().settlement.clone()
    }

    /// Runs `f` when this promise settles (now, if it already has). Does not
    /// count as a consumer.
    pub(crate) fn on_settled(&self, f: impl FnOnce(&Settlement) + 'static) {
        let settled = {
            let mut i = self.inner.borrow_mut();
            match &i.settlement {
                Settlement::Pending => {
                    i.observers.push(Box::new(f));
                    return;
                }
                s => s.clone(),
            }
        };
        f(&settled);
    }

    pub(crate) fn mark_handled(&self) {
        self.inner.borrow_mut().handled = true;
    }

    // ---------------- engine ----------------

    /// Register `target` as waiting on this promise, or hand back what it
    /// should receive right away.
    fn follow(&self, target: &Promise) -> Option<Outcome> {
        let mut i = self.inner.borrow_mut();
        i.handled = true;
        match &i.settlement {
            Settlement::Pending => {
                i.handled_by.push(target.clone());
                None
            }
            s => s.handoff(),
        }
    }

    /// The unwrap step: turn whatever a handler produced into this
    /// promise's outcome.
    pub(crate) fn unpack(&self, resolution: Resolution) {
        match resolution {
            Resolution::Value(v) => self.receive(Outcome::Fulfilled(v)),
            Resolution::Rejected(r) => self.receive(Outcome::Rejected(r)),
            Resolution::Signal(sig) => self.receive(Outcome::Signal(sig)),
            Resolution::Promise(inner) => {
                if inner.ptr_eq(self) {
                    self.receive(Outcome::Rejected(PromiseError::SelfResolution.into()));
                    return;
                }
                match inner.follow(self) {
                    Some(outcome) => self.receive(outcome),
                    None => {
                        let ours = self.context();
                        let theirs = inner.context();
                        if ours != theirs {
                            ours.add_child(&theirs);
                        }
                    }
                }
            }
            Resolution::Thenable(thenable) => {
                // foreign code only ever runs on its own turn
                let this = self.clone();
                scheduler::schedule(move || {
                    let completer = Completer::new(this);
                    let called = panic::catch_unwind(AssertUnwindSafe(|| thenable.then(completer.clone())));
                    match called {
                        Ok(Ok(())) => {}
                        Ok(Err(reason)) => completer.reject(reason),
                        Err(payload) => completer.reject(PromiseError::HandlerPanicked {
                            message: panic_message(payload.as_ref()),
                        }),
                    }
                });
            }
        }
    }

    /// Entry point for a finished unwrap (or an outside resolve).
    pub(crate) fn receive(&self, outcome: Outcome) {
        self.decide(outcome);
        self.inner.borrow_mut().running = false;
    }

    /// Delivered by a predecessor: run the matching handler, or relay.
    fn grab(&self, outcome: Outcome) {
        if !self.is_pending() {
            return;
        }
        if self.context().is_disposed() {
            self.interrupt(ControlSignal::new_break());
            return;
        }

        let (handler, arg) = {
            let mut i = self.inner.borrow_mut();
            let on_fulfilled = i.on_fulfilled.take();
            let on_rejected = i.on_rejected.take();
            match &outcome {
                Outcome::Fulfilled(v) => (on_fulfilled, v.clone()),
                Outcome::Rejected(r) => (on_rejected, r.clone()),
                Outcome::Signal(_) => (None, Value::undefined()),
            }
        };

        match handler {
            Some(h) => self.run(h, arg),
            None => self.decide(outcome),
        }
    }

    fn run(&self, handler: Handler, arg: Value) {
        let this = self.clone();
        scheduler::schedule(move || {
            if !this.is_pending() {
                return;
            }
            if this.context().is_disposed() {
                this.interrupt(ControlSignal::new_break());
                return;
            }

            this.inner.borrow_mut().running = true;
            let resolution = match panic::catch_unwind(AssertUnwindSafe(move || handler(arg))) {
                Ok(r) => r,
                Err(payload) => Resolution::Rejected(
                    PromiseError::HandlerPanicked { message: panic_message(payload.as_ref()) }.into(),
                ),
            };
            this.unpack(resolution);
        });
    }

    fn decide(&self, outcome: Outcome) {
        let (pending, running) = {
            let i = self.inner.borrow();
            (matches!(i.settlement, Settlement::Pending), i.running)
        };
        if !pending {
            return;
        }

        if self.context().is_disposed() {
            if running {
                self.interrupted();
            } else {
                self.interrupt(ControlSignal::new_break());
            }
            return;
        }

        match outcome {
            Outcome::Signal(sig) => self.interrupt(sig),
            other => self.relay(other),
        }
    }

    /// Settle as Fulfilled/Rejected and notify every link.
    fn relay(&self, outcome: Outcome) {
        let settlement = match outcome {
            Outcome::Fulfilled(v) => Settlement::Fulfilled(v),
            Outcome::Rejected(r) => Settlement::Rejected(r),
            Outcome::Signal(sig) => return self.interrupt(sig),
        };

        let Some((chained, handled_by, observers, unhandled)) = self.settle(settlement.clone()) else {
            return;
        };
        tracing::trace!(promise = self.id(), state = ?settlement.state(), "promise settled");

        for o in observers {
            o(&settlement);
        }
        for c in chained {
            let s = settlement.clone();
            propagate(move || match s {
                Settlement::Fulfilled(v) => c.grab(Outcome::Fulfilled(v)),
                Settlement::Rejected(r) => c.grab(Outcome::Rejected(r)),
                _ => {}
            });
        }
        for h in handled_by {
            if let Some(outcome) = settlement.handoff() {
                propagate(move || h.receive(outcome));
            }
        }
        if unhandled {
            self.watch_unhandled();
        }
    }

    /// Settle as Skipped and carry the signal on.
    fn interrupt(&self, sig: ControlSignal) {
        let Some((chained, handled_by, observers, _)) = self.settle(Settlement::Skipped(sig.clone())) else {
            return;
        };
        tracing::trace!(promise = self.id(), is_break = sig.is_break(), "promise skipped");

        let settlement = Settlement::Skipped(sig.clone());
        for o in observers {
            o(&settlement);
        }

        let ours = self.context();
        for c in chained {
            if c.context() != ours {
                propagate(move || c.grab(Outcome::Fulfilled(Value::undefined())));
            } else if sig.targets(c.label_name().as_deref()) {
                let carried = sig.carried();
                propagate(move || c.grab(Outcome::Fulfilled(carried)));
            } else {
                let spent = sig.hop().unwrap_or_else(|| sig.clone());
                propagate(move || c.interrupt(spent));
            }
        }
        for h in handled_by {
            let outcome = match sig.hop() {
                Some(s) => Outcome::Signal(s),
                None => Outcome::Fulfilled(Value::undefined()),
            };
            propagate(move || h.receive(outcome));
        }
    }

    /// Context disposed while our handler was in flight: the handler did run,
    /// so settle fulfilled after giving the interruption callback its turn.
    fn interrupted(&self) {
        let callback = self.inner.borrow_mut().interruption.take();
        if let Some(cb) = callback {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(cb)) {
                config::logger().error(&format!(
                    "interruption callback panicked: {}",
                    panic_message(payload.as_ref())
                ));
            }
        }
        tracing::trace!(promise = self.id(), "handler interrupted by disposal");
        self.relay(Outcome::Fulfilled(Value::undefined()));
    }

    #[allow(clippy::type_complexity)]
    fn settle(&self, settlement: Settlement) -> Option<(Vec<Promise>, Vec<Promise>, Vec<Observer>, bool)> {
        let mut i = self.inner.borrow_mut();
        if !matches!(i.settlement, Settlement::Pending) {
            return None;
        }
        let unhandled = matches!(settlement, Settlement::Rejected(_)) && !i.handled;
        i.settlement = settlement;
        i.on_fulfilled = None;
        i.on_rejected = None;
        i.interruption = None;
        Some((
            std::mem::take(&mut i.chained),
            std::mem::take(&mut i.handled_by),
            std::mem::take(&mut i.observers),
            unhandled,
        ))
    }

    // Checked after the queue drains, so consumers attached in the meantime count.
    fn watch_unhandled(&self) {
        let this = self.clone();
        scheduler::schedule_idle(move || {
            let (handled, reason, id) = {
                let i = this.inner.borrow();
                let reason = match &i.settlement {
                    Settlement::Rejected(r) => r.clone(),
                    _ => return,
                };
                (i.handled, reason, i.id)
            };
            if handled || config::current().suppress_unhandled_rejection_warning {
                return;
            }
            config::logger().warn(&format!("unhandled rejection (promise #{id}): {reason:?}"));
        });
    }
}

impl Default for Promise {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(i) => f
                .debug_struct("Promise")
                .field("id", &i.id)
                .field("state", &i.settlement.state())
                .field("label", &i.label)
                .finish(),
            Err(_) => f.write_str("Promise(<busy>)"),
        }
    }
}

/// Settles one promise from the outside; handed to producers.
#[derive(Clone)]
pub struct Resolver {
    promise: Promise,
}

impl Resolver {
    #[inline]
    pub fn resolve(&self, value: impl IntoResolution) {
        self.promise.resolve(value);
    }

    #[inline]
    pub fn reject(&self, reason: impl Into<Value>) {
        self.promise.reject(reason);
    }

    #[inline]
    pub fn promise(&self) -> &Promise {
        &self.promise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scheduler::run, trace::BufferLogger};

    fn num(p: &Promise) -> Option<i32> {
        p.value().and_then(|v| v.get::<i32>())
    }

    #[test]
    fn handlers_never_run_inline() {
        let p = Promise::resolved(1_i32);
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        let q = p.then(move |v| {
            h.set(true);
            v
        });
        assert!(!hit.get());
        assert!(q.is_pending());
        run();
        assert!(hit.get());
        assert_eq!(num(&q), Some(1));
    }

    #[test]
    fn settles_only_once() {
        let p = Promise::new();
        p.resolve(1_i32);
        p.resolve(2_i32);
        p.reject(Value::new("late"));
        run();
        assert_eq!(p.state(), State::Fulfilled);
        assert_eq!(num(&p), Some(1));
    }

    #[test]
    fn adopted_promise_locks_out_later_resolves() {
        let inner = Promise::new();
        let p = Promise::new();
        p.resolve(&inner);
        p.resolve(5_i32);
        inner.resolve(7_i32);
        run();
        assert_eq!(num(&p), Some(7));
    }

    #[test]
    fn self_resolution_rejects() {
        let p = Promise::resolved(());
        let slot: Rc<RefCell<Option<Promise>>> = Rc::new(RefCell::new(None));
        let s = slot.clone();
        let q = p.then(move |_| {
            let me = s.borrow().clone();
            me
        });
        *slot.borrow_mut() = Some(q.clone());
        let seen = q.fail_with::<PromiseError, _, _>(|e| *e == PromiseError::SelfResolution);
        run();
        assert_eq!(seen.value().and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn rejection_skips_fulfill_handlers_until_caught() {
        let skipped = Rc::new(Cell::new(false));
        let s = skipped.clone();
        let out = Promise::rejected(Value::new("bad"))
            .then(move |_| {
                s.set(true);
            })
            .fail(|r| r.get::<&str>().map(|s| s.len() as i32));
        run();
        assert!(!skipped.get());
        assert_eq!(num(&out), Some(3));
    }

    #[test]
    fn fail_with_passes_other_reasons_through() {
        let out = Promise::rejected(Value::new(1_i32))
            .fail_with::<String, _, _>(|_| 0_i32)
            .fail(|r| r);
        run();
        assert_eq!(num(&out), Some(1));
    }

    #[test]
    fn handler_panic_becomes_rejection() {
        let out = Promise::resolved(())
            .then(|_| -> i32 { panic!("kaboom") })
            .fail_with::<PromiseError, _, _>(|e| e.to_string());
        run();
        assert_eq!(
            out.value().and_then(|v| v.get::<String>()).as_deref(),
            Some("handler panicked: kaboom")
        );
    }

    #[test]
    fn break_skips_rest_of_same_context_chain() {
        let reached = Rc::new(Cell::new(false));
        let r = reached.clone();
        let tail = Promise::resolved(())
            .then(|_| Promise::break_signal())
            .then(move |_| r.set(true));
        run();
        assert!(!reached.get());
        assert_eq!(tail.state(), State::Skipped);
    }

    #[test]
    fn goto_jumps_to_matching_label() {
        let skipped = Rc::new(Cell::new(false));
        let s = skipped.clone();
        let end = Promise::resolved(())
            .then(|_| Promise::goto("end", Value::new(42_i32)))
            .then(move |_| s.set(true))
            .label("other", |_| 0_i32)
            .label("end", |v| v);
        run();
        assert!(!skipped.get());
        assert_eq!(num(&end), Some(42));
    }

    #[test]
    fn enclosed_boundary_absorbs_break() {
        let inner = Promise::resolved(())
            .then(|_| ControlSignal::new_break())
            .then(|_| 1_i32)
            .enclose();
        let after = inner.then(|v| v.is_undefined());
        run();
        assert_eq!(inner.state(), State::Skipped);
        assert_eq!(after.value().and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn disposed_context_skips_pending_handlers() {
        let p = Promise::new();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        let q = p.then(move |_| r.set(true));
        p.context().dispose();
        p.resolve(());
        run();
        assert!(!ran.get());
        assert_eq!(p.state(), State::Skipped);
        assert_eq!(q.state(), State::Skipped);
    }

    #[test]
    fn interruption_runs_when_disposed_mid_flight() {
        let gate = Promise::new();
        let interrupted = Rc::new(Cell::new(0));
        let g = gate.clone();
        let step = Promise::resolved(()).then(move |_| g.clone());
        let i = interrupted.clone();
        step.interruption(move || i.set(i.get() + 1)).unwrap();
        assert!(matches!(step.interruption(|| {}), Err(PromiseError::InterruptionAlreadySet)));

        let after_ran = Rc::new(Cell::new(false));
        let a = after_ran.clone();
        step.then(move |_| a.set(true));

        scheduler::run_idle();
        step.context().dispose();
        gate.resolve(9_i32);
        run();

        assert_eq!(interrupted.get(), 1);
        assert_eq!(step.state(), State::Fulfilled);
        assert!(step.value().unwrap().is_undefined());
        assert!(!after_ran.get());
    }

    #[test]
    fn timeout_reaches_rejection_handlers_attached_earlier() {
        let p = Promise::new();
        let saw_timeout = Rc::new(Cell::new(false));
        let s = saw_timeout.clone();
        let caught = p.fail_with::<PromiseError, _, _>(move |e| s.set(e.is_timeout()));
        p.timeout(Duration::from_millis(2), None);
        run();
        assert_eq!(p.state(), State::Rejected);
        assert!(saw_timeout.get());
        assert_eq!(caught.state(), State::Fulfilled);
        assert!(!p.context().is_disposed());
    }

    #[test]
    fn unhandled_rejection_is_reported_once() {
        let buf = BufferLogger::new();
        config::set_logger(Box::new(buf.clone()));

        let _tail = Promise::resolved(()).then(|_| Err::<(), _>("nope"));
        let caught = Promise::rejected(Value::new("fine"));
        caught.fail(|_| ());
        run();

        let lines = buf.lines();
        assert_eq!(lines.len(), 1, "{lines:?}");
        assert!(lines[0].starts_with("[warn] unhandled rejection"));
        assert!(lines[0].contains("nope"));
    }

    #[test]
    fn unhandled_warning_can_be_suppressed() {
        let buf = BufferLogger::new();
        config::set_logger(Box::new(buf.clone()));
        config::configure(|c| c.suppress_unhandled_rejection_warning = true);
        let _p = Promise::rejected(Value::new(0_i32));
        run();
        assert!(buf.lines().is_empty());
    }

    #[test]
    fn late_attachment_after_rejection_counts_as_handled() {
        let buf = BufferLogger::new();
        config::set_logger(Box::new(buf.clone()));
        let p = Promise::rejected(Value::new("x"));
        let q = p.clone();
        scheduler::schedule(move || {
            q.fail(|_| ());
        });
        run();
        assert!(buf.lines().is_empty());
    }
}
