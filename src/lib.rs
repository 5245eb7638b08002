//! # PROMISE SCOPE
//! Ordered, cancellable, composable deferred values for single-threaded
//! cooperative execution.
//!
//! A [`Promise`] settles once, runs its continuations on later scheduler
//! turns, and belongs to a [`Context`]: a cancellation scope that can be
//! disposed to stop everything still waiting inside it.
//!
//! ## Architectural Principles
//! * **Deferred:** A continuation never runs inside the call that triggered it.
//!   Work only happens in [`scheduler::run`] and friends.
//! * **Scoped Cancellation:** Disposing a context skips pending handlers in it
//!   and in every scope it owns. In-flight handlers run to completion.
//! * **Out-of-band Control:** Break and goto travel beside the rejection channel
//!   and are never seen by rejection handlers.
//! * **Single Thread:** All runtime state is thread-local. Only async wakers
//!   may cross threads.
//!
//! ```no_run
//! use promise_scope::{ops, scheduler, Promise, Value};
//!
//! let p = Promise::resolved(2_i32)
//!     .then(|v| v.get::<i32>().map(|n| n * 21))
//!     .label("done", |v| v);
//! let all = ops::all(vec![p, Promise::resolved(Value::new("x"))]);
//! scheduler::run();
//! assert!(all.value().is_some());
//! ```

mod guard;
mod macros;
mod timer;
mod wake;

pub mod config;
pub mod context;
pub mod error;
pub mod ops;
pub mod promise;
pub mod resolution;
pub mod scheduler;
pub mod signal;
pub mod task;
pub mod trace;
pub mod value;

pub use config::Config;
pub use context::{Context, ContextId};
pub use error::{PromiseError, SchedulerError};
pub use promise::{Promise, Resolver, State};
pub use resolution::{Completer, IntoResolution, Resolution, Thenable};
pub use scheduler::TickResult;
pub use signal::{ControlSignal, SignalKind};
pub use task::{spawn_local, yield_now, PromiseFuture};
pub use timer::TimerId;
pub use trace::{BufferLogger, Logger, NullLogger, TracingLogger};
pub use value::Value;
