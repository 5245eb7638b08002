// src/error.rs
use thiserror::Error;

/// Failure kinds the engine itself produces.
///
/// Carried through the rejection channel wrapped in a [`Value`](crate::Value);
/// filter for them with [`Promise::fail_with`](crate::Promise::fail_with).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromiseError {
    /// A handler resolved its own promise with itself.
    #[error("a promise cannot be resolved with itself")]
    SelfResolution,

    /// Raised by [`Promise::timeout`](crate::Promise::timeout).
    #[error("{message}")]
    Timeout { message: String },

    /// A handler panicked inside its scheduled job.
    #[error("handler panicked: {message}")]
    HandlerPanicked { message: String },

    #[error("interruption callback is already set")]
    InterruptionAlreadySet,

    /// `using` was given something that does not resolve to a `Resource`.
    #[error("value is not a disposable resource")]
    NotAResource,

    /// Re-raised by [`Promise::done`](crate::Promise::done).
    #[error("unhandled rejection: {reason}")]
    Unhandled { reason: String },
}

impl PromiseError {
    pub(crate) fn timeout(message: Option<&str>) -> Self {
        Self::Timeout {
            message: message.unwrap_or("timed out").to_string(),
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// One or more jobs panicked during the run; `message` is the first one.
    #[error("{count} scheduled job(s) panicked; first: {message}")]
    JobPanicked { count: usize, message: String },
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
