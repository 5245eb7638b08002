// src/trace.rs
use std::{cell::RefCell, rc::Rc};

/// Pluggable diagnostics sink.
///
/// The engine reports unhandled rejections (`warn`) and panicking jobs
/// (`error`) here. Install one with [`set_logger`](crate::config::set_logger).
pub trait Logger {
    fn log(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}

/// Default sink: forwards to `tracing`.
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, msg: &str) {
        tracing::info!(target: "promise_scope", "{msg}");
    }
    fn warn(&self, msg: &str) {
        tracing::warn!(target: "promise_scope", "{msg}");
    }
    fn error(&self, msg: &str) {
        tracing::error!(target: "promise_scope", "{msg}");
    }
}

/// Swallows everything.
pub struct NullLogger;
impl Logger for NullLogger {}

/// Stores lines in memory instead of printing. Clones share the buffer.
#[derive(Clone, Default)]
pub struct BufferLogger {
    lines: Rc<RefCell<Vec<String>>>,
}

impl BufferLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, s: impl Into<String>) {
        self.lines.borrow_mut().push(s.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }
}

impl Logger for BufferLogger {
    fn log(&self, msg: &str) {
        self.push(format!("[log] {msg}"));
    }
    fn warn(&self, msg: &str) {
        self.push(format!("[warn] {msg}"));
    }
    fn error(&self, msg: &str) {
        self.push(format!("[error] {msg}"));
    }
}
