// src/config.rs
use std::{cell::RefCell, rc::Rc};

use crate::trace::{Logger, TracingLogger};

/// Per-thread engine settings.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Don't report rejections nobody attached to.
    pub suppress_unhandled_rejection_warning: bool,
}

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
    static LOGGER: RefCell<Rc<dyn Logger>> = RefCell::new(Rc::new(TracingLogger));
}

/// Edit the current thread's configuration in place.
pub fn configure(f: impl FnOnce(&mut Config)) {
    CONFIG.with(|c| f(&mut c.borrow_mut()));
}

pub fn current() -> Config {
    CONFIG.with(|c| c.borrow().clone())
}

/// Replace the diagnostics sink for the current thread.
pub fn set_logger(logger: Box<dyn Logger>) {
    let logger: Rc<dyn Logger> = Rc::from(logger);
    LOGGER.with(|l| *l.borrow_mut() = logger);
}

/// The installed sink. Cloned out so callers never hold the slot while logging.
pub(crate) fn logger() -> Rc<dyn Logger> {
    LOGGER.with(|l| l.borrow().clone())
}
