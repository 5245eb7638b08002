// src/guard.rs
use std::{cell::RefCell, rc::Rc};

/// Run a closure when dropped.
pub(crate) struct OnDrop<F: FnOnce()> {
    f: Option<F>,
}

impl<F: FnOnce()> OnDrop<F> {
    #[inline]
    pub(crate) fn new(f: F) -> Self {
        Self { f: Some(f) }
    }
}

impl<F: FnOnce()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }
}

/// Shared slot whose closure runs at most once, whichever clone fires first.
#[derive(Clone, Default)]
pub(crate) struct FireOnce {
    slot: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl FireOnce {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Arms the slot. Ignored once armed.
    pub(crate) fn arm(&self, f: impl FnOnce() + 'static) {
        let mut slot = self.slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(Box::new(f));
        }
    }

    /// Runs the armed closure, if any. Returns whether it ran.
    pub(crate) fn fire(&self) -> bool {
        let f = self.slot.borrow_mut().take();
        match f {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }
}
