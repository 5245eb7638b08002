// src/ops/mod.rs
//! Combinators built only from the public promise primitives.
use std::time::Duration;

use crate::Promise;

pub mod all;
pub mod each;
pub mod invoke;
pub mod lock;
pub mod map;
pub mod race;
pub mod retry;
pub mod using;

pub use all::all;
pub use each::{each, waterfall};
pub use invoke::{invoke, NodeCallback};
pub use lock::Lock;
pub use map::map;
pub use race::race;
pub use retry::{retry, RetryOptions};
pub use using::{using, Resource};

/// Fulfills with undefined after `duration`.
#[inline]
pub fn delay(duration: Duration) -> Promise {
    Promise::delay(duration)
}
