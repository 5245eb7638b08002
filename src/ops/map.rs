// src/ops/map.rs
use std::{cell::RefCell, rc::Rc};

use crate::{ops::all, IntoResolution, Promise, Value};

/// [`all`] over `f(value, index)` for every input, once each input has fulfilled.
pub fn map<I, T, F, R>(values: I, f: F) -> Promise
where
    I: IntoIterator<Item = T>,
    T: IntoResolution,
    F: FnMut(Value, usize) -> R + 'static,
    R: IntoResolution + 'static,
{
    let f = Rc::new(RefCell::new(f));
    let mapped: Vec<Promise> = values
        .into_iter()
        .enumerate()
        .map(|(index, v)| {
            let f = f.clone();
            Promise::resolved(v).then(move |v| (f.borrow_mut())(v, index))
        })
        .collect();
    all(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::run;

    #[test]
    fn maps_with_index_and_adopts_results() {
        let p = map(vec![10_i32, 20, 30], |v, i| {
            let n = v.get::<i32>().unwrap_or(0) + i as i32;
            Promise::resolved(n)
        });
        run();
        let out: Vec<i32> = p
            .value()
            .and_then(|v| v.get::<Vec<Value>>())
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.get::<i32>())
            .collect();
        assert_eq!(out, vec![10, 21, 32]);
    }

    #[test]
    fn callback_failure_rejects() {
        let p = map(vec![1_i32], |_, _| Err::<i32, _>("nope"));
        run();
        assert_eq!(p.reason().and_then(|r| r.get::<&str>()), Some("nope"));
    }
}
