// src/ops/all.rs
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use crate::{IntoResolution, Promise, Value};

struct Gather {
    slots: Vec<Value>,
    remaining: usize,
    // first rejection by settle order
    failure: Option<Value>,
}

/// Fulfills with the inputs' values in input order once every input
/// fulfilled. If any input rejects, the result rejects with the first
/// rejection, but only after all inputs have settled.
pub fn all<I, T>(values: I) -> Promise
where
    I: IntoIterator<Item = T>,
    T: IntoResolution,
{
    let inputs: Vec<Promise> = values.into_iter().map(Promise::resolved).collect();
    if inputs.is_empty() {
        return Promise::resolved(Vec::<Value>::new());
    }

    let result = Promise::new();
    let gather = Rc::new(RefCell::new(Gather {
        slots: vec![Value::undefined(); inputs.len()],
        remaining: inputs.len(),
        failure: None,
    }));
    let finished = Rc::new(Cell::new(false));

    for (index, input) in inputs.into_iter().enumerate() {
        let gather = gather.clone();
        let result = result.clone();
        let finished = finished.clone();
        input.handle_with(move |outcome| {
            let done = {
                let mut g = gather.borrow_mut();
                match outcome {
                    Ok(v) => g.slots[index] = v,
                    Err(r) => {
                        g.failure.get_or_insert(r);
                    }
                }
                g.remaining -= 1;
                g.remaining == 0
            };
            if !done || finished.replace(true) {
                return;
            }
            let (failure, slots) = {
                let mut g = gather.borrow_mut();
                (g.failure.take(), std::mem::take(&mut g.slots))
            };
            match failure {
                Some(reason) => result.reject(reason),
                None => result.resolve(slots),
            }
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::run;
    use std::time::Duration;

    fn ints(p: &Promise) -> Vec<i32> {
        p.value()
            .and_then(|v| v.get::<Vec<Value>>())
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.get::<i32>())
            .collect()
    }

    #[test]
    fn keeps_input_order_not_settle_order() {
        let slow = Promise::delay(Duration::from_millis(3)).then(|_| 1_i32);
        let fast = Promise::resolved(2_i32);
        let p = all(crate::resolutions![slow, fast, 3_i32]);
        run();
        assert_eq!(ints(&p), vec![1, 2, 3]);
    }

    #[test]
    fn empty_input_fulfills_immediately() {
        let p = all(Vec::<Value>::new());
        assert_eq!(p.value().and_then(|v| v.get::<Vec<Value>>()).map(|v| v.len()), Some(0));
    }

    #[test]
    fn rejection_waits_for_every_input() {
        let late = Promise::new();
        let p = all(crate::resolutions![Promise::rejected(Value::new("first")), &late]);
        crate::scheduler::run_idle();
        assert!(p.is_pending());
        late.resolve(1_i32);
        run();
        assert_eq!(p.reason().and_then(|r| r.get::<&str>()), Some("first"));
    }
}
