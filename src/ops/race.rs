// src/ops/race.rs
use crate::{IntoResolution, Promise};

/// Settles like whichever input settles first. No inputs: pending forever.
pub fn race<I, T>(values: I) -> Promise
where
    I: IntoIterator<Item = T>,
    T: IntoResolution,
{
    let result = Promise::new();
    for v in values {
        Promise::resolved(v).handle(&result);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scheduler::run, Value};
    use std::time::Duration;

    #[test]
    fn first_settled_wins() {
        let slow = Promise::delay(Duration::from_millis(5)).then(|_| "slow");
        let fast = Promise::delay(Duration::from_millis(1)).then(|_| "fast");
        let p = race(vec![slow, fast]);
        run();
        assert_eq!(p.value().and_then(|v| v.get::<&str>()), Some("fast"));
    }

    #[test]
    fn rejection_can_win() {
        let never = Promise::new();
        let p = race(crate::resolutions![&never, Promise::rejected(Value::new(3_i32))]);
        run();
        assert_eq!(p.reason().and_then(|r| r.get::<i32>()), Some(3));
    }

    #[test]
    fn empty_race_stays_pending() {
        let p = race(Vec::<Promise>::new());
        run();
        assert!(p.is_pending());
    }
}
