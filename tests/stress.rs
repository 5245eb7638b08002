// tests/stress.rs
//
// Stress goals:
// - Very long chains (no recursion proportional to chain length)
// - Deep adoption towers (promise resolved with promise resolved with ...)
// - Massive fan-out / fan-in through all, map and race
// - Break storms through long same-scope chains
// - Cascading disposal through a wide scope tree
//
// Tune with env vars (optional):
//   CHAIN=10000 TOWER=10000 LEAVES=2000 cargo test --test stress

use std::{
    cell::Cell,
    rc::Rc,
    time::Duration,
};

use promise_scope::{ops, scheduler, Promise, State, Value};

fn env_or(name: &str, default: usize) -> usize {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[test]
fn ten_thousand_link_chain_settles() {
    let links = env_or("CHAIN", 10_000);
    let mut p = Promise::resolved(0_u64);
    for _ in 0..links {
        p = p.then(|v| v.get::<u64>().unwrap_or_default() + 1);
    }
    scheduler::run();
    assert_eq!(p.value().and_then(|v| v.get::<u64>()), Some(links as u64));
}

#[test]
fn break_skips_a_long_chain_without_recursion() {
    let links = env_or("CHAIN", 10_000);
    let ran = Rc::new(Cell::new(0_usize));
    let head = Promise::new();
    let mut p = head.then(|_| Promise::break_signal());
    for _ in 0..links {
        let r = ran.clone();
        p = p.then(move |_| r.set(r.get() + 1));
    }
    let boundary = p.enclose();
    let after = boundary.then(|_| "outside");
    head.resolve(());
    scheduler::run();
    assert_eq!(ran.get(), 0);
    assert_eq!(boundary.state(), State::Skipped);
    assert_eq!(after.value().and_then(|v| v.get::<&str>()), Some("outside"));
}

#[test]
fn deep_adoption_tower() {
    let depth = env_or("TOWER", 10_000);
    let bottom = Promise::new();
    let mut top = bottom.clone();
    for _ in 0..depth {
        let next = Promise::new();
        next.resolve(&top);
        top = next;
    }
    bottom.resolve(Value::new("deep"));
    scheduler::run();
    assert_eq!(top.value().and_then(|v| v.get::<&str>()), Some("deep"));
}

#[test]
fn wide_fan_in() {
    let leaves = env_or("LEAVES", 2_000);
    let inputs: Vec<Promise> = (0..leaves)
        .map(|i| {
            let delay = Duration::from_micros((i % 7) as u64 * 100);
            ops::delay(delay).then(move |_| i as u64)
        })
        .collect();
    let sum = ops::all(inputs).then(|v| {
        v.get::<Vec<Value>>()
            .unwrap_or_default()
            .iter()
            .filter_map(|x| x.get::<u64>())
            .sum::<u64>()
    });
    let squares = ops::map((0..leaves as u64).collect::<Vec<_>>(), |v, _| {
        v.get::<u64>().map(|n| n * n)
    });
    let races: Vec<Promise> = (0..leaves / 4)
        .map(|i| {
            ops::race(vec![
                ops::delay(Duration::from_millis(2)).then(move |_| i),
                Promise::resolved(i + 1),
            ])
        })
        .collect();
    let race_total = ops::all(races);

    scheduler::run();

    let n = leaves as u64;
    assert_eq!(sum.value().and_then(|v| v.get::<u64>()), Some(n * (n - 1) / 2));
    let squares = squares.value().and_then(|v| v.get::<Vec<Value>>()).unwrap_or_default();
    assert_eq!(squares.len(), leaves);
    assert_eq!(squares.last().and_then(|v| v.get::<u64>()), Some((n - 1) * (n - 1)));
    let winners = race_total.value().and_then(|v| v.get::<Vec<Value>>()).unwrap_or_default();
    assert!(winners.iter().enumerate().all(|(i, v)| v.get::<usize>() == Some(i + 1)));
}

#[test]
fn disposal_cascades_through_adopted_work() {
    let leaves = env_or("LEAVES", 2_000);
    let ran = Rc::new(Cell::new(0_usize));
    let gates: Vec<Promise> = (0..leaves).map(|_| Promise::new()).collect();

    let owner = Promise::resolved(());
    let mut waiting = Vec::with_capacity(leaves);
    for gate in &gates {
        let g = gate.clone();
        let r = ran.clone();
        let step = owner.then(move |_| g.then(move |_| r.set(r.get() + 1)));
        waiting.push(step);
    }

    scheduler::run_idle();
    owner.context().dispose();
    for gate in &gates {
        gate.resolve(());
    }
    scheduler::run();

    assert_eq!(ran.get(), 0);
    assert!(waiting.iter().all(|p| p.state() != State::Rejected));
}
