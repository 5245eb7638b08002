// src/main.rs
// Walks through the engine: chains with break/goto, fan-in, timeouts,
// the lock queue and scoped resources. RUST_LOG=promise_scope=trace shows
// the engine's own events.

use std::{cell::RefCell, rc::Rc, time::Duration};

use promise_scope::{
    ops::{self, Lock, Resource, RetryOptions},
    scheduler, spawn_local, Promise, PromiseError, Value,
};
use tracing_subscriber::EnvFilter;

fn show(label: &str, p: &Promise) {
    match (p.value(), p.reason()) {
        (Some(v), _) => println!("{label}: fulfilled {v:?}"),
        (_, Some(r)) => println!("{label}: rejected {r:?}"),
        _ => println!("{label}: {:?}", p.state()),
    }
}

fn control_flow() {
    // goto skips the middle of the chain
    let jumped = Promise::resolved(1_i32)
        .then(|v| {
            let n = v.get::<i32>().unwrap_or_default();
            Promise::goto("finish", Value::new(n + 100))
        })
        .then(|_| -> i32 { unreachable!("skipped by goto") })
        .label("finish", |v| v);

    // break stops at an enclosed boundary
    let inner = Promise::resolved(())
        .then(|_| Promise::break_signal())
        .then(|_| "never")
        .enclose();
    let outer = inner.then(|_| "outer chain keeps going");

    scheduler::run();
    show("goto", &jumped);
    show("break (inner)", &inner);
    show("break (outer)", &outer);
}

fn fan_in() {
    let slow = ops::delay(Duration::from_millis(20)).then(|_| "slow");
    let fast = ops::delay(Duration::from_millis(5)).then(|_| "fast");
    let both = ops::all(vec![slow.clone(), fast.clone()]);
    let first = ops::race(vec![slow, fast]);

    let squares = ops::map(vec![1_i32, 2, 3], |v, _| v.get::<i32>().map(|n| n * n));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let walked = ops::each(vec!["a", "b", "c"], move |v, _| {
        let item = v.get::<&str>().unwrap_or_default();
        s.borrow_mut().push(item);
        item != "b"
    });

    let sum = ops::waterfall(vec![1_i32, 2, 3, 4], 0_i32, |acc, v, _| {
        acc.get::<i32>().unwrap_or_default() + v.get::<i32>().unwrap_or_default()
    });

    scheduler::run();
    show("all", &both);
    show("race", &first);
    show("map", &squares);
    show("each", &walked);
    println!("each visited: {:?}", seen.borrow());
    show("waterfall", &sum);
}

fn failure_paths() {
    let timed_out = ops::delay(Duration::from_millis(200))
        .then(|_| "too late")
        .timeout(Duration::from_millis(10), Some("gave up waiting"));
    let recovered = timed_out.fail_with::<PromiseError, _, _>(|e| format!("recovered from: {e}"));

    let attempts = Rc::new(RefCell::new(0));
    let a = attempts.clone();
    let retried = ops::retry(RetryOptions::default().with_interval(Duration::from_millis(2)), move |_, n| {
        *a.borrow_mut() = n;
        if n < 3 {
            Err(format!("attempt {n} failed"))
        } else {
            Ok(n)
        }
    });

    scheduler::run();
    show("timeout", &recovered);
    show("retry", &retried);
    println!("retry attempts: {}", attempts.borrow());
}

fn serialized() {
    let lock = Lock::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    for i in 0..3_u32 {
        let o = order.clone();
        lock.queue(move || {
            ops::delay(Duration::from_millis(u64::from(3 - i) * 3)).then(move |_| {
                o.borrow_mut().push(i);
                if i == 1 {
                    Err::<(), _>("middle job failed")
                } else {
                    Ok(())
                }
            })
        });
    }

    let closed = Rc::new(RefCell::new(false));
    let c = closed.clone();
    let file = Resource::new("data.txt", move || *c.borrow_mut() = true);
    let read = ops::using(file, |name| {
        let name = name.get::<&str>().unwrap_or_default();
        format!("read {name}")
    });

    let awaited = spawn_local(async {
        let v = Promise::resolved(20_i32).then(|v| v.get::<i32>().map(|n| n + 1)).await;
        v.ok().and_then(|v| v.get::<i32>()).map(|n| n * 2)
    });

    scheduler::run();
    println!("lock order: {:?}", order.borrow());
    show("using", &read);
    println!("resource closed: {}", closed.borrow());
    show("spawn_local", &awaited);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promise_scope=info")))
        .init();

    control_flow();
    fan_in();
    failure_paths();
    serialized();
}
