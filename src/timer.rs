// src/timer.rs
use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    time::{Duration, Instant},
};

use crate::scheduler::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Deadline heap. Cancelled entries stay in the heap and are skipped as stale
/// once they surface.
#[derive(Default)]
pub(crate) struct TimerWheel {
    next_id: u64,
    heap: BinaryHeap<Reverse<(Instant, TimerId)>>,
    jobs: HashMap<TimerId, Job>,
}

impl TimerWheel {
    pub(crate) fn arm(&mut self, deadline: Instant, job: Job) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.heap.push(Reverse((deadline, id)));
        self.jobs.insert(id, job);
        id
    }

    /// Returns true if the timer was still armed.
    pub(crate) fn disarm(&mut self, id: TimerId) -> bool {
        self.jobs.remove(&id).is_some()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Pops every job whose deadline is at or before `now`, earliest first.
    pub(crate) fn expired(&mut self, now: Instant) -> Vec<Job> {
        let mut out = Vec::new();
        while let Some(Reverse((dl, id))) = self.heap.peek().copied() {
            if dl > now {
                break;
            }
            self.heap.pop();
            if let Some(job) = self.jobs.remove(&id) {
                out.push(job);
            }
        }
        out
    }

    pub(crate) fn time_to_next_deadline(&mut self, now: Instant) -> Option<Duration> {
        // drop stale heads so we don't wake up for nothing
        while let Some(Reverse((dl, id))) = self.heap.peek().copied() {
            if self.jobs.contains_key(&id) {
                return Some(dl.saturating_duration_since(now));
            }
            self.heap.pop();
        }
        None
    }
}
