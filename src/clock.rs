//! Virtual-time source and a minimal discrete-event engine.
//!
//! Any cooperative, virtual-time scheduler with a `timeout` primitive
//! would do here; this crate embeds a small `BinaryHeap`-ordered event
//! queue rather than pulling in an external simulation crate.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Virtual-time source. Only advances when [`EventQueue::run`] commands it;
/// every time-dependent read in the crate goes through this.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Clock {
    now: f64,
}

impl Clock {
    pub fn now(&self) -> f64 {
        self.now
    }

    fn advance_to(&mut self, t: f64) {
        debug_assert!(t >= self.now, "clock must advance monotonically");
        self.now = t;
    }
}

/// One pending occurrence of event `E`, ordered earliest-first with
/// insertion order (`seq`) breaking ties so that processes registered
/// earlier run first at the same timestamp — the same tie-break a
/// cooperative scheduler gives same-tick coroutines.
#[derive(Debug)]
struct Scheduled<E> {
    at: f64,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}
impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest (then
        // earliest-registered) event sorts to the top.
        other
            .at
            .partial_cmp(&self.at)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A generic virtual-time priority queue of events, driving a [`Clock`].
///
/// Not specific to HTB: any simulation that needs "run this again `dt`
/// later" scheduling can reuse it by picking its own event type `E`.
#[derive(Debug)]
pub struct EventQueue<E> {
    clock: Clock,
    heap: BinaryHeap<Scheduled<E>>,
    seq: u64,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        EventQueue {
            clock: Clock::default(),
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Register `event` to fire at virtual time `at`.
    pub fn schedule(&mut self, at: f64, event: E) {
        self.seq += 1;
        self.heap.push(Scheduled {
            at,
            seq: self.seq,
            event,
        });
    }

    /// Run every event due at or before `until`, calling `handler(now,
    /// event)` for each and advancing the clock to that event's time
    /// first. `handler` returns `Some(dt)` to reschedule the same event
    /// `dt` later, or `None` to let it lapse.
    pub fn run(
        &mut self,
        until: f64,
        mut handler: impl FnMut(f64, &E) -> Result<Option<f64>, crate::error::Error>,
    ) -> Result<(), crate::error::Error>
    where
        E: Clone,
    {
        while let Some(next_at) = self.heap.peek().map(|s| s.at) {
            if next_at > until {
                break;
            }
            let Scheduled { at, event, .. } = self.heap.pop().expect("peeked Some above");
            self.clock.advance_to(at);
            if let Some(dt) = handler(at, &event)? {
                self.schedule(at + dt, event);
            }
        }
        Ok(())
    }
}
