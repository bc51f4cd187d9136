//! The event queue: bounded, timestamp-ordered, thread-safe.
//!
//! Pushing is the one operation foreign threads (timer, audio callback,
//! input delivery) are allowed to perform on the core. The interpreter
//! thread drains the queue from the front. Ordering is ascending by
//! timestamp, stable for equal timestamps; at capacity the oldest entry is
//! evicted before the new one is admitted.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::host::Clock;
use std::sync::Arc;

use super::event::Event;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[derive(Debug)]
pub struct EventQueue {
    inner: Mutex<VecDeque<Event>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
    cond: Condvar,
}

impl EventQueue {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            clock,
            cond: Condvar::new(),
        }
    }

    /// Admit an event. An unset timestamp is assigned from the clock; a
    /// full queue drops its oldest entry first; the event is placed to keep
    /// the queue ascending by timestamp with ties in insertion order.
    pub fn push(&self, mut event: Event) {
        let ts = match event.timestamp {
            Some(ts) => ts,
            None => {
                let now = self.clock.now();
                event.timestamp = Some(now);
                now
            }
        };
        let mut q = self.inner.lock().unwrap();
        if q.len() >= self.capacity {
            q.pop_front();
        }
        // Stable position: after every entry with timestamp <= ts.
        let at = q.partition_point(|e| e.timestamp.unwrap_or(0) <= ts);
        q.insert(at, event);
        drop(q);
        self.cond.notify_all();
    }

    /// The earliest event, if any.
    pub fn pop(&self) -> Option<Event> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Block up to `timeout` for an event. Returns `None` on timeout or on
    /// a wake with an empty queue (the event loop re-checks its stop flag
    /// either way).
    pub fn pop_wait(&self, timeout: Duration) -> Option<Event> {
        let mut q = self.inner.lock().unwrap();
        if q.is_empty() {
            let (guard, _timed_out) = self.cond.wait_timeout(q, timeout).unwrap();
            q = guard;
        }
        q.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    /// Wake any blocked `pop_wait` caller; used by `Stop` so the event loop
    /// notices promptly.
    pub fn wake(&self) {
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualClock;
    use crate::vm::events::EventType;

    fn queue(capacity: usize) -> (EventQueue, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (EventQueue::new(capacity, clock.clone()), clock)
    }

    fn ts(ev: &Event) -> u64 {
        ev.timestamp.unwrap()
    }

    #[test]
    fn test_pop_returns_timestamp_order() {
        let (q, _clock) = queue(10);
        q.push(Event::new(EventType::Time).with_timestamp(5));
        q.push(Event::new(EventType::Time).with_timestamp(1));
        q.push(Event::new(EventType::Time).with_timestamp(3));
        let order: Vec<u64> = std::iter::from_fn(|| q.pop()).map(|e| ts(&e)).collect();
        assert_eq!(order, vec![1, 3, 5]);
    }

    #[test]
    fn test_equal_timestamps_preserve_push_order() {
        let (q, _clock) = queue(10);
        q.push(Event::new(EventType::Time).with_timestamp(2).with_param("n", crate::vm::value::Value::I64(1)));
        q.push(Event::new(EventType::Key).with_timestamp(2).with_param("n", crate::vm::value::Value::I64(2)));
        q.push(Event::new(EventType::Click).with_timestamp(2).with_param("n", crate::vm::value::Value::I64(3)));
        let order: Vec<i64> = std::iter::from_fn(|| q.pop())
            .map(|e| e.param("n").unwrap().coerce_i64().unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let (q, _clock) = queue(3);
        for t in 1..=5 {
            q.push(Event::new(EventType::Time).with_timestamp(t));
        }
        let order: Vec<u64> = std::iter::from_fn(|| q.pop()).map(|e| ts(&e)).collect();
        assert_eq!(order, vec![3, 4, 5]);
    }

    #[test]
    fn test_unset_timestamp_is_assigned_by_clock() {
        let (q, clock) = queue(10);
        clock.advance(42);
        q.push(Event::new(EventType::Time));
        assert_eq!(ts(&q.pop().unwrap()), 42);
    }

    #[test]
    fn test_clear_empties_queue() {
        let (q, _clock) = queue(10);
        q.push(Event::new(EventType::Time).with_timestamp(1));
        q.clear();
        assert!(q.is_empty());
    }

    #[test]
    fn test_pop_wait_wakes_on_cross_thread_push() {
        let clock = Arc::new(ManualClock::new());
        let q = Arc::new(EventQueue::new(10, clock));
        let q2 = Arc::clone(&q);
        let pusher = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            q2.push(Event::new(EventType::Time).with_timestamp(1));
        });
        let got = q.pop_wait(Duration::from_secs(5));
        pusher.join().unwrap();
        assert!(got.is_some());
    }
}
