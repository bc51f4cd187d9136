//! Interval timer: a thread feeding `Time` events into a VM's queue.
//!
//! The thread owns nothing of the VM but a queue handle and pushes one
//! event per tick, which is exactly the cross-thread operation the core
//! permits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use filly_vm::vm::{Event, EventQueue, EventType};

#[derive(Debug)]
pub struct TimerSource {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TimerSource {
    /// Start ticking `Time` events into `queue` every `interval`.
    pub fn start(queue: Arc<EventQueue>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("filly-timer".into())
            .spawn(move || {
                while !stop_flag.load(Ordering::SeqCst) {
                    std::thread::sleep(interval);
                    if stop_flag.load(Ordering::SeqCst) {
                        break;
                    }
                    queue.push(Event::new(EventType::Time));
                }
            })
            .expect("spawn timer thread");
        Self {
            stop,
            thread: Some(thread),
        }
    }

    /// Stop ticking. Blocks for at most one interval while the thread
    /// winds down.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for TimerSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filly_vm::host::MonotonicClock;

    #[test]
    fn test_timer_pushes_time_events() {
        let queue = Arc::new(EventQueue::new(100, Arc::new(MonotonicClock::new())));
        let mut timer = TimerSource::start(Arc::clone(&queue), Duration::from_millis(5));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while queue.len() < 3 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        timer.stop();
        assert!(queue.len() >= 3);
        let ev = queue.pop().unwrap();
        assert_eq!(ev.ty, EventType::Time);
        assert!(ev.timestamp.is_some());
    }
}
